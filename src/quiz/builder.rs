use crate::dataset::Sentence;
use crate::quiz::distractors::generate_distractors;
use crate::quiz::words::extract_words;
use crate::quiz::Question;
use crate::shuffle::Shuffler;

pub const WORD_BANK_DISTRACTORS: usize = 8;

/// One question per sentence, in dataset order. Call again for a fresh set of word banks.
pub fn build_questions(sentences: &[Sentence], rng: &mut impl Shuffler) -> Vec<Question> {
    sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| {
            let correct_words = extract_words(&sentence.text_english);
            let distractors = generate_distractors(sentences, index, &correct_words);

            let mut word_bank: Vec<String> = correct_words
                .iter()
                .cloned()
                .chain(distractors.into_iter().take(WORD_BANK_DISTRACTORS))
                .collect();
            rng.shuffle(&mut word_bank);

            Question {
                id: sentence.id,
                chinese: sentence.text_chinese.clone(),
                pinyin: sentence.pinyin.clone(),
                english: sentence.text_english.clone(),
                correct_words,
                word_bank,
                group: sentence.group.clone(),
                batch: sentence.batch,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sentence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sentences() -> Vec<Sentence> {
        vec![
            sentence(10, "I am a teacher.", "HSK1", 1),
            sentence(11, "She is my friend.", "HSK1", 1),
            sentence(12, "We drink tea every day.", "HSK1", 2),
        ]
    }

    #[test]
    fn one_question_per_sentence_in_order() {
        let questions = build_questions(&sentences(), &mut StdRng::seed_from_u64(3));
        assert_eq!(questions.iter().map(|q| q.id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(questions[2].batch, 2);
        assert_eq!(questions[1].english, "She is my friend.");
        assert_eq!(questions[1].correct_words, vec!["She", "is", "my", "friend"]);
    }

    #[test]
    fn word_bank_holds_answer_plus_eight_distractors() {
        let input = sentences();
        let questions = build_questions(&input, &mut StdRng::seed_from_u64(5));
        for (index, question) in questions.iter().enumerate() {
            let distractors = generate_distractors(&input, index, &question.correct_words);
            let expected = question.correct_words.len() + distractors.len().min(WORD_BANK_DISTRACTORS);
            assert_eq!(question.word_bank.len(), expected);
            for word in &question.correct_words {
                assert!(question.word_bank.contains(word));
            }
            for word in distractors.iter().take(WORD_BANK_DISTRACTORS) {
                assert!(question.word_bank.contains(word));
            }
        }
    }

    #[test]
    fn rebuilding_reshuffles() {
        let input = sentences();
        let mut rng = StdRng::seed_from_u64(11);
        let first = build_questions(&input, &mut rng);
        let second = build_questions(&input, &mut rng);
        assert!(first
            .iter()
            .zip(&second)
            .any(|(a, b)| a.word_bank != b.word_bank));
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.correct_words, b.correct_words);
            let mut bank_a = a.word_bank.clone();
            let mut bank_b = b.word_bank.clone();
            bank_a.sort();
            bank_b.sort();
            assert_eq!(bank_a, bank_b);
        }
    }

    #[test]
    fn empty_dataset_gives_no_questions() {
        assert!(build_questions(&[], &mut StdRng::seed_from_u64(0)).is_empty());
    }
}
