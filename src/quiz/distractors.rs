use crate::dataset::Sentence;
use crate::quiz::words::extract_words;

pub const MAX_DISTRACTORS: usize = 15;
const NEIGHBOURS: usize = 2;

// Common function words, used when the neighbouring sentences don't give enough.
const FALLBACK_WORDS: [&str; 48] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", //
    "with", "by", "from", "up", "down", "out", "off", "over", "under", //
    "very", "quite", "really", "much", "many", "some", "all", "every", //
    "can", "will", "would", "should", "could", "may", "might", "must", //
    "do", "does", "did", "have", "has", "had", "be", "am", "is", "are", "was", "were",
];

/// Wrong words for the sentence at `index`: words of the two sentences on either
/// side first, then common function words. Never contains a word of `correct_words`.
pub fn generate_distractors(
    sentences: &[Sentence],
    index: usize,
    correct_words: &[String],
) -> Vec<String> {
    let mut distractors: Vec<String> = Vec::new();

    let start = index.saturating_sub(NEIGHBOURS);
    let end = (index + NEIGHBOURS).min(sentences.len().saturating_sub(1));
    for neighbour in (start..=end).filter(|&i| i != index && i < sentences.len()) {
        for word in extract_words(&sentences[neighbour].text_english) {
            if word.chars().count() > 1
                && !correct_words.contains(&word)
                && !distractors.contains(&word)
            {
                distractors.push(word);
            }
        }
    }

    for word in FALLBACK_WORDS {
        if distractors.len() >= MAX_DISTRACTORS {
            break;
        }
        if !correct_words.iter().any(|w| w == word) && !distractors.iter().any(|d| d == word) {
            distractors.push(word.to_string());
        }
    }

    distractors.truncate(MAX_DISTRACTORS);
    distractors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sentence;

    fn dataset(texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| sentence(i as u32 + 1, text, "HSK1", 1))
            .collect()
    }

    #[test]
    fn never_overlaps_correct_words() {
        let sentences = dataset(&[
            "I like green tea.",
            "Do you like tea?",
            "The tea is very hot.",
            "I want some hot water.",
            "Is the water hot?",
        ]);
        for index in 0..sentences.len() {
            let correct = extract_words(&sentences[index].text_english);
            let distractors = generate_distractors(&sentences, index, &correct);
            assert!(distractors.len() <= MAX_DISTRACTORS);
            for word in &distractors {
                assert!(!correct.contains(word), "{word} leaked into distractors of {index}");
            }
        }
    }

    #[test]
    fn neighbour_words_come_first() {
        let sentences = dataset(&["Cats sleep often.", "Dogs bark.", "Birds sing loudly."]);
        let correct = extract_words(&sentences[1].text_english);
        let distractors = generate_distractors(&sentences, 1, &correct);
        assert_eq!(&distractors[..6], &["Cats", "sleep", "often", "Birds", "sing", "loudly"]);
    }

    #[test]
    fn single_sentence_uses_only_fallback_words() {
        let sentences = dataset(&["I am a student."]);
        let correct = extract_words(&sentences[0].text_english);
        let distractors = generate_distractors(&sentences, 0, &correct);
        assert_eq!(distractors.len(), MAX_DISTRACTORS);
        assert!(distractors.iter().all(|d| FALLBACK_WORDS.contains(&d.as_str())));
        assert!(!distractors.contains(&"am".to_string()));
        assert!(!distractors.contains(&"a".to_string()));
    }

    #[test]
    fn short_and_duplicate_neighbour_words_are_dropped() {
        let sentences = dataset(&["I go go home.", "We eat.", "I go home too."]);
        let correct = extract_words(&sentences[1].text_english);
        let distractors = generate_distractors(&sentences, 1, &correct);
        assert!(!distractors.contains(&"I".to_string()));
        assert_eq!(distractors.iter().filter(|d| *d == "go").count(), 1);
        assert_eq!(distractors.iter().filter(|d| *d == "home").count(), 1);
    }

    #[test]
    fn large_neighbourhood_is_capped() {
        let sentences = dataset(&[
            "Alpha bravo charlie delta echo foxtrot.",
            "Golf hotel india juliet kilo lima.",
            "Short one.",
            "Mike november oscar papa quebec romeo.",
            "Sierra tango uniform victor whiskey xray.",
        ]);
        let correct = extract_words(&sentences[2].text_english);
        let distractors = generate_distractors(&sentences, 2, &correct);
        assert_eq!(distractors.len(), MAX_DISTRACTORS);
        assert!(distractors.iter().all(|d| !FALLBACK_WORDS.contains(&d.as_str())));
    }

    #[test]
    fn edges_are_clamped() {
        let sentences = dataset(&["First here.", "Second there.", "Third where.", "Fourth now."]);
        let last = sentences.len() - 1;
        let correct = extract_words(&sentences[last].text_english);
        let distractors = generate_distractors(&sentences, last, &correct);
        assert!(distractors.contains(&"Second".to_string()));
        assert!(distractors.contains(&"Third".to_string()));
        assert!(!distractors.contains(&"First".to_string()));
    }
}
