use crate::dataset::Sentence;
use crate::error::{DrillError, Result};
use crate::quiz::builder::build_questions;
use crate::quiz::Question;
use crate::shuffle::Shuffler;

/// Which prompt, if any, the player is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Answering,
    /// Answer was right; waiting for "Continue" or the auto-advance timer.
    AwaitingContinue,
    /// Answer was wrong; the correct one is shown with "Try again" / "Next question".
    Reviewing { correct_answer: String },
    ConfirmingSkip,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Correct,
    Incorrect { correct_answer: String },
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<Question>,
    current: usize,
    selected: Vec<String>,
    score: u32,
    phase: Phase,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>) -> Self {
        let phase = if questions.is_empty() {
            Phase::Finished
        } else {
            Phase::Answering
        };
        Self {
            questions,
            current: 0,
            selected: Vec::new(),
            score: 0,
            phase,
        }
    }

    pub fn load(sentences: &[Sentence], rng: &mut impl Shuffler) -> Self {
        Self::new(build_questions(sentences, rng))
    }

    /// Starts over with freshly built word banks.
    pub fn restart(&mut self, sentences: &[Sentence], rng: &mut impl Shuffler) {
        *self = Self::load(sentences, rng);
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.is_finished() {
            return None;
        }
        self.questions.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn selected_words(&self) -> &[String] {
        &self.selected
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Adds a word from the bank to the answer. Repeats and unknown words are ignored.
    pub fn press_word(&mut self, word: &str) -> bool {
        if self.phase != Phase::Answering {
            return false;
        }
        let Some(question) = self.questions.get(self.current) else {
            return false;
        };
        if !question.word_bank.iter().any(|w| w == word) || self.selected.iter().any(|w| w == word) {
            return false;
        }
        self.selected.push(word.to_string());
        true
    }

    pub fn reset_selection(&mut self) {
        self.selected.clear();
    }

    /// Compares the selection with the answer, order included.
    /// `Ok(None)` means there is no open question to check.
    pub fn check(&mut self) -> Result<Option<CheckOutcome>> {
        if self.phase != Phase::Answering {
            return Ok(None);
        }
        let Some(question) = self.questions.get(self.current) else {
            return Ok(None);
        };
        if self.selected.is_empty() {
            return Err(DrillError::EmptySelection);
        }

        if self.selected == question.correct_words {
            self.score += 1;
            self.phase = Phase::AwaitingContinue;
            Ok(Some(CheckOutcome::Correct))
        } else {
            let correct_answer = question.answer_text();
            self.phase = Phase::Reviewing {
                correct_answer: correct_answer.clone(),
            };
            Ok(Some(CheckOutcome::Incorrect { correct_answer }))
        }
    }

    /// Moves on after a correct answer. Keyed by question so that "Continue" and the
    /// auto-advance timer together advance only once.
    pub fn acknowledge(&mut self, question_index: usize) -> bool {
        if self.phase != Phase::AwaitingContinue || self.current != question_index {
            return false;
        }
        self.advance();
        true
    }

    /// Back to the same question with an empty answer.
    pub fn retry(&mut self) {
        if matches!(self.phase, Phase::Reviewing { .. }) {
            self.selected.clear();
            self.phase = Phase::Answering;
        }
    }

    pub fn advance(&mut self) {
        self.selected.clear();
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.phase = Phase::Answering;
        } else {
            self.phase = Phase::Finished;
        }
    }

    pub fn request_skip(&mut self) -> bool {
        if self.phase != Phase::Answering {
            return false;
        }
        self.phase = Phase::ConfirmingSkip;
        true
    }

    pub fn confirm_skip(&mut self, confirmed: bool) {
        if self.phase != Phase::ConfirmingSkip {
            return;
        }
        if confirmed {
            self.advance();
        } else {
            self.phase = Phase::Answering;
        }
    }
}
