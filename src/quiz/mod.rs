pub mod builder;
pub mod distractors;
pub mod session;
pub mod words;

pub use session::{CheckOutcome, Phase, QuizSession};

/// A "rebuild the English sentence" question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Question {
    pub id: u32,
    pub chinese: String,
    pub pinyin: String,
    pub english: String,
    pub correct_words: Vec<String>,
    /// Correct words and distractors, shuffled.
    pub word_bank: Vec<String>,
    pub group: String,
    pub batch: u32,
}

impl Question {
    pub fn answer_text(&self) -> String {
        self.correct_words.join(" ")
    }
}
