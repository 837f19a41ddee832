use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub id: u32,
    pub text_chinese: String,
    pub text_english: String,
    pub pinyin: String,
    pub group: String,
    pub batch: u32,
}

/// The read-only sentence collection shared by the flashcards and the sentence game.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub sentences: Vec<Sentence>,
}

impl Dataset {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let sentences: Vec<Sentence> = serde_json::from_reader(reader)?;
        Ok(Self::new(sentences))
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn batch(&self, group: &str, batch: u32) -> Vec<Sentence> {
        self.sentences
            .iter()
            .filter(|s| s.group == group && s.batch == batch)
            .cloned()
            .collect()
    }

    /// Group keys in first-appearance order.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for sentence in &self.sentences {
            if !groups.contains(&sentence.group) {
                groups.push(sentence.group.clone());
            }
        }
        groups
    }

    pub fn batches(&self, group: &str) -> Vec<u32> {
        self.sentences
            .iter()
            .filter(|s| s.group == group)
            .map(|s| s.batch)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// "HSK3" -> "3". Groups without the prefix are used as they are.
pub fn level_of(group: &str) -> &str {
    group.strip_prefix("HSK").unwrap_or(group)
}

#[cfg(test)]
pub(crate) fn sentence(id: u32, english: &str, group: &str, batch: u32) -> Sentence {
    Sentence {
        id,
        text_chinese: format!("句子{}", id),
        text_english: english.to_string(),
        pinyin: format!("jùzi {}", id),
        group: group.to_string(),
        batch,
    }
}
