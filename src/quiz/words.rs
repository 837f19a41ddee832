const STRIPPED: [char; 8] = ['.', ',', '!', '?', ';', ':', '\'', '"'];

/// Splits English text into the words the player has to rebuild, punctuation removed.
pub fn extract_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.chars().filter(|c| !STRIPPED.contains(c)).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect()
}
