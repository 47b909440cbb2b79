//! Flashcard data types shared by every stage of the pipeline

use serde::{Deserialize, Serialize};

/// Longest question or answer kept, in characters
pub const MAX_FIELD_CHARS: usize = 190;
/// Longest title kept, in characters
pub const MAX_TITLE_CHARS: usize = 50;
/// Longest prompt accepted, in characters
pub const MAX_PROMPT_CHARS: usize = 250;

/// One extracted question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    /// Build a card from raw fields, trimming and capping both
    pub fn clamped(question: &str, answer: &str) -> Self {
        Self {
            question: clamp_field(question, MAX_FIELD_CHARS),
            answer: clamp_field(answer, MAX_FIELD_CHARS),
        }
    }

    /// Either field is empty after trimming
    pub fn has_empty_field(&self) -> bool {
        self.question.is_empty() || self.answer.is_empty()
    }
}

/// Ordered cards plus the optional title, handed to the caller on completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub cards: Vec<Flashcard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Trim surrounding whitespace, then keep at most `max_chars` characters
pub fn clamp_field(raw: &str, max_chars: usize) -> String {
    raw.trim().chars().take(max_chars).collect()
}

/// Normalize a title candidate; None when nothing remains after trimming
pub fn clamp_title(raw: &str) -> Option<String> {
    let title = clamp_field(raw, MAX_TITLE_CHARS);
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_trims_then_truncates() {
        let long = format!("   {}   ", "x".repeat(300));
        let clamped = clamp_field(&long, MAX_FIELD_CHARS);
        assert_eq!(clamped.chars().count(), 190);
        assert!(clamped.chars().all(|c| c == 'x'));
    }

    #[test]
    fn test_clamp_counts_characters_not_bytes() {
        let long = "é".repeat(200);
        let clamped = clamp_field(&long, MAX_FIELD_CHARS);
        assert_eq!(clamped.chars().count(), 190);
        assert_eq!(clamped.len(), 380);
    }

    #[test]
    fn test_clamped_card_keeps_empty_fields() {
        let card = Flashcard::clamped("  ", "answer");
        assert_eq!(card.question, "");
        assert!(card.has_empty_field());
        let card = Flashcard::clamped(" 2+2? ", " 4 ");
        assert_eq!(card.question, "2+2?");
        assert_eq!(card.answer, "4");
        assert!(!card.has_empty_field());
    }

    #[test]
    fn test_title_capped_at_fifty() {
        let title = clamp_title(&"t".repeat(80)).unwrap();
        assert_eq!(title.len(), 50);
        assert_eq!(clamp_title("   "), None);
    }
}
