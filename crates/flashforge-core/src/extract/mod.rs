//! Record extraction
//!
//! Turns decoded frames into titles and flashcards the moment they are
//! complete. Format A text goes through the marker tokenizer; format B
//! events already carry one unit each.

pub mod markers;

use tracing::{debug, warn};

pub use markers::{MarkerScanner, Token, CARD_END, CARD_START};

use crate::stream::Frame;
use crate::types::{clamp_title, Flashcard};

/// A completed unit ready for the emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Title(String),
    Card {
        card: Flashcard,
        /// Sequence number claimed by the backend (format B only)
        claimed_index: Option<usize>,
    },
}

/// Stateful extractor, one per session
#[derive(Debug, Default)]
pub struct RecordExtractor {
    scanner: MarkerScanner,
    title_captured: bool,
    cards_extracted: usize,
}

impl RecordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cards handed out so far
    pub fn cards_extracted(&self) -> usize {
        self.cards_extracted
    }

    /// Feed one frame; returns every unit it completes, in order
    pub fn extract(&mut self, frame: Frame) -> Vec<Extracted> {
        match frame {
            Frame::Text(text) => {
                let tokens = self.scanner.push(&text);
                self.accept_tokens(tokens)
            }
            Frame::Title(raw) => self.capture_title(&raw).into_iter().collect(),
            Frame::Card {
                question,
                answer,
                index,
            } => {
                vec![self.accept_card(&question, &answer, index)]
            }
        }
    }

    /// End of stream: flush text still held by the tokenizer
    pub fn finish(&mut self) -> Vec<Extracted> {
        let tokens = self.scanner.finish();
        self.accept_tokens(tokens)
    }

    fn accept_tokens(&mut self, tokens: Vec<Token>) -> Vec<Extracted> {
        let mut extracted = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Title(raw) => extracted.extend(self.capture_title(&raw)),
                Token::Card { question, answer } => {
                    extracted.push(self.accept_card(&question, &answer, None))
                }
            }
        }
        extracted
    }

    fn accept_card(
        &mut self,
        question: &str,
        answer: &str,
        claimed_index: Option<usize>,
    ) -> Extracted {
        let card = Flashcard::clamped(question, answer);
        if card.has_empty_field() {
            warn!(
                "Card #{} has an empty question or answer",
                self.cards_extracted
            );
        }
        self.cards_extracted += 1;
        Extracted::Card {
            card,
            claimed_index,
        }
    }

    /// Only the first title line counts, and only before the first card.
    /// A blank first title still uses up the capture.
    fn capture_title(&mut self, raw: &str) -> Option<Extracted> {
        if self.title_captured {
            debug!("Ignoring extra title: {}", raw.trim());
            return None;
        }
        if self.cards_extracted > 0 {
            debug!("Ignoring title that arrived after the first card");
            return None;
        }
        self.title_captured = true;
        match clamp_title(raw) {
            Some(title) => Some(Extracted::Title(title)),
            None => {
                debug!("First title line is blank; no title for this session");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    fn cards(extracted: &[Extracted]) -> Vec<(String, String)> {
        extracted
            .iter()
            .filter_map(|e| match e {
                Extracted::Card { card, .. } => Some((card.question.clone(), card.answer.clone())),
                Extracted::Title(_) => None,
            })
            .collect()
    }

    fn run_chunks(chunks: &[&str]) -> Vec<Extracted> {
        let mut extractor = RecordExtractor::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(extractor.extract(text(chunk)));
        }
        out.extend(extractor.finish());
        out
    }

    const BODY: &str = "TITLE: Arithmetic\nCARD_START\nQ: 2+2?\nA: 4\nCARD_END\n\
                        CARD_START\nQ: 3×3?\nA: 9\nCARD_END\nCARD_START\nQ: 10/2?\nA: 5\nCARD_END";

    #[test]
    fn test_split_inside_start_marker() {
        let out = run_chunks(&["CARD_ST", "ART\nQ: 2+2?\nA: 4\nCARD_END"]);
        assert_eq!(
            out,
            vec![Extracted::Card {
                card: Flashcard {
                    question: "2+2?".to_string(),
                    answer: "4".to_string()
                },
                claimed_index: None
            }]
        );
    }

    #[test]
    fn test_any_two_way_split_matches_whole() {
        let whole = run_chunks(&[BODY]);
        assert_eq!(whole.len(), 4);
        for (split, _) in BODY.char_indices() {
            let out = run_chunks(&[&BODY[..split], &BODY[split..]]);
            assert_eq!(out, whole, "split at {}", split);
        }
    }

    #[test]
    fn test_three_way_splits_match_whole() {
        let whole = run_chunks(&[BODY]);
        let offsets: Vec<usize> = BODY.char_indices().map(|(i, _)| i).step_by(3).collect();
        for &a in &offsets {
            for &b in offsets.iter().filter(|&&b| b >= a) {
                let out = run_chunks(&[&BODY[..a], &BODY[a..b], &BODY[b..]]);
                assert_eq!(out, whole, "splits at {} and {}", a, b);
            }
        }
    }

    #[test]
    fn test_fields_truncated_to_190_chars() {
        let long = "q".repeat(250);
        let body = format!("CARD_START\nQ:   {}   \nA: {}\nCARD_END\n", long, long);
        let out = run_chunks(&[&body]);
        let (question, answer) = &cards(&out)[0];
        assert_eq!(question.chars().count(), 190);
        assert_eq!(answer.chars().count(), 190);
    }

    #[test]
    fn test_second_title_after_cards_ignored() {
        let out = run_chunks(&[
            "TITLE: First\nCARD_START\nQ: a\nA: b\nCARD_END\nTITLE: Second\n",
        ]);
        let titles: Vec<_> = out
            .iter()
            .filter_map(|e| match e {
                Extracted::Title(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["First"]);
    }

    #[test]
    fn test_title_after_first_card_ignored() {
        let out = run_chunks(&["CARD_START\nQ: a\nA: b\nCARD_END\nTITLE: Late\n"]);
        assert!(out.iter().all(|e| !matches!(e, Extracted::Title(_))));
    }

    #[test]
    fn test_only_first_title_captured() {
        let out = run_chunks(&["TITLE: One\nTITLE: Two\n"]);
        assert_eq!(out, vec![Extracted::Title("One".to_string())]);
    }

    #[test]
    fn test_event_card_keeps_claimed_index() {
        let mut extractor = RecordExtractor::new();
        let out = extractor.extract(Frame::Card {
            question: "  Capital of France? ".to_string(),
            answer: "Paris".to_string(),
            index: Some(0),
        });
        assert_eq!(
            out,
            vec![Extracted::Card {
                card: Flashcard {
                    question: "Capital of France?".to_string(),
                    answer: "Paris".to_string()
                },
                claimed_index: Some(0)
            }]
        );
        assert!(extractor.extract(Frame::Title("Too late".to_string())).is_empty());
    }

    #[test]
    fn test_event_card_with_empty_answer_still_extracted() {
        let mut extractor = RecordExtractor::new();
        let out = extractor.extract(Frame::Card {
            question: "q".to_string(),
            answer: "   ".to_string(),
            index: Some(0),
        });
        assert_eq!(
            out,
            vec![Extracted::Card {
                card: Flashcard {
                    question: "q".to_string(),
                    answer: String::new()
                },
                claimed_index: Some(0)
            }]
        );
        let next = extractor.extract(Frame::Card {
            question: "q2".to_string(),
            answer: "a2".to_string(),
            index: Some(1),
        });
        assert_eq!(next.len(), 1);
        assert_eq!(extractor.cards_extracted(), 2);
    }

    #[test]
    fn test_empty_flat_card_still_extracted() {
        let out = run_chunks(&["CARD_START\nQ:\nA: b\nCARD_END\nCARD_START\nQ: c\nA: d\nCARD_END\n"]);
        assert_eq!(
            cards(&out),
            vec![
                (String::new(), "b".to_string()),
                ("c".to_string(), "d".to_string())
            ]
        );
    }

    #[test]
    fn test_blank_first_title_uses_up_capture() {
        let out = run_chunks(&["TITLE:   \nTITLE: Second\nCARD_START\nQ: a\nA: b\nCARD_END\n"]);
        assert!(out.iter().all(|e| !matches!(e, Extracted::Title(_))));
        assert_eq!(cards(&out).len(), 1);
    }
}
