//! Cursor-based tokenizer for delimiter-marked text (format A)
//!
//! ```text
//! TITLE: <text>
//! CARD_START
//! Q: <question>
//! A: <answer>
//! CARD_END
//! ```
//!
//! Every byte is examined once. Complete lines outside a card are dropped as
//! soon as they are examined; the text of a partially matched card stays in the
//! buffer until its end marker arrives.

use tracing::{debug, warn};

pub const CARD_START: &str = "CARD_START";
pub const CARD_END: &str = "CARD_END";
const TITLE_PREFIX: &str = "TITLE:";
const QUESTION_PREFIX: &str = "Q:";
const ANSWER_PREFIX: &str = "A:";

/// A fully matched unit of format A text. Fields are raw (untrimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Title(String),
    Card { question: String, answer: String },
}

/// Position inside the card grammar
#[derive(Debug, Default)]
enum Stage {
    #[default]
    Seeking,
    Question,
    Answer {
        question: String,
    },
    End {
        question: String,
        answer: String,
    },
}

#[derive(Debug, Default)]
pub struct MarkerScanner {
    /// Unconsumed text; starts at the current block or the next unexamined line
    buffer: String,
    /// Start of the first line not yet examined
    cursor: usize,
    /// Everything before this offset is known to contain no newline past `cursor`
    scanned_to: usize,
    /// Start of the partially matched block, if any
    block_start: Option<usize>,
    /// The current line already closed a block; the rest of it is ignored
    closed_mid_line: bool,
    stage: Stage,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the text still held for future matching
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append text and return every unit it completes
    pub fn push(&mut self, text: &str) -> Vec<Token> {
        self.buffer.push_str(text);
        let mut tokens = Vec::new();

        loop {
            let search_from = self.scanned_to.max(self.cursor);
            let Some(offset) = self.buffer[search_from..].find('\n') else {
                self.scanned_to = self.buffer.len();
                break;
            };
            let line_start = self.cursor;
            let line_end = search_from + offset;
            self.cursor = line_end + 1;
            if std::mem::take(&mut self.closed_mid_line) {
                continue;
            }
            let line = self.buffer[line_start..line_end].to_string();
            self.examine(&line, line_start, &mut tokens);
        }

        self.close_on_partial_line(&mut tokens);
        self.compact();
        tokens
    }

    /// End of stream: the unterminated final line is examined as a whole line
    pub fn finish(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        if !std::mem::take(&mut self.closed_mid_line) && self.cursor < self.buffer.len() {
            let line_start = self.cursor;
            let line = self.buffer[line_start..].to_string();
            self.cursor = self.buffer.len();
            self.examine(&line, line_start, &mut tokens);
        }
        if !matches!(self.stage, Stage::Seeking) {
            warn!("Stream ended inside an unfinished card; dropping it");
        }
        self.stage = Stage::Seeking;
        self.block_start = None;
        self.buffer.clear();
        self.cursor = 0;
        self.scanned_to = 0;
        tokens
    }

    fn examine(&mut self, line: &str, line_start: usize, tokens: &mut Vec<Token>) {
        let line = line.trim();
        match std::mem::take(&mut self.stage) {
            Stage::Seeking => self.seek(line, line_start, tokens),
            Stage::Question => {
                if line.is_empty() {
                    self.stage = Stage::Question;
                } else if let Some(question) = line.strip_prefix(QUESTION_PREFIX) {
                    self.stage = Stage::Answer {
                        question: question.to_string(),
                    };
                } else {
                    self.abandon("expected a 'Q:' line", line, line_start, tokens);
                }
            }
            Stage::Answer { question } => {
                if line.is_empty() {
                    self.stage = Stage::Answer { question };
                } else if let Some(answer) = line.strip_prefix(ANSWER_PREFIX) {
                    self.stage = Stage::End {
                        question,
                        answer: answer.to_string(),
                    };
                } else {
                    self.abandon("expected an 'A:' line", line, line_start, tokens);
                }
            }
            Stage::End { question, answer } => {
                if line.is_empty() {
                    self.stage = Stage::End { question, answer };
                } else if line.contains(CARD_END) {
                    self.block_start = None;
                    tokens.push(Token::Card { question, answer });
                } else {
                    self.abandon("expected CARD_END", line, line_start, tokens);
                }
            }
        }
    }

    fn seek(&mut self, line: &str, line_start: usize, tokens: &mut Vec<Token>) {
        if line.contains(CARD_START) {
            self.stage = Stage::Question;
            self.block_start = Some(line_start);
        } else if let Some(title) = line.strip_prefix(TITLE_PREFIX) {
            tokens.push(Token::Title(title.to_string()));
        } else if !line.is_empty() {
            debug!("Skipping text outside any card: {} chars", line.len());
        }
    }

    /// Give up on the current block; the offending line may itself start a new one
    fn abandon(&mut self, reason: &str, line: &str, line_start: usize, tokens: &mut Vec<Token>) {
        warn!("Abandoning partial card ({}), got: {}", reason, line);
        self.block_start = None;
        self.stage = Stage::Seeking;
        self.seek(line, line_start, tokens);
    }

    /// A complete end marker closes its block even before its newline arrives
    fn close_on_partial_line(&mut self, tokens: &mut Vec<Token>) {
        if !matches!(self.stage, Stage::End { .. }) {
            return;
        }
        let Some(offset) = self.buffer[self.cursor..].find(CARD_END) else {
            return;
        };
        if !self.buffer[self.cursor..self.cursor + offset].trim().is_empty() {
            return;
        }
        if let Stage::End { question, answer } = std::mem::take(&mut self.stage) {
            self.cursor += offset + CARD_END.len();
            self.scanned_to = self.cursor;
            self.block_start = None;
            self.closed_mid_line = true;
            tokens.push(Token::Card { question, answer });
        }
    }

    /// Drop the prefix no future match can use
    fn compact(&mut self) {
        let keep_from = self.block_start.unwrap_or(self.cursor);
        if keep_from == 0 {
            return;
        }
        self.buffer.drain(..keep_from);
        self.cursor -= keep_from;
        self.scanned_to = self.scanned_to.saturating_sub(keep_from);
        if let Some(start) = self.block_start.as_mut() {
            *start = 0;
        }
    }
}
