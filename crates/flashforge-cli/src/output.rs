//! Card printing

use std::io::Write;

use flashforge_core::{CardEvent, CardSink, Flashcard, GenerationResult, SinkWarning};

/// Sink that prints cards to stdout as they arrive
pub struct CardPrinter {
    json: bool,
}

impl CardPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print a result that arrived all at once
    pub fn print_result(&mut self, result: &GenerationResult) -> anyhow::Result<()> {
        if let Some(title) = &result.title {
            self.on_title(title)?;
        }
        for (index, card) in result.cards.iter().enumerate() {
            self.on_card(card, index)?;
        }
        Ok(())
    }

    fn write_event(&self, event: &CardEvent) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        match event {
            _ if self.json => writeln!(out, "{}", serde_json::to_string(event)?)?,
            CardEvent::Title { title } => writeln!(out, "# {}\n", title)?,
            CardEvent::Card { index, card } => {
                writeln!(out, "{:>3}. Q: {}", index + 1, card.question)?;
                writeln!(out, "     A: {}", card.answer)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

impl CardSink for CardPrinter {
    fn on_card(&mut self, card: &Flashcard, index: usize) -> anyhow::Result<()> {
        self.write_event(&CardEvent::Card {
            index,
            card: card.clone(),
        })
    }

    fn on_title(&mut self, title: &str) -> anyhow::Result<()> {
        self.write_event(&CardEvent::Title {
            title: title.to_string(),
        })
    }
}

pub fn report_warnings(warnings: &[SinkWarning]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}
