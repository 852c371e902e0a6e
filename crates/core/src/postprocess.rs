use std::sync::Arc;

use tracing::{debug, warn};

use crate::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use crate::prompts;

pub const DEFAULT_LENGTH_TOLERANCE: f64 = 1.2;

/// Best-effort length enforcement for generated summaries.
#[derive(Clone)]
pub struct PostProcessor {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    tolerance: f64,
}

impl PostProcessor {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self {
            generator,
            options,
            tolerance: DEFAULT_LENGTH_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = if tolerance.is_finite() && tolerance >= 1.0 {
            tolerance
        } else {
            DEFAULT_LENGTH_TOLERANCE
        };
        self
    }

    /// True when `text` is longer than `target_words * tolerance` words.
    pub fn exceeds(&self, text: &str, target_words: usize) -> bool {
        target_words > 0 && word_count(text) as f64 > target_words as f64 * self.tolerance
    }

    /// Condenses over-length text with one extra generation call.
    ///
    /// Returns the input unchanged when within bounds, and also when condensing
    /// fails or yields nothing.
    pub fn enforce(&self, text: &str, target_words: usize) -> String {
        if !self.exceeds(text, target_words) {
            return text.to_string();
        }
        debug!(
            words = word_count(text),
            target = target_words,
            "condensing over-length summary"
        );
        let request = GenerationRequest::new(
            prompts::CONDENSE_SYSTEM_PROMPT,
            prompts::condense_prompt(text, target_words),
            self.options,
        );
        match self.generator.generate(&request) {
            Ok(condensed) if !condensed.trim().is_empty() => condensed.trim().to_string(),
            Ok(_) => {
                warn!("condensation returned no text; keeping original");
                text.to_string()
            }
            Err(err) => {
                warn!("condensation failed; keeping original: {err}");
                text.to_string()
            }
        }
    }
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
