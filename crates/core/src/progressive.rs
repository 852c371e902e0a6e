use std::collections::VecDeque;

pub const DEFAULT_PROGRESSIVE_WORDS: usize = 600;
const MIN_COMPRESSED_WORDS: usize = 12;
const OMITTED_MARKER: &str = "[earlier context omitted]";

/// Running digest of the chunk summaries seen so far in one document.
///
/// Bounded by a word budget. When over budget, the oldest entries are cut down
/// to a short head first, then dropped from the front. The newest entry is only
/// cut when it alone exceeds the budget.
#[derive(Debug, Clone)]
pub struct ProgressiveContext {
    budget_words: usize,
    entries: VecDeque<Entry>,
    omitted: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    index: usize,
    text: String,
    words: usize,
    compressed: bool,
}

impl ProgressiveContext {
    pub fn new(budget_words: usize) -> Self {
        Self {
            budget_words: budget_words.max(MIN_COMPRESSED_WORDS),
            entries: VecDeque::new(),
            omitted: 0,
        }
    }

    pub fn push(&mut self, index: usize, summary: &str) {
        let text = summary.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return;
        }
        let words = word_count(&text);
        self.entries.push_back(Entry {
            index,
            text,
            words,
            compressed: false,
        });
        self.enforce_budget();
    }

    pub fn word_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.words).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries dropped from the front so far.
    pub fn omitted(&self) -> usize {
        self.omitted
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len() + 1);
        if self.omitted > 0 {
            lines.push(OMITTED_MARKER.to_string());
        }
        for entry in &self.entries {
            lines.push(format!("[Section {}] {}", entry.index + 1, entry.text));
        }
        lines.join("\n")
    }

    fn enforce_budget(&mut self) {
        let budget = self.budget_words;
        if self.word_count() <= budget {
            return;
        }
        let head = (budget / 8).max(MIN_COMPRESSED_WORDS);
        let older = self.entries.len().saturating_sub(1);
        for position in 0..older {
            if self.word_count() <= budget {
                return;
            }
            let entry = &mut self.entries[position];
            if !entry.compressed && entry.words > head {
                entry.text = truncate_words(&entry.text, head);
                entry.words = head;
                entry.compressed = true;
            }
        }
        while self.word_count() > budget && self.entries.len() > 1 {
            self.entries.pop_front();
            self.omitted += 1;
        }
        if let Some(newest) = self.entries.back_mut() {
            if newest.words > budget {
                newest.text = truncate_words(&newest.text, budget);
                newest.words = budget;
                newest.compressed = true;
            }
        }
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let mut head = text
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ");
    head.push('…');
    head
}
