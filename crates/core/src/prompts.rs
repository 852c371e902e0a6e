//! Prompt text for every generation call the pipeline issues.
//!
//! Material to be summarized always sits between `TEXT:` and `END TEXT`, and
//! template content between `TEMPLATE:` and `END TEMPLATE`; the offline
//! provider relies on these markers.

use crate::model::{ChunkSummary, DocumentSummary};

pub const FOCUS_SYSTEM_PROMPT: &str =
    "You derive the summarization focus of a template. Reply with a single JSON object and nothing else.";
pub const CHUNK_SYSTEM_PROMPT: &str =
    "You summarize one section of a longer document, keeping continuity with what came before.";
pub const DOCUMENT_SYSTEM_PROMPT: &str =
    "You combine the section summaries of one document into a single coherent summary.";
pub const META_SYSTEM_PROMPT: &str =
    "You synthesize the summaries of several documents into one meta-summary that follows the user's instructions.";
pub const CONDENSE_SYSTEM_PROMPT: &str =
    "You condense text to a target length while preserving its meaning.";

const NO_FOCUS: &str = "a balanced overview of the material";

pub fn focus_prompt(template: &str) -> String {
    format!(
        "Read the summary template below and extract:\n\
         1. \"emphasis\": a short phrase naming what the summary must emphasize.\n\
         2. \"instructions\": the ordered list of structural directives the summary must follow.\n\
         Respond with: {{\"emphasis\": \"...\", \"instructions\": [\"...\"]}}\n\n\
         TEMPLATE:\n{}\nEND TEMPLATE",
        template.trim()
    )
}

pub fn chunk_prompt(
    emphasis: &str,
    progressive_context: &str,
    previous_summary: &str,
    chunk_text: &str,
    target_words: usize,
) -> String {
    format!(
        "Focus: {}\n\
         Summarize the current section in at most {} words. Emphasize the focus. \
         Use the earlier context only for continuity; do not repeat it.\n\n\
         EARLIER CONTEXT:\n{}\n\n\
         PREVIOUS SECTION SUMMARY:\n{}\n\n\
         TEXT:\n{}\nEND TEXT",
        emphasis_or_default(emphasis),
        target_words,
        or_none(progressive_context, "(none)"),
        or_none(previous_summary, "(none; this is the first section)"),
        chunk_text
    )
}

pub fn document_prompt(
    document_name: &str,
    emphasis: &str,
    summaries: &[&ChunkSummary],
    missing_sections: &[usize],
    target_words: usize,
) -> String {
    let mut body = String::new();
    for summary in summaries {
        body.push_str(&format!("[Section {}] {}\n", summary.index + 1, summary.text.trim()));
    }
    let gap_note = if missing_sections.is_empty() {
        String::new()
    } else {
        let labels: Vec<String> = missing_sections.iter().map(|i| (i + 1).to_string()).collect();
        format!(
            "Sections {} could not be summarized and are missing; do not invent their content.\n",
            labels.join(", ")
        )
    };
    format!(
        "Document: {}\nFocus: {}\n\
         Combine the section summaries below into one summary of about {} words. \
         Emphasize the focus and preserve the chronological and logical order of the sections.\n\
         {}\nTEXT:\n{}END TEXT",
        document_name,
        emphasis_or_default(emphasis),
        target_words,
        gap_note,
        body
    )
}

pub fn meta_prompt(
    documents: &[&DocumentSummary],
    emphasis: &str,
    instructions: &[String],
    min_words: usize,
    max_words: usize,
) -> String {
    let directives = if instructions.is_empty() {
        "1. Give a balanced overview of all documents.\n".to_string()
    } else {
        instructions
            .iter()
            .enumerate()
            .map(|(i, directive)| format!("{}. {}\n", i + 1, directive))
            .collect()
    };
    let mut body = String::new();
    for (position, document) in documents.iter().enumerate() {
        body.push_str(&format!(
            "### Document {}: {}\n{}\n\n",
            position + 1,
            document.document_name,
            document.text.trim()
        ));
    }
    format!(
        "Focus: {}\nInstructions:\n{}\
         Write a meta-summary of {}-{} words covering the documents below. \
         Keep the documents in the order given and refer to each by name.\n\n\
         TEXT:\n{}END TEXT",
        emphasis_or_default(emphasis),
        directives,
        min_words,
        max_words,
        body
    )
}

pub fn condense_prompt(text: &str, target_words: usize) -> String {
    format!(
        "Condense the text below to at most {} words. Keep every name, date, and fact that matters; add nothing.\n\n\
         TEXT:\n{}\nEND TEXT",
        target_words,
        text.trim()
    )
}

fn emphasis_or_default(emphasis: &str) -> &str {
    or_none(emphasis, NO_FOCUS)
}

fn or_none<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
