use anyhow::{anyhow, Result};
use focusdigest_core::{MultiDocumentSummaryResult, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

pub fn parse_format(value: &str) -> Result<ReportFormat> {
    match value.to_lowercase().as_str() {
        "markdown" | "md" => Ok(ReportFormat::Markdown),
        "json" => Ok(ReportFormat::Json),
        other => Err(anyhow!("unknown format '{}'. choose markdown|json", other)),
    }
}

pub fn render(result: &MultiDocumentSummaryResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        ReportFormat::Markdown => Ok(render_markdown(result)),
    }
}

pub fn render_markdown(result: &MultiDocumentSummaryResult) -> String {
    let mut out = String::from("# Summary report\n\n");
    out.push_str(&format!("Status: {}\n", status_line(&result.status)));
    if result.focus.is_neutral() {
        out.push_str("Focus: _none (balanced overview)_\n");
    } else {
        out.push_str(&format!("Focus: {}\n", result.focus.emphasis));
    }
    if !result.focus.instructions.is_empty() {
        out.push_str("\nInstructions:\n");
        for (i, directive) in result.focus.instructions.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, directive));
        }
    }

    if let Some(meta) = &result.meta_summary {
        out.push_str(&format!("\n## Meta-summary\n\n{}\n", meta.trim()));
    }

    out.push_str("\n## Documents\n");
    for document in &result.documents {
        out.push_str(&format!("\n### {}\n\n", document.document_name));
        match document.status.reason() {
            None => {
                out.push_str(&format!("{}\n", document.text.trim()));
                if document.failed_chunks > 0 {
                    out.push_str(&format!(
                        "\n_{} of {} sections could not be summarized._\n",
                        document.failed_chunks, document.chunk_count
                    ));
                }
            }
            Some(reason) => out.push_str(&format!("_Failed: {}_\n", reason)),
        }
    }

    if !result.excluded.is_empty() {
        out.push_str("\n## Excluded from the meta-summary\n\n");
        for excluded in &result.excluded {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                excluded.document_name, excluded.document_id, excluded.reason
            ));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for warning in &result.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out.push_str(&format!(
        "\n---\n{} generation calls in {:.1}s\n",
        result.generation_calls,
        result.elapsed_ms as f64 / 1000.0
    ));
    out
}

fn status_line(status: &RunStatus) -> String {
    match status {
        RunStatus::Succeeded => "succeeded".to_string(),
        RunStatus::Partial { excluded } => format!("partial ({excluded} excluded)"),
        RunStatus::Failed { reason } => format!("failed ({reason})"),
    }
}
