//! Triage result rendering.
//!
//! This module renders triage runs as JSON or Markdown.

use crate::models::{
    Assessment, RunMetadata, SeverityDecision, TriageEntry, TriageRun, TriageSummary, UrgencyBand,
};
use anyhow::Result;
use std::collections::BTreeMap;

const EXCERPT_CHARS: usize = 80;

/// Serialize a single decision in the shape the forum service consumes.
pub fn generate_decision_json(decision: &SeverityDecision) -> Result<String> {
    serde_json::to_string_pretty(decision).map_err(Into::into)
}

/// Serialize a whole run.
pub fn generate_json_report(run: &TriageRun) -> Result<String> {
    serde_json::to_string_pretty(run).map_err(Into::into)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(run: &TriageRun) -> String {
    let mut output = String::new();

    output.push_str("# Report Triage\n\n");
    output.push_str(&generate_metadata_section(&run.metadata));
    output.push_str(&generate_summary_section(&run.summary, &run.entries));
    output.push_str(&generate_entries_section(&run.entries));

    output
}

fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &TriageSummary, entries: &[TriageEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Published | Suppressed | Failed | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.published, summary.suppressed, summary.failed, summary.total
    ));

    let bands = count_by_band(entries);
    if !bands.is_empty() {
        section.push_str("### By Urgency\n\n");
        section.push_str("| Band | Reports |\n");
        section.push_str("|:---|:---:|\n");
        for (band, count) in bands.iter().rev() {
            section.push_str(&format!("| {} {} | {} |\n", band.emoji(), band, count));
        }
        section.push('\n');
    }

    if summary.parse_fallbacks > 0 {
        section.push_str(&format!(
            "> {} signal reading(s) were not numeric and scored as 0.0.\n\n",
            summary.parse_fallbacks
        ));
    }

    section
}

fn generate_entries_section(entries: &[TriageEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Reports\n\n");

    if entries.is_empty() {
        section.push_str("No reports in the input.\n\n");
        return section;
    }

    for entry in rank_by_urgency(entries) {
        section.push_str(&generate_entry_block(entry));
    }

    section
}

fn generate_entry_block(entry: &TriageEntry) -> String {
    let mut block = String::new();

    match (&entry.assessment, &entry.error) {
        (Some(assessment), _) => {
            let decision = &assessment.decision;
            let band = decision.band();
            block.push_str(&format!(
                "### #{} {} {} ({})\n\n",
                entry.index,
                band.emoji(),
                band,
                if decision.show_on_forum {
                    format!("urgency {}", decision.urgency_score)
                } else {
                    "not published".to_string()
                }
            ));

            let text = excerpt(&decision.original_report.text);
            if !text.is_empty() {
                block.push_str(&format!("> {}\n\n", text));
            }

            block.push_str(&generate_signal_table(assessment));
        }
        (None, error) => {
            block.push_str(&format!("### #{} ❌ Failed\n\n", entry.index));
            block.push_str(&format!(
                "**Error:** {}\n\n",
                error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    block.push_str("---\n\n");

    block
}

fn generate_signal_table(assessment: &Assessment) -> String {
    let mut table = String::new();

    table.push_str("| Signal | Score |\n");
    table.push_str("|:---|:---:|\n");
    for reading in assessment.signals.readings() {
        let marker = if reading.parsed { "" } else { " (unparsed)" };
        table.push_str(&format!(
            "| {} | {:.2}{} |\n",
            reading.signal,
            reading.score.value(),
            marker
        ));
    }
    table.push_str(&format!(
        "| **Weighted** | {:.3} |\n| **Scaled** | {} |\n\n",
        assessment.signals.weighted, assessment.signals.scaled
    ));

    table
}

/// Published reports first by descending urgency, then suppressed, then failed.
fn rank_by_urgency(entries: &[TriageEntry]) -> Vec<&TriageEntry> {
    let mut ranked: Vec<&TriageEntry> = entries.iter().collect();
    ranked.sort_by_key(|e| {
        let score = e
            .assessment
            .as_ref()
            .map(|a| i16::from(a.decision.urgency_score))
            .unwrap_or(-1);
        (std::cmp::Reverse(score), e.index)
    });
    ranked
}

fn count_by_band(entries: &[TriageEntry]) -> BTreeMap<UrgencyBand, usize> {
    let mut counts = BTreeMap::new();

    for assessment in entries.iter().filter_map(|e| e.assessment.as_ref()) {
        *counts.entry(assessment.decision.band()).or_default() += 1;
    }

    counts
}

fn excerpt(text: &str) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= EXCERPT_CHARS {
        single_line
    } else {
        let cut: String = single_line.chars().take(EXCERPT_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}
