//! Markdown summary generation
//!
//! Human-readable report of one ingestion run: counters, skip reasons and
//! where the failure report went.

use crate::ingest::RunSummary;
use crate::state::CheckpointStats;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_summary(summary: &RunSummary, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Ripple-Ingest Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Start URL**: {}\n", summary.start_url));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    md.push_str(&format!(
        "- **Status**: {}\n\n",
        if summary.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    ));

    md.push_str("## This Run\n\n");
    md.push_str("| Outcome | Pages |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Ingested | {} |\n", summary.successful));
    md.push_str(&format!("| Failed | {} |\n", summary.failed));
    md.push_str(&format!("| Skipped | {} |\n", summary.skipped));
    md.push_str(&format!(
        "| Already processed | {} |\n\n",
        summary.already_processed
    ));
    md.push_str(&format!(
        "Success rate: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.skip_reasons.is_empty() {
        md.push_str("## Skip Reasons\n\n");
        md.push_str("| Reason | Pages |\n");
        md.push_str("|--------|-------|\n");
        for (reason, count) in &summary.skip_reasons {
            md.push_str(&format!("| {} | {} |\n", reason, count));
        }
        md.push('\n');
    }

    md.push_str("## Whole Job\n\n");
    md.push_str(&format_checkpoint_statistics(&summary.checkpoint));
    md.push('\n');

    if summary.has_failures() {
        md.push_str("## Failures\n\n");
        if let Some(error) = &summary.crawl_error {
            md.push_str(&format!("- **Crawl error**: {}\n", error));
        }
        if let Some(report) = &summary.failure_report {
            md.push_str(&format!("- **Failure report**: {}\n", report.display()));
        }
        md.push('\n');
    }

    md
}

/// Checkpoint counters as a markdown list
pub fn format_checkpoint_statistics(stats: &CheckpointStats) -> String {
    format!(
        "- **Discovered**: {}\n- **Successful**: {}\n- **Failed**: {}\n- **Skipped**: {}\n- **Pending**: {}\n",
        stats.total_discovered, stats.successful, stats.failed, stats.skipped, stats.pending
    )
}
