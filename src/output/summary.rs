//! Crawl completion summary
//!
//! Produced by the coordinator once a crawl reaches a terminal phase.

use crate::output::DownloadSummary;
use crate::state::{CrawlPhase, PageCounters};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

/// Final report of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Terminal phase (`Done` or `Aborted`)
    pub phase: CrawlPhase,

    /// Distinct pages admitted
    pub pages_visited: usize,

    pub counters: PageCounters,

    /// Unique image URLs written to the output file
    pub unique_images: usize,

    pub output_path: PathBuf,

    /// Failure counts by error label
    pub failures: BTreeMap<String, u32>,

    /// Present when a download directory was configured
    pub downloads: Option<DownloadSummary>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// Wall-clock duration of the crawl
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Returns true if the crawl produced at least one image
    ///
    /// Partial crawls (failed pages, an expired deadline) count as a success as long as
    /// something was collected.
    pub fn is_success(&self) -> bool {
        self.unique_images > 0
    }
}

/// Formats a report as human-readable text
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    let c = &report.counters;

    // Writing to a String never fails
    let _ = writeln!(out, "=== Crawl Summary ===\n");
    let _ = writeln!(out, "Phase: {}", report.phase);
    let _ = writeln!(
        out,
        "Elapsed: {:.2}s",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Visited: {}", report.pages_visited);
    let _ = writeln!(out, "  Succeeded: {}", c.succeeded);
    let _ = writeln!(out, "  Failed: {}", c.failed);
    let _ = writeln!(out, "  Skipped by robots.txt: {}", c.disallowed);
    if c.abandoned > 0 {
        let _ = writeln!(out, "  Abandoned: {}", c.abandoned);
    }
    let _ = writeln!(out, "  Fetch attempts: {}", c.attempts);
    let _ = writeln!(out);

    if !report.failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for (label, count) in &report.failures {
            let _ = writeln!(out, "  {}: {}", label, count);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Images:");
    let _ = writeln!(out, "  Candidates seen: {}", c.candidates);
    let _ = writeln!(out, "  Unique: {}", report.unique_images);
    let _ = writeln!(out, "  Output: {}", report.output_path.display());

    if let Some(downloads) = &report.downloads {
        let _ = writeln!(
            out,
            "  Downloaded: {}/{} into {} ({} failed)",
            downloads.saved,
            downloads.attempted,
            downloads.dir.display(),
            downloads.failed
        );
        if let Some(error) = &downloads.error {
            let _ = writeln!(out, "  Download error: {}", error);
        }
    }

    out
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
