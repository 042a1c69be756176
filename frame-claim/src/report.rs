//! Result table and progress display

use indicatif::{ProgressBar, ProgressStyle};

use crate::claimer::{ClaimOutcome, ProgressSink, RunSummary};

/// Column headers of the result table
pub const HEADERS: [&str; 6] = [
    "name",
    "address",
    "totalAllocation",
    "hasClaimedPoints",
    "pointsClaimed",
    "error",
];

/// Gap between columns
const COLUMN_PADDING: usize = 3;

/// Placeholder for a missing value
const EMPTY: &str = "-";

/// Table cells for one wallet.
pub fn row(outcome: &ClaimOutcome) -> [String; 6] {
    let (allocation, claimed, points) = match &outcome.status {
        Some(status) => (
            status.total_allocation.to_string(),
            status.has_claimed_points.to_string(),
            status.points_claimed.clone(),
        ),
        None => (EMPTY.to_string(), EMPTY.to_string(), EMPTY.to_string()),
    };

    let error = outcome
        .failure
        .as_ref()
        .map(|f| f.to_string())
        .unwrap_or_else(|| EMPTY.to_string());

    [
        outcome.wallet.name.clone(),
        outcome.wallet.short_address(),
        allocation,
        claimed,
        points,
        error,
    ]
}

/// Render the result table followed by the `total:` line.
pub fn render(summary: &RunSummary) -> String {
    let header: [String; 6] = HEADERS.map(str::to_string);
    let rows: Vec<[String; 6]> = std::iter::once(header)
        .chain(summary.outcomes.iter().map(row))
        .collect();

    let mut widths = [0usize; 6];
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for cells in &rows {
        let line: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<w$}", cell, w = width + COLUMN_PADDING))
            .collect();
        out.push_str(line.concat().trim_end());
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&format!("total: {}\n", summary.total_allocation));
    out
}

/// Progress bar for a sweep over `len` wallets.
pub fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    match ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} wallets [{elapsed_precise}]")
    {
        Ok(style) => bar.with_style(style),
        Err(_) => bar,
    }
}

impl ProgressSink for ProgressBar {
    fn advance(&self) {
        self.inc(1);
    }
}
