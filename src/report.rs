//! Console summaries.

use crate::session::TransferStats;

const MIN_WIDTH: usize = 30;
const PADDING: usize = 4;

/// Center `lines` between two horizontal rules.
pub fn block<S: AsRef<str>>(lines: &[S]) -> String {
    let longest = lines
        .iter()
        .map(|l| l.as_ref().chars().count())
        .max()
        .unwrap_or(0);
    let width = longest.max(MIN_WIDTH) + PADDING;
    let rule = "─".repeat(width);

    let mut out = Vec::with_capacity(lines.len() + 2);
    out.push(rule.clone());
    out.extend(lines.iter().map(|l| format!("{:^width$}", l.as_ref())));
    out.push(rule);
    out.join("\n")
}

pub fn client_summary(stats: &TransferStats) -> Vec<String> {
    vec![
        format!("Time taken: {:.3} s", stats.elapsed.as_secs_f64()),
        format!("Throughput: {:.2} Mbps", stats.throughput_mbps()),
        format!("Timeouts: {}", stats.timeouts),
    ]
}

pub fn server_summary(stats: &TransferStats) -> Vec<String> {
    vec![
        format!("Time taken: {:.3} s", stats.elapsed.as_secs_f64()),
        format!("Throughput: {:.2} Mbps", stats.throughput_mbps()),
    ]
}
