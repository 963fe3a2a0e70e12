//! Human-readable text output

use crate::coordinator::{Decision, SelectionOutcome};
use crate::worker::WorkerReport;
use std::fmt::Write;

/// Print the selection result to stdout
pub fn print_outcome(outcome: &SelectionOutcome, reports: &[WorkerReport]) {
    print!("{}", render_outcome(outcome, reports));
}

/// Render the report printed by [`print_outcome`]
///
/// Shows the answer, the dataset shape, the round history and, when
/// available, what each worker did.
pub fn render_outcome(outcome: &SelectionOutcome, reports: &[WorkerReport]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_outcome(&mut out, outcome, reports);
    out
}

fn write_outcome(
    out: &mut String,
    outcome: &SelectionOutcome,
    reports: &[WorkerReport],
) -> std::fmt::Result {
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    SELECTION RESULT")?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;

    if outcome.rank == outcome.total / 2 {
        writeln!(out, "Median: {}", outcome.value)?;
    } else {
        writeln!(out, "Value:  {}", outcome.value)?;
    }
    writeln!(out)?;

    writeln!(out, "Dataset:")?;
    writeln!(out, "  Elements: {}", format_number(outcome.total))?;
    writeln!(out, "  Workers:  {}", outcome.workers())?;
    writeln!(out, "  Rank:     {} elements above the answer", format_number(outcome.rank))?;
    writeln!(out)?;

    writeln!(out, "Rounds: {}", outcome.rounds.len())?;
    writeln!(
        out,
        "  {:>5}  {:>6}  {:>12}  {:>10}  {:>8}  {:>10}  {:>10}  decision",
        "round", "worker", "pivot", "above", "equal", "live", "k"
    )?;
    for round in &outcome.rounds {
        writeln!(
            out,
            "  {:>5}  {:>6}  {:>12}  {:>10}  {:>8}  {:>10}  {:>10}  {}",
            round.round,
            round.pivot_worker,
            round.pivot,
            format_number(round.counts.greater),
            format_number(round.counts.equal),
            format_number(round.counts.live),
            format_number(round.k),
            decision_label(round.decision)
        )?;
    }
    let retries: u32 = outcome
        .rounds
        .iter()
        .map(|r| r.sample_requests.saturating_sub(1))
        .sum();
    if retries > 0 {
        writeln!(out, "  ({} samples hit exhausted workers)", retries)?;
    }
    writeln!(out)?;

    if !reports.is_empty() {
        writeln!(out, "Workers:")?;
        for report in reports {
            writeln!(
                out,
                "  Worker {:>3}: {:>8} values, {:>8} live, {:>8} tombstoned, {} samples",
                report.worker_id,
                format_number(report.initial_len as u64),
                format_number(report.live_len as u64),
                format_number(report.tombstoned),
                report.samples
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    Ok(())
}

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::Found => "found",
        Decision::KeepHigh => "keep high",
        Decision::KeepLow => "keep low",
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RoundSummary;
    use crate::shard::PivotCounts;
    use std::collections::BTreeMap;

    fn outcome() -> SelectionOutcome {
        SelectionOutcome {
            value: 13,
            rank: 12,
            total: 25,
            shard_sizes: (1..=5).map(|id| (id, 5)).collect::<BTreeMap<_, _>>(),
            rounds: vec![
                RoundSummary {
                    round: 1,
                    pivot_worker: 2,
                    pivot: 19,
                    sample_requests: 1,
                    counts: PivotCounts {
                        greater: 6,
                        equal: 1,
                        live: 25,
                    },
                    k: 12,
                    decision: Decision::KeepLow,
                },
                RoundSummary {
                    round: 2,
                    pivot_worker: 4,
                    pivot: 13,
                    sample_requests: 2,
                    counts: PivotCounts {
                        greater: 5,
                        equal: 1,
                        live: 18,
                    },
                    k: 5,
                    decision: Decision::Found,
                },
            ],
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_render_outcome() {
        let text = render_outcome(&outcome(), &[]);
        assert!(text.contains("Median: 13"));
        assert!(text.contains("Rounds: 2"));
        assert!(text.contains("keep low"));
        assert!(text.contains("1 samples hit exhausted workers"));
        assert!(!text.contains("Workers:\n"));
    }

    #[test]
    fn test_render_worker_section() {
        let report = WorkerReport {
            worker_id: 1,
            initial_len: 5,
            live_len: 2,
            tombstoned: 3,
            ..Default::default()
        };
        let text = render_outcome(&outcome(), &[report]);
        assert!(text.contains("Worker   1"));
    }
}
