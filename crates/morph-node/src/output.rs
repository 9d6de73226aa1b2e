//! Output formatting

use morph_scheduler::{MetricsSnapshot, RunReport};
use morph_storage::Value;
use serde_json::json;
use std::fmt::Write;

/// Renders the final state and the run report
pub struct Output {
    json_mode: bool,
}

impl Output {
    /// Create a new output renderer
    pub fn new(json_mode: bool) -> Self {
        Self { json_mode }
    }

    /// Render committed values, report and metrics
    pub fn render(
        &self,
        values: &[Value],
        report: &RunReport,
        metrics: &MetricsSnapshot,
    ) -> Result<String, serde_json::Error> {
        if self.json_mode {
            let doc = json!({
                "storage": values,
                "report": report,
                "metrics": metrics,
            });
            return serde_json::to_string_pretty(&doc);
        }

        let mut out = String::new();
        for (idx, value) in values.iter().enumerate() {
            let _ = writeln!(out, "Storage {idx}: {value}");
        }
        let _ = writeln!(
            out,
            "mode={} workers={} nodes={} executed={} skipped={} handoffs={} elapsed={}us",
            report.mode,
            report.workers,
            report.nodes,
            report.executed,
            report.skipped,
            report.handoffs,
            report.elapsed.as_micros(),
        );
        if !report.aborted_transactions.is_empty() {
            let _ = writeln!(out, "aborted transactions: {:?}", report.aborted_transactions);
        }
        Ok(out)
    }

    /// Print to stdout
    pub fn print(
        &self,
        values: &[Value],
        report: &RunReport,
        metrics: &MetricsSnapshot,
    ) -> Result<(), serde_json::Error> {
        let text = self.render(values, report, metrics)?;
        print!("{text}");
        if self.json_mode {
            println!();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_scheduler::ExecutionMode;
    use std::time::Duration;

    fn report(aborted: Vec<u64>) -> RunReport {
        RunReport {
            mode: ExecutionMode::Dfs,
            workers: 1,
            nodes: 5,
            executed: 5,
            skipped: 0,
            aborted: 0,
            handoffs: 0,
            aborted_transactions: aborted,
            elapsed: Duration::from_micros(12),
            worker_stats: Vec::new(),
        }
    }

    #[test]
    fn test_render_text() {
        let text = Output::new(false)
            .render(&[500, 0], &report(vec![]), &MetricsSnapshot::default())
            .unwrap();
        assert!(text.starts_with("Storage 0: 500\nStorage 1: 0\n"));
        assert!(text.contains("executed=5"));
        assert!(!text.contains("aborted transactions"));
    }

    #[test]
    fn test_render_text_with_aborts() {
        let text = Output::new(false)
            .render(&[1], &report(vec![222, 333]), &MetricsSnapshot::default())
            .unwrap();
        assert!(text.contains("aborted transactions: [222, 333]"));
    }

    #[test]
    fn test_render_json() {
        let text = Output::new(true)
            .render(&[500, 0], &report(vec![]), &MetricsSnapshot::default())
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["storage"], json!([500, 0]));
        assert_eq!(doc["report"]["executed"], json!(5));
        assert_eq!(doc["metrics"]["runs"], json!(0));
    }
}
