//! Plain-text budget report
//!
//! Rendered only from the structured verdict, so the layout can change
//! without touching evaluation.

use std::fmt::Write;

use super::{EvaluationVerdict, MetricVerdict};

/// Rule framing the banner
pub const RULE: &str = "-----------------------------------------------";

/// One report line for a metric, without the trailing newline
pub fn render_line(verdict: &MetricVerdict) -> String {
    let mut line = format!("{}: {} [{}]", verdict.metric, verdict.observed, verdict.status);
    if let Some(limit) = verdict.threshold.limit() {
        let _ = write!(line, ". Budget is {}", super::metric::format_number(limit));
    }
    line
}

/// Banner line naming the URL and the overall result
pub fn render_banner(url: &str, passed: bool) -> String {
    format!("Test for {} \t  {}", url, if passed { "PASSED" } else { "FAILED" })
}

/// Render the full report: metric lines, banner, summary
pub fn render_report(verdict: &EvaluationVerdict) -> String {
    let mut out = String::new();

    for metric in &verdict.metrics {
        out.push_str(&render_line(metric));
        out.push('\n');
    }

    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&render_banner(&verdict.url, verdict.passed));
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    let _ = writeln!(out, "Summary: {}", verdict.summary);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::View;
    use crate::engine::metric::{Metric, Threshold};
    use crate::engine::{MetricStatus, Observed};

    fn verdict(metrics: Vec<MetricVerdict>, passed: bool) -> EvaluationVerdict {
        EvaluationVerdict {
            passed,
            url: "https://example.com".to_string(),
            view: View::FirstView,
            metrics,
            summary: "https://wpt.example/results.php?test=T1".to_string(),
            report: String::new(),
        }
    }

    #[test]
    fn test_enforced_line_names_threshold() {
        let line = render_line(&MetricVerdict {
            metric: Metric::LoadTime,
            observed: Observed::Number(1200u64.into()),
            threshold: Threshold::Max(1000.0),
            status: MetricStatus::Fail,
        });
        assert_eq!(line, "loadTime: 1200 [FAIL]. Budget is 1000");
    }

    #[test]
    fn test_unenforced_line_has_no_threshold() {
        let line = render_line(&MetricVerdict {
            metric: Metric::Requests,
            observed: Observed::Absent,
            threshold: Threshold::Unenforced,
            status: MetricStatus::Skipped,
        });
        assert_eq!(line, "requests: n/a [SKIPPED]");
    }

    #[test]
    fn test_report_layout() {
        let report = render_report(&verdict(
            vec![MetricVerdict {
                metric: Metric::LoadTime,
                observed: Observed::Number(800u64.into()),
                threshold: Threshold::Max(1000.0),
                status: MetricStatus::Pass,
            }],
            true,
        ));

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "loadTime: 800 [PASS]. Budget is 1000");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], RULE);
        assert_eq!(lines[3], "Test for https://example.com \t  PASSED");
        assert_eq!(lines[4], RULE);
        assert_eq!(lines[5], "Summary: https://wpt.example/results.php?test=T1");
    }

    #[test]
    fn test_failed_banner() {
        assert!(render_banner("https://example.com", false).ends_with("FAILED"));
    }
}
