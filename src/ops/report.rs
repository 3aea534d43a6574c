//! Doctor-style report for the verify operation.

use std::fmt::Display;

/// Severity of a single verification finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warn,
    Fail,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warn => "warn",
            Severity::Fail => "fail",
        }
    }
}

/// Collects check outcomes and renders them as an indented text report.
pub struct VerifyReport {
    lines: Vec<String>,
    warn_count: usize,
    fail_count: usize,
}

impl VerifyReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
            warn_count: 0,
            fail_count: 0,
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Record one check outcome.
    pub fn check(&mut self, severity: Severity, what: &str, detail: impl Display) {
        match severity {
            Severity::Ok => {}
            Severity::Warn => self.warn_count += 1,
            Severity::Fail => self.fail_count += 1,
        }
        self.lines
            .push(format!("  [{}] {what}: {detail}", severity.label()));
    }

    /// Attach a remedy line to the preceding check.
    pub fn remedy(&mut self, fix: impl Display) {
        self.lines.push(format!("         fix: {fix}"));
    }

    pub fn failed(&self) -> bool {
        self.fail_count > 0
    }

    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    pub fn warn_count(&self) -> usize {
        self.warn_count
    }

    /// Render the report including the final PASS/FAIL line. Warnings alone
    /// never flip the result to FAIL.
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push_str("\n\n");
        if self.failed() {
            text.push_str(&format!(
                "FAIL ({} failed, {} warning(s))",
                self.fail_count, self.warn_count
            ));
        } else if self.warn_count > 0 {
            text.push_str(&format!("PASS ({} warning(s))", self.warn_count));
        } else {
            text.push_str("PASS");
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_report_passes() {
        let mut report = VerifyReport::new("unit verify");
        report.section("Tools");
        report.check(Severity::Ok, "node", "node");
        assert!(!report.failed());
        let rendered = report.render();
        assert!(rendered.starts_with("unit verify"));
        assert!(rendered.contains("  [ok] node: node"));
        assert!(rendered.ends_with("PASS"));
    }

    #[test]
    fn warnings_do_not_fail_the_run() {
        let mut report = VerifyReport::new("unit verify");
        report.check(Severity::Warn, "http health", "connection refused");
        report.remedy("retry in a few seconds");
        assert!(!report.failed());
        assert_eq!(report.warn_count(), 1);
        let rendered = report.render();
        assert!(rendered.contains("[warn] http health"));
        assert!(rendered.contains("fix: retry in a few seconds"));
        assert!(rendered.ends_with("PASS (1 warning(s))"));
    }

    #[test]
    fn failures_flip_the_result() {
        let mut report = VerifyReport::new("unit verify");
        report.check(Severity::Fail, "runner script", "missing");
        report.check(Severity::Warn, "funnel", "off");
        assert!(report.failed());
        assert_eq!(report.fail_count(), 1);
        assert!(report.render().ends_with("FAIL (1 failed, 1 warning(s))"));
    }
}
