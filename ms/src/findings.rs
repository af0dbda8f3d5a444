//! Structured quality findings
//!
//! Findings are stored apart from the synthesis context; only a compact
//! summary (severity counts plus the top three) is injected into the
//! orchestrator context to bound token load.

use serde::{Deserialize, Serialize};

/// Finding severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// What the finding suggests doing about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Fix,
    Investigate,
    Optimize,
    Document,
    Monitor,
    Alert,
}

/// Optional location context for a finding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// One structured observation from a subtask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "is_empty_context")]
    pub context: FindingContext,
    pub actionable: bool,
    pub suggested_action: SuggestedAction,
}

fn is_empty_context(ctx: &FindingContext) -> bool {
    ctx.file.is_none() && ctx.line.is_none() && ctx.endpoint.is_none() && ctx.timestamp.is_none()
}

/// Per-subtask findings store
#[derive(Debug, Default)]
pub struct FindingsStore {
    findings: Vec<Finding>,
}

impl FindingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn all(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Count of findings at a given severity
    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Compact summary for orchestrator context: severity counts + top 3
    ///
    /// "Top" means most severe; ties keep insertion order.
    pub fn compact_summary(&self) -> String {
        if self.findings.is_empty() {
            return "no findings".to_string();
        }

        let counts = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ]
        .iter()
        .filter_map(|s| {
            let n = self.count_at(*s);
            if n > 0 { Some(format!("{}:{}", s, n)) } else { None }
        })
        .collect::<Vec<_>>()
        .join(" ");

        let mut ranked: Vec<&Finding> = self.findings.iter().collect();
        ranked.sort_by_key(|f| f.severity);

        let top = ranked
            .iter()
            .take(3)
            .map(|f| format!("- [{}] {}", f.severity, f.title))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{}\n{}", counts, top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, title: &str) -> Finding {
        Finding {
            category: "correctness".to_string(),
            severity,
            title: title.to_string(),
            description: "details".to_string(),
            context: FindingContext::default(),
            actionable: true,
            suggested_action: SuggestedAction::Fix,
        }
    }

    #[test]
    fn test_empty_summary() {
        let store = FindingsStore::new();
        assert_eq!(store.compact_summary(), "no findings");
    }

    #[test]
    fn test_summary_counts_by_severity() {
        let mut store = FindingsStore::new();
        store.add(finding(Severity::High, "a"));
        store.add(finding(Severity::High, "b"));
        store.add(finding(Severity::Info, "c"));

        let summary = store.compact_summary();
        assert!(summary.contains("high:2"));
        assert!(summary.contains("info:1"));
        assert!(!summary.contains("critical"));
    }

    #[test]
    fn test_summary_top_three_most_severe() {
        let mut store = FindingsStore::new();
        store.add(finding(Severity::Info, "noise"));
        store.add(finding(Severity::Critical, "broken auth"));
        store.add(finding(Severity::Low, "style"));
        store.add(finding(Severity::High, "race condition"));

        let summary = store.compact_summary();
        assert!(summary.contains("broken auth"));
        assert!(summary.contains("race condition"));
        assert!(summary.contains("style"));
        assert!(!summary.contains("noise"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Info);
    }

    #[test]
    fn test_finding_serde_skips_empty_context() {
        let f = finding(Severity::Medium, "t");
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("context"));

        let with_ctx = Finding {
            context: FindingContext {
                file: Some("src/lib.rs".to_string()),
                line: Some(10),
                ..Default::default()
            },
            ..f
        };
        let json = serde_json::to_string(&with_ctx).unwrap();
        assert!(json.contains("src/lib.rs"));
    }
}
