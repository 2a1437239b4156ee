//! Diagnostics collected while reading records and reconstructing topology.
//!
//! Reconstruction is best-effort: data anomalies (unknown phase codes, missing
//! breaker rows) and structural anomalies (duplicate island names, unresolved
//! cycles) never abort a run. Each one is logged through `tracing` where it
//! happens and also recorded here so callers can inspect what was skipped or
//! repaired.
//!
//! # Example
//!
//! ```
//! use gridtrace_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning_with_entity("phase", "unknown phase code 12, segment skipped", "Line 4711");
//! diag.add_error("island", "duplicate element names");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! assert_eq!(diag.summary(), "1 warning, 1 error");
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recovered locally (substituted value, skipped record, renamed island)
    Warning,
    /// Reported but not repaired
    Error,
}

/// A single issue encountered during a run
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g. "phase", "schema", "island", "cycle")
    pub category: String,
    pub message: String,
    /// Element, bus or island the issue refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    // =========================================================================
    // Warning Methods
    // =========================================================================

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    // =========================================================================
    // Error Methods
    // =========================================================================

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Get issues filtered by category
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    // =========================================================================
    // Utility Methods
    // =========================================================================

    /// Merge another diagnostics into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        fn plural(n: usize, word: &str) -> String {
            format!("{} {}{}", n, word, if n == 1 { "" } else { "s" })
        }

        match (self.warning_count(), self.error_count()) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => plural(w, "warning"),
            (0, e) => plural(e, "error"),
            (w, e) => format!("{}, {}", plural(w, "warning"), plural(e, "error")),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display_with_entity() {
        let issue = DiagnosticIssue::new(Severity::Warning, "island", "renamed")
            .with_entity("bus7.t1 #2");
        assert_eq!(issue.to_string(), "[warning:island] renamed (bus7.t1 #2)");
    }

    #[test]
    fn test_summary_and_counts() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");
        diag.add_warning("cycle", "unresolved");
        diag.add_warning("phase", "unknown code");
        assert_eq!(diag.summary(), "2 warnings");
        assert_eq!(diag.issues_by_category("cycle").count(), 1);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_merge() {
        let mut a = Diagnostics::new();
        a.add_warning("phase", "x");
        let mut b = Diagnostics::new();
        b.add_error_with_entity("island", "duplicate names", "net");
        a.merge(b);
        assert_eq!(a.issues.len(), 2);
        assert!(a.has_errors());
        assert_eq!(a.errors().next().and_then(|i| i.entity.as_deref()), Some("net"));
    }

    #[test]
    fn test_serialize_skips_empty() {
        let diag = Diagnostics::new();
        let json = serde_json::to_string(&diag).unwrap();
        assert_eq!(json, "{}");
    }
}
