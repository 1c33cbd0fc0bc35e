//! Findings collected while checking a topology before a fault study.
//!
//! Topology defects rarely stop the solver outright; more often they produce
//! plausible-looking but wrong currents (an isolated bus reads 0 kA, a line
//! between mismatched voltage levels skews the per-unit system). Importers and
//! [`Network::validate_into`](crate::Network::validate_into) record them here
//! and the caller decides whether to proceed.
//!
//! ```
//! use relayset_core::diagnostics::{Category, Diagnostics};
//!
//! let mut diag = Diagnostics::new();
//! diag.warning_at(Category::Source, "bus is not fed by any external grid", "6kV Load 1");
//! diag.error(Category::Structure, "network has no buses");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Study can run but results for the entity are suspect
    Warning,
    /// Study cannot produce meaningful results
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// What part of the topology a finding concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Missing or duplicated buses
    Structure,
    /// External grids and paths to them
    Source,
    /// Nominal and rated voltages
    Voltage,
    /// Line and transformer impedance data
    Impedance,
    Naming,
    /// Elements referring to buses that do not exist
    Reference,
    /// Values the importer had to replace or skip
    Import,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Structure => "structure",
            Category::Source => "source",
            Category::Voltage => "voltage",
            Category::Impedance => "impedance",
            Category::Naming => "naming",
            Category::Reference => "reference",
            Category::Import => "import",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    /// Name of the bus, line, transformer or grid concerned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.severity.as_str(), self.category, self.message)?;
        match &self.entity {
            Some(entity) => write!(f, " ({entity})"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, category: Category, message: &str, entity: Option<&str>) {
        self.issues.push(DiagnosticIssue {
            severity,
            category,
            message: message.to_string(),
            entity: entity.map(str::to_string),
        });
    }

    pub fn warning(&mut self, category: Category, message: &str) {
        self.push(Severity::Warning, category, message, None);
    }

    pub fn warning_at(&mut self, category: Category, message: &str, entity: &str) {
        self.push(Severity::Warning, category, message, Some(entity));
    }

    pub fn error(&mut self, category: Category, message: &str) {
        self.push(Severity::Error, category, message, None);
    }

    pub fn error_at(&mut self, category: Category, message: &str, entity: &str) {
        self.push(Severity::Error, category, message, Some(entity));
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// "No issues", "2 warnings", "1 warning, 3 errors", ...
    pub fn summary(&self) -> String {
        let counted = |n: usize, noun: &str| {
            if n == 1 {
                format!("1 {noun}")
            } else {
                format!("{n} {noun}s")
            }
        };
        match (self.warning_count(), self.error_count()) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => counted(w, "warning"),
            (0, e) => counted(e, "error"),
            (w, e) => format!("{}, {}", counted(w, "warning"), counted(e, "error")),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        let mut sorted: Vec<&DiagnosticIssue> = self.issues.iter().collect();
        // Errors first, declaration order otherwise
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
        for issue in sorted {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}
