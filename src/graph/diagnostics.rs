//! Diagnostics
//!
//! Collects recoverable anomalies during a generation run. None of these
//! stop the run; they are summarised once the document model is finished.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Ingestion ===
    /// GVK extension has the wrong shape or the key cannot be split
    MalformedGvk,
    /// No configured full name for a group
    MissingGroupFullName,

    // === References ===
    /// $ref target not found among the definitions
    DanglingReference,
    /// Definitions that reference each other
    ReferenceCycle,

    // === Operations ===
    /// Parameter `in` is not path, query or body
    UnknownParameterLocation,
    /// No definition claimed the operation
    OrphanedOperation,
    /// Unbound operation matching an excluded substring
    ExcludedOperation,

    // === Report ===
    /// Definition neither used by a field nor returned by an operation
    OrphanedDefinition,
    /// Resource listed in the table of contents does not exist
    MissingTocResource,
    /// Definition with operations that is absent from the table of contents
    OperationsNotInToc,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedGvk => "W001",
            Self::DanglingReference => "W002",
            Self::UnknownParameterLocation => "W003",
            Self::OrphanedOperation => "W004",
            Self::OrphanedDefinition => "W005",
            Self::MissingTocResource => "W006",
            Self::OperationsNotInToc => "W007",
            Self::MissingGroupFullName => "I001",
            Self::ExcludedOperation => "I002",
            Self::ReferenceCycle => "I003",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MalformedGvk
            | Self::DanglingReference
            | Self::UnknownParameterLocation
            | Self::OrphanedOperation
            | Self::OrphanedDefinition
            | Self::MissingTocResource
            | Self::OperationsNotInToc => Severity::Warning,

            Self::MissingGroupFullName | Self::ExcludedOperation | Self::ReferenceCycle => {
                Severity::Info
            }
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level. Hard failures are [`crate::DocsError`]s, not diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Definition key or operation id this is about
    pub subject: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (suggestions, paths, cycle members)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    pub fn report(&mut self, subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(subject, code, message));
    }

    pub fn malformed_gvk(&mut self, key: &str, reason: impl fmt::Display) {
        self.report(key, DiagnosticCode::MalformedGvk, format!("skipping definition: {}", reason));
    }

    pub fn dangling_reference(&mut self, from: &str, target: &str) {
        self.report(
            from,
            DiagnosticCode::DanglingReference,
            format!("$ref target '{}' not found among definitions", target),
        );
    }

    pub fn unknown_parameter_location(&mut self, operation_id: &str, name: &str, location: &str) {
        self.report(
            operation_id,
            DiagnosticCode::UnknownParameterLocation,
            format!("parameter '{}' has unknown location '{}'", name, location),
        );
    }

    pub fn orphaned_operation(&mut self, operation_id: &str, path: &str) {
        self.push(
            DiagnosticItem::new(
                operation_id,
                DiagnosticCode::OrphanedOperation,
                "no definition found for operation",
            )
            .with_context(path.to_string()),
        );
    }

    pub fn excluded_operation(&mut self, operation_id: &str) {
        self.report(operation_id, DiagnosticCode::ExcludedOperation, "operation excluded");
    }

    pub fn orphaned_definition(&mut self, key: &str) {
        self.report(
            key,
            DiagnosticCode::OrphanedDefinition,
            "definition is neither referenced by a field nor returned by an operation",
        );
    }

    pub fn missing_toc_resource(&mut self, resource: &str, suggestions: &[String]) {
        let mut item = DiagnosticItem::new(
            resource,
            DiagnosticCode::MissingTocResource,
            "table of contents lists a resource that does not exist",
        );
        for suggestion in suggestions {
            item = item.with_context(format!("did you mean {}?", suggestion));
        }
        self.push(item);
    }

    pub fn operations_not_in_toc(&mut self, key: &str) {
        self.report(
            key,
            DiagnosticCode::OperationsNotInToc,
            "definition has operations but is missing from the table of contents",
        );
    }

    pub fn missing_group_full_name(&mut self, group: &str) {
        self.report(
            group,
            DiagnosticCode::MissingGroupFullName,
            "no full group name configured, using the short name",
        );
    }

    pub fn reference_cycle(&mut self, members: &[String]) {
        let subject = members.first().cloned().unwrap_or_default();
        self.push(
            DiagnosticItem::new(
                subject,
                DiagnosticCode::ReferenceCycle,
                format!("{} definitions reference each other", members.len()),
            )
            .with_context(members.join(" -> ")),
        );
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} warning(s), {} note(s)\n",
                self.warning_count(),
                self.len() - self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
