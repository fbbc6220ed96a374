use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "CONV-PARSE-001";
pub const ERR_UNRESOLVED_VARIABLE: &str = "CONV-SCOPE-001";
pub const ERR_UNSUPPORTED_CONSTRUCT: &str = "CONV-UNSUPPORTED-001";
pub const ERR_MISSING_ESCAPE_METADATA: &str = "CONV-ESCAPE-001";
pub const ERR_MISSING_LOOP_CONTEXT: &str = "CONV-LOOP-001";
pub const ERR_SCOPE_IMBALANCE: &str = "CONV-SCOPE-002";

/// Kind tag carried by every conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ParseError,
    UnresolvedVariableError,
    UnsupportedConstructError,
    MissingEscapeMetadataError,
    MissingLoopContextError,
    ScopeImbalanceError,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ParseError => ERR_PARSE,
            ErrorKind::UnresolvedVariableError => ERR_UNRESOLVED_VARIABLE,
            ErrorKind::UnsupportedConstructError => ERR_UNSUPPORTED_CONSTRUCT,
            ErrorKind::MissingEscapeMetadataError => ERR_MISSING_ESCAPE_METADATA,
            ErrorKind::MissingLoopContextError => ERR_MISSING_LOOP_CONTEXT,
            ErrorKind::ScopeImbalanceError => ERR_SCOPE_IMBALANCE,
        }
    }

    fn hint(self) -> &'static str {
        match self {
            ErrorKind::ParseError => {
                "The component source must parse and its render method must return exactly one html`...` template."
            }
            ErrorKind::UnresolvedVariableError => {
                "Declare the name in the component parameters or read it inside the loop that binds it."
            }
            ErrorKind::UnsupportedConstructError => {
                "Rewrite the expression using field reads, .map() loops, ternaries or the supported helpers."
            }
            ErrorKind::MissingEscapeMetadataError => {
                "Every value written into markup needs an explicit escape policy: html, url, attr, js or none."
            }
            ErrorKind::MissingLoopContextError => {
                "Item fields and per-item helpers may only be used inside an array .map() body."
            }
            ErrorKind::ScopeImbalanceError => {
                "Every opened <?php region, loop and conditional must be closed in the order it was opened."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSION ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {kind} in component '{component}': {message}")]
pub struct ConversionError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub component: String,
    /// Offending field, identifier or construct.
    pub subject: Option<String>,
    /// Metadata path an operator must populate (escape failures only).
    pub metadata_path: Option<String>,
    pub visible_names: Vec<String>,
    pub hints: Vec<String>,
}

impl ConversionError {
    pub fn new(kind: ErrorKind, component: &str, message: impl Into<String>) -> Self {
        ConversionError {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            component: component.to_string(),
            subject: None,
            metadata_path: None,
            visible_names: vec![],
            hints: vec![kind.hint().to_string()],
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn parse(component: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, component, message)
    }

    pub fn unresolved_variable(
        component: &str,
        name: &str,
        context_label: &str,
        visible_names: Vec<String>,
    ) -> Self {
        let listed = if visible_names.is_empty() {
            "(none)".to_string()
        } else {
            visible_names.join(", ")
        };
        let mut err = Self::new(
            ErrorKind::UnresolvedVariableError,
            component,
            format!(
                "'{}' is not visible in {}. Visible names: {}",
                name, context_label, listed
            ),
        )
        .with_subject(name);
        err.visible_names = visible_names;
        err
    }

    pub fn unsupported(component: &str, construct: &str, context_label: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedConstructError,
            component,
            format!("{} is not supported in {}", construct, context_label),
        )
        .with_subject(construct)
    }

    pub fn missing_escape(
        component: &str,
        field: &str,
        metadata_path: &str,
        detail: &str,
    ) -> Self {
        let mut err = Self::new(
            ErrorKind::MissingEscapeMetadataError,
            component,
            format!(
                "field '{}' has no usable escape policy ({}). Add it at {}",
                field, detail, metadata_path
            ),
        )
        .with_subject(field);
        err.metadata_path = Some(metadata_path.to_string());
        err
    }

    pub fn missing_loop_context(component: &str, field: &str, context_label: &str) -> Self {
        Self::new(
            ErrorKind::MissingLoopContextError,
            component,
            format!(
                "'{}' reads a loop item but {} is not inside any loop",
                field, context_label
            ),
        )
        .with_subject(field)
    }

    pub fn scope_imbalance(component: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ScopeImbalanceError, component, message)
    }

    /// JSON form handed across the Node bridge.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
