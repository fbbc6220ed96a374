//! Output-encoding resolution.
//!
//! Position beats declaration: any value written into an attribute value
//! gets URL or attribute encoding. Outside attributes the declared `escape`
//! token decides. There is no fallback encoding.

use serde::Serialize;

use crate::error::{ConversionError, Result};
use crate::metadata::ComponentMetadata;

const URL_ATTRIBUTES: [&str; 3] = ["href", "src", "action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeFunction {
    Html,
    Url,
    Attribute,
    Script,
    None,
}

impl EscapeFunction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "html" | "esc_html" => Some(EscapeFunction::Html),
            "url" | "esc_url" => Some(EscapeFunction::Url),
            "attr" | "attribute" | "esc_attr" => Some(EscapeFunction::Attribute),
            "js" | "script" | "esc_js" => Some(EscapeFunction::Script),
            "none" | "raw" => Some(EscapeFunction::None),
            _ => None,
        }
    }

    pub fn php_function(self) -> Option<&'static str> {
        match self {
            EscapeFunction::Html => Some("esc_html"),
            EscapeFunction::Url => Some("esc_url"),
            EscapeFunction::Attribute => Some("esc_attr"),
            EscapeFunction::Script => Some("esc_js"),
            EscapeFunction::None => None,
        }
    }

    /// Wraps a PHP expression in this encoding call.
    pub fn wrap(self, php: &str) -> String {
        match self.php_function() {
            Some(function) => format!("{}( {} )", function, php),
            None => php.to_string(),
        }
    }
}

/// A value read from component data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'f> {
    /// A declared parameter (`this.title`).
    Scalar(&'f str),
    /// A field of the current loop item (`item.name`), keyed by the array
    /// parameter the loop iterates.
    Item {
        array: Option<&'f str>,
        field: &'f str,
    },
}

impl FieldRef<'_> {
    pub fn field(&self) -> &str {
        match self {
            FieldRef::Scalar(name) => name,
            FieldRef::Item { field, .. } => field,
        }
    }
}

pub struct EscapeResolver<'m> {
    metadata: &'m ComponentMetadata,
}

impl<'m> EscapeResolver<'m> {
    pub fn new(metadata: &'m ComponentMetadata) -> Self {
        Self { metadata }
    }

    /// `attribute` is the enclosing attribute name when the value is
    /// written inside an attribute value.
    pub fn resolve(&self, field: FieldRef<'_>, attribute: Option<&str>) -> Result<EscapeFunction> {
        if let Some(attribute) = attribute {
            let name = attribute.trim_start_matches(['.', '?', ':']).to_ascii_lowercase();
            return Ok(if URL_ATTRIBUTES.contains(&name.as_str()) {
                EscapeFunction::Url
            } else {
                EscapeFunction::Attribute
            });
        }

        let component = &self.metadata.name;
        let (token, path) = match field {
            FieldRef::Scalar(name) => (
                self.metadata.parameter(name).and_then(|p| p.escape.as_deref()),
                ComponentMetadata::parameter_path(name),
            ),
            FieldRef::Item {
                array: Some(array),
                field,
            } => (
                self.metadata
                    .array_field(array, field)
                    .and_then(|f| f.escape.as_deref()),
                ComponentMetadata::array_field_path(array, field),
            ),
            FieldRef::Item { array: None, field } => {
                return Err(ConversionError::missing_escape(
                    component,
                    field,
                    &ComponentMetadata::array_field_path("<loop source>", field),
                    "the loop source is not a declared array field",
                ));
            }
        };

        match token {
            Some(token) => EscapeFunction::from_token(token).ok_or_else(|| {
                ConversionError::missing_escape(
                    component,
                    field.field(),
                    &path,
                    &format!("unknown escape token '{}'", token),
                )
            }),
            None => Err(ConversionError::missing_escape(
                component,
                field.field(),
                &path,
                "no escape declared",
            )),
        }
    }
}
