//! Component metadata: the declared parameters, per-item array fields and
//! their escape policies. Loaded once per run and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{ConversionError, Result};

pub const DEFAULT_ENTRY_POINT: &str = "render";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterMeta>,
    #[serde(default)]
    pub array_fields: BTreeMap<String, Vec<ArrayFieldMeta>>,
    /// Method whose returned template is converted. Defaults to `render`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Text domain passed to `_n()` by the pluralize helper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArrayFieldMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape: Option<String>,
}

impl ComponentMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let metadata: ComponentMetadata = serde_json::from_str(json).map_err(|e| {
            ConversionError::parse("<metadata>", format!("Metadata parse error: {}", e))
        })?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ConversionError::parse(
                "<metadata>",
                format!("Cannot read metadata file {}: {}", path.display(), e),
            )
        })?;
        Self::from_json_str(&data)
    }

    /// Rejects duplicate parameter and field names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(ConversionError::parse(
                    &self.name,
                    format!("parameter '{}' is declared more than once", param.name),
                )
                .with_subject(param.name.as_str()));
            }
        }
        for (array, fields) in &self.array_fields {
            let mut seen = HashSet::new();
            for field in fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(ConversionError::parse(
                        &self.name,
                        format!(
                            "field '{}' is declared more than once in arrayFields.{}",
                            field.name, array
                        ),
                    )
                    .with_subject(field.name.as_str()));
                }
            }
        }
        Ok(())
    }

    pub fn entry_point(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(DEFAULT_ENTRY_POINT)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterMeta> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn array_field(&self, array: &str, field: &str) -> Option<&ArrayFieldMeta> {
        self.array_fields
            .get(array)
            .and_then(|fields| fields.iter().find(|f| f.name == field))
    }

    /// Names visible at the component root: every parameter plus every
    /// array declared only through `arrayFields`.
    pub fn root_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parameters.iter().map(|p| p.name.clone()).collect();
        for array in self.array_fields.keys() {
            if !names.iter().any(|n| n == array) {
                names.push(array.clone());
            }
        }
        names
    }

    pub fn parameter_path(name: &str) -> String {
        format!("parameters[name=\"{}\"].escape", name)
    }

    pub fn array_field_path(array: &str, field: &str) -> String {
        format!("arrayFields.{}[name=\"{}\"].escape", array, field)
    }
}
