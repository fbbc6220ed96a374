//! Attribute prelude: pulls every declared parameter out of `$attributes`,
//! falling back to its declared default.

use crate::metadata::{ComponentMetadata, ParameterMeta};
use crate::php;

pub fn attribute_prelude(metadata: &ComponentMetadata) -> String {
    let names = metadata.root_names();
    if names.is_empty() {
        return String::new();
    }

    let mut out = String::from("<?php\n");
    for name in names {
        let default = match metadata.parameter(&name) {
            Some(param) => default_value(param),
            None => "array()".to_string(),
        };
        out.push_str(&format!(
            "{} = isset( $attributes[{key}] ) ? $attributes[{key}] : {};\n",
            php::variable(&name),
            default,
            key = php::string_literal(&name),
        ));
    }
    out.push_str("?>\n");
    out
}

fn default_value(param: &ParameterMeta) -> String {
    if let Some(value) = &param.default {
        return php::literal(value);
    }
    match param.param_type.as_str() {
        "boolean" | "bool" => "false",
        "number" | "integer" | "int" | "float" => "0",
        "array" | "object" => "array()",
        _ => "''",
    }
    .to_string()
}
