//! # Template Converter Ground Truth
//!
//! Converts the `html` template returned by a component's `render()` method
//! into a server-side PHP fragment.
//!
//! ## Conversion Invariants
//!
//! 1. **One Entry Template**: only the template returned by the entry-point
//!    method (`render` unless metadata names another) is converted. Templates
//!    anywhere else in the source are never visited.
//!
//! 2. **Explicit Encoding**: every data value echoed into markup passes through
//!    exactly one of `esc_html`, `esc_url`, `esc_attr`, `esc_js`, or is echoed
//!    raw because metadata says `none`. Attribute position decides first
//!    (`href`/`src`/`action` get `esc_url`, any other attribute `esc_attr`),
//!    then the declared `escape` token. Nothing is ever defaulted; a missing
//!    policy is a compile error (CONV-ESCAPE-001).
//!
//! 3. **Scope Balance**: every frame the converter opens (loop body, conditional
//!    branch) it closes, and every `<?php` region it opens is closed with `?>`.
//!    Hand-written markers inside literal markup are tracked the same way.
//!
//! 4. **Visibility**: a bare name resolves against the innermost loop frames
//!    first, then the declared parameters; `this.name` only against the
//!    parameters. A `.map()` variable may not shadow a visible name. An
//!    unresolved name fails with the list of names it could have been
//!    (CONV-SCOPE-001).
//!
//! 5. **Loop Context**: `item.field` is only legal inside a loop that binds
//!    `item` (CONV-LOOP-001).
//!
//! 6. **Determinism**: the same source and metadata always produce byte-identical
//!    output.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod batch;
mod convert;
mod error;
mod escape;
mod helpers;
mod ir;
mod markers;
mod metadata;
mod parse;
mod php;
mod prelude;
mod scope;

#[cfg(test)]
mod convert_tests;

pub use batch::{convert_all, ConversionCache, ConversionJob};
pub use convert::{convert, convert_with_options, ConvertOptions, TemplateConverter};
pub use error::*;
pub use escape::{EscapeFunction, EscapeResolver, FieldRef};
pub use ir::{Expr, TemplateIR, TemplatePart};
pub use metadata::{ArrayFieldMeta, ComponentMetadata, ParameterMeta, DEFAULT_ENTRY_POINT};
pub use parse::parse_entry_template;
pub use prelude::attribute_prelude;
pub use scope::{BindingKind, ContextTracker, FrameKind, LoopBinding, ScopeFrame};

/// Node entry point. Errors come back as the JSON form of [`ConversionError`].
#[cfg(feature = "napi")]
#[napi]
pub fn convert_component_native(
    source: String,
    metadata_json: String,
    options_json: Option<String>,
) -> napi::Result<String> {
    let metadata = ComponentMetadata::from_json_str(&metadata_json)
        .map_err(|e| napi::Error::from_reason(e.to_json()))?;
    let options = match options_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid convert options: {}", e)))?,
        None => ConvertOptions::default(),
    };
    convert_with_options(&source, &metadata, options).map_err(|e| napi::Error::from_reason(e.to_json()))
}
