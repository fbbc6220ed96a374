//! Template Converter
//!
//! Walks the entry template in source order and writes a PHP fragment.
//! Literal chunks are copied verbatim; interpolations become encoded echoes,
//! `foreach` blocks, `if`/`else` blocks or helper snippets. Every frame the
//! converter opens it also closes, and every literal chunk is scanned for
//! hand-written `<?php` markers so the context tracker stays in step with
//! the text that was emitted.

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, Result};
use crate::escape::{EscapeFunction, EscapeResolver, FieldRef};
use crate::helpers::{self, Helper};
use crate::ir::{Expr, TemplateIR, TemplatePart};
use crate::markers::{self, Marker};
use crate::metadata::ComponentMetadata;
use crate::parse;
use crate::php;
use crate::prelude;
use crate::scope::{BindingKind, ContextTracker, FrameKind, LoopBinding};

const BINARY_OPERATORS: [&str; 14] = [
    "==", "!=", "===", "!==", "<", "<=", ">", ">=", "+", "-", "*", "/", "%", "**",
];
const LOGICAL_OPERATORS: [&str; 3] = ["&&", "||", "??"];
const UNARY_OPERATORS: [&str; 3] = ["!", "-", "+"];

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Prepend the `$attributes` extraction block.
    #[serde(default)]
    pub include_prelude: bool,
    /// Re-scan the finished output and fail if its markers do not balance.
    #[serde(default = "default_true")]
    pub verify_markers: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            include_prelude: false,
            verify_markers: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TemplateConverter<'m> {
    metadata: &'m ComponentMetadata,
    options: ConvertOptions,
}

impl<'m> TemplateConverter<'m> {
    pub fn new(metadata: &'m ComponentMetadata) -> Self {
        Self::with_options(metadata, ConvertOptions::default())
    }

    pub fn with_options(metadata: &'m ComponentMetadata, options: ConvertOptions) -> Self {
        Self { metadata, options }
    }

    /// Parses `source`, finds the entry template and converts it.
    pub fn convert(&self, source: &str) -> Result<String> {
        let template = parse::parse_entry_template(
            source,
            self.metadata.entry_point(),
            &self.metadata.name,
        )?;
        self.convert_template(&template)
    }

    /// Converts an already lowered template.
    pub fn convert_template(&self, template: &TemplateIR) -> Result<String> {
        let component = self.metadata.name.as_str();
        tracing::debug!(
            component,
            interpolations = template.expressions.len(),
            "converting entry template"
        );

        let mut session = ConversionSession::new(self.metadata);
        let label = format!("{}()", self.metadata.entry_point());
        session.convert_template(template, &label)?;
        session.ctx.finish()?;
        let body = session.out;
        tracing::debug!(component, bytes = body.len(), "conversion finished");

        if self.options.verify_markers {
            markers::verify_balanced(&body).map_err(|detail| {
                ConversionError::scope_imbalance(
                    component,
                    format!("emitted markers do not balance: {}", detail),
                )
            })?;
        }

        if self.options.include_prelude {
            Ok(format!("{}{}", prelude::attribute_prelude(self.metadata), body))
        } else {
            Ok(body)
        }
    }
}

pub fn convert(source: &str, metadata: &ComponentMetadata) -> Result<String> {
    TemplateConverter::new(metadata).convert(source)
}

pub fn convert_with_options(
    source: &str,
    metadata: &ComponentMetadata,
    options: ConvertOptions,
) -> Result<String> {
    TemplateConverter::with_options(metadata, options).convert(source)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// What a data read resolves to, for picking its encoding.
#[derive(Debug, Clone, PartialEq)]
enum Leaf {
    Scalar(String),
    Item { array: Option<String>, field: String },
    /// `count( ... )`, always an integer.
    Count,
    /// A loop index, always an integer.
    Index,
}

#[derive(Debug, Clone)]
struct Operand {
    php: String,
    leaf: Leaf,
}

struct ConversionSession<'m> {
    metadata: &'m ComponentMetadata,
    resolver: EscapeResolver<'m>,
    ctx: ContextTracker,
    out: String,
    /// Literal markup emitted so far, used to detect attribute position.
    markup: String,
    /// Non-zero while writing an expression that lands inside generated PHP
    /// (a test, a compound echo, a helper argument).
    bare_depth: usize,
    /// True while writing a truth test, where `||`/`&&` keep their boolean meaning.
    in_test: bool,
    /// Data reads collected while capturing a compound expression.
    leaves: Option<Vec<Leaf>>,
}

impl<'m> ConversionSession<'m> {
    fn new(metadata: &'m ComponentMetadata) -> Self {
        Self {
            metadata,
            resolver: EscapeResolver::new(metadata),
            ctx: ContextTracker::new(&metadata.name, metadata.root_names()),
            out: String::new(),
            markup: String::new(),
            bare_depth: 0,
            in_test: false,
            leaves: None,
        }
    }

    fn component(&self) -> &str {
        &self.metadata.name
    }

    fn unsupported(&self, construct: &str, label: &str) -> ConversionError {
        ConversionError::unsupported(self.component(), construct, label)
    }

    /// True when output is PHP source rather than markup.
    fn emits_bare(&self) -> bool {
        self.bare_depth > 0 || self.ctx.in_generated_code_region()
    }

    fn emit_statement(&mut self, statement: &str) -> Result<()> {
        self.out.push_str("<?php ");
        self.ctx.enter_generated_code_region();
        self.out.push_str(statement);
        self.out.push_str(" ?>");
        self.ctx.exit_generated_code_region()
    }

    fn emit_echo(&mut self, php: &str) -> Result<()> {
        self.emit_statement(&format!("echo {};", php))
    }

    /// Runs `f` in bare mode against an empty buffer and returns what it wrote
    /// together with the data reads it made.
    fn capture<F>(&mut self, f: F) -> Result<(String, Vec<Leaf>)>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let saved_out = std::mem::take(&mut self.out);
        let saved_leaves = self.leaves.replace(Vec::new());
        self.bare_depth += 1;
        let result = f(self);
        self.bare_depth -= 1;
        let php = std::mem::replace(&mut self.out, saved_out);
        let leaves = std::mem::replace(&mut self.leaves, saved_leaves).unwrap_or_default();
        if let Some(outer) = self.leaves.as_mut() {
            outer.extend(leaves.iter().cloned());
        }
        result.map(|()| (php, leaves))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Templates and literal text
    // ───────────────────────────────────────────────────────────────────────────

    fn convert_template(&mut self, template: &TemplateIR, label: &str) -> Result<()> {
        for part in template.parts() {
            match part {
                TemplatePart::Literal(text) => self.convert_literal(text)?,
                TemplatePart::Interpolation(expr) => {
                    tracing::trace!(
                        component = %self.metadata.name,
                        label,
                        node = %expr.describe(),
                        "interpolation"
                    );
                    self.convert_expr(expr, label)?
                }
            }
        }
        Ok(())
    }

    fn convert_literal(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let found = markers::scan(text, self.ctx.in_generated_code_region());
        self.out.push_str(text);
        self.markup.push_str(text);
        for marker in found {
            self.sync_marker(marker)?;
        }
        Ok(())
    }

    fn sync_marker(&mut self, marker: Marker) -> Result<()> {
        match marker {
            Marker::CodeOpen => {
                if self.ctx.in_generated_code_region() {
                    return Err(ConversionError::scope_imbalance(
                        self.component(),
                        "'<?php' opened inside a region that is already PHP",
                    ));
                }
                self.ctx.enter_generated_code_region();
            }
            Marker::CodeClose => self.ctx.exit_generated_code_region()?,
            Marker::LoopOpen {
                item,
                index,
                source_field,
            } => {
                let binding = item.map(|item| LoopBinding {
                    item,
                    index,
                    source_field,
                });
                self.ctx.enter_scope(FrameKind::Loop, binding)?;
            }
            Marker::LoopClose => self.ctx.exit_scope_of(FrameKind::Loop)?,
            Marker::ConditionalOpen => {
                self.ctx.enter_scope(FrameKind::Conditional, None)?;
            }
            Marker::ConditionalElse => {
                if self.ctx.current_kind() != FrameKind::Conditional {
                    return Err(ConversionError::scope_imbalance(
                        self.component(),
                        "'else' marker outside of an open if block",
                    ));
                }
            }
            Marker::ConditionalClose => self.ctx.exit_scope_of(FrameKind::Conditional)?,
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────────

    fn convert_expr(&mut self, expr: &Expr, label: &str) -> Result<()> {
        let bare = self.emits_bare();
        match expr {
            Expr::Identifier { .. } | Expr::Member { .. } => {
                let operand = self.reference(expr, label)?;
                self.emit_operand(operand)
            }
            Expr::Call { callee, arguments } => self.convert_call(callee, arguments, label),
            Expr::Binary {
                operator,
                left,
                right,
            } => {
                if bare {
                    self.convert_binary(operator, left, right, label)
                } else {
                    self.echo_compound(expr, label)
                }
            }
            Expr::Logical {
                operator,
                left,
                right,
            } => {
                if bare {
                    self.convert_logical(operator, left, right, label)
                } else if operator == "&&" && matches!(**right, Expr::Template(_) | Expr::Str { .. }) {
                    self.convert_optional(left, right, label)
                } else {
                    self.echo_compound(expr, label)
                }
            }
            Expr::Unary { operator, argument } => {
                if bare {
                    self.convert_unary(operator, argument, label)
                } else {
                    self.echo_compound(expr, label)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if bare {
                    self.convert_ternary(test, consequent, alternate, label)
                } else {
                    self.convert_conditional_block(test, consequent, alternate, label)
                }
            }
            Expr::Template(template) => {
                if bare {
                    Err(self.unsupported("html template inside a PHP expression", label))
                } else {
                    self.convert_template(template, label)
                }
            }
            Expr::Number { value } => {
                let number = php::number(*value);
                if bare {
                    self.out.push_str(&number);
                    Ok(())
                } else {
                    self.convert_literal(&number)
                }
            }
            Expr::Str { value } => {
                if bare {
                    self.out.push_str(&php::string_literal(value));
                    Ok(())
                } else {
                    self.convert_literal(value)
                }
            }
            Expr::Bool { value } => {
                if bare {
                    self.out.push_str(if *value { "true" } else { "false" });
                    Ok(())
                } else {
                    Err(self.unsupported("boolean literal rendered as markup", label))
                }
            }
            Expr::Null => {
                if bare {
                    self.out.push_str("null");
                }
                Ok(())
            }
            Expr::This | Expr::Arrow { .. } | Expr::Unsupported { .. } => {
                Err(self.unsupported(&expr.describe(), label))
            }
        }
    }

    /// Runs `f` with the truth-test flag set to `in_test`, then restores it.
    fn in_context<F>(&mut self, in_test: bool, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let saved = std::mem::replace(&mut self.in_test, in_test);
        let result = f(self);
        self.in_test = saved;
        result
    }

    /// Whether `+` over this operand is string concatenation: a string
    /// literal, or a field whose metadata type is `string`.
    fn is_string_operand(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Str { .. } => true,
            Expr::Binary {
                operator,
                left,
                right,
            } => operator == "+" && (self.is_string_operand(left) || self.is_string_operand(right)),
            _ => self
                .declared_type(expr)
                .map_or(false, |declared| declared.eq_ignore_ascii_case("string")),
        }
    }

    fn declared_type(&self, expr: &Expr) -> Option<&str> {
        match expr {
            Expr::Member { object, property } => match &**object {
                Expr::This => self.metadata.parameter(property).map(|p| p.param_type.as_str()),
                Expr::Identifier { name } => self.item_field_type(name, property),
                _ => None,
            },
            Expr::Identifier { name } => match self.ctx.binding_kind(name)? {
                BindingKind::Parameter => self.metadata.parameter(name).map(|p| p.param_type.as_str()),
                BindingKind::LoopItem => self.item_field_type(name, name),
                BindingKind::LoopIndex | BindingKind::Local => None,
            },
            _ => None,
        }
    }

    fn item_field_type(&self, item: &str, field: &str) -> Option<&str> {
        let array = self.ctx.loop_binding_for(item)?.source_field.as_deref()?;
        self.metadata.array_field(array, field).map(|f| f.value_type.as_str())
    }

    /// Wraps compound operands in parentheses.
    fn convert_operand(&mut self, expr: &Expr, label: &str) -> Result<()> {
        if expr.is_compound() {
            self.out.push_str("( ");
            self.convert_expr(expr, label)?;
            self.out.push_str(" )");
            Ok(())
        } else {
            self.convert_expr(expr, label)
        }
    }

    fn convert_binary(&mut self, operator: &str, left: &Expr, right: &Expr, label: &str) -> Result<()> {
        if !BINARY_OPERATORS.contains(&operator) {
            return Err(self.unsupported(&format!("binary operator '{}'", operator), label));
        }
        let php_operator = if operator == "+" && (self.is_string_operand(left) || self.is_string_operand(right)) {
            "."
        } else {
            operator
        };
        self.in_context(false, |s| {
            s.convert_operand(left, label)?;
            s.out.push_str(&format!(" {} ", php_operator));
            s.convert_operand(right, label)
        })
    }

    fn convert_logical(&mut self, operator: &str, left: &Expr, right: &Expr, label: &str) -> Result<()> {
        if !LOGICAL_OPERATORS.contains(&operator) {
            return Err(self.unsupported(&format!("logical operator '{}'", operator), label));
        }
        // PHP `||`/`&&` yield a bool, JS yields an operand.
        if self.in_test || operator == "??" {
            self.convert_operand(left, label)?;
            self.out.push_str(&format!(" {} ", operator));
            return self.convert_operand(right, label);
        }
        self.convert_operand(left, label)?;
        if operator == "||" {
            self.out.push_str(" ?: ");
            self.convert_operand(right, label)
        } else {
            self.out.push_str(" ? ");
            self.convert_operand(right, label)?;
            self.out.push_str(" : ");
            self.convert_operand(left, label)
        }
    }

    fn convert_unary(&mut self, operator: &str, argument: &Expr, label: &str) -> Result<()> {
        if !UNARY_OPERATORS.contains(&operator) {
            return Err(self.unsupported(&format!("unary operator '{}'", operator), label));
        }
        self.out.push_str(operator);
        self.in_context(operator == "!", |s| s.convert_operand(argument, label))
    }

    fn convert_ternary(&mut self, test: &Expr, consequent: &Expr, alternate: &Expr, label: &str) -> Result<()> {
        self.out.push_str("( ");
        self.in_context(true, |s| s.convert_operand(test, label))?;
        self.out.push_str(" ? ");
        self.in_context(false, |s| {
            s.convert_operand(consequent, label)?;
            s.out.push_str(" : ");
            s.convert_operand(alternate, label)
        })?;
        self.out.push_str(" )");
        Ok(())
    }

    /// A compound expression echoed into markup. All data it reads must share
    /// one encoding; that encoding wraps the whole expression.
    fn echo_compound(&mut self, expr: &Expr, label: &str) -> Result<()> {
        let (php, leaves) = self.capture(|s| s.convert_expr(expr, label))?;

        let mut encodings: Vec<EscapeFunction> = Vec::new();
        for leaf in &leaves {
            if let Some(encoding) = self.encoding_for(leaf)? {
                if !encodings.contains(&encoding) {
                    encodings.push(encoding);
                }
            }
        }

        let php = match encodings.as_slice() {
            [] => php,
            [encoding] => encoding.wrap(&php),
            many => {
                let names: Vec<&str> = many
                    .iter()
                    .map(|e| e.php_function().unwrap_or("no escaping"))
                    .collect();
                return Err(self.unsupported(
                    &format!("{} mixing escape policies ({})", expr.describe(), names.join(", ")),
                    label,
                ));
            }
        };
        self.emit_echo(&php)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Data reads
    // ───────────────────────────────────────────────────────────────────────────

    fn reference(&self, expr: &Expr, label: &str) -> Result<Operand> {
        match expr {
            Expr::Identifier { name } => self.name_reference(name, label),
            Expr::Member { object, property } => self.member_reference(object, property, label),
            other => Err(self.unsupported(&other.describe(), label)),
        }
    }

    fn name_reference(&self, name: &str, label: &str) -> Result<Operand> {
        let leaf = match self.ctx.require_visible(name, label)? {
            BindingKind::LoopItem => Leaf::Item {
                array: self
                    .ctx
                    .loop_binding_for(name)
                    .and_then(|binding| binding.source_field.clone()),
                field: name.to_string(),
            },
            BindingKind::LoopIndex => Leaf::Index,
            BindingKind::Parameter | BindingKind::Local => Leaf::Scalar(name.to_string()),
        };
        Ok(Operand {
            php: php::variable(name),
            leaf,
        })
    }

    fn member_reference(&self, object: &Expr, property: &str, label: &str) -> Result<Operand> {
        match object {
            Expr::This => {
                self.ctx.require_parameter(property, label)?;
                Ok(Operand {
                    php: php::variable(property),
                    leaf: Leaf::Scalar(property.to_string()),
                })
            }
            Expr::Member {
                object: inner,
                property: base,
            } if property == "length" => {
                let base = self.member_reference(inner, base, label)?;
                match base.leaf {
                    Leaf::Count | Leaf::Index => {
                        Err(self.unsupported("'.length' of a number", label))
                    }
                    _ => Ok(Operand {
                        php: format!("count( {} )", base.php),
                        leaf: Leaf::Count,
                    }),
                }
            }
            Expr::Identifier { name } => self.item_field(name, property, label),
            _ => Err(self.unsupported(&format!("nested property access '.{}'", property), label)),
        }
    }

    /// `item.field` inside a loop body.
    fn item_field(&self, name: &str, field: &str, label: &str) -> Result<Operand> {
        if self.ctx.current_loop_binding().is_none() {
            return Err(ConversionError::missing_loop_context(
                self.component(),
                &format!("{}.{}", name, field),
                label,
            ));
        }
        if self.ctx.require_visible(name, label)? != BindingKind::LoopItem {
            return Err(self.unsupported(
                &format!("property access on '{}', which is not a loop item", name),
                label,
            ));
        }
        let array = self
            .ctx
            .loop_binding_for(name)
            .and_then(|binding| binding.source_field.clone());
        Ok(Operand {
            php: format!("{}['{}']", php::variable(name), field),
            leaf: Leaf::Item {
                array,
                field: field.to_string(),
            },
        })
    }

    fn encoding_for(&self, leaf: &Leaf) -> Result<Option<EscapeFunction>> {
        let field = match leaf {
            Leaf::Scalar(name) => FieldRef::Scalar(name.as_str()),
            Leaf::Item { array, field } => FieldRef::Item {
                array: array.as_deref(),
                field: field.as_str(),
            },
            Leaf::Count | Leaf::Index => return Ok(None),
        };
        let attribute = markers::attribute_context(&self.markup);
        self.resolver.resolve(field, attribute.as_deref()).map(Some)
    }

    fn emit_operand(&mut self, operand: Operand) -> Result<()> {
        if self.emits_bare() {
            if let Some(leaves) = self.leaves.as_mut() {
                leaves.push(operand.leaf);
            }
            self.out.push_str(&operand.php);
            return Ok(());
        }
        let php = match (self.encoding_for(&operand.leaf)?, &operand.leaf) {
            (Some(encoding), _) => encoding.wrap(&operand.php),
            (None, Leaf::Index) => format!("(int) {}", operand.php),
            (None, _) => operand.php,
        };
        self.emit_echo(&php)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Blocks
    // ───────────────────────────────────────────────────────────────────────────

    /// Converts `body` inside its own frame and checks it closed everything it
    /// opened.
    fn convert_branch(
        &mut self,
        kind: FrameKind,
        binding: Option<LoopBinding>,
        body: &Expr,
        label: &str,
    ) -> Result<()> {
        let depth = self.ctx.depth();
        self.ctx.enter_scope(kind, binding)?;
        self.convert_expr(body, label)?;
        if self.ctx.depth() != depth + 1 || self.ctx.in_generated_code_region() {
            return Err(ConversionError::scope_imbalance(
                self.component(),
                format!("{} leaves an unclosed block or <?php region", label),
            ));
        }
        self.ctx.exit_scope_of(kind)
    }

    fn emit_if(&mut self, test: &Expr, label: &str) -> Result<()> {
        let test_label = format!("the condition in {}", label);
        let (php, _) = self.capture(|s| s.in_context(true, |s| s.convert_expr(test, &test_label)))?;
        self.emit_statement(&format!("if ( {} ) :", php))
    }

    fn convert_conditional_block(
        &mut self,
        test: &Expr,
        consequent: &Expr,
        alternate: &Expr,
        label: &str,
    ) -> Result<()> {
        tracing::debug!(component = %self.metadata.name, label, "lowering conditional to an if block");
        self.emit_if(test, label)?;
        self.convert_branch(
            FrameKind::Conditional,
            None,
            consequent,
            &format!("the true branch in {}", label),
        )?;
        if !(alternate.is_empty_string() || *alternate == Expr::Null) {
            self.emit_statement("else :")?;
            self.convert_branch(
                FrameKind::Conditional,
                None,
                alternate,
                &format!("the false branch in {}", label),
            )?;
        }
        self.emit_statement("endif;")
    }

    /// `test && html\`...\``
    fn convert_optional(&mut self, test: &Expr, body: &Expr, label: &str) -> Result<()> {
        self.emit_if(test, label)?;
        self.convert_branch(
            FrameKind::Conditional,
            None,
            body,
            &format!("the guarded fragment in {}", label),
        )?;
        self.emit_statement("endif;")
    }

    fn convert_call(&mut self, callee: &Expr, arguments: &[Expr], label: &str) -> Result<()> {
        if let Expr::Member { object, property } = callee {
            if property == "map" {
                return self.convert_map(object, arguments, label);
            }
        }
        match Helper::from_callee(callee) {
            Some(helper) => self.convert_helper(helper, arguments, label),
            None => Err(self.unsupported(&format!("call to {}", callee.describe()), label)),
        }
    }

    /// `source.map((item, index) => html\`...\`)` becomes a `foreach` block.
    fn convert_map(&mut self, source: &Expr, arguments: &[Expr], label: &str) -> Result<()> {
        if self.emits_bare() {
            return Err(self.unsupported(".map() inside a PHP expression", label));
        }
        let (params, body) = match arguments {
            [Expr::Arrow { params, body }] => (params, body),
            _ => {
                return Err(self.unsupported(".map() without a single arrow-function callback", label));
            }
        };
        let (item, index) = match params.as_slice() {
            [item] => (item.clone(), None),
            [item, index] => (item.clone(), Some(index.clone())),
            _ => {
                return Err(self.unsupported(
                    &format!(".map() callback with {} parameters", params.len()),
                    label,
                ));
            }
        };

        // PHP loop variables leak into the enclosing scope.
        for name in std::iter::once(&item).chain(index.iter()) {
            if self.ctx.is_visible(name) {
                return Err(self.unsupported(
                    &format!(".map() variable '{}' that shadows a visible name", name),
                    label,
                ));
            }
        }

        let source = self.reference(source, label)?;
        let source_field = match &source.leaf {
            Leaf::Scalar(name) => name.clone(),
            Leaf::Item { field, .. } => field.clone(),
            Leaf::Count | Leaf::Index => {
                return Err(self.unsupported(".map() over a number", label));
            }
        };

        let head = match &index {
            Some(index) => format!(
                "foreach ( {} as {} => {} ) :",
                source.php,
                php::variable(index),
                php::variable(&item)
            ),
            None => format!("foreach ( {} as {} ) :", source.php, php::variable(&item)),
        };
        tracing::debug!(component = %self.metadata.name, label, source = %source_field, "lowering .map() to foreach");

        let body_label = format!("the .map() body over '{}'", source_field);
        let binding = LoopBinding {
            item,
            index,
            source_field: Some(source_field),
        };
        self.emit_statement(&head)?;
        self.convert_branch(FrameKind::Loop, Some(binding), body, &body_label)?;
        self.emit_statement("endforeach;")
    }

    fn convert_helper(&mut self, helper: Helper, arguments: &[Expr], label: &str) -> Result<()> {
        if self.emits_bare() {
            return Err(self.unsupported(
                &format!("helper {}() inside a PHP expression", helper.name()),
                label,
            ));
        }
        match helper {
            Helper::Pluralize => {
                let (count, singular, plural) = match arguments {
                    [count, Expr::Str { value: singular }] => {
                        (count, singular.clone(), format!("{}s", singular))
                    }
                    [count, Expr::Str { value: singular }, Expr::Str { value: plural }] => {
                        (count, singular.clone(), plural.clone())
                    }
                    _ => {
                        return Err(self.unsupported(
                            "pluralize() without (count, 'singular', 'plural') arguments",
                            label,
                        ));
                    }
                };
                let (count_php, _) = self.capture(|s| s.convert_expr(count, label))?;
                let statement = helpers::pluralize_statement(
                    &count_php,
                    &singular,
                    &plural,
                    self.metadata.text_domain.as_deref(),
                );
                self.emit_statement(&statement)
            }
            Helper::RatingStars => {
                if !arguments.is_empty() {
                    return Err(self.unsupported("renderStars() with arguments", label));
                }
                let item = match self.ctx.current_loop_binding() {
                    Some(binding) => binding.item.clone(),
                    None => {
                        return Err(ConversionError::missing_loop_context(
                            self.component(),
                            "rating",
                            label,
                        ));
                    }
                };
                let rating = format!("{}['rating']", php::variable(&item));

                self.emit_statement(&helpers::stars_loop_head())?;
                self.ctx.enter_scope(FrameKind::Loop, None)?;
                self.ctx.bind_name("star", BindingKind::Local);
                self.convert_literal(helpers::STAR_OPEN)?;
                self.emit_statement(&helpers::star_class_statement(&rating))?;
                self.convert_literal(helpers::STAR_CLOSE)?;
                self.ctx.exit_scope_of(FrameKind::Loop)?;
                self.emit_statement("endfor;")
            }
        }
    }
}
