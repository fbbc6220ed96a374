//! Parse Module
//!
//! Parses component source with oxc, locates the single template returned by
//! the entry-point method and lowers it into the owned [`TemplateIR`].

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrowFunctionExpression, BindingPattern, Expression, Function, MethodDefinition,
    PropertyKey, Statement, TaggedTemplateExpression, TemplateLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::scope::ScopeFlags;

use crate::error::{ConversionError, Result};
use crate::ir::{Expr, TemplateIR};

/// Tags that mark a template expression.
const TEMPLATE_TAGS: [&str; 2] = ["html", "svg"];

/// Wrapper that lets a bare method list (no surrounding class) parse.
const WRAPPER_OPEN: &str = "class __Component {\n";
const WRAPPER_CLOSE: &str = "\n}";

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY TEMPLATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Parses `source` and returns the one template returned by `entry_point`.
pub fn parse_entry_template(source: &str, entry_point: &str, component: &str) -> Result<TemplateIR> {
    let direct = match collect_candidates(source, entry_point) {
        Ok(collector) if collector.methods_seen > 0 => {
            return select_entry(collector, entry_point, component);
        }
        other => other,
    };

    let wrapped = format!("{}{}{}", WRAPPER_OPEN, source, WRAPPER_CLOSE);
    if let Ok(collector) = collect_candidates(&wrapped, entry_point) {
        if collector.methods_seen > 0 {
            tracing::debug!(component, "parsed source as a bare class body");
            return select_entry(collector, entry_point, component);
        }
    }

    match direct {
        Ok(collector) => select_entry(collector, entry_point, component),
        Err(errors) => Err(ConversionError::parse(
            component,
            format!("Invalid component source: {}", errors.join("; ")),
        )),
    }
}

fn collect_candidates(text: &str, entry_point: &str) -> std::result::Result<EntryCollector, Vec<String>> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true);
    let ret = Parser::new(&allocator, text, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(ret.errors.iter().map(|e| format!("{:?}", e)).collect());
    }

    let mut collector = EntryCollector {
        source: text.to_string(),
        entry_point: entry_point.to_string(),
        methods_seen: 0,
        templates: vec![],
    };
    collector.visit_program(&ret.program);
    Ok(collector)
}

fn select_entry(collector: EntryCollector, entry_point: &str, component: &str) -> Result<TemplateIR> {
    if collector.methods_seen == 0 {
        return Err(ConversionError::parse(
            component,
            format!("no `{}()` method found in component source", entry_point),
        )
        .with_subject(entry_point));
    }
    let mut templates = collector.templates;
    match templates.len() {
        1 => Ok(templates.remove(0)),
        0 => Err(ConversionError::parse(
            component,
            format!("`{}()` does not return an html`...` template", entry_point),
        )
        .with_subject(entry_point)),
        n => Err(ConversionError::parse(
            component,
            format!(
                "entry point is ambiguous: `{}()` returns {} html templates; declare a single entry point",
                entry_point, n
            ),
        )
        .with_subject(entry_point)),
    }
}

struct EntryCollector {
    source: String,
    entry_point: String,
    methods_seen: usize,
    templates: Vec<TemplateIR>,
}

impl EntryCollector {
    fn collect_function(&mut self, func: &Function<'_>) {
        self.methods_seen += 1;
        if let Some(body) = &func.body {
            let mut found = Vec::new();
            collect_returned_templates(&body.statements, &mut found);
            for tagged in found {
                let template = lower_template(&tagged.quasi, &self.source);
                self.templates.push(template);
            }
        }
    }
}

impl<'a> Visit<'a> for EntryCollector {
    fn visit_method_definition(&mut self, def: &MethodDefinition<'a>) {
        if let PropertyKey::StaticIdentifier(id) = &def.key {
            if id.name.as_str() == self.entry_point {
                self.collect_function(&def.value);
            }
        }
        walk::walk_method_definition(self, def);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        if let Some(id) = &func.id {
            if id.name.as_str() == self.entry_point {
                self.collect_function(func);
            }
        }
        walk::walk_function(self, func, flags);
    }
}

/// Collects `return html\`...\`` statements, descending into blocks and
/// `if` branches but not into nested functions.
fn collect_returned_templates<'b, 'a>(
    statements: &'b [Statement<'a>],
    found: &mut Vec<&'b TaggedTemplateExpression<'a>>,
) {
    for stmt in statements {
        collect_from_statement(stmt, found);
    }
}

fn collect_from_statement<'b, 'a>(
    stmt: &'b Statement<'a>,
    found: &mut Vec<&'b TaggedTemplateExpression<'a>>,
) {
    match stmt {
        Statement::ReturnStatement(ret) => {
            if let Some(tagged) = ret.argument.as_ref().and_then(as_template) {
                found.push(tagged);
            }
        }
        Statement::BlockStatement(block) => collect_returned_templates(&block.body, found),
        Statement::IfStatement(if_stmt) => {
            collect_from_statement(&if_stmt.consequent, found);
            if let Some(alternate) = &if_stmt.alternate {
                collect_from_statement(alternate, found);
            }
        }
        _ => {}
    }
}

fn as_template<'b, 'a>(expr: &'b Expression<'a>) -> Option<&'b TaggedTemplateExpression<'a>> {
    match expr {
        Expression::ParenthesizedExpression(paren) => as_template(&paren.expression),
        Expression::TaggedTemplateExpression(tagged) if is_template_tag(&tagged.tag) => {
            Some(&**tagged)
        }
        _ => None,
    }
}

fn is_template_tag(tag: &Expression<'_>) -> bool {
    match tag {
        Expression::Identifier(id) => TEMPLATE_TAGS.contains(&id.name.as_str()),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

fn lower_template(quasi: &TemplateLiteral<'_>, source: &str) -> TemplateIR {
    TemplateIR {
        quasis: quasi
            .quasis
            .iter()
            .map(|element| match &element.value.cooked {
                Some(cooked) => cooked.to_string(),
                None => element.value.raw.to_string(),
            })
            .collect(),
        expressions: quasi
            .expressions
            .iter()
            .map(|expr| lower_expression(expr, source))
            .collect(),
    }
}

fn snippet(expr: &Expression<'_>, source: &str) -> String {
    let span = expr.span();
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or("")
        .to_string()
}

fn unsupported(kind: &str, expr: &Expression<'_>, source: &str) -> Expr {
    Expr::Unsupported {
        kind: kind.to_string(),
        source: snippet(expr, source),
    }
}

pub(crate) fn lower_expression(expr: &Expression<'_>, source: &str) -> Expr {
    match expr {
        Expression::Identifier(id) => match id.name.as_str() {
            "undefined" => Expr::Null,
            name => Expr::ident(name),
        },
        Expression::ThisExpression(_) => Expr::This,
        Expression::ParenthesizedExpression(paren) => lower_expression(&paren.expression, source),
        Expression::StaticMemberExpression(member) => {
            Expr::member(lower_expression(&member.object, source), member.property.name.as_str())
        }
        Expression::CallExpression(call) => {
            let mut arguments = Vec::with_capacity(call.arguments.len());
            for arg in &call.arguments {
                arguments.push(lower_argument(arg, source));
            }
            Expr::Call {
                callee: Box::new(lower_expression(&call.callee, source)),
                arguments,
            }
        }
        Expression::ArrowFunctionExpression(arrow) => lower_arrow(arrow, expr, source),
        Expression::TaggedTemplateExpression(tagged) => {
            if is_template_tag(&tagged.tag) {
                Expr::Template(lower_template(&tagged.quasi, source))
            } else {
                unsupported("tagged template with an unknown tag", expr, source)
            }
        }
        Expression::ConditionalExpression(cond) => Expr::Conditional {
            test: Box::new(lower_expression(&cond.test, source)),
            consequent: Box::new(lower_expression(&cond.consequent, source)),
            alternate: Box::new(lower_expression(&cond.alternate, source)),
        },
        Expression::BinaryExpression(bin) => Expr::Binary {
            operator: bin.operator.as_str().to_string(),
            left: Box::new(lower_expression(&bin.left, source)),
            right: Box::new(lower_expression(&bin.right, source)),
        },
        Expression::LogicalExpression(logical) => Expr::Logical {
            operator: logical.operator.as_str().to_string(),
            left: Box::new(lower_expression(&logical.left, source)),
            right: Box::new(lower_expression(&logical.right, source)),
        },
        Expression::UnaryExpression(unary) => Expr::Unary {
            operator: unary.operator.as_str().to_string(),
            argument: Box::new(lower_expression(&unary.argument, source)),
        },
        Expression::NumericLiteral(num) => Expr::Number { value: num.value },
        Expression::StringLiteral(s) => Expr::Str {
            value: s.value.to_string(),
        },
        Expression::BooleanLiteral(b) => Expr::Bool { value: b.value },
        Expression::NullLiteral(_) => Expr::Null,
        Expression::TemplateLiteral(_) => unsupported("untagged template literal", expr, source),
        Expression::ComputedMemberExpression(_) => {
            unsupported("computed member access", expr, source)
        }
        Expression::ChainExpression(_) => unsupported("optional chaining", expr, source),
        Expression::ArrayExpression(_) => unsupported("array literal", expr, source),
        Expression::ObjectExpression(_) => unsupported("object literal", expr, source),
        Expression::FunctionExpression(_) => unsupported("function expression", expr, source),
        Expression::AssignmentExpression(_) => unsupported("assignment", expr, source),
        Expression::UpdateExpression(_) => unsupported("update expression", expr, source),
        Expression::SequenceExpression(_) => unsupported("sequence expression", expr, source),
        Expression::NewExpression(_) => unsupported("new expression", expr, source),
        Expression::AwaitExpression(_) => unsupported("await expression", expr, source),
        _ => unsupported("expression", expr, source),
    }
}

fn lower_argument(arg: &Argument<'_>, source: &str) -> Expr {
    match arg.as_expression() {
        Some(expr) => lower_expression(expr, source),
        None => Expr::Unsupported {
            kind: "spread argument".to_string(),
            source: source
                .get(arg.span().start as usize..arg.span().end as usize)
                .unwrap_or("")
                .to_string(),
        },
    }
}

fn lower_arrow(arrow: &ArrowFunctionExpression<'_>, expr: &Expression<'_>, source: &str) -> Expr {
    if arrow.params.rest.is_some() {
        return unsupported("rest parameter", expr, source);
    }
    let mut params = Vec::with_capacity(arrow.params.items.len());
    for param in &arrow.params.items {
        match &param.pattern {
            BindingPattern::BindingIdentifier(id) => params.push(id.name.to_string()),
            _ => return unsupported("destructuring parameter", expr, source),
        }
    }

    let body = if arrow.expression {
        match arrow.body.statements.first() {
            Some(Statement::ExpressionStatement(stmt)) => Some(&stmt.expression),
            _ => None,
        }
    } else {
        match arrow.body.statements.first() {
            Some(Statement::ReturnStatement(ret)) if arrow.body.statements.len() == 1 => {
                ret.argument.as_ref()
            }
            _ => None,
        }
    };

    match body {
        Some(body) => Expr::Arrow {
            params,
            body: Box::new(lower_expression(body, source)),
        },
        None => unsupported("arrow function with a statement body", expr, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const CARD: &str = r#"
import { LitElement, html, css } from 'lit';

export class Card extends LitElement {
  static styles = css`:host { display: block; }`;

  helper() {
    return html`<span>skipped</span>`;
  }

  render() {
    return html`<div class="card">${this.title}</div>`;
  }
}
"#;

    #[test]
    fn test_finds_render_template_only() {
        let template = parse_entry_template(CARD, "render", "Card").unwrap();
        assert_eq!(template.quasis, vec!["<div class=\"card\">", "</div>"]);
        assert_eq!(template.expressions, vec![Expr::this_member("title")]);
    }

    #[test]
    fn test_bare_method_is_wrapped() {
        let source = "render() { return html`<p>${this.text}</p>`; }";
        let template = parse_entry_template(source, "render", "Bare").unwrap();
        assert_eq!(template.expressions, vec![Expr::this_member("text")]);
    }

    #[test]
    fn test_missing_entry_point() {
        let err = parse_entry_template("class A { other() { return 1; } }", "render", "A")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.message.contains("no `render()` method"));
    }

    #[test]
    fn test_render_without_template() {
        let err = parse_entry_template("class A { render() { return null; } }", "render", "A")
            .unwrap_err();
        assert!(err.message.contains("does not return"));
    }

    #[test]
    fn test_ambiguous_entry_point() {
        let source = r#"
class A {
  render() {
    if (this.compact) {
      return html`<small></small>`;
    }
    return html`<div></div>`;
  }
}
"#;
        let err = parse_entry_template(source, "render", "A").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.message.contains("ambiguous"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_entry_template("class A { render( { }", "render", "A").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.message.starts_with("Invalid component source"));
    }

    #[test]
    fn test_lowers_map_and_conditional() {
        let source = r#"
class List {
  render() {
    return html`<ul>${this.items.map((item, i) => html`<li>${item.name}</li>`)}</ul>${this.open ? html`<b></b>` : ''}`;
  }
}
"#;
        let template = parse_entry_template(source, "render", "List").unwrap();
        assert_eq!(template.expressions.len(), 2);
        match &template.expressions[0] {
            Expr::Call { callee, arguments } => {
                assert_eq!(**callee, Expr::member(Expr::this_member("items"), "map"));
                match &arguments[0] {
                    Expr::Arrow { params, body } => {
                        assert_eq!(params, &vec!["item".to_string(), "i".to_string()]);
                        assert!(matches!(**body, Expr::Template(_)));
                    }
                    other => panic!("expected arrow, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
        match &template.expressions[1] {
            Expr::Conditional { alternate, .. } => assert!(alternate.is_empty_string()),
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_kinds_keep_source() {
        let source = "class A { render() { return html`${this.items[0]}`; } }";
        let template = parse_entry_template(source, "render", "A").unwrap();
        assert_eq!(
            template.expressions[0],
            Expr::Unsupported {
                kind: "computed member access".to_string(),
                source: "this.items[0]".to_string(),
            }
        );
    }
}
