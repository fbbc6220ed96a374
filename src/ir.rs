use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE IR
// Owned, arena-free view of the entry template. Lowered once from the oxc tree.
// ═══════════════════════════════════════════════════════════════════════════════

/// Literal chunks interleaved with interpolations:
/// `quasis[0] ${expressions[0]} quasis[1] ... quasis[n]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemplateIR {
    pub quasis: Vec<String>,
    pub expressions: Vec<Expr>,
}

impl TemplateIR {
    /// Iterates the template in source order.
    pub fn parts(&self) -> impl Iterator<Item = TemplatePart<'_>> {
        self.quasis.iter().enumerate().flat_map(move |(i, quasi)| {
            std::iter::once(TemplatePart::Literal(quasi.as_str()))
                .chain(self.expressions.get(i).map(TemplatePart::Interpolation))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemplatePart<'t> {
    Literal(&'t str),
    Interpolation(&'t Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Expr {
    Identifier {
        name: String,
    },
    This,
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Arrow {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Binary {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: String,
        argument: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Template(TemplateIR),
    Number {
        value: f64,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Null,
    Unsupported {
        kind: String,
        source: String,
    },
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Identifier {
            name: name.to_string(),
        }
    }

    pub fn member(object: Expr, property: &str) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
        }
    }

    /// `this.<property>`
    pub fn this_member(property: &str) -> Self {
        Self::member(Expr::This, property)
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Expr::Binary { .. } | Expr::Logical { .. } | Expr::Conditional { .. }
        )
    }

    pub fn is_empty_string(&self) -> bool {
        matches!(self, Expr::Str { value } if value.is_empty())
    }

    /// Short human-readable name used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Identifier { name } => format!("identifier '{}'", name),
            Expr::This => "bare 'this'".to_string(),
            Expr::Member { property, .. } => format!("property access '.{}'", property),
            Expr::Call { callee, .. } => format!("call to {}", callee.describe()),
            Expr::Arrow { .. } => "arrow function".to_string(),
            Expr::Binary { operator, .. } => format!("binary operator '{}'", operator),
            Expr::Logical { operator, .. } => format!("logical operator '{}'", operator),
            Expr::Unary { operator, .. } => format!("unary operator '{}'", operator),
            Expr::Conditional { .. } => "conditional expression".to_string(),
            Expr::Template(_) => "html template".to_string(),
            Expr::Number { .. } => "numeric literal".to_string(),
            Expr::Str { .. } => "string literal".to_string(),
            Expr::Bool { .. } => "boolean literal".to_string(),
            Expr::Null => "null literal".to_string(),
            Expr::Unsupported { kind, source } => format!("{} `{}`", kind, source),
        }
    }
}
