//! Named helper calls lowered to fixed PHP snippets.

use crate::ir::Expr;
use crate::php;

/// Stars rendered by `renderStars()`.
pub const STAR_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    /// `pluralize(count, 'review', 'reviews'?)`
    Pluralize,
    /// `renderStars()`, reads `rating` off the current loop item.
    RatingStars,
}

impl Helper {
    /// Matches `name(...)` and `this.name(...)`.
    pub fn from_callee(callee: &Expr) -> Option<Self> {
        let name = match callee {
            Expr::Identifier { name } => name.as_str(),
            Expr::Member { object, property } if **object == Expr::This => property.as_str(),
            _ => return None,
        };
        match name {
            "pluralize" => Some(Helper::Pluralize),
            "renderStars" => Some(Helper::RatingStars),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Helper::Pluralize => "pluralize",
            Helper::RatingStars => "renderStars",
        }
    }
}

pub fn pluralize_statement(
    count_php: &str,
    singular: &str,
    plural: &str,
    text_domain: Option<&str>,
) -> String {
    let domain = text_domain
        .map(|d| format!(", {}", php::string_literal(d)))
        .unwrap_or_default();
    format!(
        "echo esc_html( sprintf( _n( {}, {}, {}{} ), {} ) );",
        php::string_literal(&format!("%d {}", singular)),
        php::string_literal(&format!("%d {}", plural)),
        count_php,
        domain,
        count_php
    )
}

pub fn stars_loop_head() -> String {
    format!("for ( $star = 1; $star <= {}; $star++ ) :", STAR_COUNT)
}

pub fn star_class_statement(rating_php: &str) -> String {
    format!("echo $star <= (int) {} ? ' is-filled' : '';", rating_php)
}

pub const STAR_OPEN: &str = "<span class=\"star";
pub const STAR_CLOSE: &str = "\" aria-hidden=\"true\">&#9733;</span>";
