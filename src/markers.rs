//! Textual marker scanning over markup and emitted PHP.
//!
//! Literal template chunks may open or close `<?php` regions and, inside
//! those regions, alternative-syntax control blocks. The converter feeds the
//! markers found here into the context tracker as a consistency check; the
//! tracker stays the source of truth.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CODE_OPEN_RE: Regex = Regex::new(r"<\?(?:php\b|=)").unwrap();
    static ref KEYWORD_RE: Regex = Regex::new(
        r"\b(?:foreach|for|while|elseif|if|else|endforeach|endfor|endwhile|endif)\b"
    )
    .unwrap();
    static ref STRING_LITERAL_RE: Regex =
        Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#).unwrap();
    static ref FOREACH_HEAD_RE: Regex =
        Regex::new(r"^\s*(?P<source>.+?)\s+as\s+(?:\$(?P<index>\w+)\s*=>\s*)?\$(?P<item>\w+)\s*$")
            .unwrap();
    static ref SOURCE_FIELD_RE: Regex =
        Regex::new(r#"(?:^\$(?P<var>\w+)|\[\s*['"](?P<key>\w+)['"]\s*\])$"#).unwrap();
    static ref PHP_BLOCK_RE: Regex = Regex::new(r"(?s)<\?(?:php\b|=).*?(?:\?>|$)").unwrap();
    static ref ATTRIBUTE_VALUE_RE: Regex = Regex::new(
        r#"(?P<name>[A-Za-z_:@.?][-A-Za-z0-9_:.]*)\s*=\s*(?:"[^"]*|'[^']*|[^\s"'=<>`]*)$"#
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    CodeOpen,
    CodeClose,
    LoopOpen {
        item: Option<String>,
        index: Option<String>,
        source_field: Option<String>,
    },
    LoopClose,
    ConditionalOpen,
    ConditionalElse,
    ConditionalClose,
}

/// Scans `text` in order. `starts_in_code` tells whether the text begins
/// inside an already opened `<?php` region. Control markers are only
/// recognised inside code regions.
pub fn scan(text: &str, starts_in_code: bool) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut in_code = starts_in_code;
    let mut rest = text;

    while !rest.is_empty() {
        if in_code {
            let (code, after) = match rest.find("?>") {
                Some(end) => (&rest[..end], Some(&rest[end + 2..])),
                None => (rest, None),
            };
            scan_control(code, &mut markers);
            match after {
                Some(after) => {
                    markers.push(Marker::CodeClose);
                    in_code = false;
                    rest = after;
                }
                None => break,
            }
        } else {
            match CODE_OPEN_RE.find(rest) {
                Some(m) => {
                    markers.push(Marker::CodeOpen);
                    in_code = true;
                    rest = &rest[m.end()..];
                }
                None => break,
            }
        }
    }

    markers
}

/// Recognises alternative-syntax control markers in one code segment.
/// Keywords and parentheses inside string literals are ignored, and a head
/// may itself contain `:` (ternaries, URLs) as long as its parentheses balance.
fn scan_control(code: &str, markers: &mut Vec<Marker>) {
    let masked = mask_strings(code);
    let mut pos = 0;

    while let Some(keyword) = KEYWORD_RE.find_at(&masked, pos) {
        pos = keyword.end();
        if is_member_name(&masked[..keyword.start()]) {
            continue;
        }
        let after = &masked[keyword.end()..];
        match keyword.as_str() {
            "else" => {
                if after.trim_start().starts_with(':') {
                    markers.push(Marker::ConditionalElse);
                }
            }
            "endforeach" | "endfor" | "endwhile" => {
                if ends_statement(after) {
                    markers.push(Marker::LoopClose);
                }
            }
            "endif" => {
                if ends_statement(after) {
                    markers.push(Marker::ConditionalClose);
                }
            }
            opener => {
                let Some((open, close)) = balanced_head(after) else {
                    continue;
                };
                let rest = &after[close + 1..];
                let trimmed = rest.trim_start();
                if !trimmed.starts_with(':') || trimmed.starts_with("::") {
                    continue;
                }
                pos = keyword.end() + close + 1;
                let head = &code[keyword.end() + open + 1..keyword.end() + close];
                markers.push(match opener {
                    "foreach" => parse_foreach_head(head),
                    "for" | "while" => Marker::LoopOpen {
                        item: None,
                        index: None,
                        source_field: None,
                    },
                    "elseif" => Marker::ConditionalElse,
                    _ => Marker::ConditionalOpen,
                });
            }
        }
    }
}

/// Blanks string-literal contents, keeping byte offsets.
fn mask_strings(code: &str) -> String {
    STRING_LITERAL_RE
        .replace_all(code, |caps: &regex::Captures| {
            let literal = &caps[0];
            let quote = &literal[..1];
            format!("{}{}{}", quote, " ".repeat(literal.len() - 2), quote)
        })
        .into_owned()
}

/// `$for`, `->if` and `::else` are names, not keywords.
fn is_member_name(before: &str) -> bool {
    before.ends_with('$') || before.ends_with("->") || before.ends_with("::")
}

fn ends_statement(after: &str) -> bool {
    let trimmed = after.trim_start();
    trimmed.is_empty() || trimmed.starts_with(';')
}

/// Byte offsets of the `(` opening `text` (after whitespace) and of its
/// matching `)`.
fn balanced_head(text: &str) -> Option<(usize, usize)> {
    let open = text.len() - text.trim_start().len();
    if !text[open..].starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + i));
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_foreach_head(head: &str) -> Marker {
    match FOREACH_HEAD_RE.captures(head) {
        Some(caps) => {
            let source = caps.name("source").map(|m| m.as_str().trim()).unwrap_or("");
            let source_field = SOURCE_FIELD_RE.captures(source).and_then(|c| {
                c.name("key")
                    .or_else(|| c.name("var"))
                    .map(|m| m.as_str().to_string())
            });
            Marker::LoopOpen {
                item: caps.name("item").map(|m| m.as_str().to_string()),
                index: caps.name("index").map(|m| m.as_str().to_string()),
                source_field,
            }
        }
        None => Marker::LoopOpen {
            item: None,
            index: None,
            source_field: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Loop,
    Conditional,
}

/// Checks that the markers of a complete output balance and nest.
pub fn verify_balanced(output: &str) -> Result<(), String> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut in_code = false;

    for marker in scan(output, false) {
        match marker {
            Marker::CodeOpen => in_code = true,
            Marker::CodeClose => in_code = false,
            Marker::LoopOpen { .. } => blocks.push(Block::Loop),
            Marker::ConditionalOpen => blocks.push(Block::Conditional),
            Marker::ConditionalElse => {
                if blocks.last() != Some(&Block::Conditional) {
                    return Err("'else' marker outside of an open if block".to_string());
                }
            }
            Marker::LoopClose => {
                if blocks.pop() != Some(Block::Loop) {
                    return Err("loop end marker does not close an open loop".to_string());
                }
            }
            Marker::ConditionalClose => {
                if blocks.pop() != Some(Block::Conditional) {
                    return Err("'endif' marker does not close an open if block".to_string());
                }
            }
        }
    }

    if in_code {
        return Err("output ends inside an unclosed <?php region".to_string());
    }
    if !blocks.is_empty() {
        return Err(format!("output leaves {} block(s) unclosed", blocks.len()));
    }
    Ok(())
}

/// Returns the attribute name when `markup` ends inside an attribute value,
/// e.g. `<a class="x" href="` yields `href`.
pub fn attribute_context(markup: &str) -> Option<String> {
    let markup = PHP_BLOCK_RE.replace_all(markup, "");
    let tag_start = markup.rfind('<')?;
    let tag = &markup[tag_start + 1..];
    if tag.contains('>') || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    ATTRIBUTE_VALUE_RE
        .captures(tag)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str().to_ascii_lowercase())
}
