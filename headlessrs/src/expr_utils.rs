//! Identifier extraction and substitution over SQL expression strings.
//!
//! Expressions stay opaque text at this layer; the scanner only understands
//! enough lexical structure to find free identifiers: quoted literals,
//! numbers, keywords and function-call names are skipped.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Range;

use once_cell::sync::Lazy;

/// Extracts and replaces free identifiers in an expression.
pub trait ExpressionRewriter {
    /// Free column/identifier references in `expr`.
    fn column_refs(&self, expr: &str) -> BTreeSet<String>;
    /// Replace each referenced identifier with its substitution text.
    fn rewrite(&self, expr: &str, substitutions: &HashMap<String, String>) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentifierRewriter;

impl ExpressionRewriter for IdentifierRewriter {
    fn column_refs(&self, expr: &str) -> BTreeSet<String> {
        scan_identifiers(expr)
            .into_iter()
            .filter(|span| span.is_reference(expr))
            .map(|span| expr[span.name].to_string())
            .collect()
    }

    fn rewrite(&self, expr: &str, substitutions: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut last = 0;
        for span in scan_identifiers(expr) {
            if !span.is_reference(expr) {
                continue;
            }
            let Some(replacement) = substitutions.get(&expr[span.name.clone()]) else {
                continue;
            };
            out.push_str(&expr[last..span.outer.start]);
            let replacement = replacement.trim();
            let whole = expr[..span.outer.start].trim().is_empty()
                && expr[span.outer.end..].trim().is_empty();
            if !whole && needs_parens(replacement) {
                out.push('(');
                out.push_str(replacement);
                out.push(')');
            } else {
                out.push_str(replacement);
            }
            last = span.outer.end;
        }
        out.push_str(&expr[last..]);
        out
    }
}

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "and", "or", "not", "in", "is", "null", "case", "when", "then", "else", "end", "distinct",
        "as", "between", "like", "true", "false", "interval", "over", "partition", "by", "asc",
        "desc", "if",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone)]
struct IdentSpan {
    /// Identifier text without backticks.
    name: Range<usize>,
    /// Full token including any backticks.
    outer: Range<usize>,
    is_call: bool,
}

impl IdentSpan {
    fn is_reference(&self, expr: &str) -> bool {
        !self.is_call && !KEYWORDS.contains(expr[self.name.clone()].to_ascii_lowercase().as_str())
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn scan_identifiers(expr: &str) -> Vec<IdentSpan> {
    let bytes = expr.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < len {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => i = skip_quoted(bytes, i),
            b'`' => {
                let start = i + 1;
                let close = bytes[start..]
                    .iter()
                    .position(|&b| b == b'`')
                    .map_or(len, |p| start + p);
                let end = (close + 1).min(len);
                spans.push(IdentSpan {
                    name: start..close,
                    outer: i..end,
                    is_call: followed_by_paren(bytes, end),
                });
                i = end;
            }
            b'0'..=b'9' => {
                while i < len && is_ident_byte(bytes[i]) {
                    i += 1;
                }
            }
            _ if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < len && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                spans.push(IdentSpan {
                    name: start..i,
                    outer: start..i,
                    is_call: followed_by_paren(bytes, i),
                });
            }
            _ => i += 1,
        }
    }
    spans
}

/// Returns the index just past the closing quote; doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn followed_by_paren(bytes: &[u8], mut i: usize) -> bool {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    bytes.get(i) == Some(&b'(')
}

/// Whether a substitution must be wrapped to keep operator precedence.
fn needs_parens(expr: &str) -> bool {
    if is_wrapped(expr) {
        return false;
    }
    let bytes = expr.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => depth -= 1,
            b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'|' if depth == 0 => {
                return true
            }
            _ => {}
        }
        i += 1;
    }
    let lowered = expr.to_ascii_lowercase();
    lowered.contains(" and ") || lowered.contains(" or ")
}

/// True when the whole expression is enclosed by one matching pair of parens.
fn is_wrapped(expr: &str) -> bool {
    let bytes = expr.as_bytes();
    if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
        return false;
    }
    let mut depth = 0i32;
    for (idx, b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && idx != bytes.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
