use serde_json::Value;

use crate::models::{DimensionFilter, FilterOp};

/// Renders dimension filters into a WHERE fragment. Returns an empty string
/// when there is nothing to filter on.
pub trait WhereClauseRenderer {
    fn render(&self, filters: &[DimensionFilter]) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlFilterRenderer;

impl WhereClauseRenderer for SqlFilterRenderer {
    fn render(&self, filters: &[DimensionFilter]) -> String {
        filters
            .iter()
            .map(render_filter)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn render_filter(filter: &DimensionFilter) -> String {
    let field = &filter.field;
    let op = match filter.op {
        FilterOp::In | FilterOp::NotIn => {
            let list = match &filter.value {
                Value::Array(items) => items.iter().map(render_literal).collect::<Vec<_>>(),
                other => vec![render_literal(other)],
            };
            let not = if filter.op == FilterOp::NotIn { " NOT" } else { "" };
            return format!("{field}{not} IN ({})", list.join(", "));
        }
        FilterOp::Eq => "=",
        FilterOp::Neq => "<>",
        FilterOp::Gt => ">",
        FilterOp::Gte => ">=",
        FilterOp::Lt => "<",
        FilterOp::Lte => "<=",
        FilterOp::Like => "LIKE",
    };
    format!("{field} {op} {}", render_literal(&filter.value))
}

pub(crate) fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => items
            .iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => quote(&value.to_string()),
    }
}

/// Single-quote a string literal, doubling embedded quotes.
pub(crate) fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
