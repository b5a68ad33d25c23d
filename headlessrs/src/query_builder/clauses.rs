//! SELECT / GROUP BY / ORDER BY / LIMIT text for a structured query.
//!
//! Every aggregator is expected to carry a column; that is checked upstream.

use std::collections::HashMap;

use crate::filters::quote;
use crate::models::{AggOperator, Aggregator, StructQueryParam};

/// Prefix separating a joined model name from its field in group names.
pub const JOIN_UNDERLINE: &str = "__";

/// Precomputed expressions keyed by aggregator or order column.
pub type DerivedExprs = HashMap<String, String>;

pub fn render_select(params: &StructQueryParam, derived: Option<&DerivedExprs>) -> String {
    let aggs: Vec<String> = params
        .aggregators
        .iter()
        .map(|agg| match derived.and_then(|d| d.get(&agg.column)) {
            Some(expr) => expr.clone(),
            None => render_select_field(agg),
        })
        .collect();
    join_select(&params.groups, &aggs)
}

pub fn render_select_field(agg: &Aggregator) -> String {
    let col = &agg.column;
    if agg.func == AggOperator::CountDistinct {
        return format!("count(distinct {col}) AS {col} ");
    }
    let func = agg.func.sql_name();
    if agg.args.is_empty() {
        return format!("{func}( {col} ) AS {col} ");
    }
    let args: Vec<String> = agg
        .args
        .iter()
        .map(|arg| {
            if arg == col || is_numeric(arg) {
                arg.clone()
            } else {
                quote(arg)
            }
        })
        .collect();
    format!("{func}( {} ) AS {col} ", args.join(","))
}

pub fn render_group_by(params: &StructQueryParam) -> String {
    if params.groups.is_empty() {
        return String::new();
    }
    format!("group by {}", params.groups.join(","))
}

pub fn render_order_by(params: &StructQueryParam, derived: Option<&DerivedExprs>) -> String {
    if params.orders.is_empty() {
        return String::new();
    }
    let items: Vec<String> = params
        .orders
        .iter()
        .map(|order| {
            let target = derived
                .and_then(|d| d.get(&order.column))
                .unwrap_or(&order.column);
            format!("{target} {}", order.direction)
        })
        .collect();
    format!("order by {}", items.join(","))
}

pub fn render_limit(params: &StructQueryParam) -> String {
    match params.limit {
        Some(limit) if limit > 0 => format!(" limit {limit}"),
        _ => String::new(),
    }
}

/// Select list for stacking several item queries with `UNION`: groups drop
/// their join prefix and aggregators become positional `valueN` columns.
pub fn render_union_select(params: &StructQueryParam) -> String {
    let groups: Vec<String> = params
        .groups
        .iter()
        .map(|group| match group.split_once(JOIN_UNDERLINE) {
            Some((_, field)) => field.to_string(),
            None => group.clone(),
        })
        .collect();
    let aggs: Vec<String> = params
        .aggregators
        .iter()
        .enumerate()
        .map(|(idx, agg)| format!("{} as value{}", agg.column, idx + 1))
        .collect();
    let sql = join_select(&groups, &aggs);
    tracing::debug!(sql = %sql, "union select");
    sql
}

fn join_select(groups: &[String], aggs: &[String]) -> String {
    groups
        .iter()
        .chain(aggs)
        .cloned()
        .collect::<Vec<_>>()
        .join(",")
}

fn is_numeric(arg: &str) -> bool {
    !arg.is_empty() && !arg.chars().any(|c| c.is_alphabetic()) && arg.parse::<f64>().is_ok()
}
