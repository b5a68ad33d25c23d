//! Derived metric expansion.
//!
//! A metric expression references other metrics, measures or raw fields
//! depending on its define type. Metric references are expanded recursively
//! and memoized per compilation; measure references become aggregate
//! expressions; field references are only classified.

use std::collections::{BTreeSet, HashMap};

use crate::error::{HeadlessError, Result};
use crate::expr_utils::ExpressionRewriter;
use crate::models::{AggOperator, AggOption, MeasureDefinition, MetricDefinition, MetricDefineType};
use crate::registry::SchemaRegistry;

/// Mutable scratch state for one compilation. Not shared across queries.
#[derive(Debug, Default, Clone)]
pub struct ResolutionContext {
    /// Resolved expression per referenced metric name.
    pub memo: HashMap<String, String>,
    /// Measures the resolved expressions depend on.
    pub measures: BTreeSet<String>,
    /// Dimensions the resolved expressions depend on.
    pub dimensions: BTreeSet<String>,
    in_progress: Vec<String>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct DerivedMetricResolver<'a> {
    registry: &'a SchemaRegistry,
    rewriter: &'a dyn ExpressionRewriter,
    agg_option: AggOption,
}

impl<'a> DerivedMetricResolver<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        rewriter: &'a dyn ExpressionRewriter,
        agg_option: AggOption,
    ) -> Self {
        Self {
            registry,
            rewriter,
            agg_option,
        }
    }

    /// Expand a metric's own definition, memoizing it under its biz name.
    pub fn resolve_metric(
        &self,
        metric: &MetricDefinition,
        ctx: &mut ResolutionContext,
    ) -> Result<String> {
        if let Some(done) = ctx.memo.get(&metric.biz_name) {
            return Ok(done.clone());
        }
        let resolved = self.enter(metric, ctx)?;
        ctx.memo.insert(metric.biz_name.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Substitute every reference in `expression` according to `define_type`.
    /// Unknown identifiers pass through untouched.
    pub fn resolve(
        &self,
        expression: &str,
        define_type: MetricDefineType,
        ctx: &mut ResolutionContext,
    ) -> Result<String> {
        let fields = self.rewriter.column_refs(expression);
        if fields.is_empty() {
            return Ok(expression.to_string());
        }

        let mut replace = HashMap::new();
        for field in fields {
            match define_type {
                MetricDefineType::Metric => {
                    let Some(metric) = self.registry.find_metric(&field) else {
                        continue;
                    };
                    if let Some(done) = ctx.memo.get(&field) {
                        replace.insert(field, done.clone());
                        continue;
                    }
                    let resolved = self.enter(metric, ctx)?;
                    ctx.memo.insert(field.clone(), resolved.clone());
                    replace.insert(field, resolved);
                }
                MetricDefineType::Measure => {
                    if let Some(measure) = self.registry.get_measure(&field) {
                        replace.insert(field.clone(), measure_expr(measure, self.agg_option));
                        ctx.measures.insert(field);
                    }
                }
                MetricDefineType::Field => {
                    if self.registry.has_field(&field) {
                        if self.registry.find_dimension(&field).is_some() {
                            ctx.dimensions.insert(field);
                        } else {
                            ctx.measures.insert(field);
                        }
                    }
                }
            }
        }

        if replace.is_empty() {
            return Ok(expression.to_string());
        }
        let expr = self.rewriter.rewrite(expression, &replace);
        tracing::debug!(from = %expression, to = %expr, "derived metric");
        Ok(expr)
    }

    /// Resolve `metric`'s definition while it is marked in progress.
    fn enter(&self, metric: &MetricDefinition, ctx: &mut ResolutionContext) -> Result<String> {
        if ctx
            .in_progress
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&metric.biz_name))
        {
            let mut path = ctx.in_progress.clone();
            path.push(metric.biz_name.clone());
            tracing::warn!(metric = %metric.biz_name, path = ?path, "cyclic metric definition");
            return Err(HeadlessError::CyclicMetric {
                name: metric.biz_name.clone(),
                path,
            });
        }
        ctx.in_progress.push(metric.biz_name.clone());
        let resolved = self.resolve(&metric.expr, metric.define_type, ctx);
        ctx.in_progress.pop();
        resolved
    }
}

/// Aggregate expression for a measure; the native option reads the
/// pre-aggregated column named after the measure.
pub fn measure_expr(measure: &MeasureDefinition, agg_option: AggOption) -> String {
    if agg_option == AggOption::Native {
        return measure.biz_name.clone();
    }
    match measure.agg {
        AggOperator::CountDistinct => format!("count(distinct {})", measure.column()),
        agg => format!("{}({})", agg.sql_name(), measure.column()),
    }
}
