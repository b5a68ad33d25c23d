use std::collections::BTreeSet;

use crate::config::HeadlessConfig;
use crate::date_mode::{DateModeRenderer, DefaultDateMode};
use crate::dialect::{DialectChecker, EngineType};
use crate::error::Result;
use crate::expr_utils::{ExpressionRewriter, IdentifierRewriter};
use crate::filters::{SqlFilterRenderer, WhereClauseRenderer};
use crate::models::{AggOption, EffectiveDateRange, ItemDateRange, MetricDefineType, StructQueryParam};
use crate::registry::SchemaRegistry;

pub mod clauses;
pub mod date_window;
pub mod derived;

pub use clauses::DerivedExprs;
pub use derived::{DerivedMetricResolver, ResolutionContext};

/// Alias given to the source relation when wrapping it.
pub const SOURCE_ALIAS: &str = "t";

/// The rendered pieces of one statement.
#[derive(Debug, Clone, Default)]
pub struct SqlClauses {
    pub select: String,
    pub where_clause: String,
    pub group_by: String,
    pub order_by: String,
    pub limit: String,
    /// Measures referenced by derived metrics.
    pub measures: BTreeSet<String>,
    /// Dimensions referenced by derived metrics.
    pub dimensions: BTreeSet<String>,
    pub date_range: EffectiveDateRange,
}

impl SqlClauses {
    /// Assemble a statement reading from `from` (a table name or aliased subquery).
    pub fn to_sql(&self, from: &str) -> String {
        let mut sql = format!("select {} from {from}", self.select.trim_end());
        if !self.where_clause.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&self.where_clause);
        }
        for clause in [&self.group_by, &self.order_by] {
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(clause);
            }
        }
        sql.push_str(&self.limit);
        sql
    }
}

pub struct SqlBuilder {
    checker: DialectChecker,
    date_mode: Box<dyn DateModeRenderer + Send + Sync>,
    filter_renderer: Box<dyn WhereClauseRenderer + Send + Sync>,
    rewriter: Box<dyn ExpressionRewriter + Send + Sync>,
    agg_option: AggOption,
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new(&HeadlessConfig::default())
    }
}

impl SqlBuilder {
    pub fn new(config: &HeadlessConfig) -> Self {
        Self {
            checker: DialectChecker::new(config.engine.clone()),
            date_mode: Box::new(DefaultDateMode::new(config.date.clone())),
            filter_renderer: Box::new(SqlFilterRenderer),
            rewriter: Box::new(IdentifierRewriter),
            agg_option: AggOption::Default,
        }
    }

    pub fn with_date_mode(mut self, date_mode: impl DateModeRenderer + Send + Sync + 'static) -> Self {
        self.date_mode = Box::new(date_mode);
        self
    }

    pub fn with_filter_renderer(
        mut self,
        renderer: impl WhereClauseRenderer + Send + Sync + 'static,
    ) -> Self {
        self.filter_renderer = Box::new(renderer);
        self
    }

    pub fn with_rewriter(mut self, rewriter: impl ExpressionRewriter + Send + Sync + 'static) -> Self {
        self.rewriter = Box::new(rewriter);
        self
    }

    pub fn with_agg_option(mut self, agg_option: AggOption) -> Self {
        self.agg_option = agg_option;
        self
    }

    /// Expand derived metrics referenced by aggregators or orders, then
    /// render every clause.
    pub fn build(
        &self,
        registry: &SchemaRegistry,
        params: &StructQueryParam,
        available: Option<&ItemDateRange>,
    ) -> Result<SqlClauses> {
        let resolver = DerivedMetricResolver::new(registry, self.rewriter.as_ref(), self.agg_option);
        let mut ctx = ResolutionContext::new();
        let mut derived = DerivedExprs::new();

        let columns = params
            .aggregators
            .iter()
            .map(|a| &a.column)
            .chain(params.orders.iter().map(|o| &o.column));
        for column in columns {
            if derived.contains_key(column) {
                continue;
            }
            let Some(metric) = registry.find_metric(column) else {
                continue;
            };
            if metric.define_type != MetricDefineType::Metric {
                continue;
            }
            let expr = resolver.resolve_metric(metric, &mut ctx)?;
            derived.insert(column.clone(), expr);
        }

        let select_exprs: DerivedExprs = derived
            .iter()
            .map(|(col, expr)| (col.clone(), format!("{expr} AS {col}")))
            .collect();

        let clauses = SqlClauses {
            select: clauses::render_select(params, Some(&select_exprs)),
            where_clause: date_window::generate_where(
                params,
                available,
                self.filter_renderer.as_ref(),
                self.date_mode.as_ref(),
            ),
            group_by: clauses::render_group_by(params),
            order_by: clauses::render_order_by(params, Some(&derived)),
            limit: clauses::render_limit(params),
            measures: ctx.measures,
            dimensions: ctx.dimensions,
            date_range: date_window::resolve_effective_range(
                params,
                available,
                self.date_mode.as_ref(),
            ),
        };
        tracing::debug!(
            derived = derived.len(),
            where_clause = %clauses.where_clause,
            "built sql clauses"
        );
        Ok(clauses)
    }

    pub fn supports_with(&self, engine: EngineType, version: Option<&str>) -> bool {
        self.checker.supports_with(engine, version)
    }

    /// Full statement over `source_sql`, as a `WITH` clause when the engine
    /// supports it and as a nested subquery otherwise.
    pub fn wrap_source(
        &self,
        clauses: &SqlClauses,
        source_sql: &str,
        engine: EngineType,
        version: Option<&str>,
    ) -> String {
        if self.supports_with(engine, version) {
            format!(
                "with {SOURCE_ALIAS} as ({source_sql}) {}",
                clauses.to_sql(SOURCE_ALIAS)
            )
        } else {
            clauses.to_sql(&format!("({source_sql}) {SOURCE_ALIAS}"))
        }
    }
}
