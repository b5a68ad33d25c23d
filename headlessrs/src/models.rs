use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A structured analytical query: groups, aggregations, filters, a date
/// window, ordering and a limit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StructQueryParam {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub aggregators: Vec<Aggregator>,
    #[serde(default)]
    pub dimension_filters: Vec<DimensionFilter>,
    pub date_info: Option<DateConf>,
    #[serde(default)]
    pub orders: Vec<OrderItem>,
    pub limit: Option<i64>,
}

impl StructQueryParam {
    /// Parse a request body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// A requested aggregate computation.
///
/// `column` is required; an aggregator without one is a caller error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregator {
    pub func: AggOperator,
    pub column: String,
    /// Raw argument tokens. Ignored for `count_distinct`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Aggregator {
    pub fn new(func: AggOperator, column: impl Into<String>) -> Self {
        Self {
            func,
            column: column.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggOperator {
    Max,
    Min,
    Avg,
    Sum,
    Count,
    CountDistinct,
    Distinct,
    Topn,
    Percentile,
}

impl AggOperator {
    /// SQL function name as emitted in generated clauses.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggOperator::Max => "max",
            AggOperator::Min => "min",
            AggOperator::Avg => "avg",
            AggOperator::Sum => "sum",
            AggOperator::Count => "count",
            AggOperator::CountDistinct => "count_distinct",
            AggOperator::Distinct => "distinct",
            AggOperator::Topn => "topn",
            AggOperator::Percentile => "percentile",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
}

/// Requested date window. Only the fields relevant to `date_mode` are read:
/// `date_list` for list, `start_date`/`end_date` for between and available,
/// `unit`/`period` for recent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConf {
    pub date_mode: DateMode,
    /// Explicit date column; derived from `period` when absent.
    pub date_field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub date_list: Vec<String>,
    #[serde(default)]
    pub unit: u32,
    #[serde(default)]
    pub period: DatePeriod,
}

impl DateConf {
    pub fn list<I, S>(dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date_list: dates.into_iter().map(Into::into).collect(),
            ..Self::empty(DateMode::List)
        }
    }

    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Self::empty(DateMode::Between)
        }
    }

    pub fn recent(unit: u32, period: DatePeriod) -> Self {
        Self {
            unit,
            period,
            ..Self::empty(DateMode::Recent)
        }
    }

    pub fn available(unit: u32, period: DatePeriod) -> Self {
        Self {
            unit,
            period,
            ..Self::empty(DateMode::Available)
        }
    }

    fn empty(date_mode: DateMode) -> Self {
        Self {
            date_mode,
            date_field: None,
            start_date: None,
            end_date: None,
            date_list: Vec::new(),
            unit: 0,
            period: DatePeriod::Day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    List,
    Between,
    Available,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatePeriod {
    #[default]
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// Known data availability for a queried item, typically computed from
/// partition metadata. Dates are `YYYY-MM-DD`; a missing bound is unknown.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ItemDateRange {
    pub item_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ItemDateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            item_id: None,
            start_date: Some(start.into()),
            end_date: Some(end.into()),
        }
    }

    /// True when neither bound is known.
    pub fn is_empty(&self) -> bool {
        let blank = |d: &Option<String>| d.as_deref().map_or(true, str::is_empty);
        blank(&self.start_date) && blank(&self.end_date)
    }
}

/// Normalized `(column, start, end)` description of the effective range.
/// All three are empty when the range cannot be determined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveDateRange {
    pub column: String,
    pub start: String,
    pub end: String,
}

impl EffectiveDateRange {
    pub fn new(
        column: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty() && self.start.is_empty() && self.end.is_empty()
    }
}

/// How a metric's expression references its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricDefineType {
    /// References other metrics.
    Metric,
    /// References measures.
    #[default]
    Measure,
    /// References raw fields.
    Field,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub biz_name: String,
    #[serde(default)]
    pub define_type: MetricDefineType,
    pub expr: String,
    pub description: Option<String>,
}

impl MetricDefinition {
    pub fn new(
        biz_name: impl Into<String>,
        define_type: MetricDefineType,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            biz_name: biz_name.into(),
            define_type,
            expr: expr.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureDefinition {
    pub biz_name: String,
    pub agg: AggOperator,
    /// Underlying column or expression; the biz name is used when absent.
    pub expr: Option<String>,
    pub description: Option<String>,
}

impl MeasureDefinition {
    pub fn new(biz_name: impl Into<String>, agg: AggOperator) -> Self {
        Self {
            biz_name: biz_name.into(),
            agg,
            expr: None,
            description: None,
        }
    }

    pub fn column(&self) -> &str {
        self.expr
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.biz_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionDefinition {
    pub biz_name: String,
    pub expr: Option<String>,
    pub description: Option<String>,
}

impl DimensionDefinition {
    pub fn new(biz_name: impl Into<String>) -> Self {
        Self {
            biz_name: biz_name.into(),
            expr: None,
            description: None,
        }
    }
}

/// Aggregation form requested for measure substitutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggOption {
    #[default]
    Default,
    /// Rows are already aggregated; measures render as bare columns.
    Native,
    Aggregation,
}
