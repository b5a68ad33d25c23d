//! WHERE clause generation for the requested date window.

use crate::date_mode::{format_day, minus_days, DateModeRenderer};
use crate::filters::WhereClauseRenderer;
use crate::models::{
    DateConf, DateMode, DatePeriod, EffectiveDateRange, ItemDateRange, StructQueryParam,
};

/// Full WHERE text: the date predicate merged with the dimension filters.
pub fn generate_where(
    params: &StructQueryParam,
    available: Option<&ItemDateRange>,
    filters: &dyn WhereClauseRenderer,
    date_mode: &dyn DateModeRenderer,
) -> String {
    let from_filters = filters.render(&params.dimension_filters);
    let from_date = params
        .date_info
        .as_ref()
        .map(|conf| date_where_clause(conf, available, date_mode))
        .unwrap_or_default();
    merge_where(params, &from_filters, &from_date, date_mode)
}

/// Date predicate for `conf`. Known availability always wins over the
/// requested mode so no predicate reaches past verified data.
pub fn date_where_clause(
    conf: &DateConf,
    available: Option<&ItemDateRange>,
    date_mode: &dyn DateModeRenderer,
) -> String {
    if let Some(available) = available.filter(|a| !a.is_empty()) {
        tracing::debug!(?available, "building date predicate from available range");
        return date_mode.date_where_str(conf, available);
    }
    match conf.date_mode {
        DateMode::List => date_mode.list_date_str(conf),
        DateMode::Between => date_mode.between_date_str(conf),
        _ if date_mode.has_available_data_mode(conf) => {
            date_mode.has_data_mode_str(available, conf)
        }
        _ => date_mode.default_recent_date_info(Some(conf)),
    }
}

/// Combine the date and filter predicates: `<date> AND (<filter>)` when both
/// exist, either one alone otherwise, and the default recent window when
/// neither does.
pub fn merge_where(
    params: &StructQueryParam,
    from_filters: &str,
    from_date: &str,
    date_mode: &dyn DateModeRenderer,
) -> String {
    match (from_date.is_empty(), from_filters.is_empty()) {
        (false, false) => format!("{from_date} AND ({from_filters})"),
        (true, false) => from_filters.to_string(),
        (false, true) => from_date.to_string(),
        (true, true) => {
            tracing::debug!("no date or filter predicate, using default recent window");
            date_mode.default_recent_date_info(params.date_info.as_ref())
        }
    }
}

/// Normalized `(column, start, end)` of the window the query will cover.
pub fn resolve_effective_range(
    params: &StructQueryParam,
    available: Option<&ItemDateRange>,
    date_mode: &dyn DateModeRenderer,
) -> EffectiveDateRange {
    let Some(conf) = params.date_info.as_ref() else {
        return EffectiveDateRange::default();
    };
    let column = date_mode.sys_date_col(conf);
    if column.is_empty() {
        return EffectiveDateRange::default();
    }
    match conf.date_mode {
        DateMode::Available | DateMode::Between => EffectiveDateRange::new(
            column,
            conf.start_date.clone().unwrap_or_default(),
            conf.end_date.clone().unwrap_or_default(),
        ),
        DateMode::List => {
            let start = conf.date_list.iter().min();
            let end = conf.date_list.iter().max();
            match start.zip(end) {
                Some((start, end)) => EffectiveDateRange::new(column, start, end),
                None => EffectiveDateRange::default(),
            }
        }
        DateMode::Recent => recent_range(column, conf, available, date_mode),
    }
}

fn recent_range(
    column: String,
    conf: &DateConf,
    available: Option<&ItemDateRange>,
    date_mode: &dyn DateModeRenderer,
) -> EffectiveDateRange {
    let Some(available) = available else {
        let end = minus_days(date_mode.today(), 1);
        let start = minus_days(end, date_mode.recent_unit(conf).saturating_sub(1));
        return EffectiveDateRange::new(column, format_day(start), format_day(end));
    };
    match conf.period {
        DatePeriod::Day => {
            let (start, end) = date_mode.recent_day(available, conf);
            EffectiveDateRange::new(column, start, end)
        }
        DatePeriod::Week => {
            let (start, end) = date_mode.recent_week(available, conf);
            EffectiveDateRange::new(column, start, end)
        }
        DatePeriod::Month => {
            let months = date_mode.recent_month(available, conf);
            let start = months.iter().map(|(s, _)| s).min();
            let end = months.iter().map(|(_, e)| e).max();
            match start.zip(end) {
                Some((start, end)) => EffectiveDateRange::new(column, start, end),
                None => EffectiveDateRange::default(),
            }
        }
        DatePeriod::Quarter | DatePeriod::Year => EffectiveDateRange::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    use crate::config::DateColumnConfig;
    use crate::date_mode::DefaultDateMode;
    use crate::filters::SqlFilterRenderer;
    use crate::models::{DimensionFilter, FilterOp};

    fn mode() -> DefaultDateMode {
        DefaultDateMode::default().with_today(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    fn with_date(conf: DateConf) -> StructQueryParam {
        StructQueryParam {
            date_info: Some(conf),
            ..Default::default()
        }
    }

    fn region_filter() -> DimensionFilter {
        DimensionFilter {
            field: "region".to_string(),
            op: FilterOp::Eq,
            value: json!("US"),
        }
    }

    #[test]
    fn merges_date_and_filter_predicates() {
        let p = StructQueryParam::default();
        let merged = merge_where(&p, "region = 'US'", "dt >= '2023-01-01'", &mode());
        assert_eq!(merged, "dt >= '2023-01-01' AND (region = 'US')");
        assert_eq!(merge_where(&p, "region = 'US'", "", &mode()), "region = 'US'");
        assert_eq!(merge_where(&p, "", "dt = 1", &mode()), "dt = 1");
    }

    #[test]
    fn empty_predicates_fall_back_to_recent_window() {
        let p = with_date(DateConf::recent(1, DatePeriod::Day));
        assert_eq!(
            merge_where(&p, "", "", &mode()),
            "sys_imp_date >= '2024-03-14' and sys_imp_date <= '2024-03-14'"
        );
        assert_eq!(merge_where(&StructQueryParam::default(), "", "", &mode()), "");
    }

    #[test]
    fn dispatches_on_mode_without_availability() {
        let m = mode();
        assert_eq!(
            date_where_clause(&DateConf::list(["2024-01-01"]), None, &m),
            "(sys_imp_date in ('2024-01-01'))"
        );
        assert_eq!(
            date_where_clause(&DateConf::between("2024-01-01", "2024-01-02"), None, &m),
            "sys_imp_date >= '2024-01-01' and sys_imp_date <= '2024-01-02'"
        );
        assert_eq!(
            date_where_clause(&DateConf::available(2, DatePeriod::Day), None, &m),
            "sys_imp_date >= '2024-03-13' and sys_imp_date <= '2024-03-14'"
        );
    }

    #[test]
    fn availability_overrides_requested_mode() {
        let avail = ItemDateRange::new("2024-01-01", "2024-02-10");
        let clause = date_where_clause(
            &DateConf::recent(3, DatePeriod::Day),
            Some(&avail),
            &mode(),
        );
        assert_eq!(
            clause,
            "sys_imp_date >= '2024-02-08' and sys_imp_date <= '2024-02-10'"
        );
    }

    #[test]
    fn empty_availability_is_ignored() {
        let clause = date_where_clause(
            &DateConf::between("2024-01-01", "2024-01-02"),
            Some(&ItemDateRange::default()),
            &mode(),
        );
        assert_eq!(
            clause,
            "sys_imp_date >= '2024-01-01' and sys_imp_date <= '2024-01-02'"
        );
    }

    #[test]
    fn generate_where_combines_everything() {
        let mut p = with_date(DateConf::between("2024-01-01", "2024-01-31"));
        p.dimension_filters.push(region_filter());
        assert_eq!(
            generate_where(&p, None, &SqlFilterRenderer, &mode()),
            "sys_imp_date >= '2024-01-01' and sys_imp_date <= '2024-01-31' AND (region = 'US')"
        );
    }

    #[test]
    fn effective_range_for_between_is_unchanged() {
        let p = with_date(DateConf::between("2024-01-01", "2024-01-31"));
        assert_eq!(
            resolve_effective_range(&p, None, &mode()),
            EffectiveDateRange::new("sys_imp_date", "2024-01-01", "2024-01-31")
        );
    }

    #[test]
    fn effective_range_for_list_spans_min_to_max() {
        let p = with_date(DateConf::list(["2024-01-05", "2024-01-01", "2024-01-03"]));
        assert_eq!(
            resolve_effective_range(&p, None, &mode()),
            EffectiveDateRange::new("sys_imp_date", "2024-01-01", "2024-01-05")
        );
    }

    #[test]
    fn effective_range_for_recent_days_ends_yesterday() {
        let p = with_date(DateConf::recent(7, DatePeriod::Day));
        assert_eq!(
            resolve_effective_range(&p, None, &mode()),
            EffectiveDateRange::new("sys_imp_date", "2024-03-08", "2024-03-14")
        );
    }

    #[test]
    fn effective_range_for_recent_months_spans_all_pairs() {
        let p = with_date(DateConf::recent(2, DatePeriod::Month));
        let avail = ItemDateRange::new("2023-01-01", "2024-02-10");
        assert_eq!(
            resolve_effective_range(&p, Some(&avail), &mode()),
            EffectiveDateRange::new("sys_imp_month", "2024-01-01", "2024-02-10")
        );
    }

    #[test]
    fn effective_range_is_empty_when_undeterminable() {
        let m = mode();
        assert!(resolve_effective_range(&StructQueryParam::default(), None, &m).is_empty());
        let year = with_date(DateConf::recent(1, DatePeriod::Year));
        assert!(resolve_effective_range(&year, None, &m).is_empty());
        let mut quarter = DateConf::recent(1, DatePeriod::Quarter);
        quarter.date_field = Some("dt".to_string());
        let avail = ItemDateRange::new("2024-01-01", "2024-02-10");
        assert!(resolve_effective_range(&with_date(quarter), Some(&avail), &m).is_empty());
    }

    #[test]
    fn zero_unit_range_matches_predicate() {
        let m = DefaultDateMode::new(DateColumnConfig {
            default_recent_unit: 3,
            ..Default::default()
        })
        .with_today(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let p = with_date(DateConf::recent(0, DatePeriod::Day));
        assert_eq!(
            generate_where(&p, None, &SqlFilterRenderer, &m),
            "sys_imp_date >= '2024-03-12' and sys_imp_date <= '2024-03-14'"
        );
        assert_eq!(
            resolve_effective_range(&p, None, &m),
            EffectiveDateRange::new("sys_imp_date", "2024-03-12", "2024-03-14")
        );
    }
}

