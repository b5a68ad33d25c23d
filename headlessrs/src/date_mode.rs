//! Date-window predicate rendering.
//!
//! All dates are `YYYY-MM-DD` strings, which sort lexicographically in
//! calendar order. Recent windows end yesterday unless availability data
//! says otherwise.

use chrono::{Datelike, Days, Local, Months, NaiveDate};

use crate::config::DateColumnConfig;
use crate::filters::quote;
use crate::models::{DateConf, DateMode, DatePeriod, ItemDateRange};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Predicate never satisfied; used when a requested window has no overlap
/// with the available data.
const EMPTY_WINDOW: &str = "1 = 0";

/// Turns date windows into SQL predicates and boundary pairs.
pub trait DateModeRenderer {
    /// Reference date for "recent" windows; the window ends the day before.
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
    /// Number of periods a recent window spans.
    fn recent_unit(&self, conf: &DateConf) -> u32 {
        conf.unit.max(1)
    }
    /// Date column for the window, empty when it cannot be determined.
    fn sys_date_col(&self, conf: &DateConf) -> String;
    fn list_date_str(&self, conf: &DateConf) -> String;
    fn between_date_str(&self, conf: &DateConf) -> String;
    fn has_available_data_mode(&self, conf: &DateConf) -> bool;
    fn has_data_mode_str(&self, available: Option<&ItemDateRange>, conf: &DateConf) -> String;
    fn default_recent_date_info(&self, conf: Option<&DateConf>) -> String;
    /// Predicate for `conf` restricted to the known available range.
    fn date_where_str(&self, conf: &DateConf, available: &ItemDateRange) -> String;
    fn recent_day(&self, available: &ItemDateRange, conf: &DateConf) -> (String, String);
    fn recent_week(&self, available: &ItemDateRange, conf: &DateConf) -> (String, String);
    fn recent_month(&self, available: &ItemDateRange, conf: &DateConf) -> Vec<(String, String)>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultDateMode {
    columns: DateColumnConfig,
    today: Option<NaiveDate>,
}

impl DefaultDateMode {
    pub fn new(columns: DateColumnConfig) -> Self {
        Self {
            columns,
            today: None,
        }
    }

    /// Pin the reference date instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn yesterday(&self) -> NaiveDate {
        minus_days(self.today(), 1)
    }

    /// Last known available day, or yesterday when unknown.
    fn available_end(&self, available: &ItemDateRange) -> NaiveDate {
        available
            .end_date
            .as_deref()
            .and_then(parse_day)
            .unwrap_or_else(|| self.yesterday())
    }

    fn clamp_start(start: NaiveDate, available: &ItemDateRange) -> NaiveDate {
        match available.start_date.as_deref().and_then(parse_day) {
            Some(lo) if lo > start => lo,
            _ => start,
        }
    }

    fn recent_where(&self, available: &ItemDateRange, conf: &DateConf) -> String {
        let col = self.sys_date_col(conf);
        if col.is_empty() {
            return String::new();
        }
        let range = match conf.period {
            DatePeriod::Day => Some(self.recent_day(available, conf)),
            DatePeriod::Week => Some(self.recent_week(available, conf)),
            DatePeriod::Month => {
                let months = self.recent_month(available, conf);
                let start = months.iter().map(|(s, _)| s).min().cloned();
                let end = months.iter().map(|(_, e)| e).max().cloned();
                start.zip(end)
            }
            DatePeriod::Quarter | DatePeriod::Year => {
                let end = self.available_end(available);
                let start = window_start(end, conf.period, self.recent_unit(conf));
                Some((
                    format_day(Self::clamp_start(start, available)),
                    format_day(end),
                ))
            }
        };
        match range {
            Some((start, end)) if start <= end => between_predicate(&col, &start, &end),
            _ => EMPTY_WINDOW.to_string(),
        }
    }
}

impl DateModeRenderer for DefaultDateMode {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// A unit of 0 falls back to the configured default.
    fn recent_unit(&self, conf: &DateConf) -> u32 {
        if conf.unit == 0 {
            self.columns.default_recent_unit.max(1)
        } else {
            conf.unit
        }
    }

    fn sys_date_col(&self, conf: &DateConf) -> String {
        if let Some(field) = conf.date_field.as_deref().filter(|f| !f.is_empty()) {
            return field.to_string();
        }
        match conf.period {
            DatePeriod::Day => self.columns.day_column.clone(),
            DatePeriod::Week => self.columns.week_column.clone(),
            DatePeriod::Month => self.columns.month_column.clone(),
            DatePeriod::Quarter | DatePeriod::Year => String::new(),
        }
    }

    fn list_date_str(&self, conf: &DateConf) -> String {
        let col = self.sys_date_col(conf);
        if col.is_empty() || conf.date_list.is_empty() {
            return String::new();
        }
        list_predicate(&col, conf.date_list.iter().map(String::as_str))
    }

    fn between_date_str(&self, conf: &DateConf) -> String {
        let col = self.sys_date_col(conf);
        match (conf.start_date.as_deref(), conf.end_date.as_deref()) {
            (Some(start), Some(end)) if !col.is_empty() => between_predicate(&col, start, end),
            _ => String::new(),
        }
    }

    fn has_available_data_mode(&self, conf: &DateConf) -> bool {
        conf.date_mode == DateMode::Available
    }

    fn has_data_mode_str(&self, available: Option<&ItemDateRange>, conf: &DateConf) -> String {
        match available.filter(|a| !a.is_empty()) {
            Some(available) => self.recent_where(available, conf),
            None => self.default_recent_date_info(Some(conf)),
        }
    }

    fn default_recent_date_info(&self, conf: Option<&DateConf>) -> String {
        let Some(conf) = conf else {
            return String::new();
        };
        let col = self.sys_date_col(conf);
        if col.is_empty() {
            return String::new();
        }
        let end = self.yesterday();
        let start = window_start(end, conf.period, self.recent_unit(conf));
        between_predicate(&col, &format_day(start), &format_day(end))
    }

    fn date_where_str(&self, conf: &DateConf, available: &ItemDateRange) -> String {
        let col = self.sys_date_col(conf);
        if col.is_empty() {
            return String::new();
        }
        let lo = available.start_date.as_deref().filter(|d| !d.is_empty());
        let hi = available.end_date.as_deref().filter(|d| !d.is_empty());
        match conf.date_mode {
            DateMode::Between => {
                let start = max_opt(conf.start_date.as_deref(), lo);
                let end = min_opt(conf.end_date.as_deref(), hi);
                match (start, end) {
                    (Some(start), Some(end)) if start <= end => {
                        between_predicate(&col, start, end)
                    }
                    (Some(_), Some(_)) => EMPTY_WINDOW.to_string(),
                    _ => self.recent_where(available, conf),
                }
            }
            DateMode::List => {
                let dates: Vec<&str> = conf
                    .date_list
                    .iter()
                    .map(String::as_str)
                    .filter(|d| lo.map_or(true, |lo| *d >= lo) && hi.map_or(true, |hi| *d <= hi))
                    .collect();
                if dates.is_empty() {
                    EMPTY_WINDOW.to_string()
                } else {
                    list_predicate(&col, dates.into_iter())
                }
            }
            DateMode::Recent | DateMode::Available => self.recent_where(available, conf),
        }
    }

    fn recent_day(&self, available: &ItemDateRange, conf: &DateConf) -> (String, String) {
        let end = self.available_end(available);
        let start = Self::clamp_start(
            window_start(end, DatePeriod::Day, self.recent_unit(conf)),
            available,
        );
        (format_day(start), format_day(end))
    }

    fn recent_week(&self, available: &ItemDateRange, conf: &DateConf) -> (String, String) {
        let end = self.available_end(available);
        let start = Self::clamp_start(
            window_start(end, DatePeriod::Week, self.recent_unit(conf)),
            available,
        );
        (format_day(start), format_day(end))
    }

    fn recent_month(&self, available: &ItemDateRange, conf: &DateConf) -> Vec<(String, String)> {
        let end = self.available_end(available);
        let first = month_start(end);
        let mut months = Vec::new();
        for back in 0..self.recent_unit(conf) {
            let Some(start) = first.checked_sub_months(Months::new(back)) else {
                break;
            };
            let clamped = Self::clamp_start(start, available);
            let month_end = month_end(start).min(end);
            if clamped <= month_end {
                months.push((format_day(clamped), format_day(month_end)));
            }
            // Earlier months lie entirely before the available start.
            if clamped > start {
                break;
            }
        }
        months.reverse();
        months
    }
}

pub(crate) fn parse_day(value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value.trim(), DAY_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(value, error = %e, "ignoring unparsable date bound");
            None
        }
    }
}

pub(crate) fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub(crate) fn minus_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    minus_days(date, date.weekday().num_days_from_monday())
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .map(|next| minus_days(next, 1))
        .unwrap_or(NaiveDate::MAX)
}

/// First day of an `n`-period window whose last period contains `end`.
fn window_start(end: NaiveDate, period: DatePeriod, n: u32) -> NaiveDate {
    let back = n.saturating_sub(1);
    match period {
        DatePeriod::Day => minus_days(end, back),
        DatePeriod::Week => minus_days(week_start(end), back.saturating_mul(7)),
        DatePeriod::Month => month_start(end)
            .checked_sub_months(Months::new(back))
            .unwrap_or(NaiveDate::MIN),
        DatePeriod::Quarter => {
            let into_quarter = end.month0() % 3;
            month_start(end)
                .checked_sub_months(Months::new(
                    into_quarter.saturating_add(back.saturating_mul(3)),
                ))
                .unwrap_or(NaiveDate::MIN)
        }
        DatePeriod::Year => i32::try_from(back)
            .ok()
            .and_then(|back| end.year().checked_sub(back))
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .unwrap_or(NaiveDate::MIN),
    }
}

fn between_predicate(col: &str, start: &str, end: &str) -> String {
    format!("{col} >= {} and {col} <= {}", quote(start), quote(end))
}

fn list_predicate<'a>(col: &str, dates: impl Iterator<Item = &'a str>) -> String {
    let values: Vec<String> = dates.map(quote).collect();
    format!("({col} in ({}))", values.join(","))
}

fn max_opt<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt<'a>(a: Option<&'a str>, b: Option<&'a str>) -> Option<&'a str> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode() -> DefaultDateMode {
        DefaultDateMode::default().with_today(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    #[test]
    fn column_follows_period_unless_explicit() {
        let m = mode();
        assert_eq!(m.sys_date_col(&DateConf::recent(3, DatePeriod::Week)), "sys_imp_week");
        let mut conf = DateConf::recent(3, DatePeriod::Year);
        assert_eq!(m.sys_date_col(&conf), "");
        conf.date_field = Some("dt".to_string());
        assert_eq!(m.sys_date_col(&conf), "dt");
    }

    #[test]
    fn renders_list_and_between() {
        let m = mode();
        assert_eq!(
            m.list_date_str(&DateConf::list(["2024-01-01", "2024-01-03"])),
            "(sys_imp_date in ('2024-01-01','2024-01-03'))"
        );
        assert_eq!(
            m.between_date_str(&DateConf::between("2024-01-01", "2024-01-31")),
            "sys_imp_date >= '2024-01-01' and sys_imp_date <= '2024-01-31'"
        );
    }

    #[test]
    fn default_recent_window_ends_yesterday() {
        let m = mode();
        assert_eq!(
            m.default_recent_date_info(Some(&DateConf::recent(7, DatePeriod::Day))),
            "sys_imp_date >= '2024-03-08' and sys_imp_date <= '2024-03-14'"
        );
        assert_eq!(m.default_recent_date_info(None), "");
    }

    #[test]
    fn zero_unit_uses_configured_default() {
        let m = mode();
        assert_eq!(
            m.default_recent_date_info(Some(&DateConf::recent(0, DatePeriod::Day))),
            "sys_imp_date >= '2024-03-14' and sys_imp_date <= '2024-03-14'"
        );
    }

    #[test]
    fn recent_day_anchors_on_available_end() {
        let m = mode();
        let avail = ItemDateRange::new("2024-01-01", "2024-02-10");
        let (start, end) = m.recent_day(&avail, &DateConf::recent(3, DatePeriod::Day));
        assert_eq!((start.as_str(), end.as_str()), ("2024-02-08", "2024-02-10"));
    }

    #[test]
    fn recent_day_is_clamped_to_available_start() {
        let m = mode();
        let avail = ItemDateRange::new("2024-02-09", "2024-02-10");
        let (start, _) = m.recent_day(&avail, &DateConf::recent(30, DatePeriod::Day));
        assert_eq!(start, "2024-02-09");
    }

    #[test]
    fn recent_week_starts_on_monday() {
        let m = mode();
        // 2024-02-10 is a Saturday; its ISO week starts 2024-02-05.
        let avail = ItemDateRange::new("2023-01-01", "2024-02-10");
        let (start, end) = m.recent_week(&avail, &DateConf::recent(2, DatePeriod::Week));
        assert_eq!((start.as_str(), end.as_str()), ("2024-01-29", "2024-02-10"));
    }

    #[test]
    fn recent_month_yields_one_pair_per_month() {
        let m = mode();
        let avail = ItemDateRange::new("2023-12-15", "2024-02-10");
        let months = m.recent_month(&avail, &DateConf::recent(3, DatePeriod::Month));
        assert_eq!(
            months,
            vec![
                ("2023-12-15".to_string(), "2023-12-31".to_string()),
                ("2024-01-01".to_string(), "2024-01-31".to_string()),
                ("2024-02-01".to_string(), "2024-02-10".to_string()),
            ]
        );
    }

    #[test]
    fn between_is_clamped_to_available_range() {
        let m = mode();
        let avail = ItemDateRange::new("2024-01-10", "2024-01-20");
        assert_eq!(
            m.date_where_str(&DateConf::between("2024-01-01", "2024-01-31"), &avail),
            "sys_imp_date >= '2024-01-10' and sys_imp_date <= '2024-01-20'"
        );
        assert_eq!(
            m.date_where_str(&DateConf::between("2023-01-01", "2023-01-31"), &avail),
            "1 = 0"
        );
    }

    #[test]
    fn list_keeps_only_available_dates() {
        let m = mode();
        let avail = ItemDateRange::new("2024-01-10", "2024-01-20");
        let conf = DateConf::list(["2024-01-05", "2024-01-12", "2024-01-25"]);
        assert_eq!(
            m.date_where_str(&conf, &avail),
            "(sys_imp_date in ('2024-01-12'))"
        );
        let conf = DateConf::list(["2024-02-01"]);
        assert_eq!(m.date_where_str(&conf, &avail), "1 = 0");
    }

    #[test]
    fn unparsable_available_end_falls_back_to_yesterday() {
        let m = mode();
        let avail = ItemDateRange {
            item_id: None,
            start_date: None,
            end_date: Some("not-a-date".to_string()),
        };
        let (start, end) = m.recent_day(&avail, &DateConf::recent(1, DatePeriod::Day));
        assert_eq!((start.as_str(), end.as_str()), ("2024-03-14", "2024-03-14"));
    }

    fn with_field(mut conf: DateConf) -> DateConf {
        conf.date_field = Some("dt".to_string());
        conf
    }

    #[test]
    fn quarter_and_year_windows_start_on_period_boundaries() {
        let m = mode();
        assert_eq!(
            m.default_recent_date_info(Some(&with_field(DateConf::recent(1, DatePeriod::Quarter)))),
            "dt >= '2024-01-01' and dt <= '2024-03-14'"
        );
        assert_eq!(
            m.default_recent_date_info(Some(&with_field(DateConf::recent(2, DatePeriod::Year)))),
            "dt >= '2023-01-01' and dt <= '2024-03-14'"
        );
    }

    #[test]
    fn oversized_units_saturate_to_earliest_date() {
        let m = mode();
        let earliest = format!("dt >= '{}' and dt <= '2024-03-14'", format_day(NaiveDate::MIN));
        for conf in [
            DateConf::recent(u32::MAX, DatePeriod::Quarter),
            DateConf::recent(2_147_483_650, DatePeriod::Year),
            DateConf::recent(u32::MAX, DatePeriod::Year),
            DateConf::recent(u32::MAX, DatePeriod::Week),
        ] {
            assert_eq!(m.default_recent_date_info(Some(&with_field(conf))), earliest);
        }
    }

    #[test]
    fn oversized_month_unit_stops_at_available_start() {
        let m = mode();
        let avail = ItemDateRange::new("2023-12-15", "2024-02-10");
        let months = m.recent_month(&avail, &DateConf::recent(u32::MAX, DatePeriod::Month));
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].0, "2023-12-15");
        assert_eq!(months[2].1, "2024-02-10");
    }
}
