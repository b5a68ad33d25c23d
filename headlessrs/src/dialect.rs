//! Engine feature compatibility.
//!
//! A static table of engine/version pairs that cannot run `WITH` clauses.
//! Callers fall back to nested subqueries for those.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::EngineVersionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    Mysql,
    Clickhouse,
    Postgresql,
    Duckdb,
    Starrocks,
    Doris,
    Presto,
    Trino,
    Hive,
    H2,
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct DialectChecker {
    thresholds: EngineVersionConfig,
}

impl DialectChecker {
    pub fn new(thresholds: EngineVersionConfig) -> Self {
        Self { thresholds }
    }

    /// Whether `engine` at `version` accepts common table expressions.
    /// A missing version is assumed to support them.
    pub fn supports_with(&self, engine: EngineType, version: Option<&str>) -> bool {
        let Some(version) = version else {
            return true;
        };
        let supported = match engine {
            EngineType::Mysql => !version.starts_with(&self.thresholds.mysql_low_version),
            EngineType::Clickhouse => {
                compare_versions(version, &self.thresholds.clickhouse_low_version)
                    != Ordering::Less
            }
            _ => true,
        };
        if !supported {
            tracing::debug!(?engine, version, "engine does not support WITH clauses");
        }
        supported
    }
}

/// Compare dotted version strings component by component.
///
/// Missing components count as zero, so `"20.4"` equals `"20.4.0"`. Each
/// component is read up to its first non-digit (`"3-beta"` reads as 3).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = a.split('.').map(leading_number).collect();
    let right: Vec<u64> = b.split('.').map(leading_number).collect();
    let len = left.len().max(right.len());
    for idx in 0..len {
        let l = left.get(idx).copied().unwrap_or(0);
        let r = right.get(idx).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn leading_number(part: &str) -> u64 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(mysql: &str, ck: &str) -> DialectChecker {
        DialectChecker::new(EngineVersionConfig {
            mysql_low_version: mysql.to_string(),
            clickhouse_low_version: ck.to_string(),
        })
    }

    #[test]
    fn mysql_low_version_prefix_disables_with() {
        let c = checker("5.6", "20.4");
        assert!(!c.supports_with(EngineType::Mysql, Some("5.6.1")));
        assert!(c.supports_with(EngineType::Mysql, Some("8.0.1")));
        assert!(c.supports_with(EngineType::Mysql, None));
    }

    #[test]
    fn clickhouse_below_minimum_disables_with() {
        let c = checker("5.", "20.4");
        assert!(!c.supports_with(EngineType::Clickhouse, Some("19.17.4")));
        assert!(!c.supports_with(EngineType::Clickhouse, Some("20.3.9")));
        assert!(c.supports_with(EngineType::Clickhouse, Some("20.4")));
        assert!(c.supports_with(EngineType::Clickhouse, Some("23.8.1.2992")));
    }

    #[test]
    fn other_engines_always_support_with() {
        let c = DialectChecker::default();
        assert!(c.supports_with(EngineType::Postgresql, Some("5.0")));
        assert!(c.supports_with(EngineType::H2, Some("1.0")));
    }

    #[test]
    fn compares_dotted_versions() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("20.4", "20.4.0"), Ordering::Equal);
        assert_eq!(compare_versions("3-beta.1", "3.2"), Ordering::Less);
    }
}
