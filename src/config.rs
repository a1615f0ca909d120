use crate::errors::HealthError;
use crate::metrics::{ChartRange, GoalPlan, GoalTarget};
use crate::models::parse_calendar_date;
use crate::storage::DEFAULT_CACHE_KEY;
use crate::sync::DEFAULT_PUSH_DELAY;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings the metrics engine needs beyond the entries themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub goals: GoalPlan,
    pub height_m: f64,
    pub calorie_target: f64,
    pub protein_target: f64,
    /// First date shown by the "all" chart range.
    pub all_since: NaiveDate,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            goals: GoalPlan::default(),
            height_m: 1.83,
            calorie_target: 2400.0,
            protein_target: 180.0,
            all_since: NaiveDate::from_ymd_opt(2025, 11, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub cache_key: String,
    pub seed_path: PathBuf,
    pub remote_url: String,
    pub push_delay: Duration,
    pub chart_range: ChartRange,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for
    /// unset variables and rejecting ones that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HealthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MetricsConfig::default();

        let start: f64 = parse_or(&lookup, "GOAL_START_WEIGHT", defaults.goals.start())?;
        let targets = match lookup("GOAL_TARGETS") {
            Some(raw) => raw
                .split(';')
                .flat_map(|chunk| chunk.split(','))
                .filter(|chunk| !chunk.trim().is_empty())
                .map(|chunk| {
                    chunk
                        .trim()
                        .parse::<f64>()
                        .map(GoalTarget::kg)
                        .map_err(|err| invalid("GOAL_TARGETS", chunk, err))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.goals.targets().to_vec(),
        };
        let goals = GoalPlan::new(start, targets)?;

        let height_m: f64 = parse_or(&lookup, "HEIGHT_M", defaults.height_m)?;
        if !(height_m.is_finite() && height_m > 0.0) {
            return Err(HealthError::InvalidConfig(format!(
                "HEIGHT_M must be positive, got {height_m}"
            )));
        }

        let all_since = match lookup("CHART_ALL_SINCE") {
            Some(raw) => {
                parse_calendar_date(&raw).map_err(|err| invalid("CHART_ALL_SINCE", &raw, err))?
            }
            None => defaults.all_since,
        };

        let metrics = MetricsConfig {
            goals,
            height_m,
            calorie_target: parse_or(&lookup, "CALORIE_TARGET", defaults.calorie_target)?,
            protein_target: parse_or(&lookup, "PROTEIN_TARGET", defaults.protein_target)?,
            all_since,
        };

        let chart_range = match lookup("CHART_RANGE") {
            Some(raw) => raw
                .parse()
                .map_err(|err| invalid("CHART_RANGE", &raw, err))?,
            None => ChartRange::default(),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8080)?,
            data_dir: lookup("APP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            cache_key: lookup("APP_CACHE_KEY").unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string()),
            seed_path: lookup("SEED_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data.json")),
            remote_url: lookup("REMOTE_URL").unwrap_or_else(|| "http://127.0.0.1:5000".to_string()),
            push_delay: Duration::from_millis(parse_or(
                &lookup,
                "PUSH_DEBOUNCE_MS",
                DEFAULT_PUSH_DELAY.as_millis() as u64,
            )?),
            chart_range,
            metrics,
        })
    }
}

/// Settings for the `healthos-store` binary.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub seed_path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HealthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: parse_or(&lookup, "PORT", 5000)?,
            data_dir: lookup("STORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            seed_path: lookup("STORE_SEED_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data.json")),
        })
    }
}

fn invalid(key: &str, raw: &str, err: impl std::fmt::Display) -> HealthError {
    HealthError::InvalidConfig(format!("{key}={raw:?}: {err}"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, HealthError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|err| invalid(key, &raw, err)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_key, "healthos_data_v2");
        assert_eq!(config.push_delay, Duration::from_millis(2000));
        assert_eq!(config.chart_range, ChartRange::Last(30));
        assert_eq!(config.metrics, MetricsConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("GOAL_START_WEIGHT", "120"),
            ("GOAL_TARGETS", "110, 100"),
            ("HEIGHT_M", "1.75"),
            ("CHART_ALL_SINCE", "2026-01-01"),
            ("CHART_RANGE", "all"),
            ("PUSH_DEBOUNCE_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.metrics.goals.start(), 120.0);
        assert_eq!(config.metrics.goals.targets()[1], GoalTarget::kg(100.0));
        assert_eq!(config.metrics.height_m, 1.75);
        assert_eq!(config.metrics.all_since, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(config.chart_range, ChartRange::All);
        assert_eq!(config.push_delay, Duration::from_millis(250));
    }

    #[test]
    fn goal_equal_to_start_or_junk_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("GOAL_START_WEIGHT", "100"),
            ("GOAL_TARGETS", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, HealthError::InvalidConfig(_)));

        assert!(AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("HEIGHT_M", "0")])).is_err());
    }

    #[test]
    fn store_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[("STORE_DATA_DIR", "/tmp/x")])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/x"));
    }
}
