use crate::config::MetricsConfig;
use crate::errors::HealthError;
use crate::models::{
    Dashboard, Entry, GoalProgress, MacroAverage, Reading, SeriesPoint, TrendDirection,
    TrendSeries, WeightSummary,
};
use crate::sync::SyncState;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MACRO_WINDOW: usize = 7;
pub const HISTORY_LIMIT: usize = 20;

/// How much of the weight history the trend chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartRange {
    /// The most recent `n` weigh-ins.
    Last(usize),
    /// Everything from the configured cutoff date on.
    All,
}

impl Default for ChartRange {
    fn default() -> Self {
        Self::Last(30)
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last(count) => write!(f, "{count}"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for ChartRange {
    type Err = HealthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match raw.parse::<usize>() {
            Ok(count) if count > 0 => Ok(Self::Last(count)),
            _ => Err(HealthError::InvalidNumericInput(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalTarget {
    pub label: String,
    pub value: f64,
}

impl GoalTarget {
    pub fn kg(value: f64) -> Self {
        Self {
            label: format!("{value}kg"),
            value,
        }
    }
}

/// A start weight and the targets measured against it. Only constructible
/// when every target differs from the start.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalPlan {
    start: f64,
    targets: Vec<GoalTarget>,
}

impl Default for GoalPlan {
    fn default() -> Self {
        Self {
            start: 112.0,
            targets: vec![GoalTarget::kg(100.0), GoalTarget::kg(95.0)],
        }
    }
}

impl GoalPlan {
    pub fn new(start: f64, targets: Vec<GoalTarget>) -> Result<Self, HealthError> {
        if !start.is_finite() {
            return Err(HealthError::InvalidConfig(format!("goal start {start} is not finite")));
        }
        if targets.is_empty() {
            return Err(HealthError::InvalidConfig("at least one goal target is required".into()));
        }
        for target in &targets {
            if !target.value.is_finite() || target.value == start {
                return Err(HealthError::InvalidConfig(format!(
                    "goal target {} must be finite and differ from the start value {start}",
                    target.value
                )));
            }
        }
        Ok(Self { start, targets })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn targets(&self) -> &[GoalTarget] {
        &self.targets
    }

    pub fn progress(&self, current: f64) -> Vec<GoalProgress> {
        self.targets
            .iter()
            .map(|target| {
                let remaining = (current - target.value).max(0.0);
                GoalProgress {
                    label: target.label.clone(),
                    target: target.value,
                    percent: percent(self.start, target.value, current),
                    remaining,
                    reached: remaining == 0.0,
                }
            })
            .collect()
    }
}

/// Share of the way from `start` to `target`, as a percentage in `[0, 100]`.
/// Callers guarantee `start != target`.
fn percent(start: f64, target: f64, current: f64) -> f64 {
    ((start - current) / (start - target)).clamp(0.0, 1.0) * 100.0
}

pub fn short_label(date: NaiveDate) -> String {
    date.format("%-d %b").to_string()
}

pub fn bmi(weight_kg: f64, height_m: f64) -> f64 {
    weight_kg / (height_m * height_m)
}

fn ascending_with<F>(entries: &[Entry], field: F) -> Vec<(NaiveDate, f64)>
where
    F: Fn(&Entry) -> Option<f64>,
{
    let mut points: Vec<_> = entries
        .iter()
        .filter_map(|entry| field(entry).map(|value| (entry.date, value)))
        .collect();
    points.sort_by_key(|(date, _)| *date);
    points
}

pub fn weight_summary(entries: &[Entry]) -> Option<WeightSummary> {
    let weights = ascending_with(entries, |e| e.weight);
    let (latest_date, latest) = *weights.last()?;
    let previous = weights
        .len()
        .checked_sub(2)
        .map(|index| weights[index]);
    let delta = previous.map(|(_, value)| latest - value);

    Some(WeightSummary {
        latest: Reading {
            date: latest_date,
            value: latest,
        },
        previous: previous.map(|(date, value)| Reading { date, value }),
        delta,
        direction: delta.map(|delta| {
            if delta <= 0.0 {
                TrendDirection::Favorable
            } else {
                TrendDirection::Unfavorable
            }
        }),
    })
}

pub fn latest_waist(entries: &[Entry]) -> Option<Reading> {
    ascending_with(entries, |e| e.waist_cm)
        .last()
        .map(|&(date, value)| Reading { date, value })
}

/// Means over the last [`MACRO_WINDOW`] days that logged any macro.
///
/// Both means share one denominator, the number of qualifying days; a day
/// missing one of the two fields adds zero to that field's sum.
pub fn macro_average(
    entries: &[Entry],
    calorie_target: f64,
    protein_target: f64,
) -> Option<MacroAverage> {
    let mut logs: Vec<&Entry> = entries.iter().filter(|e| e.has_macros()).collect();
    logs.sort_by(|a, b| b.date.cmp(&a.date));
    logs.truncate(MACRO_WINDOW);
    if logs.is_empty() {
        return None;
    }

    let days = logs.len();
    let total_calories: f64 = logs.iter().map(|e| e.calories.unwrap_or(0.0)).sum();
    let total_protein: f64 = logs.iter().map(|e| e.protein_g.unwrap_or(0.0)).sum();

    Some(MacroAverage {
        days,
        avg_calories: total_calories / days as f64,
        avg_protein_g: total_protein / days as f64,
        days_within_calories: logs
            .iter()
            .filter(|e| e.calories.is_some_and(|c| c <= calorie_target))
            .count(),
        days_meeting_protein: logs
            .iter()
            .filter(|e| e.protein_g.is_some_and(|p| p >= protein_target))
            .count(),
    })
}

fn window(
    points: Vec<(NaiveDate, f64)>,
    range: ChartRange,
    all_since: NaiveDate,
) -> Vec<(NaiveDate, f64)> {
    match range {
        ChartRange::Last(count) => {
            let skip = points.len().saturating_sub(count);
            points.into_iter().skip(skip).collect()
        }
        ChartRange::All => points.into_iter().filter(|(date, _)| *date >= all_since).collect(),
    }
}

/// Weight readings for `range`, with waist values placed on the same dates.
pub fn trend_series(entries: &[Entry], range: ChartRange, all_since: NaiveDate) -> TrendSeries {
    let weights = window(ascending_with(entries, |e| e.weight), range, all_since);
    let waist_by_date: BTreeMap<NaiveDate, f64> =
        window(ascending_with(entries, |e| e.waist_cm), range, all_since)
            .into_iter()
            .collect();

    let mut series = TrendSeries::default();
    for (date, weight) in weights {
        series.dates.push(date);
        series.labels.push(short_label(date));
        series.weight.push(weight);
        series.waist.push(waist_by_date.get(&date).copied());
    }
    series
}

pub fn waist_series(entries: &[Entry], since: NaiveDate) -> Vec<SeriesPoint> {
    ascending_with(entries, |e| e.waist_cm)
        .into_iter()
        .filter(|(date, _)| *date >= since)
        .map(|(date, value)| SeriesPoint {
            date,
            label: short_label(date),
            value,
        })
        .collect()
}

/// Newest first, skipping days with nothing measured.
pub fn history(entries: &[Entry], limit: usize) -> Vec<Entry> {
    let mut rows: Vec<Entry> = entries.iter().filter(|e| e.has_measurement()).cloned().collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.truncate(limit);
    rows
}

pub fn build_dashboard(
    entries: &[Entry],
    config: &MetricsConfig,
    range: ChartRange,
    sync: SyncState,
) -> Dashboard {
    let weight = weight_summary(entries);
    let current = weight.as_ref().map(|summary| summary.latest.value);

    Dashboard {
        entry_count: entries.len(),
        bmi: current.map(|value| bmi(value, config.height_m)),
        goals: current
            .map(|value| config.goals.progress(value))
            .unwrap_or_default(),
        weight,
        waist: latest_waist(entries),
        macros: macro_average(entries, config.calorie_target, config.protein_target),
        range: range.to_string(),
        trend: trend_series(entries, range, config.all_since),
        waist_series: waist_series(entries, config.all_since),
        history: history(entries, HISTORY_LIMIT),
        sync,
    }
}
