use crate::errors::HealthError;
use crate::sync::SyncState;
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const DAILY_LOG_TAG: &str = "daily_log";

/// One calendar day of measurements. Absent fields were not recorded that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "positive", skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "positive", skip_serializing_if = "Option::is_none")]
    pub waist_cm: Option<f64>,
    #[serde(default, deserialize_with = "non_negative", skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "non_negative", skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Fields the dashboard does not interpret (notes, hips_cm, ...), kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Entry {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weight: None,
            waist_cm: None,
            calories: None,
            protein_g: None,
            kind: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn daily_log(date: NaiveDate) -> Self {
        Self {
            kind: Some(DAILY_LOG_TAG.to_string()),
            ..Self::new(date)
        }
    }

    pub fn has_measurement(&self) -> bool {
        self.weight.is_some()
            || self.waist_cm.is_some()
            || self.calories.is_some()
            || self.protein_g.is_some()
    }

    pub fn has_macros(&self) -> bool {
        self.calories.is_some() || self.protein_g.is_some()
    }

    /// Overwrites only the fields `incoming` actually carries.
    pub fn absorb(&mut self, incoming: Entry) {
        if incoming.weight.is_some() {
            self.weight = incoming.weight;
        }
        if incoming.waist_cm.is_some() {
            self.waist_cm = incoming.waist_cm;
        }
        if incoming.calories.is_some() {
            self.calories = incoming.calories;
        }
        if incoming.protein_g.is_some() {
            self.protein_g = incoming.protein_g;
        }
        if incoming.kind.is_some() {
            self.kind = incoming.kind;
        }
        for (key, value) in incoming.extra {
            if !value.is_null() {
                self.extra.insert(key, value);
            }
        }
    }
}

/// Parses a user or file supplied number, tolerating thousands separators.
pub fn parse_number(raw: &str) -> Result<f64, HealthError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(HealthError::InvalidNumericInput(raw.to_string())),
    }
}

/// Normalizes an untyped JSON value to a finite number, or `None`.
pub fn clean_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(raw) => match parse_number(raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!("dropping field: {err}");
                None
            }
        },
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, dropping any time-of-day suffix.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let day = raw.trim().split(['T', ' ']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
}

fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).map_err(|err| de::Error::custom(format!("bad date {raw:?}: {err}")))
}

fn positive<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(clean_number).filter(|v| *v > 0.0))
}

fn non_negative<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(clean_number).filter(|v| *v >= 0.0))
}

/// JSON body for `POST /api/log`; numbers may arrive as numbers or strings.
#[derive(Debug, Default, Deserialize)]
pub struct LogRequest {
    pub weight: Option<Value>,
    pub waist_cm: Option<Value>,
    pub calories: Option<Value>,
    pub protein_g: Option<Value>,
}

impl LogRequest {
    pub fn into_entry(self, date: NaiveDate) -> Entry {
        let field = |value: Option<Value>| value.as_ref().and_then(clean_number);
        Entry {
            weight: field(self.weight).filter(|v| *v > 0.0),
            waist_cm: field(self.waist_cm).filter(|v| *v > 0.0),
            calories: field(self.calories).filter(|v| *v >= 0.0),
            protein_g: field(self.protein_g).filter(|v| *v >= 0.0),
            ..Entry::daily_log(date)
        }
    }
}

/// Form body for `POST /log`; blank inputs are simply not recorded.
#[derive(Debug, Default, Deserialize)]
pub struct LogForm {
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub waist_cm: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub protein_g: String,
}

impl LogForm {
    pub fn into_entry(self, date: NaiveDate) -> Entry {
        let field = |raw: &str| {
            if raw.trim().is_empty() {
                None
            } else {
                parse_number(raw).ok()
            }
        };
        Entry {
            weight: field(&self.weight).filter(|v| *v > 0.0),
            waist_cm: field(&self.waist_cm).filter(|v| *v > 0.0),
            calories: field(&self.calories).filter(|v| *v >= 0.0),
            protein_g: field(&self.protein_g).filter(|v| *v >= 0.0),
            ..Entry::daily_log(date)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Favorable,
    Unfavorable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightSummary {
    pub latest: Reading,
    pub previous: Option<Reading>,
    pub delta: Option<f64>,
    pub direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub label: String,
    pub target: f64,
    pub percent: f64,
    pub remaining: f64,
    pub reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroAverage {
    pub days: usize,
    pub avg_calories: f64,
    pub avg_protein_g: f64,
    pub days_within_calories: usize,
    pub days_meeting_protein: usize,
}

/// Weight dates with waist values aligned onto them; `None` marks a gap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub dates: Vec<NaiveDate>,
    pub labels: Vec<String>,
    pub weight: Vec<f64>,
    pub waist: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub entry_count: usize,
    pub weight: Option<WeightSummary>,
    pub waist: Option<Reading>,
    pub bmi: Option<f64>,
    pub goals: Vec<GoalProgress>,
    pub macros: Option<MacroAverage>,
    pub range: String,
    pub trend: TrendSeries,
    pub waist_series: Vec<SeriesPoint>,
    pub history: Vec<Entry>,
    pub sync: SyncState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_with_thousands_separators_are_normalized() {
        assert_eq!(parse_number("2,150").unwrap(), 2150.0);
        assert_eq!(parse_number(" 81.4 ").unwrap(), 81.4);
        assert!(parse_number("abc").is_err());
        assert!(parse_number("NaN").is_err());
        assert_eq!(clean_number(&json!("1,234.5")), Some(1234.5));
        assert_eq!(clean_number(&json!(true)), None);
    }

    #[test]
    fn entry_ingestion_drops_garbage_and_time_of_day() {
        let entry: Entry = serde_json::from_value(json!({
            "date": "2025-10-01T08:30:00Z",
            "weight": "104.2",
            "waist_cm": "n/a",
            "calories": "2,150",
            "protein_g": null,
            "type": "daily_log",
            "notes": "after run"
        }))
        .unwrap();

        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(entry.weight, Some(104.2));
        assert_eq!(entry.waist_cm, None);
        assert_eq!(entry.calories, Some(2150.0));
        assert_eq!(entry.protein_g, None);
        assert_eq!(entry.kind.as_deref(), Some("daily_log"));
        assert_eq!(entry.extra.get("notes"), Some(&json!("after run")));
    }

    #[test]
    fn zero_calories_is_recorded_but_zero_weight_is_not() {
        let entry: Entry =
            serde_json::from_value(json!({ "date": "2025-10-02", "weight": 0, "calories": 0 }))
                .unwrap();
        assert_eq!(entry.weight, None);
        assert_eq!(entry.calories, Some(0.0));
    }

    #[test]
    fn serialized_entry_omits_unrecorded_fields() {
        let mut entry = Entry::new(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        entry.weight = Some(105.0);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({ "date": "2025-10-01", "weight": 105.0 }));
    }

    #[test]
    fn log_form_ignores_blank_and_invalid_inputs() {
        let form = LogForm {
            weight: "98.6".into(),
            waist_cm: "".into(),
            calories: "two thousand".into(),
            protein_g: "1,80".into(),
        };
        let entry = form.into_entry(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert_eq!(entry.weight, Some(98.6));
        assert_eq!(entry.waist_cm, None);
        assert_eq!(entry.calories, None);
        assert_eq!(entry.protein_g, Some(180.0));
        assert_eq!(entry.kind.as_deref(), Some(DAILY_LOG_TAG));
    }
}
