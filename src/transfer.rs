use crate::errors::HealthError;
use crate::models::Entry;
use chrono::NaiveDate;
use serde_json::Value;

/// A downloadable backup of the whole collection.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub file_name: String,
    pub body: String,
}

pub fn export_document(entries: &[Entry], today: NaiveDate) -> Result<ExportDocument, HealthError> {
    let body = serde_json::to_string_pretty(entries).map_err(|err| HealthError::Io(err.into()))?;
    Ok(ExportDocument {
        file_name: format!("healthos_backup_{}.json", today.format("%Y-%m-%d")),
        body,
    })
}

/// Accepts a document only if it is a JSON array of entries.
pub fn parse_import(document: &str) -> Result<Vec<Entry>, HealthError> {
    let value: Value = serde_json::from_str(document)
        .map_err(|err| HealthError::MalformedImport(format!("invalid JSON: {err}")))?;
    if !value.is_array() {
        return Err(HealthError::MalformedImport("expected a JSON array".into()));
    }
    serde_json::from_value(value).map_err(|err| HealthError::MalformedImport(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn export_then_import_reproduces_the_collection() {
        let entries = vec![
            Entry {
                weight: Some(101.3),
                waist_cm: Some(98.0),
                ..Entry::new(NaiveDate::from_ymd_opt(2025, 11, 2).unwrap())
            },
            Entry {
                calories: Some(2250.0),
                protein_g: Some(176.0),
                ..Entry::daily_log(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap())
            },
        ];
        let today = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();

        let document = export_document(&entries, today).unwrap();
        assert_eq!(document.file_name, "healthos_backup_2025-11-03.json");
        assert!(document.body.contains("\n  "));

        let imported = parse_import(&document.body).unwrap();
        let by_date = |list: Vec<Entry>| -> BTreeMap<NaiveDate, Entry> {
            list.into_iter().map(|e| (e.date, e)).collect()
        };
        assert_eq!(by_date(imported), by_date(entries));
    }

    #[test]
    fn non_array_or_broken_documents_are_rejected() {
        for document in ["{\"date\":\"2025-11-01\"}", "not json", "[{\"weight\":90}]"] {
            let err = parse_import(document).unwrap_err();
            assert!(matches!(err, HealthError::MalformedImport(_)), "{document}");
        }
        assert!(parse_import("[]").unwrap().is_empty());
    }

    #[test]
    fn one_undated_record_rejects_the_whole_document() {
        let document = r#"[{"date":"2025-11-01","weight":90},{"date":"someday","weight":89}]"#;
        let err = parse_import(document).unwrap_err();
        assert!(matches!(err, HealthError::MalformedImport(_)));
    }
}
