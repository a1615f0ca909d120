use crate::models::Entry;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// The in-memory entry collection, keyed and ordered by calendar date.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    days: BTreeMap<NaiveDate, Entry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new day, or overwrites only the recorded fields of an existing one.
    pub fn upsert(&mut self, entry: Entry) {
        match self.days.get_mut(&entry.date) {
            Some(existing) => existing.absorb(entry),
            None => {
                self.days.insert(entry.date, entry);
            }
        }
    }

    /// Installs `entries` as-is. A repeated date keeps its last occurrence.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = Entry>) {
        self.days = entries
            .into_iter()
            .map(|entry| (entry.date, entry))
            .collect();
    }

    pub fn all(&self) -> Vec<Entry> {
        self.days.values().cloned().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Entry> {
        self.days.values()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Entry> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
