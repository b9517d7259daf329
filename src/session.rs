use std::collections::HashSet;

use chrono::{DateTime, Local};

/// A query remembered for the rest of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQuery {
    pub database: String,
    pub query: String,
    pub saved_at: DateTime<Local>,
}

impl SavedQuery {
    pub fn new(database: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            query: query.into(),
            saved_at: Local::now(),
        }
    }
}

/// Storage for saved queries. `list` collapses entries with the same query
/// text, keeping the first one.
pub trait QueryStore {
    fn append(&mut self, entry: SavedQuery);
    fn list(&self) -> Vec<SavedQuery>;
    fn clear(&mut self);
}

/// In-memory store owned by one running session.
#[derive(Debug, Default)]
pub struct SessionQueries {
    entries: Vec<SavedQuery>,
}

impl SessionQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl QueryStore for SessionQueries {
    fn append(&mut self, entry: SavedQuery) {
        self.entries.push(entry);
    }

    fn list(&self) -> Vec<SavedQuery> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.query.as_str()))
            .cloned()
            .collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_dedups_by_query_text() {
        let mut store = SessionQueries::new();
        store.append(SavedQuery::new("a.db", "SELECT 1"));
        store.append(SavedQuery::new("b.db", "SELECT 2"));
        store.append(SavedQuery::new("b.db", "SELECT 1"));

        let listed = store.list();
        assert_eq!(store.len(), 3);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].database, "a.db");
        assert_eq!(listed[0].query, "SELECT 1");
        assert_eq!(listed[1].query, "SELECT 2");
    }

    #[test]
    fn test_clear() {
        let mut store = SessionQueries::new();
        store.append(SavedQuery::new("a.db", "SELECT 1"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.list().is_empty());
    }
}
