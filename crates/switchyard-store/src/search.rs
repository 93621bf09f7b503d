//! Full-text search over message content and session titles.

use rusqlite::params;

use crate::database::SessionStore;
use crate::error::Result;
use crate::models::SearchHit;

/// Turn free text into an FTS5 query: every whitespace token becomes a quoted
/// string and all tokens must match. Returns `None` when nothing is left.
pub fn to_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|token| token.replace('"', ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

impl SessionStore {
    /// Sessions matching `query`, best first.
    ///
    /// A session matches when any of its messages or its title matches. Its
    /// rank is the best (lowest) bm25 rank among its rows; ties are broken by
    /// session id so the order is stable for a given index state.
    pub fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let Some(match_query) = to_match_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, MIN(score) AS best
             FROM (SELECT session_id, rank AS score
                   FROM search_index
                   WHERE search_index MATCH ?1)
             GROUP BY session_id
             ORDER BY best, session_id
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![match_query, limit], |row| {
            Ok(SearchHit {
                session_id: row.get(0)?,
                rank: row.get(1)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        tracing::debug!(query, hits = hits.len(), "search finished");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;

    fn seeded() -> (SessionStore, Vec<String>) {
        let store = SessionStore::open_in_memory().unwrap();
        let ids = ["flask api design", "binary tree rotations", "flask middleware"]
            .iter()
            .map(|prompt| {
                let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();
                store.add_message(&id, NewMessage::user(*prompt)).unwrap();
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_match_query() {
        assert_eq!(to_match_query("  "), None);
        assert_eq!(to_match_query("flask"), Some("\"flask\"".to_string()));
        assert_eq!(
            to_match_query("say \"hi\" AND"),
            Some("\"say\" \"hi\" \"AND\"".to_string())
        );
    }

    #[test]
    fn test_search_finds_exactly_matching_sessions() {
        let (store, ids) = seeded();

        let hits = store.search("flask", 10).unwrap();
        let mut found: Vec<_> = hits.iter().map(|h| h.session_id.clone()).collect();
        found.sort();
        let mut expected = vec![ids[0].clone(), ids[2].clone()];
        expected.sort();
        assert_eq!(found, expected);

        // Stable for a given index state.
        assert_eq!(store.search("flask", 10).unwrap(), hits);
    }

    #[test]
    fn test_search_is_stemmed_and_case_insensitive() {
        let (store, ids) = seeded();
        let hits = store.search("ROTATION", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, ids[1]);
    }

    #[test]
    fn test_search_without_matches_or_terms() {
        let (store, _) = seeded();
        assert!(store.search("quantum", 10).unwrap().is_empty());
        assert!(store.search("", 10).unwrap().is_empty());
        assert!(store.search("\"", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_leaves_no_stale_hits() {
        let (store, ids) = seeded();
        assert!(store.delete_session(&ids[0]).unwrap());

        let hits = store.search("flask", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, ids[2]);
    }

    #[test]
    fn test_search_unicode() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        store
            .add_message(&id, NewMessage::user("Über die Straße"))
            .unwrap();
        assert_eq!(store.search("über", 10).unwrap().len(), 1);
    }
}
