//! Session lifecycle: create, read, list, retitle, delete.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use unicode_segmentation::UnicodeSegmentation;

use crate::database::SessionStore;
use crate::error::{Result, StoreError};
use crate::models::{Session, SessionSummary};
use crate::time;

/// Titles derived from a prompt keep this many grapheme clusters.
pub const TITLE_MAX_GLYPHS: usize = 60;

const PREVIEW_MAX_GLYPHS: usize = 100;

pub(crate) const SESSION_COLUMNS: &str = "id, model_id, model_display_name, title, created_at, \
     updated_at, last_activity_at, message_count, total_input_tokens, total_output_tokens, \
     total_duration_ms";

/// A random v4 UUID, URL-safe.
pub(crate) fn new_session_id() -> String {
    URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes())
}

/// Title derived from a prompt: the trimmed text, truncated to
/// [`TITLE_MAX_GLYPHS`] glyphs with `...` appended when longer.
pub fn derive_title(prompt: &str) -> String {
    truncate_graphemes(prompt.trim(), TITLE_MAX_GLYPHS)
}

/// Cut on grapheme boundaries so flags and ZWJ emoji stay whole.
pub(crate) fn truncate_graphemes(text: &str, max: usize) -> String {
    match text.grapheme_indices(true).nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl SessionStore {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create an empty session and return its id.
    pub fn create_session(
        &self,
        model_id: &str,
        model_display_name: &str,
        title: Option<&str>,
    ) -> Result<String> {
        let id = new_session_id();
        let now = time::now();
        let title = title.map(str::trim).unwrap_or_default();

        self.with_tx(|tx| {
            insert_session(tx, &id, model_id, model_display_name, title, &now)?;
            Ok(())
        })?;

        tracing::debug!(session = %id, model = model_id, "created session");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        let conn = self.lock()?;
        fetch_session(&conn, session_id)
    }

    /// Page through sessions, most recently active first.
    pub fn list_sessions(
        &self,
        limit: u32,
        offset: u32,
        model_filter: Option<&str>,
    ) -> Result<Vec<SessionSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS},
                (SELECT content FROM messages m
                  WHERE m.session_id = s.id AND m.role = 'user'
                  ORDER BY m.sequence_number LIMIT 1),
                (SELECT content FROM messages m
                  WHERE m.session_id = s.id
                  ORDER BY m.sequence_number DESC LIMIT 1)
             FROM sessions s
             WHERE (?1 IS NULL OR s.model_id = ?1)
             ORDER BY s.last_activity_at DESC, s.id
             LIMIT ?2 OFFSET ?3"
        ))?;

        let rows = stmt.query_map(params![model_filter, limit, offset], |row| {
            let first: Option<String> = row.get(11)?;
            let last: Option<String> = row.get(12)?;
            Ok(SessionSummary {
                session: row_to_session(row)?,
                first_prompt: first.map(|p| truncate_graphemes(p.trim(), PREVIEW_MAX_GLYPHS)),
                last_message: last.map(|p| truncate_graphemes(p.trim(), PREVIEW_MAX_GLYPHS)),
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Total number of sessions.
    pub fn count_sessions(&self) -> Result<u64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a session's title and its entry in the search index.
    pub fn set_title(&self, session_id: &str, title: &str) -> Result<()> {
        self.with_tx(|tx| {
            crate::database::ensure_session(tx, session_id)?;
            write_title(tx, session_id, title.trim(), &time::now())
        })
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a session with its messages, tags, bookmark and index entries.
    /// Returns whether anything was deleted.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self.with_tx(|tx| delete_session_rows(tx, session_id))?;
        if deleted {
            tracing::info!(session = session_id, "deleted session");
        }
        Ok(deleted)
    }

    /// Delete every session whose last activity is before `cutoff`.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = time::to_sql(&cutoff);
        let count = self.with_tx(|tx| {
            let ids = {
                let mut stmt = tx.prepare("SELECT id FROM sessions WHERE last_activity_at < ?1")?;
                let rows = stmt.query_map([&cutoff], |row| row.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            for id in &ids {
                delete_session_rows(tx, id)?;
            }
            Ok(ids.len())
        })?;

        tracing::info!(deleted = count, "pruned old sessions");
        Ok(count)
    }
}

pub(crate) fn insert_session(
    conn: &Connection,
    id: &str,
    model_id: &str,
    model_display_name: &str,
    title: &str,
    created_at: &DateTime<Utc>,
) -> Result<()> {
    let ts = time::to_sql(created_at);
    conn.execute(
        "INSERT INTO sessions (id, model_id, model_display_name, title, created_at,
                               updated_at, last_activity_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)",
        params![id, model_id, model_display_name, title, ts],
    )?;
    if !title.is_empty() {
        index_title(conn, id, title)?;
    }
    Ok(())
}

pub(crate) fn fetch_session(conn: &Connection, session_id: &str) -> Result<Session> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
        [session_id],
        row_to_session,
    )
    .optional()?
    .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
}

pub(crate) fn write_title(
    conn: &Connection,
    session_id: &str,
    title: &str,
    now: &DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET title = ?2, updated_at = ?3 WHERE id = ?1",
        params![session_id, title, time::to_sql(now)],
    )?;
    conn.execute(
        "DELETE FROM search_index WHERE session_id = ?1 AND source = 'title'",
        [session_id],
    )?;
    if !title.is_empty() {
        index_title(conn, session_id, title)?;
    }
    Ok(())
}

fn index_title(conn: &Connection, session_id: &str, title: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO search_index (session_id, source, body) VALUES (?1, 'title', ?2)",
        params![session_id, title],
    )?;
    Ok(())
}

fn delete_session_rows(conn: &Connection, session_id: &str) -> Result<bool> {
    // The index is not covered by foreign keys.
    conn.execute("DELETE FROM search_index WHERE session_id = ?1", [session_id])?;
    let affected = conn.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
    Ok(affected > 0)
}

pub(crate) fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let created: String = row.get(4)?;
    let updated: String = row.get(5)?;
    let activity: String = row.get(6)?;

    Ok(Session {
        id: row.get(0)?,
        model_id: row.get(1)?,
        model_display_name: row.get(2)?,
        title: row.get(3)?,
        created_at: time::from_sql(4, &created)?,
        updated_at: time::from_sql(5, &updated)?,
        last_activity_at: time::from_sql(6, &activity)?,
        message_count: row.get(7)?,
        total_input_tokens: row.get(8)?,
        total_output_tokens: row.get(9)?,
        total_duration_ms: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;

    fn store() -> SessionStore {
        SessionStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_session_ids_are_url_safe_and_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 22);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("  Explain entropy \n"), "Explain entropy");

        let exactly_sixty = "x".repeat(60);
        assert_eq!(derive_title(&exactly_sixty), exactly_sixty);

        let long = "é".repeat(61);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "é".repeat(60)));
    }

    #[test]
    fn test_derive_title_keeps_grapheme_clusters_whole() {
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        let flag = "\u{1F1EF}\u{1F1F5}";
        let prompt = format!("{}{flag}{family} trailing", "x".repeat(58));

        let title = derive_title(&prompt);
        assert_eq!(title, format!("{}{flag}{family}...", "x".repeat(58)));
    }

    #[test]
    fn test_get_unknown_session() {
        let err = store().get_session("nope").unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
        assert_eq!(err.kind(), switchyard_catalog::ErrorKind::NotFound);
    }

    #[test]
    fn test_list_sessions_orders_by_activity_and_filters() {
        let store = store();
        let old = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        let new = store.create_session("qwq-32b", "QwQ", None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.add_message(&old, NewMessage::user("first question")).unwrap();
        store
            .add_message(&old, NewMessage::assistant("an answer").with_usage(2, 2, 10))
            .unwrap();

        let all = store.list_sessions(10, 0, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session.id, old);
        assert_eq!(all[0].first_prompt.as_deref(), Some("first question"));
        assert_eq!(all[0].last_message.as_deref(), Some("an answer"));
        assert_eq!(all[1].session.id, new);
        assert_eq!(all[1].first_prompt, None);

        let filtered = store.list_sessions(10, 0, Some("qwq-32b")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].session.id, new);

        let page = store.list_sessions(1, 1, None).unwrap();
        assert_eq!(page[0].session.id, new);
    }

    #[test]
    fn test_delete_older_than() {
        let store = store();
        let a = store.create_session("phi4-14b", "Phi-4", Some("a")).unwrap();
        let b = store.create_session("phi4-14b", "Phi-4", Some("b")).unwrap();
        store.add_message(&b, NewMessage::user("old question")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let cutoff = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let c = store.create_session("phi4-14b", "Phi-4", Some("c")).unwrap();

        assert_eq!(store.delete_older_than(cutoff).unwrap(), 2);
        assert!(store.get_session(&a).is_err());
        assert!(store.get_session(&b).is_err());
        assert!(store.get_session(&c).is_ok());
        assert!(store.search("old", 10).unwrap().is_empty());
    }

    #[test]
    fn test_set_title_replaces_index_entry() {
        let store = store();
        let id = store.create_session("phi4-14b", "Phi-4", Some("volcano notes")).unwrap();
        store.set_title(&id, "glacier notes").unwrap();

        assert_eq!(store.get_session(&id).unwrap().title, "glacier notes");
        assert!(store.search("volcano", 10).unwrap().is_empty());
        assert_eq!(store.search("glacier", 10).unwrap().len(), 1);
    }
}
