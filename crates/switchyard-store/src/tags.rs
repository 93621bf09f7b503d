//! Tags and bookmarks: thin join rows keyed by session id.

use rusqlite::params;

use crate::database::{ensure_session, SessionStore};
use crate::error::Result;
use crate::models::Bookmark;
use crate::time;

impl SessionStore {
    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Attach a tag. Adding an existing tag is a no-op.
    pub fn add_tag(&self, session_id: &str, tag: &str) -> Result<()> {
        let tag = tag.trim();
        self.with_tx(|tx| {
            ensure_session(tx, session_id)?;
            tx.execute(
                "INSERT OR IGNORE INTO tags (session_id, tag, created_at) VALUES (?1, ?2, ?3)",
                params![session_id, tag, time::to_sql(&time::now())],
            )?;
            Ok(())
        })
    }

    /// Returns whether the tag was present.
    pub fn remove_tag(&self, session_id: &str, tag: &str) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM tags WHERE session_id = ?1 AND tag = ?2",
            params![session_id, tag.trim()],
        )?;
        Ok(affected > 0)
    }

    /// Tags of one session, alphabetical.
    pub fn list_tags(&self, session_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT tag FROM tags WHERE session_id = ?1 ORDER BY tag")?;
        let rows = stmt.query_map([session_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Every tag in use with the number of sessions carrying it.
    pub fn all_tags(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT tag, COUNT(*) FROM tags GROUP BY tag ORDER BY COUNT(*) DESC, tag",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Ids of sessions carrying `tag`, most recently active first.
    pub fn sessions_with_tag(&self, tag: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.id FROM sessions s JOIN tags t ON t.session_id = s.id
             WHERE t.tag = ?1
             ORDER BY s.last_activity_at DESC, s.id",
        )?;
        let rows = stmt.query_map([tag.trim()], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    // ------------------------------------------------------------------
    // Bookmarks
    // ------------------------------------------------------------------

    /// Bookmark a session, replacing any previous note.
    pub fn add_bookmark(&self, session_id: &str, note: Option<&str>) -> Result<()> {
        self.with_tx(|tx| {
            ensure_session(tx, session_id)?;
            tx.execute(
                "INSERT INTO bookmarks (session_id, note, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET note = excluded.note",
                params![session_id, note, time::to_sql(&time::now())],
            )?;
            Ok(())
        })
    }

    pub fn remove_bookmark(&self, session_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM bookmarks WHERE session_id = ?1", [session_id])?;
        Ok(affected > 0)
    }

    /// All bookmarks, newest first.
    pub fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, note, created_at FROM bookmarks ORDER BY created_at DESC, session_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let created: String = row.get(2)?;
            Ok(Bookmark {
                session_id: row.get(0)?,
                note: row.get(1)?,
                created_at: time::from_sql(2, &created)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::NewMessage;

    #[test]
    fn test_tags() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();

        store.add_tag(&id, "physics").unwrap();
        store.add_tag(&id, " physics ").unwrap();
        store.add_tag(&id, "homework").unwrap();
        assert_eq!(store.list_tags(&id).unwrap(), vec!["homework", "physics"]);
        assert_eq!(store.sessions_with_tag("physics").unwrap(), vec![id.clone()]);
        assert_eq!(
            store.all_tags().unwrap(),
            vec![("homework".to_string(), 1), ("physics".to_string(), 1)]
        );

        assert!(store.remove_tag(&id, "physics").unwrap());
        assert!(!store.remove_tag(&id, "physics").unwrap());
        assert_eq!(store.list_tags(&id).unwrap(), vec!["homework"]);
    }

    #[test]
    fn test_tag_unknown_session() {
        let store = SessionStore::open_in_memory().unwrap();
        let err = store.add_tag("ghost", "x").unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[test]
    fn test_bookmarks() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();

        store.add_bookmark(&id, None).unwrap();
        store.add_bookmark(&id, Some("good answer")).unwrap();
        let bookmarks = store.list_bookmarks().unwrap();
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].note.as_deref(), Some("good answer"));

        assert!(store.remove_bookmark(&id).unwrap());
        assert!(store.list_bookmarks().unwrap().is_empty());
    }

    #[test]
    fn test_delete_session_cascades() {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        store.add_message(&id, NewMessage::user("cascade me")).unwrap();
        store
            .add_message(&id, NewMessage::assistant("gone").with_usage(1, 1, 1))
            .unwrap();
        store.add_tag(&id, "t").unwrap();
        store.add_bookmark(&id, Some("n")).unwrap();

        assert!(store.delete_session(&id).unwrap());
        assert!(!store.delete_session(&id).unwrap());

        let conn = store.lock().unwrap();
        for table in ["messages", "tags", "bookmarks", "search_index"] {
            let n: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE session_id = ?1"),
                    [&id],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(n, 0, "{table} still references the session");
        }
    }
}
