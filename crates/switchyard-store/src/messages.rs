//! Appending and reading messages.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::database::{ensure_session, SessionStore};
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageRef, Metadata, NewMessage, Role};
use crate::sessions::{derive_title, write_title};
use crate::time;

impl SessionStore {
    /// Append a message to a session.
    ///
    /// In one transaction: assigns the next sequence number, updates the
    /// session aggregates and activity time, indexes the content, and derives
    /// the title from the session's first user message when it has none.
    pub fn add_message(&self, session_id: &str, message: NewMessage) -> Result<MessageRef> {
        let now = time::now();
        let appended = self.with_tx(|tx| append_message(tx, session_id, &message, &now))?;

        tracing::debug!(
            session = session_id,
            seq = appended.sequence_number,
            role = %message.role,
            "appended message"
        );
        Ok(appended)
    }

    /// All messages of a session in sequence order.
    pub fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        ensure_session(&conn, session_id)?;
        load_messages(&conn, session_id)
    }
}

pub(crate) fn append_message(
    conn: &Connection,
    session_id: &str,
    message: &NewMessage,
    created_at: &DateTime<Utc>,
) -> Result<MessageRef> {
    let (count, title): (u64, String) = conn
        .query_row(
            "SELECT message_count, title FROM sessions WHERE id = ?1",
            [session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::SessionNotFound(session_id.to_string())
            }
            other => StoreError::Sqlite(other),
        })?;

    // Only the session's first user message may name it.
    let first_user = message.role == Role::User
        && title.is_empty()
        && conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1 AND role = 'user'",
            [session_id],
            |row| row.get::<_, u64>(0),
        )? == 0;

    let sequence_number = count + 1;
    let ts = time::to_sql(created_at);
    let metadata = serde_json::to_string(&message.metadata)?;

    conn.execute(
        "INSERT INTO messages (session_id, sequence_number, role, content, created_at,
                               token_count, input_tokens, output_tokens, duration_ms, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session_id,
            sequence_number,
            message.role.as_str(),
            message.content,
            ts,
            message.token_count,
            message.input_tokens,
            message.output_tokens,
            message.duration_ms,
            metadata,
        ],
    )?;
    let id = conn.last_insert_rowid();

    conn.execute(
        "UPDATE sessions SET
             message_count       = message_count + 1,
             total_input_tokens  = total_input_tokens + ?2,
             total_output_tokens = total_output_tokens + ?3,
             total_duration_ms   = total_duration_ms + ?4,
             updated_at          = ?5,
             last_activity_at    = MAX(last_activity_at, ?5)
         WHERE id = ?1",
        params![
            session_id,
            message.input_tokens.unwrap_or(0),
            message.output_tokens.unwrap_or(0),
            message.duration_ms.unwrap_or(0),
            ts,
        ],
    )?;

    conn.execute(
        "INSERT INTO search_index (session_id, source, body) VALUES (?1, 'message', ?2)",
        params![session_id, message.content],
    )?;

    if first_user {
        let derived = derive_title(&message.content);
        if !derived.is_empty() {
            write_title(conn, session_id, &derived, created_at)?;
        }
    }

    Ok(MessageRef {
        id,
        sequence_number,
    })
}

pub(crate) fn load_messages(conn: &Connection, session_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, sequence_number, role, content, created_at,
                token_count, input_tokens, output_tokens, duration_ms, metadata
         FROM messages
         WHERE session_id = ?1
         ORDER BY sequence_number",
    )?;

    let rows = stmt.query_map([session_id], row_to_message)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    let created: String = row.get(5)?;
    let metadata: String = row.get(10)?;

    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let metadata: Metadata = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sequence_number: row.get(2)?,
        role,
        content: row.get(4)?,
        created_at: time::from_sql(5, &created)?,
        token_count: row.get(6)?,
        input_tokens: row.get(7)?,
        output_tokens: row.get(8)?,
        duration_ms: row.get(9)?,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> SessionStore {
        SessionStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_append_retrieve() {
        let store = store();
        let id = store.create_session("phi4-14b", "Phi-4 14B", None).unwrap();

        let first = store
            .add_message(&id, NewMessage::user("Explain entropy").with_token_count(3))
            .unwrap();
        let second = store
            .add_message(
                &id,
                NewMessage::assistant("Entropy is...").with_usage(3, 10, 1200),
            )
            .unwrap();
        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);

        let session = store.get_session(&id).unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.total_input_tokens, 3);
        assert_eq!(session.total_output_tokens, 10);
        assert_eq!(session.total_duration_ms, 1200);
        assert_eq!(session.title, "Explain entropy");
        assert_eq!(session.model_display_name, "Phi-4 14B");

        let messages = store.get_messages(&id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].token_count, Some(3));
        assert_eq!(messages[0].input_tokens, None);
        assert_eq!(messages[1].content, "Entropy is...");
        assert!(session.last_activity_at >= messages[1].created_at);
    }

    #[test]
    fn test_title_not_touched_by_later_messages() {
        let store = store();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        let long = "a".repeat(80);

        store.add_message(&id, NewMessage::system("be nice")).unwrap();
        assert_eq!(store.get_session(&id).unwrap().title, "");

        store.add_message(&id, NewMessage::user(long)).unwrap();
        store.add_message(&id, NewMessage::user("second prompt")).unwrap();

        let title = store.get_session(&id).unwrap().title;
        assert_eq!(title, format!("{}...", "a".repeat(60)));
    }

    #[test]
    fn test_blank_first_prompt_leaves_title_empty() {
        let store = store();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();

        store.add_message(&id, NewMessage::user("   ")).unwrap();
        store.add_message(&id, NewMessage::user("second")).unwrap();

        assert_eq!(store.get_session(&id).unwrap().title, "");
    }

    #[test]
    fn test_explicit_title_kept() {
        let store = store();
        let id = store
            .create_session("phi4-14b", "Phi-4", Some("My notes"))
            .unwrap();
        store.add_message(&id, NewMessage::user("hello")).unwrap();
        assert_eq!(store.get_session(&id).unwrap().title, "My notes");
    }

    #[test]
    fn test_unknown_session() {
        let store = store();
        let err = store.add_message("missing", NewMessage::user("hi")).unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
        assert!(store.get_messages("missing").is_err());
    }

    #[test]
    fn test_metadata_round_trip() {
        let store = store();
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        store
            .add_message(
                &id,
                NewMessage::assistant("ok").with_metadata("category", serde_json::json!("math")),
            )
            .unwrap();
        let messages = store.get_messages(&id).unwrap();
        assert_eq!(messages[0].metadata["category"], "math");
    }

    #[test]
    fn test_concurrent_appends_are_dense() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(&dir.path().join("s.db")).unwrap());
        let id = store.create_session("phi4-14b", "Phi-4", None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store
                            .add_message(
                                &id,
                                NewMessage::assistant(format!("t{t} m{i}")).with_usage(1, 2, 3),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let session = store.get_session(&id).unwrap();
        let messages = store.get_messages(&id).unwrap();
        assert_eq!(session.message_count, 80);
        assert_eq!(messages.len(), 80);
        assert_eq!(session.total_input_tokens, 80);
        assert_eq!(session.total_output_tokens, 160);
        assert_eq!(session.total_duration_ms, 240);
        for (i, m) in messages.iter().enumerate() {
            assert_eq!(m.sequence_number, i as u64 + 1);
        }
    }
}
