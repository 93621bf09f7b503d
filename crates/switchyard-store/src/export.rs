//! Session export (JSON or Markdown) and re-import from the JSON export.

use serde::{Deserialize, Serialize};

use crate::database::SessionStore;
use crate::error::{Result, StoreError};
use crate::messages::{append_message, load_messages};
use crate::models::{ExportFormat, Message, NewMessage, Session};
use crate::sessions::{fetch_session, insert_session, new_session_id};
use crate::time;

const EXPORT_KIND: &str = "switchyard-session";
const EXPORT_VERSION: u32 = 1;

/// JSON export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub kind: String,
    pub version: u32,
    pub exported_at: String,
    pub session: Session,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SessionStore {
    /// Render one session with all its messages.
    pub fn export_session(&self, session_id: &str, format: ExportFormat) -> Result<String> {
        let (session, messages, tags) = {
            let conn = self.lock()?;
            let session = fetch_session(&conn, session_id)?;
            let messages = load_messages(&conn, session_id)?;
            let tags = {
                let mut stmt =
                    conn.prepare("SELECT tag FROM tags WHERE session_id = ?1 ORDER BY tag")?;
                let rows = stmt.query_map([session_id], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            };
            (session, messages, tags)
        };

        match format {
            ExportFormat::Json => {
                let doc = SessionExport {
                    kind: EXPORT_KIND.to_string(),
                    version: EXPORT_VERSION,
                    exported_at: time::to_sql(&time::now()),
                    session,
                    messages,
                    tags,
                };
                Ok(serde_json::to_string_pretty(&doc)?)
            }
            ExportFormat::Markdown => Ok(render_markdown(&session, &messages, &tags)),
        }
    }

    /// Re-create a session from a JSON export under a fresh id.
    ///
    /// Messages keep their order, roles, content, figures, metadata and
    /// timestamps; aggregates are rebuilt from them.
    pub fn import_session(&self, json: &str) -> Result<String> {
        let doc: SessionExport = serde_json::from_str(json)?;
        if doc.kind != EXPORT_KIND {
            return Err(StoreError::InvalidExport(format!(
                "expected kind '{EXPORT_KIND}', found '{}'",
                doc.kind
            )));
        }
        if doc.version > EXPORT_VERSION {
            return Err(StoreError::InvalidExport(format!(
                "export version {} is newer than supported version {EXPORT_VERSION}",
                doc.version
            )));
        }

        let mut messages = doc.messages;
        messages.sort_by_key(|m| m.sequence_number);

        let id = new_session_id();
        self.with_tx(|tx| {
            insert_session(
                tx,
                &id,
                &doc.session.model_id,
                &doc.session.model_display_name,
                &doc.session.title,
                &doc.session.created_at,
            )?;
            for message in &messages {
                let new = NewMessage {
                    role: message.role,
                    content: message.content.clone(),
                    token_count: message.token_count,
                    input_tokens: message.input_tokens,
                    output_tokens: message.output_tokens,
                    duration_ms: message.duration_ms,
                    metadata: message.metadata.clone(),
                };
                append_message(tx, &id, &new, &message.created_at)?;
            }
            for tag in &doc.tags {
                tx.execute(
                    "INSERT OR IGNORE INTO tags (session_id, tag, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, tag, time::to_sql(&time::now())],
                )?;
            }
            Ok(())
        })?;

        tracing::info!(session = %id, messages = messages.len(), "imported session");
        Ok(id)
    }
}

fn render_markdown(session: &Session, messages: &[Message], tags: &[String]) -> String {
    let title = if session.title.is_empty() {
        "Untitled session"
    } else {
        session.title.as_str()
    };

    let mut out = String::new();
    out.push_str(&format!("# {title}\n\n"));
    out.push_str(&format!(
        "- **Model:** {} (`{}`)\n",
        session.model_display_name, session.model_id
    ));
    out.push_str(&format!("- **Session:** `{}`\n", session.id));
    out.push_str(&format!("- **Created:** {}\n", time::to_sql(&session.created_at)));
    out.push_str(&format!("- **Messages:** {}\n", session.message_count));
    out.push_str(&format!(
        "- **Tokens:** {} in / {} out\n",
        session.total_input_tokens, session.total_output_tokens
    ));
    if !tags.is_empty() {
        out.push_str(&format!("- **Tags:** {}\n", tags.join(", ")));
    }

    for message in messages {
        let heading = match message.role {
            crate::models::Role::User => "User",
            crate::models::Role::Assistant => "Assistant",
            crate::models::Role::System => "System",
        };
        out.push_str(&format!("\n---\n\n## {heading}\n\n"));
        out.push_str(message.content.trim_end());
        out.push('\n');
        if let (Some(output), Some(duration)) = (message.output_tokens, message.duration_ms) {
            out.push_str(&format!(
                "\n*{} tokens in {:.1}s*\n",
                output,
                duration as f64 / 1000.0
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (SessionStore, String) {
        let store = SessionStore::open_in_memory().unwrap();
        let id = store.create_session("phi4-14b", "Phi-4 14B", None).unwrap();
        store
            .add_message(&id, NewMessage::system("You are helpful."))
            .unwrap();
        store
            .add_message(&id, NewMessage::user("Explain entropy").with_token_count(3))
            .unwrap();
        store
            .add_message(
                &id,
                NewMessage::assistant("Entropy is a measure of disorder.")
                    .with_usage(3, 10, 1200)
                    .with_metadata("category", serde_json::json!("research")),
            )
            .unwrap();
        store.add_tag(&id, "physics").unwrap();
        (store, id)
    }

    #[test]
    fn test_markdown_export() {
        let (store, id) = seeded();
        let md = store.export_session(&id, ExportFormat::Markdown).unwrap();
        assert!(md.starts_with("# Explain entropy\n"));
        assert!(md.contains("Phi-4 14B"));
        assert!(md.contains("## User\n\nExplain entropy"));
        assert!(md.contains("## Assistant\n\nEntropy is a measure of disorder."));
        assert!(md.contains("*10 tokens in 1.2s*"));
        assert!(md.contains("physics"));
    }

    #[test]
    fn test_json_round_trip_into_fresh_store() {
        let (store, id) = seeded();
        let json = store.export_session(&id, ExportFormat::Json).unwrap();

        let fresh = SessionStore::open_in_memory().unwrap();
        let new_id = fresh.import_session(&json).unwrap();
        assert_ne!(new_id, id);

        let original = store.get_messages(&id).unwrap();
        let imported = fresh.get_messages(&new_id).unwrap();
        assert_eq!(original.len(), imported.len());
        for (a, b) in original.iter().zip(&imported) {
            assert_eq!(a.sequence_number, b.sequence_number);
            assert_eq!(a.role, b.role);
            assert_eq!(a.content, b.content);
            assert_eq!(a.input_tokens, b.input_tokens);
            assert_eq!(a.output_tokens, b.output_tokens);
            assert_eq!(a.metadata, b.metadata);
            assert_eq!(a.created_at, b.created_at);
        }

        let a = store.get_session(&id).unwrap();
        let b = fresh.get_session(&new_id).unwrap();
        assert_eq!(a.title, b.title);
        assert_eq!(a.message_count, b.message_count);
        assert_eq!(a.total_input_tokens, b.total_input_tokens);
        assert_eq!(a.total_output_tokens, b.total_output_tokens);
        assert_eq!(fresh.list_tags(&new_id).unwrap(), vec!["physics"]);
        assert_eq!(fresh.search("entropy", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_import_rejects_foreign_documents() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(matches!(
            store.import_session("{\"not\": \"an export\"}"),
            Err(StoreError::Json(_))
        ));

        let (source, id) = seeded();
        let json = source
            .export_session(&id, ExportFormat::Json)
            .unwrap()
            .replace(EXPORT_KIND, "something-else");
        let err = store.import_session(&json).unwrap_err();
        assert_eq!(err.kind(), switchyard_catalog::ErrorKind::Validation);
    }

    #[test]
    fn test_export_unknown_session() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(matches!(
            store.export_session("nope", ExportFormat::Json),
            Err(StoreError::SessionNotFound(_))
        ));
    }
}
