//! Session management commands.

use std::path::Path;

use chrono::{Duration, Utc};
use colored::Colorize;
use switchyard_catalog::ErrorKind;
use switchyard_store::{ExportFormat, Role, Session};

use super::App;
use crate::error::{CliError, CliResult};
use crate::ui::truncate;

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::internal(e.to_string()))
}

fn session_line(session: &Session, preview: Option<&str>) -> String {
    let title = if session.title.is_empty() {
        preview.map(|p| truncate(p, 50)).unwrap_or_default()
    } else {
        truncate(&session.title, 50)
    };
    format!(
        "{}  {:<20} {:>4} msgs  {}  {}",
        session.id.cyan(),
        session.model_id,
        session.message_count,
        session.last_activity_at.format("%Y-%m-%d %H:%M"),
        title
    )
}

pub(crate) fn list(
    app: &App,
    limit: u32,
    offset: u32,
    model: Option<&str>,
    as_json: bool,
) -> CliResult<()> {
    let sessions = app.core.store().list_sessions(limit, offset, model)?;
    if as_json {
        println!("{}", to_json(&sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }
    for summary in &sessions {
        println!(
            "{}",
            session_line(&summary.session, summary.first_prompt.as_deref())
        );
    }
    let total = app.core.store().count_sessions()?;
    println!();
    println!(
        "{}",
        format!("showing {}-{} of {}", offset + 1, offset as usize + sessions.len(), total).dimmed()
    );
    Ok(())
}

pub(crate) fn show(app: &App, id: &str, as_json: bool) -> CliResult<()> {
    let store = app.core.store();
    let session = store.get_session(id)?;
    let messages = store.get_messages(id)?;

    if as_json {
        let body = serde_json::json!({ "session": session, "messages": messages });
        println!("{}", to_json(&body)?);
        return Ok(());
    }

    println!("{}", session_line(&session, None));
    let tags = store.list_tags(id)?;
    if !tags.is_empty() {
        println!("tags: {}", tags.join(", "));
    }
    println!(
        "{}",
        format!(
            "{} in / {} out tokens, {:.1}s total",
            session.total_input_tokens,
            session.total_output_tokens,
            session.total_duration_ms as f64 / 1000.0
        )
        .dimmed()
    );
    for message in messages {
        println!();
        let label = match message.role {
            Role::User => "you".green().bold(),
            Role::Assistant => "model".blue().bold(),
            Role::System => "system".yellow().bold(),
        };
        println!("[{}] {}", message.sequence_number, label);
        println!("{}", message.content.trim_end());
    }
    Ok(())
}

pub(crate) fn search(app: &App, query: &str, limit: u32) -> CliResult<()> {
    let store = app.core.store();
    let hits = store.search(query, limit)?;
    if hits.is_empty() {
        println!("No sessions match '{query}'.");
        return Ok(());
    }
    for hit in hits {
        let session = store.get_session(&hit.session_id)?;
        println!("{}", session_line(&session, None));
    }
    Ok(())
}

pub(crate) fn export(app: &App, id: &str, format: &str, output: Option<&Path>) -> CliResult<()> {
    let format: ExportFormat = format.parse()?;
    let rendered = app.core.store().export_session(id, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Exported {} to {}", id, path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

pub(crate) fn import(app: &App, file: &Path) -> CliResult<()> {
    let text = std::fs::read_to_string(file)?;
    let id = app.core.store().import_session(&text)?;
    println!("Imported as session {}", id.cyan());
    Ok(())
}

pub(crate) fn delete(app: &App, id: &str) -> CliResult<()> {
    let session = app.core.store().get_session(id)?;
    let question = format!(
        "Delete session {} ({} messages)?",
        session.id, session.message_count
    );
    if !app.confirm(&question)? {
        println!("Kept.");
        return Ok(());
    }
    if !app.core.store().delete_session(id)? {
        return Err(CliError::new(
            ErrorKind::NotFound,
            format!("session '{id}' not found"),
        ));
    }
    println!("Deleted {id}.");
    Ok(())
}

pub(crate) fn prune(app: &App, days: u32) -> CliResult<()> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let question = format!(
        "Delete every session inactive since {}?",
        cutoff.format("%Y-%m-%d")
    );
    if !app.confirm(&question)? {
        println!("Nothing deleted.");
        return Ok(());
    }
    let deleted = app.core.store().delete_older_than(cutoff)?;
    println!("Deleted {deleted} session(s).");
    Ok(())
}

pub(crate) fn tag(app: &App, id: &str, tag: &str, remove: bool) -> CliResult<()> {
    let store = app.core.store();
    store.get_session(id)?;
    if remove {
        if store.remove_tag(id, tag)? {
            println!("Removed tag '{tag}'.");
        } else {
            println!("Session {id} had no tag '{tag}'.");
        }
    } else {
        store.add_tag(id, tag)?;
        println!("Tagged {id} with '{tag}'.");
    }
    Ok(())
}

/// Rows for `sessions tags`: every tag with its session count, or the
/// sessions carrying `tag`.
fn tag_listing(app: &App, tag: Option<&str>) -> CliResult<Vec<String>> {
    let store = app.core.store();
    match tag {
        None => Ok(store
            .all_tags()?
            .into_iter()
            .map(|(tag, count)| format!("{tag:<20} {count}"))
            .collect()),
        Some(tag) => store
            .sessions_with_tag(tag)?
            .iter()
            .map(|id| Ok(session_line(&store.get_session(id)?, None)))
            .collect(),
    }
}

pub(crate) fn tags(app: &App, tag: Option<&str>) -> CliResult<()> {
    let rows = tag_listing(app, tag)?;
    if rows.is_empty() {
        match tag {
            Some(tag) => println!("No sessions tagged '{tag}'."),
            None => println!("No tags."),
        }
    }
    for row in rows {
        println!("{row}");
    }
    Ok(())
}

pub(crate) fn bookmark(
    app: &App,
    id: Option<&str>,
    note: Option<&str>,
    remove: bool,
) -> CliResult<()> {
    let store = app.core.store();
    let Some(id) = id else {
        let bookmarks = store.list_bookmarks()?;
        if bookmarks.is_empty() {
            println!("No bookmarks.");
        }
        for b in bookmarks {
            println!(
                "{}  {}  {}",
                b.session_id.cyan(),
                b.created_at.format("%Y-%m-%d"),
                b.note.unwrap_or_default()
            );
        }
        return Ok(());
    };

    store.get_session(id)?;
    if remove {
        if store.remove_bookmark(id)? {
            println!("Removed bookmark.");
        } else {
            println!("Session {id} was not bookmarked.");
        }
    } else {
        store.add_bookmark(id, note)?;
        println!("Bookmarked {id}.");
    }
    Ok(())
}
