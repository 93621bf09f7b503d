//! v001 -- Initial schema.
//!
//! Sessions, messages, tags, bookmarks and the FTS5 search index. The index is
//! maintained by the store inside the same transaction as each write rather
//! than by triggers, because it also carries session titles.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    id                  TEXT PRIMARY KEY NOT NULL,  -- 128-bit random, base64url
    model_id            TEXT NOT NULL,
    model_display_name  TEXT NOT NULL,
    title               TEXT NOT NULL DEFAULT '',
    created_at          TEXT NOT NULL,              -- RFC 3339, UTC, micros
    updated_at          TEXT NOT NULL,
    last_activity_at    TEXT NOT NULL,
    message_count       INTEGER NOT NULL DEFAULT 0,
    total_input_tokens  INTEGER NOT NULL DEFAULT 0,
    total_output_tokens INTEGER NOT NULL DEFAULT 0,
    total_duration_ms   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(last_activity_at DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_model ON sessions(model_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    sequence_number INTEGER NOT NULL,
    role            TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    token_count     INTEGER,
    input_tokens    INTEGER,
    output_tokens   INTEGER,
    duration_ms     INTEGER,
    metadata        TEXT NOT NULL DEFAULT '{}',

    UNIQUE (session_id, sequence_number),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);

-- ----------------------------------------------------------------
-- Tags and bookmarks
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tags (
    session_id TEXT NOT NULL,
    tag        TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (session_id, tag),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag);

CREATE TABLE IF NOT EXISTS bookmarks (
    session_id TEXT PRIMARY KEY NOT NULL,
    note       TEXT,
    created_at TEXT NOT NULL,

    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Full-text index over message content and session titles
-- ----------------------------------------------------------------
CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
    session_id UNINDEXED,
    source     UNINDEXED,   -- 'title' or 'message'
    body,
    tokenize = 'porter unicode61'
);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
