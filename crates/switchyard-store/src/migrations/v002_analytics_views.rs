//! v002 -- Read-only analytics views.
//!
//! - `session_summary`: one row per session with tag and bookmark figures.
//! - `message_details`: one row per message with its session's model.
//! - `model_performance`: assistant response figures grouped by model.
//! - `daily_statistics`: message volume per UTC day.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE VIEW IF NOT EXISTS session_summary AS
SELECT
    s.id                  AS session_id,
    s.model_id            AS model_id,
    s.model_display_name  AS model_display_name,
    s.title               AS title,
    s.created_at          AS created_at,
    s.last_activity_at    AS last_activity_at,
    s.message_count       AS message_count,
    s.total_input_tokens  AS total_input_tokens,
    s.total_output_tokens AS total_output_tokens,
    s.total_duration_ms   AS total_duration_ms,
    (SELECT COUNT(*) FROM tags t WHERE t.session_id = s.id)           AS tag_count,
    EXISTS (SELECT 1 FROM bookmarks b WHERE b.session_id = s.id)      AS bookmarked
FROM sessions s;

CREATE VIEW IF NOT EXISTS message_details AS
SELECT
    m.id              AS message_id,
    m.session_id      AS session_id,
    s.model_id        AS model_id,
    m.sequence_number AS sequence_number,
    m.role            AS role,
    length(m.content) AS content_chars,
    m.token_count     AS token_count,
    m.input_tokens    AS input_tokens,
    m.output_tokens   AS output_tokens,
    m.duration_ms     AS duration_ms,
    CASE
        WHEN m.duration_ms > 0 AND m.output_tokens IS NOT NULL
        THEN m.output_tokens * 1000.0 / m.duration_ms
    END               AS tokens_per_second,
    m.created_at      AS created_at
FROM messages m
JOIN sessions s ON s.id = m.session_id;

CREATE VIEW IF NOT EXISTS model_performance AS
SELECT
    s.model_id                             AS model_id,
    COUNT(DISTINCT m.session_id)           AS session_count,
    COUNT(*)                               AS response_count,
    AVG(m.duration_ms)                     AS avg_duration_ms,
    AVG(m.output_tokens)                   AS avg_output_tokens,
    COALESCE(SUM(m.input_tokens), 0)       AS total_input_tokens,
    COALESCE(SUM(m.output_tokens), 0)      AS total_output_tokens,
    CASE
        WHEN SUM(m.duration_ms) > 0
        THEN SUM(m.output_tokens) * 1000.0 / SUM(m.duration_ms)
    END                                    AS tokens_per_second
FROM messages m
JOIN sessions s ON s.id = m.session_id
WHERE m.role = 'assistant'
GROUP BY s.model_id;

CREATE VIEW IF NOT EXISTS daily_statistics AS
SELECT
    substr(m.created_at, 1, 10)                                AS day,
    COUNT(DISTINCT m.session_id)                               AS active_sessions,
    COUNT(*)                                                   AS message_count,
    SUM(m.role = 'user')                                       AS user_messages,
    SUM(m.role = 'assistant')                                  AS assistant_messages,
    COALESCE(SUM(m.input_tokens), 0) + COALESCE(SUM(m.output_tokens), 0) AS total_tokens
FROM messages m
GROUP BY substr(m.created_at, 1, 10);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
