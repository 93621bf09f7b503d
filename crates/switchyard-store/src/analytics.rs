//! Windowed statistics and readers over the analytics views.

use rusqlite::params;

use crate::database::SessionStore;
use crate::error::Result;
use crate::models::{
    DailyActivity, DailyStatistics, ModelPerformance, ModelUsage, SessionSummaryRow, Statistics,
};
use crate::time;

impl SessionStore {
    /// Totals over the last `window_days` days. Sessions are counted by
    /// creation time, messages by their own timestamp.
    pub fn statistics(&self, window_days: u32) -> Result<Statistics> {
        let cutoff = time::cutoff_days(window_days);
        let conn = self.lock()?;

        let sessions: u64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE created_at >= ?1",
            [&cutoff],
            |row| row.get(0),
        )?;

        let (messages, user_messages, assistant_messages, total_tokens): (u64, u64, u64, u64) =
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(role = 'user'), 0),
                        COALESCE(SUM(role = 'assistant'), 0),
                        COALESCE(SUM(COALESCE(input_tokens, 0) + COALESCE(output_tokens, 0)), 0)
                 FROM messages WHERE created_at >= ?1",
                [&cutoff],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let avg_tokens_per_message = if messages == 0 {
            0.0
        } else {
            total_tokens as f64 / messages as f64
        };

        Ok(Statistics {
            window_days,
            sessions,
            messages,
            user_messages,
            assistant_messages,
            total_tokens,
            avg_tokens_per_message,
        })
    }

    /// Sessions created per model in the window, most used first.
    pub fn model_usage(&self, window_days: u32) -> Result<Vec<ModelUsage>> {
        let cutoff = time::cutoff_days(window_days);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT model_id, COUNT(*) AS n FROM sessions
             WHERE created_at >= ?1
             GROUP BY model_id
             ORDER BY n DESC, model_id",
        )?;
        let rows = stmt.query_map([&cutoff], |row| {
            Ok(ModelUsage {
                model_id: row.get(0)?,
                session_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Messages per UTC day in the window, oldest day first.
    pub fn daily_activity(&self, window_days: u32) -> Result<Vec<DailyActivity>> {
        let cutoff = time::cutoff_days(window_days);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) FROM messages
             WHERE created_at >= ?1
             GROUP BY day
             ORDER BY day",
        )?;
        let rows = stmt.query_map([&cutoff], |row| {
            Ok(DailyActivity {
                date: row.get(0)?,
                message_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ------------------------------------------------------------------
    // View readers
    // ------------------------------------------------------------------

    /// Rows of `session_summary`, most recently active first.
    pub fn session_summaries(&self, limit: u32) -> Result<Vec<SessionSummaryRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, model_id, title, last_activity_at, message_count,
                    total_input_tokens, total_output_tokens, total_duration_ms,
                    tag_count, bookmarked
             FROM session_summary
             ORDER BY last_activity_at DESC, session_id
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            let activity: String = row.get(3)?;
            Ok(SessionSummaryRow {
                session_id: row.get(0)?,
                model_id: row.get(1)?,
                title: row.get(2)?,
                last_activity_at: time::from_sql(3, &activity)?,
                message_count: row.get(4)?,
                total_input_tokens: row.get(5)?,
                total_output_tokens: row.get(6)?,
                total_duration_ms: row.get(7)?,
                tag_count: row.get(8)?,
                bookmarked: row.get(9)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows of `model_performance`, busiest model first.
    pub fn model_performance(&self) -> Result<Vec<ModelPerformance>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT model_id, session_count, response_count, avg_duration_ms,
                    avg_output_tokens, total_input_tokens, total_output_tokens,
                    tokens_per_second
             FROM model_performance
             ORDER BY response_count DESC, model_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelPerformance {
                model_id: row.get(0)?,
                session_count: row.get(1)?,
                response_count: row.get(2)?,
                avg_duration_ms: row.get(3)?,
                avg_output_tokens: row.get(4)?,
                total_input_tokens: row.get(5)?,
                total_output_tokens: row.get(6)?,
                tokens_per_second: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows of `daily_statistics` within the window, oldest day first.
    pub fn daily_statistics(&self, window_days: u32) -> Result<Vec<DailyStatistics>> {
        let cutoff_day = time::cutoff_days(window_days)[..10].to_string();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT day, active_sessions, message_count, user_messages,
                    assistant_messages, total_tokens
             FROM daily_statistics
             WHERE day >= ?1
             ORDER BY day",
        )?;
        let rows = stmt.query_map([&cutoff_day], |row| {
            Ok(DailyStatistics {
                day: row.get(0)?,
                active_sessions: row.get(1)?,
                message_count: row.get(2)?,
                user_messages: row.get(3)?,
                assistant_messages: row.get(4)?,
                total_tokens: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;

    fn seeded() -> SessionStore {
        let store = SessionStore::open_in_memory().unwrap();
        let a = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        store.add_message(&a, NewMessage::user("q1").with_token_count(1)).unwrap();
        store
            .add_message(&a, NewMessage::assistant("a1").with_usage(4, 6, 1000))
            .unwrap();

        let b = store.create_session("phi4-14b", "Phi-4", None).unwrap();
        store.add_message(&b, NewMessage::user("q2")).unwrap();
        store
            .add_message(&b, NewMessage::assistant("a2").with_usage(2, 8, 1000))
            .unwrap();

        let c = store.create_session("qwq-32b", "QwQ", None).unwrap();
        store.add_message(&c, NewMessage::user("q3")).unwrap();
        store.add_tag(&c, "math").unwrap();
        store.add_bookmark(&c, None).unwrap();
        store
    }

    #[test]
    fn test_statistics() {
        let stats = seeded().statistics(30).unwrap();
        assert_eq!(stats.sessions, 3);
        assert_eq!(stats.messages, 5);
        assert_eq!(stats.user_messages, 3);
        assert_eq!(stats.assistant_messages, 2);
        assert_eq!(stats.total_tokens, 20);
        assert!((stats.avg_tokens_per_message - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_empty_store() {
        let stats = SessionStore::open_in_memory().unwrap().statistics(7).unwrap();
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.avg_tokens_per_message, 0.0);
    }

    #[test]
    fn test_model_usage_and_daily_activity() {
        let store = seeded();
        assert_eq!(
            store.model_usage(30).unwrap(),
            vec![
                ModelUsage {
                    model_id: "phi4-14b".to_string(),
                    session_count: 2
                },
                ModelUsage {
                    model_id: "qwq-32b".to_string(),
                    session_count: 1
                },
            ]
        );

        let daily = store.daily_activity(30).unwrap();
        assert_eq!(daily.iter().map(|d| d.message_count).sum::<u64>(), 5);
        assert_eq!(daily.last().unwrap().date, chrono::Utc::now().format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_views() {
        let store = seeded();

        let summaries = store.session_summaries(10).unwrap();
        assert_eq!(summaries.len(), 3);
        let qwq = summaries.iter().find(|s| s.model_id == "qwq-32b").unwrap();
        assert!(qwq.bookmarked);
        assert_eq!(qwq.tag_count, 1);

        let perf = store.model_performance().unwrap();
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].model_id, "phi4-14b");
        assert_eq!(perf[0].response_count, 2);
        assert_eq!(perf[0].total_output_tokens, 14);
        assert_eq!(perf[0].tokens_per_second, Some(7.0));

        let daily = store.daily_statistics(30).unwrap();
        assert_eq!(daily.iter().map(|d| d.message_count).sum::<u64>(), 5);
        assert_eq!(daily.iter().map(|d| d.total_tokens).sum::<u64>(), 20);
    }
}
