//! SQLite checkpoint backend.
//!
//! Stores one row per thread in the `checkpoints` table: the thread id,
//! its step counter, the serialized state, and an update timestamp. Saving
//! replaces the row wholesale, which is all the engine needs because only
//! the latest checkpoint is ever loaded.
//!
//! ## Behavior
//!
//! - State is serialized through the persistence models (see
//!   [`super::persistence`]); this module stays focused on database I/O.
//! - When the `sqlite-migrations` feature is enabled (default), embedded
//!   migrations (`sqlx::migrate!("./migrations")`) run on connect;
//!   disabling the feature assumes external migration orchestration.
//! - A row whose `state_json` no longer decodes is treated as corrupted:
//!   `load_latest` logs a warning and reports the thread as having no
//!   checkpoint, so the next turn starts that thread fresh instead of
//!   failing forever.

use std::sync::Arc;

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use crate::runtimes::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use crate::runtimes::persistence::{PersistedCheckpoint, PersistedState};

/// SQLite-backed checkpointer holding the latest checkpoint per thread.
///
/// Storage stays small by construction: one row per thread, replaced on
/// every save. Deleting a thread's history is a single-row `DELETE`.
pub struct SQLiteCheckpointer {
    /// Shared connection pool for concurrent checkpoint operations.
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SQLiteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SQLiteCheckpointer").finish()
    }
}

impl SQLiteCheckpointer {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: `sqlite://tutorgraph.db`
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> std::result::Result<Self, CheckpointerError> {
        let pool =
            SqlitePool::connect(database_url)
                .await
                .map_err(|e| CheckpointerError::Backend {
                    message: format!("connect error: {e}"),
                })?;
        // Run embedded migrations only if the feature is enabled (idempotent).
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(CheckpointerError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        #[cfg(not(feature = "sqlite-migrations"))]
        {
            // Feature disabled: assume the schema was applied externally.
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn decode_row(row: &SqliteRow, thread_id: &str) -> Option<Checkpoint> {
        let step: i64 = row.get("step");
        let state_json: String = row.get("state_json");
        let updated_at: String = row.get("updated_at");

        let persisted: PersistedState = match serde_json::from_str(&state_json) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    thread_id = %thread_id,
                    error = %e,
                    "discarding corrupted checkpoint; thread will start fresh"
                );
                return None;
            }
        };

        Some(Checkpoint::from(PersistedCheckpoint {
            thread_id: thread_id.to_string(),
            step: step as u64,
            state: persisted,
            created_at: updated_at,
        }))
    }
}

#[async_trait::async_trait]
impl Checkpointer for SQLiteCheckpointer {
    #[instrument(skip(self, checkpoint), err)]
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedState::from(&checkpoint.state);
        let state_json =
            serde_json::to_string(&persisted).map_err(|e| CheckpointerError::Other {
                message: format!("state serialize: {e}"),
            })?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checkpoints (thread_id, step, state_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
        "#,
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.step as i64)
        .bind(&state_json)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("insert checkpoint: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self, thread_id), err)]
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row_opt: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT step, state_json, updated_at
            FROM checkpoints
            WHERE thread_id = ?1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select latest: {e}"),
        })?;

        Ok(row_opt.and_then(|row| Self::decode_row(&row, thread_id)))
    }

    #[instrument(skip(self), err)]
    async fn list_threads(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT thread_id FROM checkpoints
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("list threads: {e}"),
        })?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("thread_id"))
            .collect())
    }
}
