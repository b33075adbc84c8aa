//! PostgreSQL story store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! The expected tables are described by [`NARRATIVE_SCHEMA`].

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::types::{
    ChoiceId, PartId, ProgressId, ProgressUpdate, PublicationState, ReaderId, Story, StoryChoice,
    StoryId, StoryPart, StoryProgress,
};
use super::{ProgressStore, StoryStore};

/// SQL schema for the tables read and written by [`PostgresStore`].
pub const NARRATIVE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    genre TEXT,
    author_id UUID NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT stories_status_check CHECK (status IN ('draft', 'submitted', 'published'))
);

CREATE TABLE IF NOT EXISTS story_parts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    story_id UUID NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    is_ending BOOLEAN NOT NULL DEFAULT FALSE,
    is_start BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS story_choices (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    part_id UUID NOT NULL REFERENCES story_parts(id) ON DELETE CASCADE,
    choice_text TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    next_part_id UUID REFERENCES story_parts(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS story_progress (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    reader_id UUID NOT NULL,
    story_id UUID NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
    current_part_id UUID REFERENCES story_parts(id) ON DELETE SET NULL,
    completed BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT story_progress_reader_story_key UNIQUE (reader_id, story_id)
);

CREATE INDEX IF NOT EXISTS idx_story_parts_story
    ON story_parts(story_id, is_start DESC, created_at);
CREATE INDEX IF NOT EXISTS idx_story_choices_part
    ON story_choices(part_id, order_index);
"#;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/stories".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A row held a value the engine cannot interpret.
    #[error("Invalid row in {table}: {detail}")]
    InvalidRow {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        detail: String,
    },
    /// Update targeted a progress record that does not exist.
    #[error("Progress not found: {0}")]
    ProgressNotFound(ProgressId),
}

/// PostgreSQL story store.
///
/// Uses connection pooling with production-tuned settings.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        // Unprepared execution allows the multi-statement schema script.
        (&self.pool).execute(NARRATIVE_SCHEMA).await?;
        Ok(())
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_story_row(row: &PgRow) -> Result<Story, PostgresError> {
        let status: String = row.try_get("status")?;
        let state = PublicationState::from_str(&status).ok_or_else(|| PostgresError::InvalidRow {
            table: "stories",
            detail: format!("unknown status {status:?}"),
        })?;

        Ok(Story {
            id: StoryId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            description: row.try_get::<Option<String>, _>("description")?.unwrap_or_default(),
            genre: row.try_get("genre")?,
            author_id: ReaderId::new(row.try_get("author_id")?),
            state,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_part_row(row: &PgRow) -> Result<StoryPart, PostgresError> {
        Ok(StoryPart {
            id: PartId::new(row.try_get("id")?),
            story_id: StoryId::new(row.try_get("story_id")?),
            content: row.try_get("content")?,
            is_ending: row.try_get("is_ending")?,
            is_start: row.try_get("is_start")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_choice_row(row: &PgRow) -> Result<StoryChoice, PostgresError> {
        let next: Option<Uuid> = row.try_get("next_part_id")?;
        Ok(StoryChoice {
            id: ChoiceId::new(row.try_get("id")?),
            part_id: PartId::new(row.try_get("part_id")?),
            text: row.try_get("choice_text")?,
            order_index: row.try_get("order_index")?,
            next_part_id: next.map(PartId::new),
        })
    }

    fn parse_progress_row(row: &PgRow) -> Result<StoryProgress, PostgresError> {
        let current: Option<Uuid> = row.try_get("current_part_id")?;
        Ok(StoryProgress {
            id: ProgressId::new(row.try_get("id")?),
            reader_id: ReaderId::new(row.try_get("reader_id")?),
            story_id: StoryId::new(row.try_get("story_id")?),
            current_part_id: current.map(PartId::new),
            completed: row.try_get("completed")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const PART_COLUMNS: &str = "id, story_id, content, is_ending, is_start, created_at";

#[async_trait]
impl StoryStore for PostgresStore {
    type Error = PostgresError;

    async fn fetch_story(&self, id: &StoryId, viewer: &ReaderId) -> Result<Option<Story>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, title, description, genre, author_id, status, created_at
            FROM stories
            WHERE id = $1 AND (status = 'published' OR author_id = $2)
            "#
        )
        .bind(id.as_uuid())
        .bind(viewer.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_story_row).transpose()
    }

    async fn fetch_part(&self, id: &PartId) -> Result<Option<StoryPart>, Self::Error> {
        let row = sqlx::query(&format!("SELECT {PART_COLUMNS} FROM story_parts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_part_row).transpose()
    }

    async fn fetch_choices(&self, part_id: &PartId) -> Result<Vec<StoryChoice>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, part_id, choice_text, order_index, next_part_id
            FROM story_choices
            WHERE part_id = $1
            ORDER BY order_index, id
            "#
        )
        .bind(part_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_choice_row).collect()
    }

    async fn fetch_start_part(&self, story_id: &StoryId) -> Result<Option<StoryPart>, Self::Error> {
        let row = sqlx::query(&format!(
            "SELECT {PART_COLUMNS} FROM story_parts WHERE story_id = $1 \
             ORDER BY is_start DESC, created_at, id LIMIT 1"
        ))
        .bind(story_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_part_row).transpose()
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[async_trait]
impl ProgressStore for PostgresStore {
    type Error = PostgresError;

    async fn upsert_progress(&self, reader: &ReaderId, story: &StoryId) -> Result<StoryProgress, Self::Error> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO story_progress (reader_id, story_id)
            VALUES ($1, $2)
            ON CONFLICT (reader_id, story_id)
            DO UPDATE SET reader_id = EXCLUDED.reader_id
            RETURNING id, reader_id, story_id, current_part_id, completed, created_at, updated_at
            "#
        )
        .bind(reader.as_uuid())
        .bind(story.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Self::parse_progress_row(&row)
    }

    async fn update_progress(&self, id: &ProgressId, update: &ProgressUpdate) -> Result<(), Self::Error> {
        let (set_part, part) = match update.current_part_id {
            Some(part) => (true, part.map(|p| p.as_uuid())),
            None => (false, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE story_progress
            SET current_part_id = CASE WHEN $2 THEN $3 ELSE current_part_id END,
                completed = COALESCE($4, completed),
                updated_at = NOW()
            WHERE id = $1
            "#
        )
        .bind(id.as_uuid())
        .bind(set_part)
        .bind(part)
        .bind(update.completed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PostgresError::ProgressNotFound(*id));
        }
        Ok(())
    }
}
