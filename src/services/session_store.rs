//! Local key-value storage for the session blob.
//!
//! Three fixed keys live in the `session_kv` table: the signed-in user (JSON),
//! the power mode flag and the onboarding flag. This is a convenience cache;
//! the file model never reads it.

use crate::models::session::{PlanType, SessionState, SessionUser};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

const USER_KEY: &str = "session_user";
const POWER_MODE_KEY: &str = "power_mode";
const ONBOARDING_KEY: &str = "onboarding_completed";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("stored value for `{key}` is malformed: {source}")]
    Malformed {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Clone)]
pub struct SessionStore {
    /// Shared SQLite pool.
    pub db: Arc<SqlitePool>,
}

impl SessionStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Safe to run more than once.
    pub async fn migrate(&self) -> SessionResult<usize> {
        let statements = MIGRATION
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    async fn read(&self, key: &str) -> SessionResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM session_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.db)
            .await?;
        Ok(value)
    }

    async fn write(&self, key: &str, value: &str) -> SessionResult<()> {
        sqlx::query(
            "INSERT INTO session_kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> SessionResult<()> {
        sqlx::query("DELETE FROM session_kv WHERE key = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn read_flag(&self, key: &str) -> SessionResult<bool> {
        Ok(self.read(key).await?.as_deref() == Some("true"))
    }

    async fn write_flag(&self, key: &str, value: bool) -> SessionResult<()> {
        self.write(key, if value { "true" } else { "false" }).await
    }

    async fn write_user(&self, user: &SessionUser) -> SessionResult<()> {
        let json = serde_json::to_string(user).map_err(|source| SessionError::Malformed {
            key: USER_KEY,
            source,
        })?;
        self.write(USER_KEY, &json).await
    }

    /// Everything the front end restores at startup. Missing keys fall back
    /// to defaults.
    pub async fn load(&self) -> SessionResult<SessionState> {
        let user = match self.read(USER_KEY).await? {
            Some(raw) => Some(serde_json::from_str::<SessionUser>(&raw).map_err(|source| {
                SessionError::Malformed {
                    key: USER_KEY,
                    source,
                }
            })?),
            None => None,
        };

        Ok(SessionState {
            user,
            power_mode: self.read_flag(POWER_MODE_KEY).await?,
            onboarding_completed: self.read_flag(ONBOARDING_KEY).await?,
        })
    }

    pub async fn login(&self, user: &SessionUser) -> SessionResult<SessionState> {
        self.write_user(user).await?;
        debug!("session stored for {}", user.email);
        self.load().await
    }

    pub async fn update_plan(&self, plan: PlanType) -> SessionResult<SessionState> {
        let mut state = self.load().await?;
        let user = state.user.as_mut().ok_or(SessionError::NotSignedIn)?;
        user.plan = plan;
        self.write_user(user).await?;
        Ok(state)
    }

    /// Forget the user and the onboarding flag. Power mode survives.
    pub async fn logout(&self) -> SessionResult<SessionState> {
        self.remove(USER_KEY).await?;
        self.remove(ONBOARDING_KEY).await?;
        self.load().await
    }

    pub async fn set_power_mode(&self, enabled: bool) -> SessionResult<SessionState> {
        self.write_flag(POWER_MODE_KEY, enabled).await?;
        self.load().await
    }

    pub async fn complete_onboarding(&self) -> SessionResult<SessionState> {
        self.write_flag(ONBOARDING_KEY, true).await?;
        self.load().await
    }

    /// Connectivity check used by `/readyz`.
    pub async fn ping(&self) -> SessionResult<i64> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(value)
    }
}
