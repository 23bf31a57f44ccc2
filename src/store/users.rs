use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{AuthProvider, User, UserStatus};

/// Fields required to create a user on first login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub firebase_uid: String,
    pub provider: AuthProvider,
    pub avatar: Option<String>,
}

/// Explicit patch applied on update. `None` fields keep the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("user with firebase uid {0} already exists")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

const USER_COLUMNS: &str =
    "id, email, name, avatar, firebase_uid, provider, status, created_at, updated_at";

type UserRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    String,
);

/// SQLite-backed user directory.
///
/// The connection mutex is the only shared mutable state in the process;
/// read-modify-write updates hold it for the whole operation.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                avatar TEXT,
                firebase_uid TEXT NOT NULL UNIQUE,
                provider TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'ACTIVE',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at)",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Login-time lookup by the provider's subject id.
    pub fn find_by_firebase_uid(&self, firebase_uid: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        get_by_firebase_uid(&conn, firebase_uid)
    }

    pub fn find_by_id(&self, id: &str) -> Result<User, StoreError> {
        let conn = self.lock()?;
        get_by_id(&conn, id)
    }

    /// Insert a new user with `status = ACTIVE` and fresh timestamps.
    ///
    /// The UNIQUE constraint on `firebase_uid` turns a concurrent duplicate
    /// insert into `Conflict`; callers racing on first login fall back to
    /// the update path.
    pub fn create(&self, data: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: data.email,
            name: data.name,
            avatar: data.avatar,
            firebase_uid: data.firebase_uid,
            provider: data.provider,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO users (id, email, name, avatar, firebase_uid, provider, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.email,
                user.name,
                user.avatar,
                user.firebase_uid,
                user.provider.as_str(),
                user.status.as_str(),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict(user.firebase_uid))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    /// Merge non-null patch fields into the user and bump `updated_at`.
    pub fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let current = get_by_id(&conn, id)?;
        apply_patch(&conn, current, patch)
    }

    /// Same merge semantics keyed by the provider subject id; used on repeat
    /// login to refresh profile fields.
    pub fn update_by_firebase_uid(
        &self,
        firebase_uid: &str,
        patch: UserPatch,
    ) -> Result<User, StoreError> {
        let conn = self.lock()?;
        let current = get_by_firebase_uid(&conn, firebase_uid)?
            .ok_or_else(|| StoreError::NotFound(firebase_uid.to_string()))?;
        apply_patch(&conn, current, patch)
    }

    /// Delete a user row. Repeated deletion is not idempotent: a second call
    /// fails `NotFound`.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!("User {} deleted", id);
        Ok(())
    }

    pub fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut users = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
            users.push(into_user(raw)?);
        }
        Ok(users)
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn get_by_id(conn: &Connection, id: &str) -> Result<User, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?;
    match raw {
        Some(raw) => into_user(raw),
        None => Err(StoreError::NotFound(id.to_string())),
    }
}

fn get_by_firebase_uid(conn: &Connection, firebase_uid: &str) -> Result<Option<User>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE firebase_uid = ?1"),
            params![firebase_uid],
            read_row,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?;
    raw.map(into_user).transpose()
}

fn apply_patch(conn: &Connection, current: User, patch: UserPatch) -> Result<User, StoreError> {
    let mut updated = current;
    if let Some(name) = patch.name {
        updated.name = name;
    }
    if let Some(avatar) = patch.avatar {
        updated.avatar = Some(avatar);
    }
    if let Some(status) = patch.status {
        updated.status = status;
    }
    updated.updated_at = Utc::now();

    conn.execute(
        "UPDATE users SET name = ?1, avatar = ?2, status = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            updated.name,
            updated.avatar,
            updated.status.as_str(),
            updated.updated_at.to_rfc3339(),
            updated.id,
        ],
    )
    .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(updated)
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn into_user(raw: UserRow) -> Result<User, StoreError> {
    Ok(User {
        id: raw.0,
        email: raw.1,
        name: raw.2,
        avatar: raw.3,
        firebase_uid: raw.4,
        provider: AuthProvider::parse(&raw.5),
        status: UserStatus::parse(&raw.6),
        created_at: parse_timestamp(&raw.7)?,
        updated_at: parse_timestamp(&raw.8)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("bad timestamp {s}: {e}")))
}
