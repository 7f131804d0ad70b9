//! Identity provider boundary.
//!
//! Login credentials, roles and sessions live outside the school store. The
//! daemon only talks to them through [`IdentityProvider`]; the bundled
//! [`LocalDirectory`] keeps them in a separate SQLite file in the workspace,
//! so store writes and identity writes are never in the same transaction.

use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

pub const DIRECTORY_FILE: &str = "identity.sqlite3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Student, Role::Parent];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

/// Who is making the current request. `role` is `None` when the provider
/// knows the user but carries no recognised role for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Option<Role>,
}

impl Identity {
    pub fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub role: Option<Role>,
    pub expires_at: String,
}

/// A user as stored by the provider. Credential fields are opaque to callers
/// and only travel back into [`IdentityProvider::restore_user`].
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    password_hash: String,
    salt: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UserPatch {
    pub username: String,
    /// `None` keeps the current password.
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity store: {0}")]
    Store(#[from] rusqlite::Error),
}

pub trait IdentityProvider: Send {
    fn resolve_session(&self, token: &str) -> Result<Option<Identity>, IdentityError>;
    fn sign_in(
        &self,
        username: &str,
        password: &str,
        ttl: Duration,
    ) -> Result<Session, IdentityError>;
    fn sign_out(&self, token: &str) -> Result<(), IdentityError>;
    fn role_exists(&self, role: Role) -> Result<bool, IdentityError>;

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>, IdentityError>;
    fn create_user(&self, user: &NewUser) -> Result<String, IdentityError>;
    fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), IdentityError>;
    /// Writes a previously captured record back verbatim (compensation path).
    fn restore_user(&self, record: &UserRecord) -> Result<(), IdentityError>;
    fn delete_user(&self, id: &str) -> Result<(), IdentityError>;
}

pub struct LocalDirectory {
    conn: Connection,
}

impl LocalDirectory {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(DIRECTORY_FILE))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                role TEXT,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions(
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
            [],
        )?;
        Ok(Self { conn })
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn map_unique(e: rusqlite::Error) -> IdentityError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
            IdentityError::UsernameTaken
        }
        _ => IdentityError::Store(e),
    }
}

impl IdentityProvider for LocalDirectory {
    fn resolve_session(&self, token: &str) -> Result<Option<Identity>, IdentityError> {
        let row: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT u.id, u.role
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token = ? AND s.expires_at > ?",
                (token, now_stamp()),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(user_id, role)| Identity {
            user_id,
            role: role.as_deref().and_then(Role::parse),
        }))
    }

    fn sign_in(
        &self,
        username: &str,
        password: &str,
        ttl: Duration,
    ) -> Result<Session, IdentityError> {
        let row: Option<(String, Option<String>, String, String)> = self
            .conn
            .query_row(
                "SELECT id, role, password_hash, salt FROM users WHERE username = ?",
                [username],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        let Some((user_id, role, stored_hash, salt)) = row else {
            return Err(IdentityError::InvalidCredentials);
        };
        if hash_password(&salt, password) != stored_hash {
            return Err(IdentityError::InvalidCredentials);
        }

        // Drop this user's stale sessions while we are here.
        self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ? AND expires_at <= ?",
            (&user_id, now_stamp()),
        )?;

        let token = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "INSERT INTO sessions(token, user_id, expires_at) VALUES(?, ?, ?)",
            (&token, &user_id, &expires_at),
        )?;
        Ok(Session {
            token,
            user_id,
            role: role.as_deref().and_then(Role::parse),
            expires_at,
        })
    }

    fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?", [token])?;
        Ok(())
    }

    fn role_exists(&self, role: Role) -> Result<bool, IdentityError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE role = ? LIMIT 1",
                [role.as_str()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>, IdentityError> {
        let rec = self
            .conn
            .query_row(
                "SELECT id, username, first_name, last_name, role, password_hash, salt
                 FROM users WHERE id = ?",
                [id],
                |r| {
                    let role: Option<String> = r.get(4)?;
                    Ok(UserRecord {
                        id: r.get(0)?,
                        username: r.get(1)?,
                        first_name: r.get(2)?,
                        last_name: r.get(3)?,
                        role: role.as_deref().and_then(Role::parse),
                        password_hash: r.get(5)?,
                        salt: r.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    fn create_user(&self, user: &NewUser) -> Result<String, IdentityError> {
        let id = format!("user_{}", Uuid::new_v4().simple());
        let salt = Uuid::new_v4().to_string();
        let hash = hash_password(&salt, &user.password);
        self.conn
            .execute(
                "INSERT INTO users(id, username, first_name, last_name, role, password_hash, salt)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &user.username,
                    &user.first_name,
                    &user.last_name,
                    user.role.as_str(),
                    &hash,
                    &salt,
                ),
            )
            .map_err(map_unique)?;
        Ok(id)
    }

    fn update_user(&self, id: &str, patch: &UserPatch) -> Result<(), IdentityError> {
        let changed = match &patch.password {
            Some(password) => {
                let salt = Uuid::new_v4().to_string();
                let hash = hash_password(&salt, password);
                self.conn
                    .execute(
                        "UPDATE users
                         SET username = ?, first_name = ?, last_name = ?, password_hash = ?, salt = ?
                         WHERE id = ?",
                        (
                            &patch.username,
                            &patch.first_name,
                            &patch.last_name,
                            &hash,
                            &salt,
                            id,
                        ),
                    )
                    .map_err(map_unique)?
            }
            None => self
                .conn
                .execute(
                    "UPDATE users SET username = ?, first_name = ?, last_name = ? WHERE id = ?",
                    (&patch.username, &patch.first_name, &patch.last_name, id),
                )
                .map_err(map_unique)?,
        };
        if changed == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }

    fn restore_user(&self, record: &UserRecord) -> Result<(), IdentityError> {
        self.conn.execute(
            "INSERT INTO users(id, username, first_name, last_name, role, password_hash, salt)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               username = excluded.username,
               first_name = excluded.first_name,
               last_name = excluded.last_name,
               role = excluded.role,
               password_hash = excluded.password_hash,
               salt = excluded.salt",
            (
                &record.id,
                &record.username,
                &record.first_name,
                &record.last_name,
                record.role.map(Role::as_str),
                &record.password_hash,
                &record.salt,
            ),
        )?;
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?", [id])?;
        let n = tx.execute("DELETE FROM users WHERE id = ?", [id])?;
        if n == 0 {
            return Err(IdentityError::NotFound);
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> LocalDirectory {
        let ws = std::env::temp_dir().join(format!("schoold-identity-{}", Uuid::new_v4()));
        LocalDirectory::open(&ws).expect("open directory")
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "password123".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role,
        }
    }

    #[test]
    fn sign_in_resolves_role_from_directory() {
        let dir = directory();
        let id = dir.create_user(&new_user("tina", Role::Teacher)).expect("create");
        let session = dir
            .sign_in("tina", "password123", Duration::minutes(10))
            .expect("sign in");
        let who = dir
            .resolve_session(&session.token)
            .expect("resolve")
            .expect("identity");
        assert_eq!(who.user_id, id);
        assert_eq!(who.role, Some(Role::Teacher));
    }

    #[test]
    fn wrong_password_and_expired_sessions_are_rejected() {
        let dir = directory();
        dir.create_user(&new_user("sam", Role::Student)).expect("create");
        assert!(matches!(
            dir.sign_in("sam", "nope-nope", Duration::minutes(10)),
            Err(IdentityError::InvalidCredentials)
        ));
        let expired = dir
            .sign_in("sam", "password123", Duration::minutes(-1))
            .expect("sign in");
        assert!(dir.resolve_session(&expired.token).expect("resolve").is_none());
    }

    #[test]
    fn duplicate_username_is_reported() {
        let dir = directory();
        dir.create_user(&new_user("dup", Role::Parent)).expect("first");
        assert!(matches!(
            dir.create_user(&new_user("dup", Role::Parent)),
            Err(IdentityError::UsernameTaken)
        ));
    }

    #[test]
    fn restore_undoes_an_update() {
        let dir = directory();
        let id = dir.create_user(&new_user("orig", Role::Teacher)).expect("create");
        let before = dir.get_user(&id).expect("get").expect("user");
        dir.update_user(
            &id,
            &UserPatch {
                username: "renamed".to_string(),
                password: Some("another-pass".to_string()),
                first_name: "B".to_string(),
                last_name: "C".to_string(),
            },
        )
        .expect("update");
        dir.restore_user(&before).expect("restore");
        let after = dir.get_user(&id).expect("get").expect("user");
        assert_eq!(after.username, "orig");
        assert!(dir
            .sign_in("orig", "password123", Duration::minutes(5))
            .is_ok());
    }

    #[test]
    fn delete_removes_sessions() {
        let dir = directory();
        let id = dir.create_user(&new_user("gone", Role::Parent)).expect("create");
        let s = dir
            .sign_in("gone", "password123", Duration::minutes(5))
            .expect("sign in");
        dir.delete_user(&id).expect("delete");
        assert!(dir.resolve_session(&s.token).expect("resolve").is_none());
        assert!(matches!(dir.delete_user(&id), Err(IdentityError::NotFound)));
    }
}
