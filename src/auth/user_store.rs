//! User Storage
//! Mission: store and verify user accounts with SQLite

use crate::auth::models::{RoleRecord, User, UserRole};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (role_id) REFERENCES roles(id)
);
"#;

/// Roles available for registration, created at startup if absent
const SEED_ROLES: [&str; 2] = ["ADMIN", "USER"];

/// User storage with SQLite backend
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    /// Create a new user store, initialize the schema, and seed roles
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize user schema")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.seed_roles()?;
        Ok(store)
    }

    /// Insert the seed roles if they do not exist yet (idempotent)
    fn seed_roles(&self) -> Result<()> {
        let conn = self.conn.lock();
        for name in SEED_ROLES {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO roles (id, name) VALUES (?1, ?2)",
                    params![Uuid::new_v4().to_string(), name],
                )
                .with_context(|| format!("Failed to seed role {}", name))?;
            if inserted > 0 {
                info!("Seeded role: {}", name);
            }
        }
        Ok(())
    }

    /// List all roles, ordered by name
    pub fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name FROM roles ORDER BY name ASC")?;

        let roles = stmt
            .query_map([], |row| {
                Ok(RoleRecord {
                    id: parse_uuid(0, row.get(0)?)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roles)
    }

    /// Get a role by id
    pub fn get_role(&self, role_id: &Uuid) -> Result<Option<RoleRecord>> {
        let conn = self.conn.lock();
        let role = conn
            .query_row(
                "SELECT id, name FROM roles WHERE id = ?1",
                params![role_id.to_string()],
                |row| {
                    Ok(RoleRecord {
                        id: parse_uuid(0, row.get(0)?)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(role)
    }

    /// Create a new role. Returns `Ok(None)` if the name is already taken.
    pub fn create_role(&self, name: &str) -> Result<Option<RoleRecord>> {
        let conn = self.conn.lock();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM roles WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Ok(None);
        }

        let role = RoleRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        conn.execute(
            "INSERT INTO roles (id, name) VALUES (?1, ?2)",
            params![role.id.to_string(), role.name],
        )
        .context("Failed to insert role")?;

        info!("Created role: {}", role.name);
        Ok(Some(role))
    }

    /// Get a user by username, with the role name resolved
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.password_hash, u.role_id, r.name, u.created_at
                 FROM users u JOIN roles r ON u.role_id = r.id
                 WHERE u.username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?;

        Ok(user)
    }

    /// Create a new user with a bcrypt-hashed password.
    ///
    /// Returns `Ok(None)` if the username is already taken. The uniqueness
    /// check and the insert run under one connection lock, so concurrent
    /// registrations of the same name cannot both succeed.
    ///
    /// bcrypt hashing is CPU-bound; call from a blocking context.
    pub fn create_user(&self, username: &str, password: &str, role_id: &Uuid) -> Result<Option<User>> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;

        let conn = self.conn.lock();

        let taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Ok(None);
        }

        let role_name: String = conn
            .query_row(
                "SELECT name FROM roles WHERE id = ?1",
                params![role_id.to_string()],
                |row| row.get(0),
            )
            .with_context(|| format!("Unknown role id {}", role_id))?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            role_id: *role_id,
            role: UserRole::from_str(&role_name).unwrap_or(UserRole::User),
            created_at: Utc::now().to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO users (id, username, password_hash, role_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role_id.to_string(),
                user.created_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("Created user: {} ({})", user.username, user.role.as_str());

        Ok(Some(user))
    }

    /// Verify a username/password pair.
    ///
    /// Returns the matching user only if the password checks out; an unknown
    /// username and a wrong password are indistinguishable to the caller.
    ///
    /// bcrypt verification is CPU-bound; call from a blocking context.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_username(username)? else {
            return Ok(None);
        };

        let valid = verify(password, &user.password_hash).context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_name: String = row.get(4)?;
    Ok(User {
        id: parse_uuid(0, row.get(0)?)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role_id: parse_uuid(3, row.get(3)?)?,
        role: UserRole::from_str(&role_name).unwrap_or(UserRole::User),
        created_at: row.get(5)?,
    })
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    fn user_role_id(store: &UserStore) -> Uuid {
        store
            .list_roles()
            .unwrap()
            .into_iter()
            .find(|r| r.name == "USER")
            .unwrap()
            .id
    }

    #[test]
    fn test_roles_seeded() {
        let (store, temp) = create_test_store();

        let roles = store.list_roles().unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ADMIN", "USER"]);

        // Re-opening the same database must not duplicate the seeds
        let reopened = UserStore::new(temp.path().to_str().unwrap()).unwrap();
        assert_eq!(reopened.list_roles().unwrap().len(), 2);
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();
        let role_id = user_role_id(&store);

        let user = store
            .create_user("alice", "password123", &role_id)
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, UserRole::User);

        let retrieved = store.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(retrieved.id, user.id);
        assert_eq!(retrieved.role_id, role_id);
    }

    #[test]
    fn test_password_stored_hashed() {
        let (store, _temp) = create_test_store();
        let role_id = user_role_id(&store);

        let user = store
            .create_user("alice", "secret1", &role_id)
            .unwrap()
            .unwrap();

        assert_ne!(user.password_hash, "secret1");
        assert!(user.password_hash.starts_with("$2"));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (store, _temp) = create_test_store();
        let role_id = user_role_id(&store);

        assert!(store
            .create_user("alice", "password123", &role_id)
            .unwrap()
            .is_some());
        assert!(store
            .create_user("alice", "other-password", &role_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_verify_credentials() {
        let (store, _temp) = create_test_store();
        let role_id = user_role_id(&store);
        store
            .create_user("alice", "password123", &role_id)
            .unwrap()
            .unwrap();

        // Correct password
        let user = store.verify_credentials("alice", "password123").unwrap();
        assert!(user.is_some());

        // Wrong password and unknown user look the same
        assert!(store
            .verify_credentials("alice", "wrongpassword")
            .unwrap()
            .is_none());
        assert!(store
            .verify_credentials("nonexistent", "password123")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_create_role() {
        let (store, _temp) = create_test_store();

        let role = store.create_role("AUDITOR").unwrap().unwrap();
        assert_eq!(role.name, "AUDITOR");
        assert!(store.get_role(&role.id).unwrap().is_some());

        // Duplicate name rejected
        assert!(store.create_role("AUDITOR").unwrap().is_none());
    }
}
