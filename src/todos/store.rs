//! Todo Storage
//! Mission: owner-scoped todo persistence with SQLite
//!
//! Every row access carries an `owner_id` predicate, so rows belonging to
//! other users are never fetched. Mutations check ownership before writing.
//! A missing row and a row owned by someone else are indistinguishable to
//! callers of this store.

use crate::todos::models::{Label, Priority, TodoDraft, TodoRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS labels (
    id TEXT PRIMARY KEY,
    title TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS todos (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT NOT NULL DEFAULT 'LOW',
    is_done INTEGER NOT NULL DEFAULT 0,
    due_date TEXT,
    label_id TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (label_id) REFERENCES labels(id)
);

CREATE INDEX IF NOT EXISTS idx_todos_owner ON todos(owner_id, is_done);
"#;

/// Labels available out of the box, created at startup if absent
const SEED_LABELS: [&str; 2] = ["Work", "Personal"];

const SELECT_COLUMNS: &str = "t.id, t.owner_id, t.title, t.description, t.priority, t.is_done, \
                              t.due_date, l.id, l.title, t.created_at";

/// Todo storage with SQLite backend
pub struct TodoStore {
    conn: Arc<Mutex<Connection>>,
}

/// Result of an owner-checked delete
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Row missing or owned by someone else; the two are not distinguished
    NotAccessible,
    /// Row passed the ownership check but vanished before the delete
    AlreadyGone,
}

impl TodoStore {
    /// Create a new todo store, initialize the schema, and seed labels
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize todo schema")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.seed_labels()?;
        Ok(store)
    }

    /// Insert the seed labels if they do not exist yet (idempotent)
    fn seed_labels(&self) -> Result<()> {
        let conn = self.conn.lock();
        for title in SEED_LABELS {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO labels (id, title) VALUES (?1, ?2)",
                    params![Uuid::new_v4().to_string(), title],
                )
                .with_context(|| format!("Failed to seed label {}", title))?;
            if inserted > 0 {
                info!("Seeded label: {}", title);
            }
        }
        Ok(())
    }

    /// List all labels, ordered by title
    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, title FROM labels ORDER BY title ASC")?;

        let labels = stmt
            .query_map([], |row| {
                Ok(Label {
                    id: parse_uuid(0, row.get(0)?)?,
                    title: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(labels)
    }

    /// Get a label by id
    pub fn get_label(&self, label_id: &Uuid) -> Result<Option<Label>> {
        let conn = self.conn.lock();
        let label = conn
            .query_row(
                "SELECT id, title FROM labels WHERE id = ?1",
                params![label_id.to_string()],
                |row| {
                    Ok(Label {
                        id: parse_uuid(0, row.get(0)?)?,
                        title: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(label)
    }

    /// List the owner's todos: open items first, then by due date with
    /// undated items last, then by creation order.
    pub fn list_for_owner(&self, owner_id: &Uuid) -> Result<Vec<TodoRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS}
             FROM todos t LEFT JOIN labels l ON t.label_id = l.id
             WHERE t.owner_id = ?1
             ORDER BY t.is_done ASC, t.due_date IS NULL, t.due_date ASC, t.created_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;

        let todos = stmt
            .query_map(params![owner_id.to_string()], row_to_todo)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(todos)
    }

    /// Get a single todo by id, visible only to its owner
    pub fn get_for_owner(&self, owner_id: &Uuid, todo_id: &Uuid) -> Result<Option<TodoRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SELECT_COLUMNS}
             FROM todos t LEFT JOIN labels l ON t.label_id = l.id
             WHERE t.id = ?1 AND t.owner_id = ?2"
        );
        let todo = conn
            .query_row(
                &sql,
                params![todo_id.to_string(), owner_id.to_string()],
                row_to_todo,
            )
            .optional()?;

        Ok(todo)
    }

    /// Create a todo owned by the caller
    pub fn create(&self, owner_id: &Uuid, draft: &TodoDraft) -> Result<TodoRecord> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO todos (id, owner_id, title, description, priority, is_done, due_date, label_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    owner_id.to_string(),
                    draft.title,
                    draft.description,
                    draft.priority.as_str(),
                    draft.is_done,
                    draft.due_date.map(|d| d.to_rfc3339()),
                    draft.label_id.map(|l| l.to_string()),
                    created_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert todo")?;
        }

        self.get_for_owner(owner_id, &id)?
            .context("Todo missing immediately after insert")
    }

    /// Replace a todo's mutable fields, if the caller owns it.
    ///
    /// Ownership is checked before anything is written; the write itself is
    /// also owner-filtered. Returns `Ok(None)` when the row is missing or
    /// owned by someone else.
    pub fn update_for_owner(
        &self,
        owner_id: &Uuid,
        todo_id: &Uuid,
        draft: &TodoDraft,
    ) -> Result<Option<TodoRecord>> {
        {
            let conn = self.conn.lock();
            if !owned_row_exists(&conn, owner_id, todo_id)? {
                return Ok(None);
            }

            conn.execute(
                "UPDATE todos
                 SET title = ?1, description = ?2, priority = ?3, is_done = ?4, due_date = ?5, label_id = ?6
                 WHERE id = ?7 AND owner_id = ?8",
                params![
                    draft.title,
                    draft.description,
                    draft.priority.as_str(),
                    draft.is_done,
                    draft.due_date.map(|d| d.to_rfc3339()),
                    draft.label_id.map(|l| l.to_string()),
                    todo_id.to_string(),
                    owner_id.to_string(),
                ],
            )
            .context("Failed to update todo")?;
        }

        self.get_for_owner(owner_id, todo_id)
    }

    /// Delete a todo, if the caller owns it.
    ///
    /// Ownership is checked before the delete; the delete itself is also
    /// owner-filtered.
    pub fn delete_for_owner(&self, owner_id: &Uuid, todo_id: &Uuid) -> Result<DeleteOutcome> {
        let conn = self.conn.lock();
        if !owned_row_exists(&conn, owner_id, todo_id)? {
            return Ok(DeleteOutcome::NotAccessible);
        }

        let deleted = conn
            .execute(
                "DELETE FROM todos WHERE id = ?1 AND owner_id = ?2",
                params![todo_id.to_string(), owner_id.to_string()],
            )
            .context("Failed to delete todo")?;

        if deleted == 0 {
            return Ok(DeleteOutcome::AlreadyGone);
        }

        Ok(DeleteOutcome::Deleted)
    }
}

/// The shared ownership check used by every mutation path
fn owned_row_exists(conn: &Connection, owner_id: &Uuid, todo_id: &Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM todos WHERE id = ?1 AND owner_id = ?2",
            params![todo_id.to_string(), owner_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(found.is_some())
}

fn row_to_todo(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoRecord> {
    let priority: String = row.get(4)?;
    let label = match row.get::<_, Option<String>>(7)? {
        Some(id) => Some(Label {
            id: parse_uuid(7, id)?,
            title: row.get(8)?,
        }),
        None => None,
    };

    Ok(TodoRecord {
        id: parse_uuid(0, row.get(0)?)?,
        user_id: parse_uuid(1, row.get(1)?)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: Priority::from_str(&priority).unwrap_or(Priority::Low),
        is_done: row.get(5)?,
        due_date: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_datetime(6, &s))
            .transpose()?,
        label,
        created_at: parse_datetime(9, &row.get::<_, String>(9)?)?,
    })
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (TodoStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = TodoStore::new(db_path).unwrap();
        (store, temp_file)
    }

    fn draft(title: &str) -> TodoDraft {
        TodoDraft {
            title: title.to_string(),
            description: None,
            priority: Priority::Low,
            is_done: false,
            due_date: None,
            label_id: None,
        }
    }

    fn due(date: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_labels_seeded() {
        let (store, temp) = create_test_store();

        let labels = store.list_labels().unwrap();
        let titles: Vec<&str> = labels.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Personal", "Work"]);

        let reopened = TodoStore::new(temp.path().to_str().unwrap()).unwrap();
        assert_eq!(reopened.list_labels().unwrap().len(), 2);
    }

    #[test]
    fn test_create_and_get_for_owner() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let todo = store.create(&alice, &draft("Buy milk")).unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.user_id, alice);
        assert!(!todo.is_done);
        assert_eq!(todo.priority, Priority::Low);

        // Owner sees the row
        assert!(store.get_for_owner(&alice, &todo.id).unwrap().is_some());

        // Another user gets the same answer as for a nonexistent id
        assert!(store.get_for_owner(&bob, &todo.id).unwrap().is_none());
        assert!(store
            .get_for_owner(&alice, &Uuid::new_v4())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_label_joined_into_record() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let work = store
            .list_labels()
            .unwrap()
            .into_iter()
            .find(|l| l.title == "Work")
            .unwrap();

        let mut d = draft("Slides");
        d.label_id = Some(work.id);
        let todo = store.create(&alice, &d).unwrap();

        let label = todo.label.unwrap();
        assert_eq!(label.id, work.id);
        assert_eq!(label.title, "Work");
    }

    #[test]
    fn test_list_is_owner_scoped() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.create(&alice, &draft("Alice todo")).unwrap();
        store.create(&bob, &draft("Bob todo")).unwrap();

        let alice_todos = store.list_for_owner(&alice).unwrap();
        assert_eq!(alice_todos.len(), 1);
        assert_eq!(alice_todos[0].title, "Alice todo");

        let bob_todos = store.list_for_owner(&bob).unwrap();
        assert_eq!(bob_todos.len(), 1);
        assert_eq!(bob_todos[0].title, "Bob todo");
    }

    #[test]
    fn test_list_ordering() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();

        let mut done = draft("done");
        done.is_done = true;
        done.due_date = Some(due("2025-07-01T00:00:00Z"));
        store.create(&alice, &done).unwrap();

        let mut late = draft("open-late");
        late.due_date = Some(due("2025-07-25T00:00:00Z"));
        store.create(&alice, &late).unwrap();

        store.create(&alice, &draft("open-undated")).unwrap();

        let mut early = draft("open-early");
        early.due_date = Some(due("2025-07-18T00:00:00Z"));
        store.create(&alice, &early).unwrap();

        let titles: Vec<String> = store
            .list_for_owner(&alice)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();

        // Open before done; within open, dated before undated, earliest first
        assert_eq!(titles, vec!["open-early", "open-late", "open-undated", "done"]);
    }

    #[test]
    fn test_update_replaces_all_fields() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let work = store.list_labels().unwrap().remove(1);

        let mut d = draft("Original");
        d.description = Some("with description".to_string());
        d.priority = Priority::High;
        d.due_date = Some(due("2025-07-20T23:59:59Z"));
        d.label_id = Some(work.id);
        let todo = store.create(&alice, &d).unwrap();
        assert!(todo.due_date.is_some());

        // A draft with the optional fields unset wipes them
        let updated = store
            .update_for_owner(&alice, &todo.id, &draft("Replaced"))
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Replaced");
        assert_eq!(updated.description, None);
        assert_eq!(updated.priority, Priority::Low);
        assert_eq!(updated.due_date, None);
        assert!(updated.label.is_none());
    }

    #[test]
    fn test_update_denied_for_non_owner() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let todo = store.create(&alice, &draft("Alice todo")).unwrap();

        // Bob's update is rejected and indistinguishable from a missing row
        assert!(store
            .update_for_owner(&bob, &todo.id, &draft("hijacked"))
            .unwrap()
            .is_none());
        assert!(store
            .update_for_owner(&bob, &Uuid::new_v4(), &draft("hijacked"))
            .unwrap()
            .is_none());

        // Nothing was written
        let unchanged = store.get_for_owner(&alice, &todo.id).unwrap().unwrap();
        assert_eq!(unchanged.title, "Alice todo");
    }

    #[test]
    fn test_toggle_is_done_alternates() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let todo = store.create(&alice, &draft("toggle me")).unwrap();

        for expected in [true, false, true, false] {
            let mut d = draft("toggle me");
            d.is_done = expected;
            let updated = store
                .update_for_owner(&alice, &todo.id, &d)
                .unwrap()
                .unwrap();
            assert_eq!(updated.is_done, expected);
        }
    }

    #[test]
    fn test_delete_outcomes() {
        let (store, _temp) = create_test_store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let todo = store.create(&alice, &draft("doomed")).unwrap();

        // Non-owner delete is rejected without revealing existence
        assert_eq!(
            store.delete_for_owner(&bob, &todo.id).unwrap(),
            DeleteOutcome::NotAccessible
        );
        assert!(store.get_for_owner(&alice, &todo.id).unwrap().is_some());

        assert_eq!(
            store.delete_for_owner(&alice, &todo.id).unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(store.get_for_owner(&alice, &todo.id).unwrap().is_none());

        // Second delete looks like any other inaccessible id
        assert_eq!(
            store.delete_for_owner(&alice, &todo.id).unwrap(),
            DeleteOutcome::NotAccessible
        );
    }
}
