//! SQLite-backed store
//!
//! Persists users, rooms and messages in a single SQLite database.
//! The connection is shared behind a mutex and every statement runs on the
//! blocking thread pool so async callers never stall the runtime.
//!
//! # Schema
//! - `users(id, username UNIQUE, password_hash, created_at)`
//! - `rooms(name PRIMARY KEY, created_at)`
//! - `messages(id, room, author, body, created_at)` indexed by `(room, created_at, id)`
//!
//! Timestamps are stored as Unix milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::error::{StoreError, StoreResult};
use super::types::{now_millis, Message, NewMessage, Room, RoomId, User};
use super::MessageStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rooms (
        name TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room TEXT NOT NULL REFERENCES rooms(name),
        author TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(room, created_at, id);
";

/// SQLite implementation of the chat store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = ?path, "Store schema ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
            f(&mut guard)
        })
        .await?
    }

    /// Check that the database answers a trivial query
    pub async fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    // ============================================
    // ROOMS
    // ============================================

    /// Create a room; fails with `Conflict` if the name is taken
    pub async fn create_room(&self, name: RoomId) -> StoreResult<Room> {
        let created_at = now_millis();
        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO rooms (name, created_at) VALUES (?1, ?2)",
                params![name.as_str(), created_at.timestamp_millis()],
            );

            match result {
                Ok(_) => Ok(Room { name, created_at }),
                Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                    "room '{}'",
                    name
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// Look up a room by name
    pub async fn get_room(&self, name: &RoomId) -> StoreResult<Option<Room>> {
        let name = name.clone();
        self.with_conn(move |conn| {
            let created_at = conn
                .query_row(
                    "SELECT created_at FROM rooms WHERE name = ?1",
                    params![name.as_str()],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;

            Ok(created_at.map(|ms| Room {
                name,
                created_at: from_millis(ms),
            }))
        })
        .await
    }

    /// List all rooms, oldest first
    pub async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT name, created_at FROM rooms ORDER BY created_at, name")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut rooms = Vec::new();
            for row in rows {
                let (name, created_at) = row?;
                rooms.push(Room {
                    name: RoomId::parse(name)?,
                    created_at: from_millis(created_at),
                });
            }
            Ok(rooms)
        })
        .await
    }

    // ============================================
    // USERS
    // ============================================

    /// Insert a user; fails with `Conflict` if the username is taken
    pub async fn create_user(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        let created_at = now_millis();

        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, created_at.timestamp_millis()],
            );

            match result {
                Ok(_) => Ok(User {
                    id: conn.last_insert_rowid(),
                    username,
                    password_hash,
                    created_at,
                }),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::Conflict(format!("user '{}'", username)))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// Find a user by username
    pub async fn find_user(&self, username: &str) -> StoreResult<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password_hash: row.get(2)?,
                            created_at: from_millis(row.get(3)?),
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn persist(&self, message: NewMessage) -> StoreResult<Message> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM rooms WHERE name = ?1",
                    params![message.room.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Err(StoreError::RoomNotFound(message.room.to_string()));
            }

            tx.execute(
                "INSERT INTO messages (room, author, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    message.room.as_str(),
                    message.author,
                    message.body,
                    message.created_at.timestamp_millis()
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(message.into_message(id))
        })
        .await
    }

    async fn list_by_room(&self, room: &RoomId) -> StoreResult<Vec<Message>> {
        let room = room.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, author, body, created_at FROM messages
                 WHERE room = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![room.as_str()], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    author: row.get(1)?,
                    body: row.get(2)?,
                    room: room.clone(),
                    created_at: from_millis(row.get(3)?),
                })
            })?;

            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
        .await
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn room(name: &str) -> RoomId {
        RoomId::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("roomcast.db");

        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_list_rooms() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.create_room(room("general")).await.unwrap();
        store.create_room(room("random")).await.unwrap();

        let rooms = store.list_rooms().await.unwrap();
        let names: Vec<_> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(rooms.len(), 2);
        assert!(names.contains(&"general"));
        assert!(names.contains(&"random"));

        assert!(store.get_room(&room("general")).await.unwrap().is_some());
        assert!(store.get_room(&room("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_room_conflicts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_room(room("general")).await.unwrap();

        let result = store.create_room(room("general")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_persist_assigns_increasing_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_room(room("general")).await.unwrap();

        let first = store
            .persist(NewMessage::new(room("general"), "alice", "hi"))
            .await
            .unwrap();
        let second = store
            .persist(NewMessage::new(room("general"), "bob", "hello"))
            .await
            .unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.author, "alice");
        assert_eq!(first.room, room("general"));
    }

    #[tokio::test]
    async fn test_persist_unknown_room_fails() {
        let store = SqliteStore::open_in_memory().unwrap();

        let result = store
            .persist(NewMessage::new(room("nowhere"), "alice", "hi"))
            .await;
        assert!(matches!(result, Err(StoreError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_room_is_scoped_and_ordered() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_room(room("general")).await.unwrap();
        store.create_room(room("random")).await.unwrap();

        let a = store
            .persist(NewMessage::new(room("general"), "alice", "one"))
            .await
            .unwrap();
        store
            .persist(NewMessage::new(room("random"), "bob", "elsewhere"))
            .await
            .unwrap();
        let b = store
            .persist(NewMessage::new(room("general"), "carol", "two"))
            .await
            .unwrap();

        let history = store.list_by_room(&room("general")).await.unwrap();
        assert_eq!(history, vec![a, b]);

        let empty = store.list_by_room(&room("missing")).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_users_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let user = store.create_user("alice", "$argon2id$hash").await.unwrap();
        assert_eq!(user.username, "alice");

        let found = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "$argon2id$hash");

        assert!(store.find_user("bob").await.unwrap().is_none());

        let dup = store.create_user("alice", "other").await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomcast.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_room(room("general")).await.unwrap();
            store
                .persist(NewMessage::new(room("general"), "alice", "persisted"))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let history = store.list_by_room(&room("general")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "persisted");
    }
}
