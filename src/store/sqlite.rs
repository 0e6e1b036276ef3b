use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{
    Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};

use super::schema::SCHEMA;
use super::{Store, Upserted};
use crate::error::{Error, Result};
use crate::stats::average_rating;
use crate::types::Store as StoreRecord;
use crate::types::*;

const USER_COLUMNS: &str =
    "u.id, u.name, u.email, u.password_hash, u.address, u.role, u.created_at, u.updated_at";
const USER_WIDTH: usize = 8;
const STORE_COLUMNS: &str =
    "s.id, s.name, s.email, s.address, s.owner_id, s.created_at, s.updated_at";
const STORE_WIDTH: usize = 7;
const RATING_COLUMNS: &str =
    "r.id, r.store_id, r.user_id, r.rating, r.review, r.created_at, r.updated_at";
const RATING_WIDTH: usize = 7;
/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const SESSION_COLUMNS: &str = "id, token_hash, token_lookup, user_id, created_at, expires_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Useful for tests and demos.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role '{s}'").into()))
    }
}

fn user_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        email: row.get(at + 2)?,
        password_hash: row.get(at + 3)?,
        address: row.get(at + 4)?,
        role: row.get(at + 5)?,
        created_at: parse_datetime(&row.get::<_, String>(at + 6)?),
        updated_at: parse_datetime(&row.get::<_, String>(at + 7)?),
    })
}

fn store_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<StoreRecord> {
    Ok(StoreRecord {
        id: row.get(at)?,
        name: row.get(at + 1)?,
        email: row.get(at + 2)?,
        address: row.get(at + 3)?,
        owner_id: row.get(at + 4)?,
        created_at: parse_datetime(&row.get::<_, String>(at + 5)?),
        updated_at: parse_datetime(&row.get::<_, String>(at + 6)?),
    })
}

fn rating_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: row.get(at)?,
        store_id: row.get(at + 1)?,
        user_id: row.get(at + 2)?,
        rating: row.get(at + 3)?,
        review: row.get(at + 4)?,
        created_at: parse_datetime(&row.get::<_, String>(at + 5)?),
        updated_at: parse_datetime(&row.get::<_, String>(at + 6)?),
    })
}

fn rating_details_from_row(row: &Row<'_>) -> rusqlite::Result<RatingWithDetails> {
    Ok(RatingWithDetails {
        rating: rating_from_row(row, 0)?,
        user: user_from_row(row, RATING_WIDTH)?,
        store: store_from_row(row, RATING_WIDTH + USER_WIDTH)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

/// Builds a LIKE pattern matching `term` anywhere, escaping wildcards.
fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn fetch_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
        params![id],
        |row| user_from_row(row, 0),
    )
    .optional()
    .map_err(Error::from)
}

fn fetch_store(conn: &Connection, id: i64) -> Result<Option<StoreRecord>> {
    conn.query_row(
        &format!("SELECT {STORE_COLUMNS} FROM stores s WHERE s.id = ?1"),
        params![id],
        |row| store_from_row(row, 0),
    )
    .optional()
    .map_err(Error::from)
}

fn fetch_rating(conn: &Connection, id: i64) -> Result<Option<Rating>> {
    conn.query_row(
        &format!("SELECT {RATING_COLUMNS} FROM ratings r WHERE r.id = ?1"),
        params![id],
        |row| rating_from_row(row, 0),
    )
    .optional()
    .map_err(Error::from)
}

fn query_ratings(conn: &Connection, filter_sql: &str, values: &[i64]) -> Result<Vec<Rating>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RATING_COLUMNS} FROM ratings r {filter_sql}
         ORDER BY r.created_at DESC, r.id DESC"
    ))?;

    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        rating_from_row(row, 0)
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn query_rating_details(
    conn: &Connection,
    filter_sql: &str,
    values: &[i64],
) -> Result<Vec<RatingWithDetails>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RATING_COLUMNS}, {USER_COLUMNS}, {STORE_COLUMNS}
         FROM ratings r
         JOIN users u ON u.id = r.user_id
         JOIN stores s ON s.id = r.store_id
         {filter_sql}"
    ))?;

    let rows = stmt.query_map(params_from_iter(values.iter()), rating_details_from_row)?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn();
        let now = format_datetime(&Utc::now());
        let result = conn.execute(
            "INSERT INTO users (name, email, password_hash, address, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user.name,
                user.email,
                user.password_hash,
                user.address,
                user.role,
                now,
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(Error::AlreadyExists);
            }
            Err(e) => return Err(Error::from(e)),
        }

        fetch_user(&conn, conn.last_insert_rowid())?.ok_or(Error::NotFound)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        fetch_user(&self.conn(), id)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1"),
            params![email],
            |row| user_from_row(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE (?1 IS NULL OR u.name LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\')
               AND (?2 IS NULL OR u.role = ?2)
             ORDER BY u.created_at DESC, u.id DESC"
        ))?;

        let rows = stmt.query_map(
            params![like_pattern(filter.search.as_deref()), filter.role],
            |row| user_from_row(row, 0),
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_users(&self) -> Result<i64> {
        count_rows(&self.conn(), "users")
    }

    fn has_admin(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![Role::Admin],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn delete_user_cascade(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM ratings WHERE user_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM ratings WHERE store_id IN (SELECT id FROM stores WHERE owner_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM stores WHERE owner_id = ?1", params![id])?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // Store operations

    fn create_store(&self, fields: &StoreFields) -> Result<StoreRecord> {
        let conn = self.conn();
        let now = format_datetime(&Utc::now());
        conn.execute(
            "INSERT INTO stores (name, email, address, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![fields.name, fields.email, fields.address, fields.owner_id, now],
        )?;

        fetch_store(&conn, conn.last_insert_rowid())?.ok_or(Error::NotFound)
    }

    fn get_store(&self, id: i64) -> Result<Option<StoreRecord>> {
        fetch_store(&self.conn(), id)
    }

    fn get_store_with_ratings(&self, id: i64) -> Result<Option<StoreWithRatings>> {
        let conn = self.conn();
        let Some(store) = fetch_store(&conn, id)? else {
            return Ok(None);
        };

        let ratings = query_ratings(&conn, "WHERE r.store_id = ?1", &[id])?;
        let owner = fetch_user(&conn, store.owner_id)?;
        let values: Vec<i64> = ratings.iter().map(|r| r.rating).collect();

        Ok(Some(StoreWithRatings {
            average_rating: average_rating(&values),
            total_ratings: ratings.len() as i64,
            store,
            ratings,
            owner,
        }))
    }

    fn update_store(&self, id: i64, fields: &StoreFields) -> Result<Option<StoreRecord>> {
        let conn = self.conn();
        let rows = conn.execute(
            "UPDATE stores SET name = ?1, email = ?2, address = ?3, owner_id = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                fields.name,
                fields.email,
                fields.address,
                fields.owner_id,
                format_datetime(&Utc::now()),
                id
            ],
        )?;

        if rows == 0 {
            return Ok(None);
        }
        fetch_store(&conn, id)
    }

    fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<StoreSummary>> {
        let order = match filter.sort {
            StoreSort::Name => "s.name COLLATE NOCASE, s.id",
            StoreSort::Rating => "average_rating DESC, total_ratings DESC, s.name COLLATE NOCASE",
            StoreSort::Newest => "s.created_at DESC, s.id DESC",
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STORE_COLUMNS},
                    COALESCE(AVG(r.rating), 0.0) AS average_rating,
                    COUNT(r.id) AS total_ratings
             FROM stores s
             LEFT JOIN ratings r ON r.store_id = s.id
             WHERE (?1 IS NULL OR s.name LIKE ?1 ESCAPE '\\' OR s.address LIKE ?1 ESCAPE '\\')
             GROUP BY s.id
             ORDER BY {order}"
        ))?;

        let rows = stmt.query_map(params![like_pattern(filter.search.as_deref())], |row| {
            Ok(StoreSummary {
                store: store_from_row(row, 0)?,
                average_rating: row.get(STORE_WIDTH)?,
                total_ratings: row.get(STORE_WIDTH + 1)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_stores_by_owner(&self, owner_id: i64) -> Result<Vec<StoreRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STORE_COLUMNS} FROM stores s WHERE s.owner_id = ?1 ORDER BY s.name COLLATE NOCASE, s.id"
        ))?;

        let rows = stmt.query_map(params![owner_id], |row| store_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_recent_stores(&self, limit: i64) -> Result<Vec<StoreWithOwner>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STORE_COLUMNS}, {USER_COLUMNS}
             FROM stores s
             LEFT JOIN users u ON u.id = s.owner_id
             ORDER BY s.created_at DESC, s.id DESC
             LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], |row| {
            let owner_id: Option<i64> = row.get(STORE_WIDTH)?;
            Ok(StoreWithOwner {
                store: store_from_row(row, 0)?,
                owner: match owner_id {
                    Some(_) => Some(user_from_row(row, STORE_WIDTH)?),
                    None => None,
                },
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_stores(&self) -> Result<i64> {
        count_rows(&self.conn(), "stores")
    }

    fn delete_store_cascade(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute("DELETE FROM ratings WHERE store_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM stores WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // Rating operations

    fn get_rating(&self, id: i64) -> Result<Option<Rating>> {
        fetch_rating(&self.conn(), id)
    }

    fn get_rating_by_user_and_store(
        &self,
        user_id: i64,
        store_id: i64,
    ) -> Result<Option<Rating>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {RATING_COLUMNS} FROM ratings r WHERE r.user_id = ?1 AND r.store_id = ?2"),
            params![user_id, store_id],
            |row| rating_from_row(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn upsert_rating(&self, fields: &RatingFields) -> Result<(Rating, Upserted)> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = format_datetime(&Utc::now());

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM ratings WHERE user_id = ?1 AND store_id = ?2",
                params![fields.user_id, fields.store_id],
                |row| row.get(0),
            )
            .optional()?;

        let (id, outcome) = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE ratings SET rating = ?1, review = ?2, updated_at = ?3 WHERE id = ?4",
                    params![fields.rating, fields.review, now, id],
                )?;
                (id, Upserted::Updated)
            }
            None => {
                tx.execute(
                    "INSERT INTO ratings (store_id, user_id, rating, review, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![
                        fields.store_id,
                        fields.user_id,
                        fields.rating,
                        fields.review,
                        now
                    ],
                )?;
                (tx.last_insert_rowid(), Upserted::Created)
            }
        };

        let rating = fetch_rating(&tx, id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok((rating, outcome))
    }

    fn list_ratings(&self) -> Result<Vec<Rating>> {
        query_ratings(&self.conn(), "", &[])
    }

    fn list_ratings_by_user(&self, user_id: i64) -> Result<Vec<Rating>> {
        query_ratings(&self.conn(), "WHERE r.user_id = ?1", &[user_id])
    }

    fn list_ratings_by_store(&self, store_id: i64) -> Result<Vec<Rating>> {
        query_ratings(&self.conn(), "WHERE r.store_id = ?1", &[store_id])
    }

    fn list_ratings_by_stores(&self, store_ids: &[i64]) -> Result<Vec<Rating>> {
        if store_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!("WHERE r.store_id IN ({})", placeholders(store_ids.len()));
        query_ratings(&self.conn(), &filter, store_ids)
    }

    fn list_recent_ratings(&self, limit: i64) -> Result<Vec<RatingWithDetails>> {
        query_rating_details(
            &self.conn(),
            "ORDER BY r.created_at DESC, r.id DESC LIMIT ?1",
            &[limit],
        )
    }

    fn list_recent_ratings_by_stores(
        &self,
        store_ids: &[i64],
        limit: i64,
    ) -> Result<Vec<RatingWithDetails>> {
        if store_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = format!(
            "WHERE r.store_id IN ({}) ORDER BY r.created_at DESC, r.id DESC LIMIT ?",
            placeholders(store_ids.len())
        );
        let mut values = store_ids.to_vec();
        values.push(limit);
        query_rating_details(&self.conn(), &filter, &values)
    }

    fn count_ratings(&self) -> Result<i64> {
        count_rows(&self.conn(), "ratings")
    }

    fn delete_rating(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM ratings WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::SessionLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_lookup = ?1"),
            params![lookup],
            session_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_expired_sessions(&self) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![format_datetime(&Utc::now())],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn new_user(store: &SqliteStore, email: &str, role: Role) -> User {
        store
            .create_user(&NewUser {
                name: "A Sufficiently Long User Name".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                address: "1 Main St".to_string(),
                role,
            })
            .unwrap()
    }

    fn new_store(store: &SqliteStore, name: &str, owner_id: i64) -> StoreRecord {
        store
            .create_store(&StoreFields {
                name: name.to_string(),
                email: "shop@example.com".to_string(),
                address: "2 Market St".to_string(),
                owner_id,
            })
            .unwrap()
    }

    fn rate(store: &SqliteStore, user_id: i64, store_id: i64, rating: i64) -> (Rating, Upserted) {
        store
            .upsert_rating(&RatingFields {
                store_id,
                user_id,
                rating,
                review: None,
            })
            .unwrap()
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["users", "stores", "ratings", "sessions"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        store.initialize().unwrap();
    }

    #[test]
    fn test_user_crud() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let user = new_user(&store, "owner@example.com", Role::StoreOwner);
        assert_eq!(user.role, Role::StoreOwner);

        let fetched = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(fetched.email, "owner@example.com");

        let by_email = store
            .get_user_by_email("OWNER@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(store.get_user(9999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        new_user(&store, "dup@example.com", Role::User);
        let result = store.create_user(&NewUser {
            name: "Another Sufficiently Long Name".to_string(),
            email: "dup@example.com".to_string(),
            password_hash: "hash".to_string(),
            address: String::new(),
            role: Role::User,
        });
        assert!(matches!(result, Err(Error::AlreadyExists)));
    }

    #[test]
    fn test_list_users_filters() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        new_user(&store, "alice@example.com", Role::User);
        new_user(&store, "bob@shops.test", Role::StoreOwner);
        new_user(&store, "root@example.com", Role::Admin);

        let all = store.list_users(&UserFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].email, "root@example.com");

        let owners = store
            .list_users(&UserFilter {
                search: None,
                role: Some(Role::StoreOwner),
            })
            .unwrap();
        assert_eq!(owners.len(), 1);

        let searched = store
            .list_users(&UserFilter {
                search: Some("EXAMPLE".to_string()),
                role: None,
            })
            .unwrap();
        assert_eq!(searched.len(), 2);

        assert!(store.has_admin().unwrap());
        assert_eq!(store.count_users().unwrap(), 3);
    }

    #[test]
    fn test_rating_upsert_updates_in_place() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let rater = new_user(&store, "rater@example.com", Role::User);
        let shop = new_store(&store, "Corner Shop", owner.id);

        let (first, outcome) = store
            .upsert_rating(&RatingFields {
                store_id: shop.id,
                user_id: rater.id,
                rating: 4,
                review: Some("ok".to_string()),
            })
            .unwrap();
        assert_eq!(outcome, Upserted::Created);

        let (second, outcome) = rate(&store, rater.id, shop.id, 2);
        assert_eq!(outcome, Upserted::Updated);
        assert_eq!(second.id, first.id);
        assert_eq!(second.rating, 2);
        assert_eq!(second.review, None);

        assert_eq!(store.list_ratings_by_store(shop.id).unwrap().len(), 1);
        assert_eq!(store.count_ratings().unwrap(), 1);

        let by_key = store
            .get_rating_by_user_and_store(rater.id, shop.id)
            .unwrap()
            .unwrap();
        assert_eq!(by_key.id, first.id);
        assert_eq!(by_key.rating, 2);
        assert!(
            store
                .get_rating_by_user_and_store(owner.id, shop.id)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_concurrent_upserts_keep_one_row() {
        const WRITERS: i64 = 8;

        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let rater = new_user(&store, "rater@example.com", Role::User);
        let shop = new_store(&store, "Busy Shop", owner.id);

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(WRITERS as usize));
        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                // Each writer has its own connection to the same file.
                let writer = SqliteStore::new(temp.path().join("test.db")).unwrap();
                let barrier = barrier.clone();
                let (user_id, store_id) = (rater.id, shop.id);
                std::thread::spawn(move || {
                    barrier.wait();
                    rate(&writer, user_id, store_id, i % 5 + 1).1
                })
            })
            .collect();

        let outcomes: Vec<Upserted> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created = outcomes.iter().filter(|o| **o == Upserted::Created).count();
        let updated = outcomes.iter().filter(|o| **o == Upserted::Updated).count();
        assert_eq!(created, 1);
        assert_eq!(updated, WRITERS as usize - 1);

        assert_eq!(store.list_ratings_by_store(shop.id).unwrap().len(), 1);
        assert!(
            store
                .get_rating_by_user_and_store(rater.id, shop.id)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_store_with_ratings_aggregates() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let shop = new_store(&store, "Empty Shop", owner.id);

        let empty = store.get_store_with_ratings(shop.id).unwrap().unwrap();
        assert_eq!(empty.total_ratings, 0);
        assert_eq!(empty.average_rating, 0.0);
        assert_eq!(empty.owner.unwrap().id, owner.id);

        let a = new_user(&store, "a@example.com", Role::User);
        let b = new_user(&store, "b@example.com", Role::User);
        rate(&store, a.id, shop.id, 5);
        rate(&store, b.id, shop.id, 2);

        let rated = store.get_store_with_ratings(shop.id).unwrap().unwrap();
        assert_eq!(rated.total_ratings, 2);
        assert_eq!(rated.average_rating, 3.5);

        assert!(store.get_store_with_ratings(99).unwrap().is_none());
    }

    #[test]
    fn test_list_stores_search_and_sort() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let rater = new_user(&store, "rater@example.com", Role::User);
        let zed = new_store(&store, "Zed Books", owner.id);
        new_store(&store, "apple market", owner.id);
        rate(&store, rater.id, zed.id, 5);

        let by_name = store.list_stores(&StoreFilter::default()).unwrap();
        let names: Vec<_> = by_name.iter().map(|s| s.store.name.as_str()).collect();
        assert_eq!(names, vec!["apple market", "Zed Books"]);
        assert_eq!(by_name[0].total_ratings, 0);
        assert_eq!(by_name[0].average_rating, 0.0);

        let by_rating = store
            .list_stores(&StoreFilter {
                search: None,
                sort: StoreSort::Rating,
            })
            .unwrap();
        assert_eq!(by_rating[0].store.id, zed.id);
        assert_eq!(by_rating[0].average_rating, 5.0);

        let searched = store
            .list_stores(&StoreFilter {
                search: Some("market st".to_string()),
                sort: StoreSort::Name,
            })
            .unwrap();
        assert_eq!(searched.len(), 2);

        let none = store
            .list_stores(&StoreFilter {
                search: Some("100%".to_string()),
                sort: StoreSort::Name,
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_update_store_full_replace() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let shop = new_store(&store, "Old Name", owner.id);

        let updated = store
            .update_store(
                shop.id,
                &StoreFields {
                    name: "New Name".to_string(),
                    email: "new@example.com".to_string(),
                    address: String::new(),
                    owner_id: owner.id,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.address, "");
        assert_eq!(updated.created_at, shop.created_at);

        let missing = store
            .update_store(
                999,
                &StoreFields {
                    name: "x".to_string(),
                    email: "x@example.com".to_string(),
                    address: String::new(),
                    owner_id: owner.id,
                },
            )
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_delete_user_cascade() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let other_owner = new_user(&store, "other@example.com", Role::StoreOwner);
        let raters: Vec<User> = (0..3)
            .map(|i| new_user(&store, &format!("r{i}@example.com"), Role::User))
            .collect();

        let first = new_store(&store, "First", owner.id);
        let second = new_store(&store, "Second", owner.id);
        let unrelated = new_store(&store, "Unrelated", other_owner.id);

        rate(&store, raters[0].id, first.id, 5);
        rate(&store, raters[1].id, first.id, 4);
        rate(&store, raters[2].id, first.id, 3);
        rate(&store, raters[0].id, second.id, 2);
        rate(&store, raters[1].id, second.id, 1);
        // The owner's own rating on someone else's store goes too.
        rate(&store, owner.id, unrelated.id, 5);
        rate(&store, raters[2].id, unrelated.id, 4);

        assert!(store.delete_user_cascade(owner.id).unwrap());

        let conn = store.conn();
        let referencing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ratings WHERE user_id = ?1 OR store_id IN (?2, ?3)",
                params![owner.id, first.id, second.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(referencing, 0);
        let stores: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM stores WHERE owner_id = ?1",
                params![owner.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stores, 0);
        drop(conn);

        assert!(store.get_user(owner.id).unwrap().is_none());
        assert_eq!(store.list_ratings_by_store(unrelated.id).unwrap().len(), 1);
        assert!(!store.delete_user_cascade(owner.id).unwrap());
    }

    #[test]
    fn test_delete_store_cascade() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let rater = new_user(&store, "rater@example.com", Role::User);
        let shop = new_store(&store, "Doomed", owner.id);
        rate(&store, rater.id, shop.id, 3);

        assert!(store.delete_store_cascade(shop.id).unwrap());
        assert!(store.get_store(shop.id).unwrap().is_none());
        assert!(store.list_ratings_by_user(rater.id).unwrap().is_empty());
        assert!(!store.delete_store_cascade(shop.id).unwrap());
    }

    #[test]
    fn test_recent_ratings_by_stores() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        let shop = new_store(&store, "Busy", owner.id);
        let quiet = new_store(&store, "Quiet", owner.id);
        for i in 0..4 {
            let rater = new_user(&store, &format!("r{i}@example.com"), Role::User);
            rate(&store, rater.id, shop.id, 1 + i);
        }

        let recent = store
            .list_recent_ratings_by_stores(&[shop.id, quiet.id], 3)
            .unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].rating.rating, 4);
        assert_eq!(recent[0].store.id, shop.id);
        assert!(recent[0].user.email.starts_with('r'));

        assert!(store.list_recent_ratings_by_stores(&[], 3).unwrap().is_empty());
        assert_eq!(store.list_ratings_by_stores(&[shop.id, quiet.id]).unwrap().len(), 4);
        assert_eq!(store.list_recent_ratings(10).unwrap().len(), 4);
    }

    #[test]
    fn test_recent_stores_include_owner() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let owner = new_user(&store, "owner@example.com", Role::StoreOwner);
        new_store(&store, "One", owner.id);
        new_store(&store, "Two", owner.id);

        let recent = store.list_recent_stores(5).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].store.name, "Two");
        assert_eq!(recent[0].owner.as_ref().unwrap().id, owner.id);
    }

    #[test]
    fn test_session_lookup_collision_and_expiry() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let user = new_user(&store, "user@example.com", Role::User);

        let now = Utc::now();
        let session = Session {
            id: "session-1".to_string(),
            token_hash: "hash1".to_string(),
            token_lookup: "lookup12".to_string(),
            user_id: user.id,
            created_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
        };
        store.create_session(&session).unwrap();

        let clash = Session {
            id: "session-2".to_string(),
            ..session.clone()
        };
        assert!(matches!(
            store.create_session(&clash),
            Err(Error::SessionLookupCollision)
        ));

        let fetched = store.get_session_by_lookup("lookup12").unwrap().unwrap();
        assert_eq!(fetched.user_id, user.id);

        assert_eq!(store.delete_expired_sessions().unwrap(), 1);
        assert!(store.get_session_by_lookup("lookup12").unwrap().is_none());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("a_b%")).as_deref(), Some("%a\\_b\\%%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
