use std::collections::HashMap;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Transaction};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No wheel named **{0}**.")]
    NoSuchWheel(String),
    #[error("Wheel **{0}** already exists.")]
    WheelExists(String),
    #[error("Invalid index.")]
    InvalidIndex,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

impl StoreError {
    /// Whether the error was caused by the command's arguments rather than the database.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StoreError::NoSuchWheel(_) | StoreError::WheelExists(_) | StoreError::InvalidIndex
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub fn open_pool(manager: SqliteConnectionManager) -> anyhow::Result<DbPool> {
    let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().build(manager)?;
    init_db(&pool)?;
    Ok(pool)
}

fn init_db(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    // run migrations
    let tx = conn.transaction()?;
    init_wheels(&tx)?;
    init_filter_keys(&tx)?;
    tx.commit()?;

    Ok(())
}

fn init_wheels(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS wheels (
            guild_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (guild_id, name)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS wheel_options (
            id INTEGER PRIMARY KEY,
            guild_id INTEGER NOT NULL,
            wheel TEXT NOT NULL,
            label TEXT NOT NULL,
            FOREIGN KEY (guild_id, wheel) REFERENCES wheels (guild_id, name) ON DELETE CASCADE
        ) STRICT;

        CREATE INDEX IF NOT EXISTS wheel_options_by_wheel ON wheel_options (guild_id, wheel);

        CREATE TABLE IF NOT EXISTS wheel_images (
            guild_id INTEGER NOT NULL,
            wheel TEXT NOT NULL,
            label TEXT NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (guild_id, wheel, label),
            FOREIGN KEY (guild_id, wheel) REFERENCES wheels (guild_id, name) ON DELETE CASCADE
        ) STRICT;
        ",
    )
}

fn init_filter_keys(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS filter_keys (
            user_id INTEGER PRIMARY KEY,
            api_key TEXT NOT NULL
        ) STRICT;
        ",
    )
}

// sqlite integers are signed; snowflakes are stored bit-for-bit
fn snowflake(id: u64) -> i64 {
    id as i64
}

fn ensure_wheel(conn: &rusqlite::Connection, guild: u64, name: &str) -> StoreResult<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM wheels WHERE guild_id = ?1 AND name = ?2",
            params![snowflake(guild), name],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(StoreError::NoSuchWheel(name.to_string()))
    }
}

pub fn create_wheel(pool: &DbPool, guild: u64, name: &str) -> StoreResult<()> {
    let conn = pool.get()?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO wheels (guild_id, name) VALUES (?1, ?2)",
        params![snowflake(guild), name],
    )?;
    if inserted == 0 {
        return Err(StoreError::WheelExists(name.to_string()));
    }
    Ok(())
}

pub fn delete_wheel(pool: &DbPool, guild: u64, name: &str) -> StoreResult<()> {
    let conn = pool.get()?;
    let deleted = conn.execute(
        "DELETE FROM wheels WHERE guild_id = ?1 AND name = ?2",
        params![snowflake(guild), name],
    )?;
    if deleted == 0 {
        return Err(StoreError::NoSuchWheel(name.to_string()));
    }
    Ok(())
}

/// Every wheel in the guild with its option count, sorted by name.
pub fn list_wheels(pool: &DbPool, guild: u64) -> StoreResult<Vec<(String, usize)>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "
        SELECT w.name, COUNT(o.id)
        FROM wheels w
        LEFT JOIN wheel_options o ON o.guild_id = w.guild_id AND o.wheel = w.name
        WHERE w.guild_id = ?1
        GROUP BY w.name
        ORDER BY w.name
        ",
    )?;
    let rows = stmt
        .query_map(params![snowflake(guild)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Options of a wheel in insertion order.
pub fn wheel_options(pool: &DbPool, guild: u64, name: &str) -> StoreResult<Vec<String>> {
    let conn = pool.get()?;
    ensure_wheel(&conn, guild, name)?;
    let mut stmt = conn.prepare(
        "SELECT label FROM wheel_options WHERE guild_id = ?1 AND wheel = ?2 ORDER BY id",
    )?;
    let labels = stmt
        .query_map(params![snowflake(guild), name], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(labels)
}

pub fn add_options(pool: &DbPool, guild: u64, name: &str, labels: &[String]) -> StoreResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    ensure_wheel(&tx, guild, name)?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO wheel_options (guild_id, wheel, label) VALUES (?1, ?2, ?3)")?;
        for label in labels {
            stmt.execute(params![snowflake(guild), name, label])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Removes the option at the 1-based `index` and returns its label.
///
/// The label's image goes with it once no other option carries that label.
pub fn remove_option(pool: &DbPool, guild: u64, name: &str, index: usize) -> StoreResult<String> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    ensure_wheel(&tx, guild, name)?;
    let offset = index.checked_sub(1).ok_or(StoreError::InvalidIndex)?;
    let (id, label): (i64, String) = tx
        .query_row(
            "
            SELECT id, label FROM wheel_options
            WHERE guild_id = ?1 AND wheel = ?2
            ORDER BY id LIMIT 1 OFFSET ?3
            ",
            params![snowflake(guild), name, offset as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(StoreError::InvalidIndex)?;
    tx.execute("DELETE FROM wheel_options WHERE id = ?1", params![id])?;
    tx.execute(
        "
        DELETE FROM wheel_images
        WHERE guild_id = ?1 AND wheel = ?2 AND label = ?3
        AND NOT EXISTS (
            SELECT 1 FROM wheel_options
            WHERE guild_id = ?1 AND wheel = ?2 AND label = ?3
        )
        ",
        params![snowflake(guild), name, label],
    )?;
    tx.commit()?;
    Ok(label)
}

/// Removes every option of the wheel along with its slice images.
pub fn clear_options(pool: &DbPool, guild: u64, name: &str) -> StoreResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    ensure_wheel(&tx, guild, name)?;
    tx.execute(
        "DELETE FROM wheel_options WHERE guild_id = ?1 AND wheel = ?2",
        params![snowflake(guild), name],
    )?;
    tx.execute(
        "DELETE FROM wheel_images WHERE guild_id = ?1 AND wheel = ?2",
        params![snowflake(guild), name],
    )?;
    tx.commit()?;
    Ok(())
}

/// Sets the background image for `label`, or removes it when `url` is `None`.
pub fn set_image(
    pool: &DbPool,
    guild: u64,
    name: &str,
    label: &str,
    url: Option<&str>,
) -> StoreResult<()> {
    let conn = pool.get()?;
    ensure_wheel(&conn, guild, name)?;
    match url {
        Some(url) => conn.execute(
            "
            INSERT INTO wheel_images (guild_id, wheel, label, url) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (guild_id, wheel, label) DO UPDATE SET url = excluded.url
            ",
            params![snowflake(guild), name, label, url],
        )?,
        None => conn.execute(
            "DELETE FROM wheel_images WHERE guild_id = ?1 AND wheel = ?2 AND label = ?3",
            params![snowflake(guild), name, label],
        )?,
    };
    Ok(())
}

/// Label to image URL map of a wheel.
pub fn wheel_images(pool: &DbPool, guild: u64, name: &str) -> StoreResult<HashMap<String, String>> {
    let conn = pool.get()?;
    ensure_wheel(&conn, guild, name)?;
    let mut stmt =
        conn.prepare("SELECT label, url FROM wheel_images WHERE guild_id = ?1 AND wheel = ?2")?;
    let images = stmt
        .query_map(params![snowflake(guild), name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<HashMap<String, String>>>()?;
    Ok(images)
}

pub fn set_filter_key(pool: &DbPool, user: u64, api_key: &str) -> StoreResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "
        INSERT INTO filter_keys (user_id, api_key) VALUES (?1, ?2)
        ON CONFLICT (user_id) DO UPDATE SET api_key = excluded.api_key
        ",
        params![snowflake(user), api_key],
    )?;
    Ok(())
}

pub fn filter_key(pool: &DbPool, user: u64) -> StoreResult<Option<String>> {
    let conn = pool.get()?;
    let key = conn
        .query_row(
            "SELECT api_key FROM filter_keys WHERE user_id = ?1",
            params![snowflake(user)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: u64 = 1_234_567_890_123_456_789;

    fn pool() -> DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        // an in-memory database only lives on its own connection
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        init_db(&pool).unwrap();
        pool
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wheels_are_unique_per_guild() {
        let pool = pool();
        create_wheel(&pool, GUILD, "lunch").unwrap();
        assert!(matches!(
            create_wheel(&pool, GUILD, "lunch"),
            Err(StoreError::WheelExists(_))
        ));
        create_wheel(&pool, GUILD + 1, "lunch").unwrap();
        create_wheel(&pool, GUILD, "games").unwrap();

        assert_eq!(
            list_wheels(&pool, GUILD).unwrap(),
            vec![("games".to_string(), 0), ("lunch".to_string(), 0)]
        );
    }

    #[test]
    fn options_keep_insertion_order() {
        let pool = pool();
        create_wheel(&pool, GUILD, "lunch").unwrap();
        add_options(&pool, GUILD, "lunch", &strings(&["Tacos", "Pizza"])).unwrap();
        add_options(&pool, GUILD, "lunch", &strings(&["Sushi"])).unwrap();

        assert_eq!(
            wheel_options(&pool, GUILD, "lunch").unwrap(),
            strings(&["Tacos", "Pizza", "Sushi"])
        );
        assert_eq!(list_wheels(&pool, GUILD).unwrap(), vec![("lunch".to_string(), 3)]);
    }

    #[test]
    fn remove_uses_one_based_indices() {
        let pool = pool();
        create_wheel(&pool, GUILD, "lunch").unwrap();
        add_options(&pool, GUILD, "lunch", &strings(&["a", "b", "c"])).unwrap();

        assert!(matches!(
            remove_option(&pool, GUILD, "lunch", 0),
            Err(StoreError::InvalidIndex)
        ));
        assert!(matches!(
            remove_option(&pool, GUILD, "lunch", 4),
            Err(StoreError::InvalidIndex)
        ));
        assert_eq!(remove_option(&pool, GUILD, "lunch", 2).unwrap(), "b");
        assert_eq!(wheel_options(&pool, GUILD, "lunch").unwrap(), strings(&["a", "c"]));
    }

    #[test]
    fn missing_wheels_are_reported() {
        let pool = pool();
        for err in [
            delete_wheel(&pool, GUILD, "nope").unwrap_err(),
            wheel_options(&pool, GUILD, "nope").unwrap_err(),
            add_options(&pool, GUILD, "nope", &strings(&["x"])).unwrap_err(),
            remove_option(&pool, GUILD, "nope", 1).unwrap_err(),
            clear_options(&pool, GUILD, "nope").unwrap_err(),
            set_image(&pool, GUILD, "nope", "x", Some("https://x")).unwrap_err(),
        ] {
            assert!(matches!(err, StoreError::NoSuchWheel(ref name) if name == "nope"));
            assert!(err.is_user_error());
        }
    }

    #[test]
    fn images_follow_their_wheel() {
        let pool = pool();
        create_wheel(&pool, GUILD, "lunch").unwrap();
        add_options(&pool, GUILD, "lunch", &strings(&["Pizza", "Tacos"])).unwrap();
        set_image(&pool, GUILD, "lunch", "Pizza", Some("https://a.png")).unwrap();
        set_image(&pool, GUILD, "lunch", "Pizza", Some("https://b.png")).unwrap();
        set_image(&pool, GUILD, "lunch", "Tacos", Some("https://c.png")).unwrap();
        set_image(&pool, GUILD, "lunch", "Tacos", None).unwrap();

        let images = wheel_images(&pool, GUILD, "lunch").unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images["Pizza"], "https://b.png");

        // a duplicate label keeps the image alive until its last option goes
        add_options(&pool, GUILD, "lunch", &strings(&["Pizza"])).unwrap();
        assert_eq!(remove_option(&pool, GUILD, "lunch", 3).unwrap(), "Pizza");
        assert_eq!(wheel_images(&pool, GUILD, "lunch").unwrap().len(), 1);
        assert_eq!(remove_option(&pool, GUILD, "lunch", 1).unwrap(), "Pizza");
        assert!(wheel_images(&pool, GUILD, "lunch").unwrap().is_empty());
        add_options(&pool, GUILD, "lunch", &strings(&["Pizza"])).unwrap();
        assert!(wheel_images(&pool, GUILD, "lunch").unwrap().is_empty());

        clear_options(&pool, GUILD, "lunch").unwrap();
        assert!(wheel_options(&pool, GUILD, "lunch").unwrap().is_empty());
        assert!(wheel_images(&pool, GUILD, "lunch").unwrap().is_empty());

        set_image(&pool, GUILD, "lunch", "Pizza", Some("https://a.png")).unwrap();
        add_options(&pool, GUILD, "lunch", &strings(&["Pizza"])).unwrap();
        delete_wheel(&pool, GUILD, "lunch").unwrap();
        create_wheel(&pool, GUILD, "lunch").unwrap();
        assert!(wheel_options(&pool, GUILD, "lunch").unwrap().is_empty());
        assert!(wheel_images(&pool, GUILD, "lunch").unwrap().is_empty());
    }

    #[test]
    fn filter_keys_are_per_user() {
        let pool = pool();
        assert_eq!(filter_key(&pool, 1).unwrap(), None);
        set_filter_key(&pool, 1, "first").unwrap();
        set_filter_key(&pool, 1, "second").unwrap();
        set_filter_key(&pool, u64::MAX, "big").unwrap();
        assert_eq!(filter_key(&pool, 1).unwrap().as_deref(), Some("second"));
        assert_eq!(filter_key(&pool, u64::MAX).unwrap().as_deref(), Some("big"));
    }
}
