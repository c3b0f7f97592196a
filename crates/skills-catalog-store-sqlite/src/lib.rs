use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use skills_catalog_core::{
    CatalogError, CatalogStore, Category, Device, NewSkill, Skill, StoreInfo,
};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS catalog_items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL CHECK (length(name) > 0),
  category TEXT NOT NULL CHECK (category IN ('sleep','stress','mobility','meds','safety','nutrition')),
  device TEXT NOT NULL CHECK (device IN ('watch','phone','any')),
  description TEXT,
  voice_prompt TEXT,
  price REAL NOT NULL DEFAULT 0 CHECK (price >= 0),
  reward REAL CHECK (reward >= 0)
);

CREATE INDEX IF NOT EXISTS idx_catalog_items_name ON catalog_items(name);
CREATE INDEX IF NOT EXISTS idx_catalog_items_category ON catalog_items(category);
CREATE INDEX IF NOT EXISTS idx_catalog_items_device ON catalog_items(device);
";

/// SQLite-backed catalog storage.
///
/// Holds only the database path; every operation opens a scoped connection,
/// applies runtime pragmas, and ensures the schema is current, so the
/// connection is released on every exit path. Id assignment relies on the
/// `AUTOINCREMENT` primary key, which never reuses ids.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db_path: PathBuf,
}

impl SqliteCatalog {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).with_context(|| {
            format!("failed to open sqlite database at {}", self.db_path.display())
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Persist one record and return it as stored, with its assigned id.
    ///
    /// # Errors
    /// Returns an error when the write or the read-back fails.
    pub fn insert_skill(&self, skill: &NewSkill) -> Result<Skill> {
        let conn = self.connect()?;
        let id = insert_row(&conn, skill)?;
        fetch_row(&conn, id)?.ok_or_else(|| anyhow!("inserted skill {id} is missing on read-back"))
    }

    /// Persist a batch of records in one transaction, preserving order.
    ///
    /// # Errors
    /// Returns an error when any write fails; the transaction is rolled back.
    pub fn insert_skills(&self, skills: &[NewSkill]) -> Result<Vec<Skill>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("failed to start insert transaction")?;

        let mut ids = Vec::with_capacity(skills.len());
        for skill in skills {
            ids.push(insert_row(&tx, skill)?);
        }

        let mut stored = Vec::with_capacity(ids.len());
        for id in ids {
            let skill = fetch_row(&tx, id)?
                .ok_or_else(|| anyhow!("inserted skill {id} is missing on read-back"))?;
            stored.push(skill);
        }

        tx.commit().context("failed to commit insert transaction")?;
        Ok(stored)
    }

    /// Load one record by id.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn fetch_skill(&self, id: i64) -> Result<Option<Skill>> {
        let conn = self.connect()?;
        fetch_row(&conn, id)
    }

    /// Delete one record by id, reporting whether a row existed.
    ///
    /// # Errors
    /// Returns an error when the delete statement fails.
    pub fn remove_skill(&self, id: i64) -> Result<bool> {
        let conn = self.connect()?;
        let affected = conn
            .execute("DELETE FROM catalog_items WHERE id = ?1", params![id])
            .context("failed to delete catalog item")?;
        Ok(affected > 0)
    }

    /// Load every record, ordered by id descending.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_skills(&self) -> Result<Vec<Skill>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, category, device, description, voice_prompt, price, reward
             FROM catalog_items
             ORDER BY id DESC",
        )?;

        let rows = stmt.query_map([], skill_from_row)?;
        let mut skills = Vec::new();
        for row in rows {
            skills.push(into_skill(row?)?);
        }

        Ok(skills)
    }

    /// Describe the backend: engine, file location, server version, row count.
    ///
    /// # Errors
    /// Returns an error when the probe queries fail.
    pub fn info(&self) -> Result<StoreInfo> {
        let conn = self.connect()?;
        let server_version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .context("failed to read sqlite version")?;
        let skill_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM catalog_items", [], |row| row.get(0))
            .context("failed to count catalog items")?;

        Ok(StoreInfo {
            backend: "sqlite".to_string(),
            location: self.db_path.display().to_string(),
            server_version: Some(server_version),
            skill_count: u64::try_from(skill_count).unwrap_or(0),
        })
    }
}

impl CatalogStore for SqliteCatalog {
    fn insert(&self, skill: &NewSkill) -> Result<Skill, CatalogError> {
        self.insert_skill(skill).map_err(into_storage)
    }

    fn insert_batch(&self, skills: &[NewSkill]) -> Result<Vec<Skill>, CatalogError> {
        self.insert_skills(skills).map_err(into_storage)
    }

    fn fetch(&self, id: i64) -> Result<Option<Skill>, CatalogError> {
        self.fetch_skill(id).map_err(into_storage)
    }

    fn remove(&self, id: i64) -> Result<bool, CatalogError> {
        self.remove_skill(id).map_err(into_storage)
    }

    fn all(&self) -> Result<Vec<Skill>, CatalogError> {
        self.list_skills().map_err(into_storage)
    }

    fn describe(&self) -> Result<StoreInfo, CatalogError> {
        self.info().map_err(into_storage)
    }
}

fn into_storage(err: anyhow::Error) -> CatalogError {
    CatalogError::Storage(format!("{err:#}"))
}

#[derive(Debug)]
struct SkillRow {
    id: i64,
    name: String,
    category: String,
    device: String,
    description: Option<String>,
    voice_prompt: Option<String>,
    price: f64,
    reward: Option<f64>,
}

fn skill_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SkillRow> {
    Ok(SkillRow {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        device: row.get(3)?,
        description: row.get(4)?,
        voice_prompt: row.get(5)?,
        price: row.get(6)?,
        reward: row.get(7)?,
    })
}

fn into_skill(row: SkillRow) -> Result<Skill> {
    let category = Category::parse(&row.category)
        .ok_or_else(|| anyhow!("unknown category `{}` in row {}", row.category, row.id))?;
    let device = Device::parse(&row.device)
        .ok_or_else(|| anyhow!("unknown device `{}` in row {}", row.device, row.id))?;

    Ok(Skill {
        id: row.id,
        name: row.name,
        category,
        device,
        description: row.description,
        voice_prompt: row.voice_prompt,
        price: row.price,
        reward: row.reward,
    })
}

fn insert_row(conn: &Connection, skill: &NewSkill) -> Result<i64> {
    conn.execute(
        "INSERT INTO catalog_items(name, category, device, description, voice_prompt, price, reward)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            skill.name,
            skill.category.as_str(),
            skill.device.as_str(),
            skill.description,
            skill.voice_prompt,
            skill.price,
            skill.reward,
        ],
    )
    .context("failed to insert catalog item")?;

    Ok(conn.last_insert_rowid())
}

fn fetch_row(conn: &Connection, id: i64) -> Result<Option<Skill>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, device, description, voice_prompt, price, reward
         FROM catalog_items
         WHERE id = ?1",
    )?;

    let row = stmt.query_row(params![id], skill_from_row).optional()?;
    row.map(into_skill).transpose()
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
        .context("failed to apply schema_migrations table")?;

    let mut version = current_schema_version(conn)?;
    if version < 1 {
        conn.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
        record_schema_version(conn, 1)?;
        version = current_schema_version(conn)?;
    }

    if version != LATEST_SCHEMA_VERSION {
        return Err(anyhow!("unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"));
    }

    Ok(())
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use skills_catalog_core::{Category, Device};

    fn unique_temp_db_path(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}-{now}.sqlite3"))
    }

    fn mk_new_skill(name: &str, category: Category, device: Device) -> NewSkill {
        NewSkill {
            name: name.to_string(),
            category,
            device,
            description: Some("fixture".to_string()),
            voice_prompt: None,
            price: 0.0,
            reward: Some(2.5),
        }
    }

    fn must<T>(value: Result<T>) -> T {
        match value {
            Ok(value) => value,
            Err(err) => panic!("store operation should succeed: {err:#}"),
        }
    }

    #[test]
    fn insert_and_fetch_round_trip() {
        let db_path = unique_temp_db_path("skills-store-roundtrip");
        let store = SqliteCatalog::new(&db_path);

        let stored =
            must(store.insert_skill(&mk_new_skill("Hydration nudge", Category::Nutrition, Device::Watch)));
        assert!(stored.id > 0);

        let fetched = must(store.fetch_skill(stored.id));
        assert_eq!(fetched, Some(stored));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn ids_are_assigned_in_insertion_order() {
        let db_path = unique_temp_db_path("skills-store-ids");
        let store = SqliteCatalog::new(&db_path);

        let first = must(store.insert_skill(&mk_new_skill("First", Category::Sleep, Device::Any)));
        let second = must(store.insert_skill(&mk_new_skill("Second", Category::Sleep, Device::Any)));
        assert!(second.id > first.id);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn remove_reports_absence_without_error() {
        let db_path = unique_temp_db_path("skills-store-remove");
        let store = SqliteCatalog::new(&db_path);

        let stored = must(store.insert_skill(&mk_new_skill("Walk", Category::Mobility, Device::Watch)));
        assert!(must(store.remove_skill(stored.id)));
        assert!(!must(store.remove_skill(stored.id)));
        assert_eq!(must(store.fetch_skill(stored.id)), None);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn list_orders_by_id_descending() {
        let db_path = unique_temp_db_path("skills-store-order");
        let store = SqliteCatalog::new(&db_path);

        for name in ["One", "Two", "Three"] {
            let _ = must(store.insert_skill(&mk_new_skill(name, Category::Stress, Device::Phone)));
        }

        let skills = must(store.list_skills());
        let names: Vec<&str> = skills.iter().map(|skill| skill.name.as_str()).collect();
        assert_eq!(names, vec!["Three", "Two", "One"]);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn insert_batch_is_transactional_and_ordered() {
        let db_path = unique_temp_db_path("skills-store-batch");
        let store = SqliteCatalog::new(&db_path);

        let batch = vec![
            mk_new_skill("One", Category::Sleep, Device::Phone),
            mk_new_skill("Two", Category::Meds, Device::Watch),
        ];
        let stored = must(store.insert_skills(&batch));
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "One");
        assert!(stored[1].id > stored[0].id);

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn check_constraints_reject_values_outside_the_enumerations() {
        let db_path = unique_temp_db_path("skills-store-checks");
        let store = SqliteCatalog::new(&db_path);
        let conn = must(store.connect());

        let result = conn.execute(
            "INSERT INTO catalog_items(name, category, device, price) VALUES (?1, ?2, ?3, ?4)",
            params!["Bad", "cardio", "any", 0.0],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO catalog_items(name, category, device, price) VALUES (?1, ?2, ?3, ?4)",
            params!["Bad", "sleep", "tablet", 0.0],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO catalog_items(name, category, device, price) VALUES (?1, ?2, ?3, ?4)",
            params!["Bad", "sleep", "any", -1.0],
        );
        assert!(result.is_err());

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn separate_handles_share_the_same_database() {
        let db_path = unique_temp_db_path("skills-store-handles");
        let writer = SqliteCatalog::new(&db_path);
        let reader = SqliteCatalog::new(&db_path);

        let stored = must(writer.insert_skill(&mk_new_skill("Shared", Category::Safety, Device::Any)));
        assert_eq!(must(reader.fetch_skill(stored.id)), Some(stored));

        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn info_reports_backend_and_count() {
        let db_path = unique_temp_db_path("skills-store-info");
        let store = SqliteCatalog::new(&db_path);

        let _ = must(store.insert_skill(&mk_new_skill("Walk", Category::Mobility, Device::Watch)));
        let info = must(store.info());

        assert_eq!(info.backend, "sqlite");
        assert_eq!(info.skill_count, 1);
        assert!(info.server_version.is_some());
        assert!(info.location.contains("skills-store-info"));

        let _ = fs::remove_file(&db_path);
    }
}
