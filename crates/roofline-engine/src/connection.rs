//! Guarded singleton connection to the embedded engine.
//!
//! Configuration is applied while the connection is created and never
//! mutated afterwards. JSON and Parquet extensions are loaded on connect;
//! the SQLite extension is loaded on demand by [`EngineConnection::attach_sqlite`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use duckdb::{Config, Connection};
use tracing::{debug, info};

use roofline_core::config::DuckDbSettings;

use crate::error::{EngineError, Result};
use crate::identifier::safe_identifier;
use crate::json::row_values_to_json;

/// Escape a path for inclusion in a SQL string literal.
fn sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Thread-safe handle to the process-wide engine connection.
///
/// Cloning is cheap; all clones share the same underlying connection. The
/// orchestrator never issues concurrent statements, the mutex enforces it.
#[derive(Clone)]
pub struct EngineConnection {
    inner: Arc<Mutex<Connection>>,
}

impl EngineConnection {
    /// Open a connection configured from `settings`.
    ///
    /// # Errors
    ///
    /// Connection failures here are fatal: the pipeline cannot run without
    /// its engine.
    pub fn connect(settings: &DuckDbSettings) -> Result<Self> {
        let config = Config::default()
            .max_memory(&settings.memory_limit)
            .map_err(|e| EngineError::Connection(e.to_string()))?
            .threads(i64::from(settings.threads))
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let conn = match &settings.database_file {
            Some(path) => Connection::open_with_flags(path, config),
            None => Connection::open_in_memory_with_flags(config),
        }
        .map_err(|e| EngineError::Connection(e.to_string()))?;

        conn.execute_batch(
            "INSTALL json; LOAD json;\n\
             INSTALL parquet; LOAD parquet;",
        )
        .map_err(|e| EngineError::Connection(format!("loading extensions: {e}")))?;

        info!(
            memory_limit = %settings.memory_limit,
            threads = settings.threads,
            "engine connected"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory connection with default limits, for tests and tools.
    pub fn in_memory() -> Result<Self> {
        Self::connect(&DuckDbSettings {
            memory_limit: "2GB".to_string(),
            threads: 2,
            database_file: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned mutex means another thread panicked mid-statement; the
        // connection state is unknown and continuing would corrupt the run.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a closure against the raw connection.
    ///
    /// Escape hatch for row-mapping reads; writers in this workspace prefer
    /// the typed helpers below.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> Result<T> {
        let guard = self.lock();
        f(&guard).map_err(EngineError::from)
    }

    /// Execute a statement, returning the affected row count.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        debug!(sql, "execute");
        let guard = self.lock();
        guard.execute(sql, []).map_err(EngineError::from)
    }

    /// Execute several statements in one batch.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(sql, "execute_batch");
        let guard = self.lock();
        guard.execute_batch(sql).map_err(EngineError::from)
    }

    /// Fetch a single integer value.
    pub fn query_i64(&self, sql: &str) -> Result<i64> {
        let guard = self.lock();
        guard
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .map_err(EngineError::from)
    }

    /// Run a closure inside a transaction: COMMIT on `Ok`, ROLLBACK on `Err`.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        guard.execute_batch("BEGIN TRANSACTION")?;
        match f(&guard) {
            Ok(value) => {
                guard.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                // Preserve the original failure even if the rollback fails.
                let _ = guard.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    /// Whether a table or view with this name exists.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let guard = self.lock();
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [name],
                |row| row.get(0),
            )
            .map_err(EngineError::from)?;
        Ok(count > 0)
    }

    /// Whether `column` exists on `table`.
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let guard = self.lock();
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_name = ? AND column_name = ?",
                [table, column],
                |row| row.get(0),
            )
            .map_err(EngineError::from)?;
        Ok(count > 0)
    }

    /// Drop a table if it exists.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let name = safe_identifier(name)?;
        self.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))
    }

    /// Drop a view if it exists.
    pub fn drop_view(&self, name: &str) -> Result<()> {
        let name = safe_identifier(name)?;
        self.execute_batch(&format!("DROP VIEW IF EXISTS {name}"))
    }

    /// Count rows in a table or view; 0 when it does not exist.
    pub fn count_records(&self, name: &str) -> Result<u64> {
        if !self.table_exists(name)? {
            return Ok(0);
        }
        let name = safe_identifier(name)?;
        let count = self.query_i64(&format!("SELECT COUNT(*) FROM {name}"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Column names and types for a table, in declaration order.
    pub fn get_table_schema(&self, name: &str) -> Result<Vec<(String, String)>> {
        if !self.table_exists(name)? {
            return Ok(Vec::new());
        }
        let guard = self.lock();
        let mut stmt = guard
            .prepare(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = ? ORDER BY ordinal_position",
            )
            .map_err(EngineError::from)?;
        let rows = stmt
            .query_map([name], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(EngineError::from)?;
        rows.collect::<duckdb::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    /// Load a JSON file into a new table in a single statement.
    ///
    /// The schema is whatever the reader infers; Bronze relies on that.
    pub fn read_json_table(&self, path: &Path, table: &str, limit: Option<u64>) -> Result<()> {
        let table = safe_identifier(table)?;
        let path_lit = sql_string(&path.to_string_lossy());
        let mut sql = format!(
            "CREATE TABLE {table} AS \
             SELECT * FROM read_json('{path_lit}', maximum_object_size=20000000)"
        );
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        self.execute_batch(&sql)
    }

    /// Load a Parquet file into a new table via the native reader.
    pub fn read_parquet(&self, path: &Path, table: &str, limit: Option<u64>) -> Result<()> {
        let table = safe_identifier(table)?;
        let path_lit = sql_string(&path.to_string_lossy());
        let mut sql =
            format!("CREATE TABLE {table} AS SELECT * FROM read_parquet('{path_lit}')");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        self.execute_batch(&sql)
    }

    /// Export a table or view with engine-native COPY. Never row-iterates.
    pub fn copy_to_parquet(
        &self,
        table: &str,
        path: &Path,
        compression: &str,
        compression_level: u8,
        row_group_size: u64,
    ) -> Result<()> {
        let table = safe_identifier(table)?;
        let path_lit = sql_string(&path.to_string_lossy());
        let mut params = vec![
            "FORMAT PARQUET".to_string(),
            format!("COMPRESSION '{}'", sql_string(compression)),
        ];
        if compression.eq_ignore_ascii_case("zstd") {
            params.push(format!("COMPRESSION_LEVEL {compression_level}"));
        }
        params.push(format!("ROW_GROUP_SIZE {row_group_size}"));
        let sql = format!(
            "COPY (SELECT * FROM {table}) TO '{path_lit}' ({})",
            params.join(", ")
        );
        self.execute_batch(&sql)
    }

    /// Attach an external SQLite database under `alias`.
    pub fn attach_sqlite(&self, path: &Path, alias: &str) -> Result<()> {
        let alias = safe_identifier(alias)?;
        let path_lit = sql_string(&path.to_string_lossy());
        self.execute_batch("INSTALL sqlite; LOAD sqlite;")?;
        self.execute_batch(&format!("ATTACH '{path_lit}' AS {alias} (TYPE sqlite)"))
    }

    /// Detach a previously attached database.
    pub fn detach(&self, alias: &str) -> Result<()> {
        let alias = safe_identifier(alias)?;
        self.execute_batch(&format!("DETACH {alias}"))
    }

    /// Materialize a query as JSON objects, one per row.
    ///
    /// The sink writers batch over the returned rows; the query itself runs
    /// exactly once.
    pub fn query_json(&self, sql: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let guard = self.lock();
        let mut stmt = guard.prepare(sql).map_err(EngineError::from)?;
        let mut rows = stmt.query([]).map_err(EngineError::from)?;
        // Result schema is only known once the query has run.
        let column_names: Vec<String> = rows
            .as_ref()
            .map(|s| {
                s.column_names()
                    .iter()
                    .map(std::string::ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(EngineError::from)? {
            let mut values = Vec::with_capacity(column_names.len());
            for idx in 0..column_names.len() {
                values.push(
                    row.get::<_, duckdb::types::Value>(idx)
                        .map_err(EngineError::from)?,
                );
            }
            out.push(row_values_to_json(&column_names, &values));
        }
        Ok(out)
    }
}
