//! Lazy relation builder.
//!
//! Mirrors the engine's relational builder surface: a [`Relation`] composes
//! one SQL statement through `table → filter → project → join → aggregate →
//! limit` and only touches the engine when materialized with
//! [`Relation::create`] or [`Relation::create_view`]. Transformers express
//! each layer as a single pipeline; no row-by-row code.

use crate::connection::EngineConnection;
use crate::error::Result;
use crate::identifier::safe_identifier;

/// Join flavor for [`Relation::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    const fn sql(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A lazily evaluated relational expression.
#[derive(Debug, Clone)]
pub struct Relation {
    sql: String,
    alias: String,
}

impl Relation {
    /// Start from a table or view.
    pub fn table(name: &str) -> Result<Self> {
        let name = safe_identifier(name)?;
        Ok(Self {
            sql: format!("SELECT * FROM {name}"),
            alias: name.to_string(),
        })
    }

    /// Start from an arbitrary subquery.
    #[must_use]
    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            alias: "t".to_string(),
        }
    }

    /// Rename the relation for use in join conditions.
    pub fn alias(mut self, alias: &str) -> Result<Self> {
        self.alias = safe_identifier(alias)?.to_string();
        Ok(self)
    }

    /// Keep rows matching `predicate`.
    #[must_use]
    pub fn filter(self, predicate: &str) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!(
                "SELECT * FROM ({}) AS {alias} WHERE {predicate}",
                self.sql
            ),
            alias,
        }
    }

    /// Project to `columns` (any SQL select-list).
    #[must_use]
    pub fn project(self, columns: &str) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!("SELECT {columns} FROM ({}) AS {alias}", self.sql),
            alias,
        }
    }

    /// Join another relation on an explicit condition.
    #[must_use]
    pub fn join(self, other: &Self, condition: &str, kind: JoinKind) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!(
                "SELECT * FROM ({}) AS {alias} {} ({}) AS {} ON {condition}",
                self.sql,
                kind.sql(),
                other.sql,
                other.alias
            ),
            alias,
        }
    }

    /// Join another relation and project in the same scope, so the select
    /// list can qualify columns with both aliases.
    #[must_use]
    pub fn join_project(
        self,
        other: &Self,
        condition: &str,
        kind: JoinKind,
        columns: &str,
    ) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!(
                "SELECT {columns} FROM ({}) AS {alias} {} ({}) AS {} ON {condition}",
                self.sql,
                kind.sql(),
                other.sql,
                other.alias
            ),
            alias,
        }
    }

    /// Join another relation on shared column names.
    #[must_use]
    pub fn join_using(self, other: &Self, keys: &str, kind: JoinKind) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!(
                "SELECT * FROM ({}) AS {alias} {} ({}) AS {} USING ({keys})",
                self.sql,
                kind.sql(),
                other.sql,
                other.alias
            ),
            alias,
        }
    }

    /// Aggregate with a select-list and GROUP BY clause.
    #[must_use]
    pub fn aggregate(self, select: &str, group_by: &str) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!(
                "SELECT {select} FROM ({}) AS {alias} GROUP BY {group_by}",
                self.sql
            ),
            alias,
        }
    }

    /// Keep at most `n` rows.
    #[must_use]
    pub fn limit(self, n: u64) -> Self {
        let alias = self.alias.clone();
        Self {
            sql: format!("SELECT * FROM ({}) AS {alias} LIMIT {n}", self.sql),
            alias,
        }
    }

    /// The composed SQL, for embedding in larger statements.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Materialize as a table in a single CREATE TABLE … AS statement.
    pub fn create(&self, engine: &EngineConnection, table: &str) -> Result<()> {
        let table = safe_identifier(table)?;
        engine.execute_batch(&format!("CREATE TABLE {table} AS {}", self.sql))
    }

    /// Materialize as a view (replacing any previous definition).
    pub fn create_view(&self, engine: &EngineConnection, name: &str) -> Result<()> {
        let name = safe_identifier(name)?;
        engine.execute_batch(&format!("CREATE OR REPLACE VIEW {name} AS {}", self.sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_listings() -> EngineConnection {
        let engine = EngineConnection::in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE listings AS SELECT * FROM (VALUES \
                 ('a', 100, 'SF'), ('b', 250, 'SF'), ('c', 0, 'LA'), ('d', 400, 'LA')) \
                 AS t(id, price, city)",
            )
            .unwrap();
        engine
    }

    #[test]
    fn filter_project_create_is_one_statement_pipeline() {
        let engine = engine_with_listings();
        Relation::table("listings")
            .unwrap()
            .filter("price > 0")
            .project("id, price * 2 AS doubled")
            .create(&engine, "silver_listings")
            .unwrap();
        assert_eq!(engine.count_records("silver_listings").unwrap(), 3);
        assert_eq!(
            engine
                .query_i64("SELECT doubled FROM silver_listings WHERE id = 'b'")
                .unwrap(),
            500
        );
    }

    #[test]
    fn left_join_keeps_unmatched_rows() {
        let engine = engine_with_listings();
        engine
            .execute_batch(
                "CREATE TABLE ratings AS SELECT * FROM (VALUES ('a', 5), ('d', 3)) AS t(id, stars)",
            )
            .unwrap();
        let listings = Relation::table("listings").unwrap().alias("l").unwrap();
        let ratings = Relation::table("ratings").unwrap().alias("r").unwrap();
        listings
            .join(&ratings, "l.id = r.id", JoinKind::Left)
            .create(&engine, "joined")
            .unwrap();
        assert_eq!(engine.count_records("joined").unwrap(), 4);
    }

    #[test]
    fn aggregate_groups_rows() {
        let engine = engine_with_listings();
        Relation::table("listings")
            .unwrap()
            .aggregate("city, COUNT(*) AS n", "city")
            .create(&engine, "by_city")
            .unwrap();
        assert_eq!(engine.count_records("by_city").unwrap(), 2);
    }

    #[test]
    fn limit_caps_rows() {
        let engine = engine_with_listings();
        Relation::table("listings")
            .unwrap()
            .limit(2)
            .create(&engine, "capped")
            .unwrap();
        assert_eq!(engine.count_records("capped").unwrap(), 2);
    }

    #[test]
    fn limit_zero_yields_empty_table_not_error() {
        let engine = engine_with_listings();
        Relation::table("listings")
            .unwrap()
            .limit(0)
            .create(&engine, "empty")
            .unwrap();
        assert_eq!(engine.count_records("empty").unwrap(), 0);
    }

    #[test]
    fn create_view_recomputes_at_read() {
        let engine = engine_with_listings();
        Relation::table("listings")
            .unwrap()
            .filter("price > 0")
            .create_view(&engine, "active_listings")
            .unwrap();
        assert_eq!(engine.count_records("active_listings").unwrap(), 3);
        engine
            .execute_batch("INSERT INTO listings VALUES ('e', 900, 'SF')")
            .unwrap();
        assert_eq!(engine.count_records("active_listings").unwrap(), 4);
    }

    #[test]
    fn table_rejects_invalid_identifier() {
        assert!(Relation::table("not a table").is_err());
    }
}
