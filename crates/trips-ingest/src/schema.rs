//! Schema and index provisioning
//!
//! Safe to run before every load: the table statement is `IF NOT EXISTS` and
//! each index is looked up in `pg_indexes` by name before it is created.
//! The table group and the index group each commit in one transaction; any
//! failure rolls its group back and aborts provisioning.

use crate::config::IngestConfig;
use crate::error::{IngestError, Result, SchemaStep};
use sqlx::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

/// Table populated by the loader.
pub const TRIPS_TABLE: &str = "trips";

/// Embedded default schema definition.
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

/// A named secondary index on the trips table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub columns: &'static str,
}

impl IndexDefinition {
    pub fn create_sql(&self) -> String {
        format!("CREATE INDEX {} ON {} ({})", self.name, TRIPS_TABLE, self.columns)
    }
}

pub const INDEXES: [IndexDefinition; 3] = [
    IndexDefinition {
        name: "idx_trips_pickup_time",
        columns: "pickup_datetime",
    },
    IndexDefinition {
        name: "idx_trips_speed",
        columns: "trip_speed_km_hr",
    },
    IndexDefinition {
        name: "idx_trips_pickup_loc",
        columns: "pickup_latitude, pickup_longitude",
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub statements_applied: usize,
    pub indexes_created: Vec<&'static str>,
    pub indexes_present: Vec<&'static str>,
}

pub struct SchemaProvisioner {
    db: PgPool,
    schema_sql: Cow<'static, str>,
}

impl SchemaProvisioner {
    /// Provisioner using the embedded schema definition
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            schema_sql: Cow::Borrowed(SCHEMA_SQL),
        }
    }

    pub fn with_schema(db: PgPool, schema_sql: impl Into<String>) -> Self {
        Self {
            db,
            schema_sql: Cow::Owned(schema_sql.into()),
        }
    }

    /// Honour `schema_path` when configured
    pub fn from_config(db: PgPool, config: &IngestConfig) -> Result<Self> {
        match &config.schema_path {
            Some(path) => {
                let sql = std::fs::read_to_string(path)
                    .map_err(|e| IngestError::schema(SchemaStep::ReadDefinition, e))?;
                Ok(Self::with_schema(db, sql))
            },
            None => Ok(Self::new(db)),
        }
    }

    #[instrument(skip(self))]
    pub async fn provision(&self) -> Result<ProvisionReport> {
        let mut report = ProvisionReport {
            statements_applied: self.create_table().await?,
            ..ProvisionReport::default()
        };
        self.create_indexes(&mut report).await?;

        info!(
            statements = report.statements_applied,
            created = ?report.indexes_created,
            present = ?report.indexes_present,
            "Schema provisioned"
        );
        Ok(report)
    }

    async fn create_table(&self) -> Result<usize> {
        let statements = split_statements(&self.schema_sql);
        let fail = |e: sqlx::Error| IngestError::schema(SchemaStep::CreateTable, e);

        let mut tx = self.db.begin().await.map_err(fail)?;
        for statement in &statements {
            sqlx::query(statement).execute(&mut *tx).await.map_err(fail)?;
        }
        tx.commit().await.map_err(fail)?;

        Ok(statements.len())
    }

    async fn create_indexes(&self, report: &mut ProvisionReport) -> Result<()> {
        let lookup_failed = |e: sqlx::Error| IngestError::schema(SchemaStep::LookupIndex, e);
        let create_failed = |e: sqlx::Error| IngestError::schema(SchemaStep::CreateIndex, e);

        let mut tx = self.db.begin().await.map_err(create_failed)?;
        for index in INDEXES {
            let existing: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*)
                FROM pg_indexes
                WHERE schemaname = current_schema()
                  AND tablename = $1
                  AND indexname = $2
                "#,
            )
            .bind(TRIPS_TABLE)
            .bind(index.name)
            .fetch_one(&mut *tx)
            .await
            .map_err(lookup_failed)?;

            if existing > 0 {
                report.indexes_present.push(index.name);
                continue;
            }

            info!(index = index.name, "Creating index");
            sqlx::query(&index.create_sql())
                .execute(&mut *tx)
                .await
                .map_err(create_failed)?;
            report.indexes_created.push(index.name);
        }
        tx.commit().await.map_err(create_failed)?;

        Ok(())
    }
}

/// Split a definition into executable statements, dropping `--` comment
/// lines and empty fragments.
pub fn split_statements(sql: &str) -> Vec<String> {
    let stripped: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_schema_is_one_statement() {
        let statements = split_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS trips"));
    }

    #[test]
    fn test_split_statements_skips_comments_and_blanks() {
        let sql = "-- header\nCREATE TABLE a (x INT);\n\n;\n-- trailing\nCREATE INDEX i ON a (x);";
        assert_eq!(
            split_statements(sql),
            vec!["CREATE TABLE a (x INT)", "CREATE INDEX i ON a (x)"]
        );
    }

    #[test]
    fn test_index_definitions() {
        let names: Vec<_> = INDEXES.iter().map(|i| i.name).collect();
        assert_eq!(
            names,
            ["idx_trips_pickup_time", "idx_trips_speed", "idx_trips_pickup_loc"]
        );
        assert_eq!(
            INDEXES[2].create_sql(),
            "CREATE INDEX idx_trips_pickup_loc ON trips (pickup_latitude, pickup_longitude)"
        );
    }
}
