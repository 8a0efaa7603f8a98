//! SQL Server connectivity: a synchronous [`SqlExecutor`] facade over
//! tiberius, plus the table existence check behind `--ensure-table`.
//!
//! The executor owns a single connection and a current-thread tokio
//! runtime; each statement blocks until the server replies, which matches
//! the one-row-at-a-time write model.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use log::info;
use rust_decimal::Decimal;
use tiberius::{Client, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::{
    data::Value,
    ddl::{SqlDialect, SqlServerDialect, TableSchema},
    profile::FieldType,
    writer::{DEFAULT_SCHEMA, SqlExecutor, SqlParam},
};

pub struct MssqlExecutor {
    runtime: tokio::runtime::Runtime,
    client: Client<Compat<TcpStream>>,
}

impl MssqlExecutor {
    /// Connects using an ADO-style connection string
    /// (`Server=...;Database=...;User Id=...;Password=...`).
    pub fn connect(connection_string: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Starting async runtime")?;

        let client = runtime
            .block_on(async {
                let config = Config::from_ado_string(connection_string)?;
                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                let client = Client::connect(config, tcp.compat_write()).await?;
                Ok::<_, anyhow::Error>(client)
            })
            .context("Connecting to SQL Server")?;

        Ok(Self { runtime, client })
    }
}

impl SqlExecutor for MssqlExecutor {
    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let owned: Vec<Box<dyn ToSql>> = params.iter().map(to_sql_value).collect();
        let refs: Vec<&dyn ToSql> = owned.iter().map(Box::as_ref).collect();
        let result = self
            .runtime
            .block_on(self.client.execute(sql, &refs))
            .with_context(|| format!("Executing statement against SQL Server: {sql}"))?;
        Ok(result.total())
    }

    fn query_count(&mut self, sql: &str, params: &[SqlParam]) -> Result<i64> {
        let owned: Vec<Box<dyn ToSql>> = params.iter().map(to_sql_value).collect();
        let refs: Vec<&dyn ToSql> = owned.iter().map(Box::as_ref).collect();
        let row = self
            .runtime
            .block_on(async { self.client.query(sql, &refs).await?.into_row().await })
            .with_context(|| format!("Querying SQL Server: {sql}"))?;
        row.and_then(|r| r.get::<i32, _>(0))
            .map(i64::from)
            .ok_or_else(|| anyhow!("Count query returned no rows"))
    }
}

/// Binds a parameter, emitting a typed NULL for absent values so the TDS
/// layer knows the column type.
fn to_sql_value(param: &SqlParam) -> Box<dyn ToSql> {
    match &param.value {
        Some(Value::String(s)) => Box::new(s.clone()),
        Some(Value::Integer(i)) => Box::new(*i),
        Some(Value::Decimal(d)) => Box::new(*d),
        Some(Value::Boolean(b)) => Box::new(*b),
        Some(Value::DateTime(dt)) => Box::new(*dt),
        None => match param.field_type {
            FieldType::String => Box::new(Option::<String>::None),
            FieldType::Int => Box::new(Option::<i64>::None),
            FieldType::Decimal => Box::new(Option::<Decimal>::None),
            FieldType::Bool => Box::new(Option::<bool>::None),
            FieldType::DateTime => Box::new(Option::<NaiveDateTime>::None),
        },
    }
}

/// True when the schema-qualified table already exists.
pub fn table_exists(
    executor: &mut dyn SqlExecutor,
    schema_name: &str,
    table_name: &str,
) -> Result<bool> {
    const EXISTS_SQL: &str = "SELECT COUNT(1) FROM INFORMATION_SCHEMA.TABLES \
                              WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2;";
    let count = executor.query_count(
        EXISTS_SQL,
        &[SqlParam::text(schema_name), SqlParam::text(table_name)],
    )?;
    Ok(count > 0)
}

/// Creates the table when it does not exist yet. Returns `true` when the
/// table was created by this call.
pub fn ensure_table(executor: &mut dyn SqlExecutor, schema: &TableSchema) -> Result<bool> {
    let schema_name = schema
        .schema_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SCHEMA);

    if table_exists(executor, schema_name, &schema.table_name)? {
        info!("Table {} already exists", schema.qualified_name());
        return Ok(false);
    }

    let ddl = SqlServerDialect.generate_create_table(schema);
    executor
        .execute(&ddl, &[])
        .with_context(|| format!("Creating table {}", schema.qualified_name()))?;
    info!("Created table {}", schema.qualified_name());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::TableColumn;

    struct FakeExecutor {
        statements: Vec<String>,
        existing_tables: i64,
    }

    impl SqlExecutor for FakeExecutor {
        fn execute(&mut self, sql: &str, _params: &[SqlParam]) -> Result<u64> {
            self.statements.push(sql.to_string());
            Ok(0)
        }

        fn query_count(&mut self, sql: &str, params: &[SqlParam]) -> Result<i64> {
            assert!(sql.contains("INFORMATION_SCHEMA.TABLES"));
            assert_eq!(params.len(), 2);
            Ok(self.existing_tables)
        }
    }

    fn schema() -> TableSchema {
        TableSchema {
            table_name: "Tickets".into(),
            schema_name: Some("staging".into()),
            columns: vec![TableColumn {
                name: "ticket_id".into(),
                field_type: FieldType::String,
                max_length: Some(50),
                is_required: true,
            }],
        }
    }

    #[test]
    fn ensure_table_creates_when_absent() {
        let mut executor = FakeExecutor {
            statements: Vec::new(),
            existing_tables: 0,
        };
        let created = ensure_table(&mut executor, &schema()).expect("ensure");
        assert!(created);
        assert_eq!(executor.statements.len(), 1);
        assert!(executor.statements[0].starts_with("CREATE TABLE [staging].[Tickets]"));
    }

    #[test]
    fn ensure_table_skips_when_present() {
        let mut executor = FakeExecutor {
            statements: Vec::new(),
            existing_tables: 1,
        };
        let created = ensure_table(&mut executor, &schema()).expect("ensure");
        assert!(!created);
        assert!(executor.statements.is_empty());
    }
}
