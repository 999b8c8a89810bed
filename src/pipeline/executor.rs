use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use r2d2::Pool;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value as Json};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::db::db_pool::DuckDBConnectionManager;
use crate::pipeline::error::ExecutionError;
use crate::pipeline::safety::ExecutableStatement;
use crate::pipeline::types::{ResultRow, ResultSet};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub struct QueryExecutor {
    pool: Pool<DuckDBConnectionManager>,
}

impl QueryExecutor {
    pub fn new(pool: Pool<DuckDBConnectionManager>) -> Self {
        Self { pool }
    }

    /// Runs exactly one validated statement. No retries.
    pub async fn execute(&self, stmt: &ExecutableStatement) -> Result<ResultSet, ExecutionError> {
        let pool = self.pool.clone();
        let sql = stmt.as_str().to_string();

        let task = tokio::task::spawn_blocking(move || -> Result<ResultSet, ExecutionError> {
            let start_time = Instant::now();
            let conn = pool.get()?;
            let result = run_query(&conn, &sql)?;
            info!(
                "Query executed successfully. Row count: {}, Execution time: {}ms",
                result.rows.len(),
                start_time.elapsed().as_millis()
            );
            Ok(result)
        });

        match task.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(ExecutionError::SchemaMissing { relation })) => {
                warn!("Relation '{}' does not exist", relation);
                Err(ExecutionError::SchemaMissing { relation })
            }
            Ok(Err(e)) => {
                error!("Database query error: {}", e);
                Err(e)
            }
            Err(join_err) => {
                error!("Task join error: {}", join_err);
                Err(ExecutionError::Store(format!("Database task execution failed: {}", join_err)))
            }
        }
    }
}

fn run_query(conn: &duckdb::Connection, sql: &str) -> Result<ResultSet, ExecutionError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    // Column names are only known once the statement has run
    let columns = rows
        .as_ref()
        .map(|s| s.column_names())
        .unwrap_or_default();

    let mut result = ResultSet {
        columns,
        rows: Vec::new(),
    };

    while let Some(row) = rows.next()? {
        let mut record = ResultRow::new();
        for (idx, name) in result.columns.iter().enumerate() {
            let value: Value = row.get(idx)?;
            record.insert(name.clone(), to_json(value));
        }
        result.rows.push(record);
    }

    Ok(result)
}

fn float(v: f64) -> Json {
    Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null)
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Maps a DuckDB value onto a JSON scalar.
pub(crate) fn to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(b),
        Value::TinyInt(v) => Json::from(v),
        Value::SmallInt(v) => Json::from(v),
        Value::Int(v) => Json::from(v),
        Value::BigInt(v) => Json::from(v),
        Value::UTinyInt(v) => Json::from(v),
        Value::USmallInt(v) => Json::from(v),
        Value::UInt(v) => Json::from(v),
        Value::UBigInt(v) => Json::from(v),
        Value::HugeInt(v) => match i64::try_from(v) {
            Ok(small) => Json::from(small),
            Err(_) => float(v as f64),
        },
        Value::Float(v) => float(v as f64),
        Value::Double(v) => float(v),
        Value::Decimal(d) => d.to_f64().map(float).unwrap_or(Json::Null),
        Value::Text(s) | Value::Enum(s) => Json::String(s),
        Value::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| Json::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Json::Null),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|ts| Json::String(ts.to_rfc3339()))
            .unwrap_or(Json::Null),
        Value::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|t| Json::String(t.format("%H:%M:%S").to_string()))
            .unwrap_or(Json::Null)
        }
        other => Json::String(format!("{:?}", other)),
    }
}
