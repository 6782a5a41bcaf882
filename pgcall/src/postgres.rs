//!
//! The sqlx-backed [ProcedureClient] for PostgreSQL.
//!
//! Parameter metadata comes from one `pg_proc` catalog query; execution
//! builds a `SELECT t.* FROM "schema"."proc"($1, ...) AS t` statement,
//! casting each placeholder to the declared parameter type so function
//! resolution never depends on the driver's inferred bind types.
//!

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Column as _, Row as _, TypeInfo as _};
use tracing::debug;

use crate::param::{CallArg, ParamDescriptor};
use crate::value::Value;
use crate::{ClientError, ProcedureClient, RunningAggregate};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// Schema assumed when a call does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

const FUNCTION_INFO_SQL: &str = "\
SELECT coalesce(p.proargnames, ARRAY[]::text[]) AS names,
       coalesce(p.proargmodes::text[], ARRAY[]::text[]) AS modes,
       coalesce((SELECT array_agg(format_type(t.oid, NULL) ORDER BY t.ord)
                   FROM unnest(p.proargtypes) WITH ORDINALITY AS t(oid, ord)),
                ARRAY[]::text[]) AS types
  FROM pg_proc p
  JOIN pg_namespace n ON n.oid = p.pronamespace
 WHERE p.proname = $1
   AND n.nspname = coalesce($2, 'public')";

/// A [ProcedureClient] over an `sqlx` connection pool.
///
/// The pool is a cheap shared handle; cloning the client clones the
/// handle, not the connections.
#[derive(Clone, Debug)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: PgPool::connect(url).await?,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProcedureClient for PgClient {
    async fn function_info(
        &self,
        procedure: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ParamDescriptor>, ClientError> {
        let rows = sqlx::query(FUNCTION_INFO_SQL)
            .bind(procedure)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        let row = match rows.len() {
            0 => {
                return Err(format!(
                    "no function named '{}' in schema '{}'",
                    procedure,
                    schema.unwrap_or(DEFAULT_SCHEMA)
                )
                .into())
            }
            1 => &rows[0],
            _ => {
                return Err(format!(
                    "function '{}' is overloaded; overloaded names are not supported",
                    procedure
                )
                .into())
            }
        };

        let names: Vec<String> = row.try_get("names")?;
        let modes: Vec<String> = row.try_get("modes")?;
        let types: Vec<String> = row.try_get("types")?;

        Ok(input_descriptors(names, modes, types))
    }

    async fn call_procedure(
        &self,
        procedure: &str,
        schema: Option<&str>,
        args: Vec<CallArg>,
        aggregates: &[RunningAggregate],
    ) -> Result<Vec<crate::Row>, ClientError> {
        // Declared types drive the placeholder casts. A failed lookup is
        // not fatal here: the call proceeds uncast and the server reports
        // whatever is actually wrong with it.
        let casts: Vec<String> = match self.function_info(procedure, schema).await {
            Ok(descriptors) => descriptors
                .into_iter()
                .map(|descriptor| descriptor.type_name)
                .collect(),
            Err(error) => {
                debug!(procedure, %error, "cast lookup failed, calling uncast");
                Vec::new()
            }
        };

        let sql = call_sql(procedure, schema, args.len(), &casts, aggregates);
        debug!(%sql, "executing procedure call");

        let mut query = sqlx::query(&sql);
        for arg in args {
            query = bind_arg(query, arg);
        }

        let pg_rows = query.fetch_all(&self.pool).await?;
        let columns: Arc<[String]> = match pg_rows.first() {
            Some(row) => row
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect::<Vec<_>>()
                .into(),
            None => Vec::new().into(),
        };

        pg_rows
            .iter()
            .map(|row| decode_row(row, &columns))
            .collect()
    }
}

/// Pair declared argument names with input types.
///
/// `proargnames` covers every argument in declaration order while
/// `proargtypes` lists only the inputs, and OUT parameters may be
/// interleaved with inputs. An empty mode list means all arguments are
/// inputs; otherwise only `i`/`b`/`v` (IN, INOUT, VARIADIC) names
/// consume a type and become descriptors.
fn input_descriptors(
    names: Vec<String>,
    modes: Vec<String>,
    types: Vec<String>,
) -> Vec<ParamDescriptor> {
    let mut types = types.into_iter();
    names
        .into_iter()
        .enumerate()
        .filter(|(index, _)| {
            modes.is_empty() || matches!(modes.get(*index).map(String::as_str), Some("i" | "b" | "v"))
        })
        .filter_map(|(_, name)| {
            types
                .next()
                .map(|type_name| ParamDescriptor::new(name, type_name))
        })
        .collect()
}

fn call_sql(
    procedure: &str,
    schema: Option<&str>,
    argc: usize,
    casts: &[String],
    aggregates: &[RunningAggregate],
) -> String {
    let mut sql = String::from("SELECT t.*");
    for aggregate in aggregates {
        // The expression is opaque pass-through data, forwarded verbatim.
        sql.push_str(", ");
        sql.push_str(aggregate.expression());
    }

    sql.push_str(" FROM ");
    sql.push_str(&quote_ident(schema.unwrap_or(DEFAULT_SCHEMA)));
    sql.push('.');
    sql.push_str(&quote_ident(procedure));

    sql.push('(');
    for index in 0..argc {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push('$');
        sql.push_str(&(index + 1).to_string());
        if let Some(type_name) = casts.get(index) {
            sql.push_str("::");
            sql.push_str(type_name);
        }
    }
    sql.push_str(") AS t");
    sql
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn bind_arg(query: PgQuery<'_>, arg: CallArg) -> PgQuery<'_> {
    match arg {
        CallArg::Binary(value) => query.bind(binary_payload(value)),
        CallArg::Plain(value) => match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Text(s) => query.bind(s),
            Value::Bytes(b) => query.bind(b),
            array_or_object => query.bind(serde_json::Value::from(array_or_object)),
        },
    }
}

/// Binary-safe payload for a `bytea` argument. Text and bytes pass their
/// raw content; anything else crosses as its JSON encoding.
fn binary_payload(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        Value::Bytes(bytes) => Some(bytes),
        Value::Text(text) => Some(text.into_bytes()),
        other => Some(serde_json::Value::from(other).to_string().into_bytes()),
    }
}

fn decode_row(row: &PgRow, columns: &Arc<[String]>) -> Result<crate::Row, ClientError> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, index, column.type_info().name())?);
    }
    Ok(crate::Row::new(columns.clone(), values))
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value, ClientError> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|i| Value::Int(i as i64)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|i| Value::Int(i as i64)),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|f| Value::Float(f as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::Text)
        }
        // Types without a mapping come through as text where the driver
        // allows it, else as Null.
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
