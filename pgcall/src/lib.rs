//!
//! Map objects onto PostgreSQL stored procedure calls.
//!
//! An [Instance](instance::Instance) is an open-ended bag of named
//! properties with an attached connection handle. Invoking a procedure
//! through it asks the connection for the procedure's declared parameter
//! list, resolves each parameter against the bag by naming convention
//! (one leading `in_` is stripped from the declared name), assembles the
//! positional argument list and delegates execution:
//!
//! ```text
//! caller ──▶ Instance::procedure("customer_get")
//!                 │ function_info          (parameter descriptors)
//!                 │ resolve_args           (overrides, properties, in_ prefix)
//!                 ▼ call_procedure         (positional, descriptor order)
//!            ProcedureClient ──▶ rows
//! ```
//!
//! The actual metadata lookup and execution live behind the
//! [ProcedureClient] trait; the `postgres` feature provides an sqlx-backed
//! implementation.
//!

use async_trait::*;

pub use pgcall_macros::*;

pub mod call;
pub mod instance;
pub mod param;
pub mod prelude;
pub mod row;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use crate::call::ProcedureCall;
pub use crate::instance::{Instance, Property};
pub use crate::param::{CallArg, ParamDescriptor};
pub use crate::row::Row;
pub use crate::value::Value;

/// Failure reported by a [ProcedureClient]. Opaque to this layer; it is
/// carried, never translated.
pub type ClientError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum CallError {
    #[error("no procedure name given")]
    MissingProcedureName,

    #[error("no connection available for the call")]
    MissingConnection,

    #[error("parameter lookup for '{procedure}' failed: {source}")]
    MetadataLookupFailed {
        procedure: String,
        #[source]
        source: ClientError,
    },

    #[error("execution of '{procedure}' failed: {source}")]
    ExecutionFailed {
        procedure: String,
        #[source]
        source: ClientError,
    },
}

pub type CallResult<T> = Result<T, CallError>;

/// A value that knows its own storage representation.
///
/// Rich domain types implement this (or `#[derive(ToStorage)]`) so they can
/// sit in a property bag and still cross the wire as a plain [Value].
/// Absence of the capability is a normal branch, never an error: plain
/// values simply pass through unconverted.
pub trait ToStorage {
    fn to_storage(&self) -> Value;
}

/// An opaque expression forwarded untouched to the execution layer, to be
/// computed over the procedure's result set (e.g. a running sum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningAggregate(String);

impl RunningAggregate {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn expression(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunningAggregate {
    fn from(expression: &str) -> Self {
        Self(expression.to_string())
    }
}

impl From<String> for RunningAggregate {
    fn from(expression: String) -> Self {
        Self(expression)
    }
}

///
/// The lower-level procedure-calling collaborator.
///
/// Implementations own connectivity, metadata introspection and SQL
/// execution. This crate only translates named arguments into positional
/// ones; both entrypoints here are single-shot and their failures
/// propagate unchanged to the caller. Overloaded procedure names are a
/// caller precondition, not something detected here.
///
#[async_trait]
pub trait ProcedureClient: Send + Sync {
    /// Declared parameters of `procedure`, in declaration order.
    async fn function_info(
        &self,
        procedure: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ParamDescriptor>, ClientError>;

    /// Execute `procedure` with positional arguments, returning result rows.
    async fn call_procedure(
        &self,
        procedure: &str,
        schema: Option<&str>,
        args: Vec<CallArg>,
        aggregates: &[RunningAggregate],
    ) -> Result<Vec<Row>, ClientError>;
}
