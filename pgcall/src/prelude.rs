pub use crate::call::{resolve_args, ProcedureCall};
pub use crate::instance::{Instance, Property};
pub use crate::param::{property_key, CallArg, ParamDescriptor};
pub use crate::row::Row;
pub use crate::value::Value;
pub use crate::{CallError, CallResult, ClientError, ProcedureClient, RunningAggregate, ToStorage};

#[cfg(feature = "postgres")]
pub use crate::postgres::PgClient;
