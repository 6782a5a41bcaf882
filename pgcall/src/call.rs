//!
//! The dispatcher: translate a named-argument stored-procedure call
//! into a positional one, using instance state as the default argument
//! source.
//!

use std::collections::HashMap;

use tracing::debug;

use crate::instance::{Instance, Property};
use crate::param::{property_key, CallArg, ParamDescriptor};
use crate::row::Row;
use crate::{CallError, CallResult, ProcedureClient, RunningAggregate};

/// One stored-procedure call under construction.
///
/// Created by [Instance::procedure]; every setter is optional. `invoke`
/// runs the named-argument path, `invoke_positional` skips argument
/// resolution and passes an explicit ordered list through.
pub struct ProcedureCall<'a, C> {
    instance: &'a Instance<C>,
    procedure: String,
    schema: Option<String>,
    overrides: HashMap<String, Property>,
    aggregates: Vec<RunningAggregate>,
    connection: Option<C>,
}

impl<'a, C> ProcedureCall<'a, C> {
    pub(crate) fn new(instance: &'a Instance<C>, procedure: String) -> Self {
        Self {
            instance,
            procedure,
            schema: None,
            overrides: HashMap::new(),
            aggregates: Vec::new(),
            connection: None,
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Override one property for this call only.
    ///
    /// A key that is present always wins over the instance property,
    /// including explicit `Null`/`false`/`0`/`""`; only absence falls
    /// back to the bag.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Forward an opaque running-aggregate expression to the execution
    /// layer. Not interpreted here.
    pub fn aggregate(mut self, aggregate: impl Into<RunningAggregate>) -> Self {
        self.aggregates.push(aggregate.into());
        self
    }

    /// Use this connection for this call instead of the instance's.
    pub fn connection(mut self, connection: C) -> Self {
        self.connection = Some(connection);
        self
    }

    fn effective_connection(&self) -> CallResult<&C> {
        self.connection
            .as_ref()
            .or_else(|| self.instance.connection())
            .ok_or(CallError::MissingConnection)
    }

    fn require_procedure(&self) -> CallResult<&str> {
        if self.procedure.is_empty() {
            return Err(CallError::MissingProcedureName);
        }
        Ok(&self.procedure)
    }
}

impl<'a, C> ProcedureCall<'a, C>
where
    C: ProcedureClient,
{
    /// The named-argument path: look up the procedure's declared
    /// parameters, resolve each one from overrides and the property bag,
    /// and delegate the assembled positional call.
    pub async fn invoke(self) -> CallResult<Vec<Row>> {
        let connection = self.effective_connection()?;
        let procedure = self.require_procedure()?;
        let schema = self.schema.as_deref();

        let descriptors = connection
            .function_info(procedure, schema)
            .await
            .map_err(|source| CallError::MetadataLookupFailed {
                procedure: procedure.to_string(),
                source,
            })?;

        let args = resolve_args(&descriptors, self.instance.properties(), &self.overrides);
        debug!(
            procedure,
            args = args.len(),
            "resolved named-argument call"
        );

        execute(connection, procedure, schema, args, &self.aggregates).await
    }

    /// The positional path: no metadata lookup, no name matching; the
    /// argument list is forwarded verbatim.
    pub async fn invoke_positional(self, args: Vec<CallArg>) -> CallResult<Vec<Row>> {
        let connection = self.effective_connection()?;
        let procedure = self.require_procedure()?;

        execute(
            connection,
            procedure,
            self.schema.as_deref(),
            args,
            &self.aggregates,
        )
        .await
    }
}

async fn execute<C>(
    connection: &C,
    procedure: &str,
    schema: Option<&str>,
    args: Vec<CallArg>,
    aggregates: &[RunningAggregate],
) -> CallResult<Vec<Row>>
where
    C: ProcedureClient,
{
    connection
        .call_procedure(procedure, schema, args, aggregates)
        .await
        .map_err(|source| CallError::ExecutionFailed {
            procedure: procedure.to_string(),
            source,
        })
}

/// Assemble the positional argument list for a descriptor list.
///
/// Order is exactly descriptor order. Per descriptor: strip the `in_`
/// prefix, take the override if its key is present, else the instance
/// property, else `Null` (an unmatched parameter is not an error); a
/// rich property is replaced by its storage representation; a `bytea`
/// descriptor wraps the result for binary-safe encoding.
pub fn resolve_args(
    descriptors: &[ParamDescriptor],
    properties: &HashMap<String, Property>,
    overrides: &HashMap<String, Property>,
) -> Vec<CallArg> {
    descriptors
        .iter()
        .map(|descriptor| {
            let key = property_key(&descriptor.name);
            let value = overrides
                .get(key)
                .or_else(|| properties.get(key))
                .map(Property::resolve)
                .unwrap_or(crate::Value::Null);

            if descriptor.is_binary() {
                CallArg::Binary(value)
            } else {
                CallArg::Plain(value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ToStorage, Value};

    fn props(pairs: Vec<(&str, Property)>) -> HashMap<String, Property> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn arguments_follow_descriptor_order() {
        let descriptors = vec![
            ParamDescriptor::new("in_b", "int"),
            ParamDescriptor::new("in_a", "int"),
            ParamDescriptor::new("in_c", "int"),
        ];
        let properties = props(vec![
            ("a", Property::from(1i64)),
            ("b", Property::from(2i64)),
            ("c", Property::from(3i64)),
        ]);

        let args = resolve_args(&descriptors, &properties, &HashMap::new());
        assert_eq!(
            args,
            vec![
                CallArg::Plain(Value::Int(2)),
                CallArg::Plain(Value::Int(1)),
                CallArg::Plain(Value::Int(3)),
            ]
        );
    }

    #[test]
    fn override_wins_over_property() {
        let descriptors = vec![ParamDescriptor::new("in_id", "int")];
        let properties = props(vec![("id", Property::from(3i64))]);
        let overrides = props(vec![("id", Property::from(7i64))]);

        let args = resolve_args(&descriptors, &properties, &overrides);
        assert_eq!(args, vec![CallArg::Plain(Value::Int(7))]);
    }

    #[test]
    fn present_but_falsy_override_still_wins() {
        let descriptors = vec![
            ParamDescriptor::new("in_id", "int"),
            ParamDescriptor::new("in_note", "text"),
        ];
        let properties = props(vec![
            ("id", Property::from(3i64)),
            ("note", Property::from("kept")),
        ]);
        let overrides = props(vec![
            ("id", Property::from(Value::Null)),
            ("note", Property::from("")),
        ]);

        let args = resolve_args(&descriptors, &properties, &overrides);
        assert_eq!(
            args,
            vec![
                CallArg::Plain(Value::Null),
                CallArg::Plain(Value::Text(String::new())),
            ]
        );
    }

    #[test]
    fn unmatched_parameter_resolves_to_null() {
        let descriptors = vec![ParamDescriptor::new("in_missing", "int")];
        let args = resolve_args(&descriptors, &HashMap::new(), &HashMap::new());
        assert_eq!(args, vec![CallArg::Plain(Value::Null)]);
    }

    #[test]
    fn unprefixed_parameter_matches_exact_property() {
        let descriptors = vec![ParamDescriptor::new("id", "int")];
        let properties = props(vec![("id", Property::from(9i64))]);
        let args = resolve_args(&descriptors, &properties, &HashMap::new());
        assert_eq!(args, vec![CallArg::Plain(Value::Int(9))]);
    }

    #[test]
    fn bytea_descriptor_wraps_the_value() {
        let descriptors = vec![
            ParamDescriptor::new("in_payload", "bytea"),
            ParamDescriptor::new("in_id", "int"),
        ];
        let properties = props(vec![
            ("payload", Property::from("xyz")),
            ("id", Property::from(1i64)),
        ]);

        let args = resolve_args(&descriptors, &properties, &HashMap::new());
        assert_eq!(
            args,
            vec![
                CallArg::Binary(Value::Text("xyz".into())),
                CallArg::Plain(Value::Int(1)),
            ]
        );
    }

    #[test]
    fn rich_property_is_replaced_by_its_storage_representation() {
        struct Money {
            cents: i64,
        }

        impl ToStorage for Money {
            fn to_storage(&self) -> Value {
                Value::Int(self.cents)
            }
        }

        let descriptors = vec![ParamDescriptor::new("in_amount", "int")];
        let properties = props(vec![("amount", Property::rich(Money { cents: 250 }))]);

        let args = resolve_args(&descriptors, &properties, &HashMap::new());
        assert_eq!(args, vec![CallArg::Plain(Value::Int(250))]);
    }
}
