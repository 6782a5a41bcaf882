//!
//! The property bag and its attached connection handle.
//!

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::call::ProcedureCall;
use crate::value::Value;
use crate::ToStorage;

/// One slot in the bag: either a plain value, or a rich value that
/// produces its own storage representation when an argument is resolved
/// from it. The two cases are an enum, so probing for the conversion
/// capability is a match arm and can never fail.
#[derive(Clone)]
pub enum Property {
    Plain(Value),
    Rich(Arc<dyn ToStorage + Send + Sync>),
}

impl Property {
    pub fn rich(value: impl ToStorage + Send + Sync + 'static) -> Self {
        Property::Rich(Arc::new(value))
    }

    /// The value this slot contributes to a call argument.
    pub fn resolve(&self) -> Value {
        match self {
            Property::Plain(value) => value.clone(),
            Property::Rich(rich) => rich.to_storage(),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Property::Rich(_) => f.write_str("Rich(..)"),
        }
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::Plain(value)
    }
}

macro_rules! property_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Property {
                fn from(value: $ty) -> Self {
                    Property::Plain(Value::from(value))
                }
            }
        )*
    };
}

property_from!(bool, i32, i64, f64, &str, String, Vec<u8>);

///
/// A bag of named properties plus a connection handle.
///
/// Properties are accepted without validation; the connection, once set,
/// is reused by every call made through this instance unless a call
/// supplies its own. The handle is a pass-through reference: it is never
/// closed, pooled or synchronized here.
///
pub struct Instance<C> {
    properties: HashMap<String, Property>,
    connection: Option<C>,
}

impl<C> Instance<C> {
    pub fn new() -> Self {
        Self {
            properties: HashMap::new(),
            connection: None,
        }
    }

    /// Build an instance from an initial set of key/value pairs.
    /// The pairs are copied one level deep; nothing is validated.
    pub fn from_properties(properties: HashMap<String, Property>) -> Self {
        Self {
            properties,
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: C) -> Self {
        self.set_connection(connection);
        self
    }

    /// Replace the active connection going forward.
    pub fn set_connection(&mut self, connection: C) {
        self.connection = Some(connection);
    }

    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Property>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        self.properties.remove(key)
    }

    pub fn properties(&self) -> &HashMap<String, Property> {
        &self.properties
    }

    /// Begin a call to the named stored procedure.
    pub fn procedure(&self, name: impl Into<String>) -> ProcedureCall<'_, C> {
        ProcedureCall::new(self, name.into())
    }
}

impl<C> Default for Instance<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Instance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("properties", &self.properties)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_are_copied_at_construction() {
        let mut pairs = HashMap::new();
        pairs.insert("id".to_string(), Property::from(3i64));
        pairs.insert("name".to_string(), Property::from("x"));

        let instance = Instance::<()>::from_properties(pairs);
        assert_eq!(instance.get("id").unwrap().resolve(), Value::Int(3));
        assert_eq!(
            instance.get("name").unwrap().resolve(),
            Value::Text("x".into())
        );
        assert!(instance.get("missing").is_none());
    }

    #[test]
    fn connection_set_at_construction_is_active() {
        let instance = Instance::new().with_connection(7u32);
        assert_eq!(instance.connection(), Some(&7));
    }

    #[test]
    fn set_connection_replaces_the_handle() {
        let mut instance = Instance::new().with_connection(1u32);
        instance.set_connection(2);
        assert_eq!(instance.connection(), Some(&2));
    }

    #[test]
    fn set_and_remove_properties() {
        let mut instance: Instance<()> = Instance::new();
        instance.set("id", 5i64);
        assert_eq!(instance.get("id").unwrap().resolve(), Value::Int(5));
        instance.set("id", 6i64);
        assert_eq!(instance.get("id").unwrap().resolve(), Value::Int(6));
        assert!(instance.remove("id").is_some());
        assert!(instance.get("id").is_none());
    }

    #[test]
    fn rich_property_resolves_through_to_storage() {
        struct Point {
            x: i64,
            y: i64,
        }

        impl ToStorage for Point {
            fn to_storage(&self) -> Value {
                Value::Array(vec![Value::Int(self.x), Value::Int(self.y)])
            }
        }

        let mut instance: Instance<()> = Instance::new();
        instance.set("origin", Property::rich(Point { x: 1, y: 2 }));
        assert_eq!(
            instance.get("origin").unwrap().resolve(),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
