//!
//! Declared procedure parameters and the naming convention that maps
//! them onto property keys.
//!

use crate::value::Value;

/// Leading marker on declared parameter names, stripped once to obtain
/// the property key.
pub const PARAM_PREFIX: &str = "in_";

/// Type tag signalling that an argument needs binary-safe encoding.
pub const BINARY_TYPE: &str = "bytea";

/// Metadata for one declared parameter of a stored procedure, as
/// produced by [ProcedureClient::function_info](crate::ProcedureClient::function_info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub type_name: String,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.type_name.eq_ignore_ascii_case(BINARY_TYPE)
    }
}

/// The property key for a declared parameter name.
///
/// Exactly one leading `in_` is stripped; a name without the prefix is
/// used unchanged. `in_in_id` therefore maps to `in_id`, not `id`.
/// Matching against the bag is exact, never partial or fuzzy.
pub fn property_key(param_name: &str) -> &str {
    param_name.strip_prefix(PARAM_PREFIX).unwrap_or(param_name)
}

/// One resolved positional argument.
///
/// `Binary` is the tagged wrapper produced for `bytea` parameters; it
/// tells the execution layer to use binary-safe encoding for the value.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Plain(Value),
    Binary(Value),
}

impl CallArg {
    pub fn value(&self) -> &Value {
        match self {
            CallArg::Plain(value) | CallArg::Binary(value) => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            CallArg::Plain(value) | CallArg::Binary(value) => value,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, CallArg::Binary(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_stripped_once() {
        assert_eq!(property_key("in_id"), "id");
        assert_eq!(property_key("in_in_id"), "in_id");
    }

    #[test]
    fn unprefixed_name_is_unchanged() {
        assert_eq!(property_key("id"), "id");
        assert_eq!(property_key("input"), "input");
        assert_eq!(property_key(""), "");
    }

    #[test]
    fn binary_tag_is_case_insensitive() {
        assert!(ParamDescriptor::new("in_payload", "bytea").is_binary());
        assert!(ParamDescriptor::new("in_payload", "BYTEA").is_binary());
        assert!(!ParamDescriptor::new("in_id", "int").is_binary());
        assert!(!ParamDescriptor::new("in_note", "text").is_binary());
    }

    #[test]
    fn call_arg_exposes_inner_value() {
        let plain = CallArg::Plain(Value::Int(1));
        let binary = CallArg::Binary(Value::Text("xyz".into()));
        assert_eq!(plain.value(), &Value::Int(1));
        assert!(!plain.is_binary());
        assert!(binary.is_binary());
        assert_eq!(binary.into_value(), Value::Text("xyz".into()));
    }
}
