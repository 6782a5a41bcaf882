//!
//! Result rows as returned by the execution layer.
//!

use std::sync::Arc;

use crate::value::Value;

/// One result row: values positionally aligned to a column-name list
/// shared across the whole result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.values.get(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Arc<[String]> {
        vec!["id".to_string(), "name".to_string()].into()
    }

    #[test]
    fn get_by_name_and_index() {
        let row = Row::new(columns(), vec![Value::Int(3), Value::Text("x".into())]);
        assert_eq!(row.get("id"), Some(&Value::Int(3)));
        assert_eq!(row.get("name"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_index(1), Some(&Value::Text("x".into())));
        assert_eq!(row.get_index(2), None);
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
    }

    #[test]
    fn column_list_is_shared() {
        let columns = columns();
        let a = Row::new(columns.clone(), vec![Value::Int(1), Value::Null]);
        let b = Row::new(columns, vec![Value::Int(2), Value::Null]);
        assert_eq!(a.columns(), b.columns());
    }
}
