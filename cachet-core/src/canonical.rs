//! Canonical query text.
//!
//! Cache keys are derived from the textual form of a query, so that form
//! must be a pure function of the query's content. JSON objects are written
//! with their keys sorted and floats in their shortest round-trip form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One recorded builder operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub operation: String,
    pub arguments: Vec<Value>,
}

/// Ordered list of the operations applied to a query.
///
/// Builders that have no native textual form (SQL or otherwise) can record
/// their continuations here and use [`CanonicalQuery::to_canonical_string`]
/// as their canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuery {
    source: String,
    clauses: Vec<Clause>,
}

impl CanonicalQuery {
    /// Start an empty query against `source` (table or entity path).
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            clauses: Vec::new(),
        }
    }

    /// Record an operation.
    pub fn push(&mut self, operation: impl Into<String>, arguments: Vec<Value>) {
        self.clauses.push(Clause {
            operation: operation.into(),
            arguments,
        });
    }

    /// Recorded operations in application order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `from <source> | op(arg, ...) | op(...)`
    pub fn to_canonical_string(&self) -> String {
        let mut out = format!("from {}", self.source);
        for clause in &self.clauses {
            out.push_str(" | ");
            out.push_str(&clause.operation);
            out.push('(');
            out.push_str(&canonical_arguments(&clause.arguments));
            out.push(')');
        }
        out
    }
}

/// Comma-separated canonical JSON of an argument list.
pub fn canonical_arguments(arguments: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical(arg, &mut out);
    }
    out
}

/// Canonical JSON text of a single value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a str never fails
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
