//! Continuation-vs-terminal routing.
//!
//! Well-known operation names are classified from static tables. Anything
//! else is classified from the contract the builder declares for it, first
//! on the builder and then on its nested query object. Operations with no
//! chainable contract are terminal: executing is preferred over silently
//! deferring forever.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::builder::QueryBuilder;

/// Routing decision for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Extends the query; nothing runs
    Continuation,
    /// Runs the query and returns data
    Terminal,
}

static TERMINAL: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // retrieval
        "get", "all", "first", "find", "findmany", "findorfail", "findornew", "firstornew",
        "firstorcreate", "firstorfail", "firstor", "firstwhere", "sole", "value", "pluck",
        "cursor", "paginate", "simplepaginate",
        // aggregates
        "count", "min", "max", "sum", "avg", "average",
        // existence
        "exists", "doesntexist",
    ]
    .into_iter()
    .collect()
});

static CONTINUATION: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // filtering
        "where", "orwhere", "wherenot", "wherein", "wherenotin", "wherenull", "wherenotnull",
        "wherebetween", "wherecolumn", "wherehas",
        // ordering
        "orderby", "orderbydesc", "latest", "oldest",
        // limiting
        "limit", "take", "offset", "skip", "forpage",
        // projection and grouping
        "select", "addselect", "distinct", "groupby", "having",
        // joins
        "join", "leftjoin", "rightjoin",
        // eager loading
        "with", "without", "withcount",
        // conditional composition
        "when", "unless", "scope",
    ]
    .into_iter()
    .collect()
});

/// Fold an operation name to its table form: ASCII lower case without
/// underscores, so `orderBy`, `order_by` and `ORDERBY` coincide.
pub fn normalize(operation: &str) -> String {
    operation
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Stateless classification policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodClassifier;

impl MethodClassifier {
    /// Classification from the static tables alone.
    pub fn known(operation: &str) -> Option<Classification> {
        let name = normalize(operation);
        if TERMINAL.contains(name.as_str()) {
            Some(Classification::Terminal)
        } else if CONTINUATION.contains(name.as_str()) {
            Some(Classification::Continuation)
        } else {
            None
        }
    }

    /// Classify `operation` as applied to `builder`.
    pub fn classify<B: QueryBuilder>(operation: &str, builder: &B) -> Classification {
        if let Some(known) = Self::known(operation) {
            return known;
        }

        let declared = builder
            .declared_result(operation)
            .or_else(|| builder.nested_declared_result(operation));

        let classification = match declared {
            Some(contract) if contract.is_chainable() => Classification::Continuation,
            _ => Classification::Terminal,
        };
        tracing::trace!(operation, ?declared, ?classification, "classified by declared contract");
        classification
    }

    /// Whether anything at all is known about `operation`.
    pub fn is_resolvable<B: QueryBuilder>(operation: &str, builder: &B) -> bool {
        Self::known(operation).is_some()
            || builder.declared_result(operation).is_some()
            || builder.nested_declared_result(operation).is_some()
    }
}
