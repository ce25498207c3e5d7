//! RQL filter expressions
//!
//! The flat filter/sort/paging mini-language accepted by the gateways: an
//! ordered list whose entries are either positional operator strings, e.g.
//! `sort(-name,+status)` or `limit(30,10)`, or field/value comparisons where
//! `*` in the value is a substring wildcard. Translation into a query lives
//! on [`Table`](crate::gateway::Table), which knows the field/column map.

/// One entry of an RQL expression list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RqlExpr {
    /// Positional operator-syntax entry, e.g. `sort(-name)`
    Operator(String),
    /// Field/value comparison entry
    Comparison { field: String, value: String },
}

impl RqlExpr {
    pub fn call(text: impl Into<String>) -> Self {
        RqlExpr::Operator(text.into())
    }

    pub fn compare(field: impl Into<String>, value: impl Into<String>) -> Self {
        RqlExpr::Comparison {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for RqlExpr {
    fn from(text: &str) -> Self {
        RqlExpr::Operator(text.to_string())
    }
}

impl From<(&str, &str)> for RqlExpr {
    fn from((field, value): (&str, &str)) -> Self {
        RqlExpr::compare(field, value)
    }
}

/// Split `name(args)` into its operator name and raw argument text
pub(crate) fn parse_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    if !text.ends_with(')') || open + 1 > text.len() - 1 {
        return None;
    }
    Some((&text[..open], &text[open + 1..text.len() - 1]))
}
