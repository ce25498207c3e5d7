//! SQL clause rendering
//!
//! Renders the clause fragments used by [`SelectQuery`](crate::query::SelectQuery)
//! and the gateway's write statements, with `$n` positional placeholders.

use crate::query::ordering::SortOrder;
use crate::query::select::{Comparison, Condition};
use serde_json::Value;

pub struct SqlGenerator;

impl SqlGenerator {
    /// Build a WHERE clause from AND-combined conditions
    pub fn build_where_clause(conditions: &[Condition]) -> (String, Vec<Value>) {
        if conditions.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Vec::with_capacity(conditions.len());
        let fragments = conditions
            .iter()
            .enumerate()
            .map(|(index, condition)| {
                params.push(condition.value.clone());
                let operator = match condition.compare {
                    Comparison::Eq => "=",
                    Comparison::Like => "LIKE",
                };
                format!("{} {} ${}", condition.column, operator, index + 1)
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        (format!("WHERE {}", fragments), params)
    }

    /// Build an ORDER BY clause
    pub fn build_order_clause(order_by: &[(String, SortOrder)]) -> String {
        if order_by.is_empty() {
            return String::new();
        }

        let terms: Vec<String> = order_by
            .iter()
            .map(|(column, order)| format!("{} {}", column, order.to_sql()))
            .collect();

        format!("ORDER BY {}", terms.join(", "))
    }

    /// Build a LIMIT/OFFSET clause
    pub fn build_limit_clause(limit: Option<u64>, offset: Option<u64>) -> String {
        let mut clauses = Vec::new();

        if let Some(limit) = limit {
            clauses.push(format!("LIMIT {}", limit));
        }

        if let Some(offset) = offset {
            clauses.push(format!("OFFSET {}", offset));
        }

        clauses.join(" ")
    }

    /// Build the `col = $n AND ...` fragment for a key-addressed write,
    /// starting placeholders at `first_param`
    pub fn build_key_predicate(columns: &[&str], first_param: usize) -> String {
        columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{} = ${}", column, first_param + index))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_clause_numbers_placeholders_sequentially() {
        let conditions = vec![
            Condition::eq("status", json!("active")),
            Condition::eq("role", json!(2)),
            Condition::like("username", "f%"),
        ];
        let (clause, params) = SqlGenerator::build_where_clause(&conditions);
        assert_eq!(
            clause,
            "WHERE status = $1 AND role = $2 AND username LIKE $3"
        );
        assert_eq!(params, vec![json!("active"), json!(2), json!("f%")]);
    }

    #[test]
    fn empty_conditions_yield_no_clause() {
        let (clause, params) = SqlGenerator::build_where_clause(&[]);
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn order_clause_preserves_encounter_order() {
        let clause = SqlGenerator::build_order_clause(&[
            ("name".into(), SortOrder::Desc),
            ("status".into(), SortOrder::Asc),
        ]);
        assert_eq!(clause, "ORDER BY name DESC, status ASC");
    }

    #[test]
    fn limit_clause_combinations() {
        assert_eq!(SqlGenerator::build_limit_clause(None, None), "");
        assert_eq!(SqlGenerator::build_limit_clause(Some(10), None), "LIMIT 10");
        assert_eq!(
            SqlGenerator::build_limit_clause(Some(10), Some(30)),
            "LIMIT 10 OFFSET 30"
        );
    }

    #[test]
    fn key_predicate_offsets_placeholders() {
        let predicate = SqlGenerator::build_key_predicate(&["role", "resource"], 3);
        assert_eq!(predicate, "role = $3 AND resource = $4");
    }
}
