//! Metadata filter language.
//!
//! A filter is a JSON document in the same shape the collection clients accept:
//!
//! ```json
//! {"$or": [{"type": {"$eq": "jpg"}}, {"type": {"$eq": "png"}}]}
//! ```
//!
//! Supported: `$and`, `$or` (non-empty arrays of filters) and per-field `$eq`, `$ne`,
//! `$in`. A filter compiles to a parameterised SQL clause and can also be evaluated
//! against a metadata object directly.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter must be a JSON object")]
    NotAnObject,
    #[error("filter object must have exactly one key, found {0}")]
    KeyCount(usize),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("{0} expects a non-empty array")]
    ExpectedArray(String),
    #[error("condition on field {0} must be an object with exactly one operator")]
    BadCondition(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

/// A bind parameter produced by [`Filter::to_sql`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A metadata key, bound as `text`.
    Text(String),
    /// A metadata value, bound as `jsonb`.
    Json(Value),
}

impl Filter {
    /// `{"$or": [{"type": {"$eq": t}} ...]}` over the given types.
    pub fn any_type<S: AsRef<str>>(types: &[S]) -> Self {
        Filter::Or(
            types
                .iter()
                .map(|t| Filter::Eq("type".into(), Value::String(t.as_ref().to_string())))
                .collect(),
        )
    }

    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        let obj = value.as_object().ok_or(FilterError::NotAnObject)?;
        let (key, inner) = single_entry(obj)?;

        match key.as_str() {
            "$and" | "$or" => {
                let items = inner
                    .as_array()
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| FilterError::ExpectedArray(key.clone()))?;
                let children = items.iter().map(Filter::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if key == "$and" {
                    Filter::And(children)
                } else {
                    Filter::Or(children)
                })
            }
            op if op.starts_with('$') => Err(FilterError::UnknownOperator(op.to_string())),
            field => parse_condition(field, inner),
        }
    }

    /// Evaluate against a record's metadata. A missing field never matches.
    pub fn matches(&self, metadata: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => metadata.get(field) == Some(expected),
            Filter::Ne(field, expected) => metadata
                .get(field)
                .is_some_and(|actual| actual != expected),
            Filter::In(field, options) => metadata
                .get(field)
                .is_some_and(|actual| options.contains(actual)),
            Filter::And(children) => children.iter().all(|c| c.matches(metadata)),
            Filter::Or(children) => children.iter().any(|c| c.matches(metadata)),
        }
    }

    /// Compile into a SQL boolean expression over the jsonb `column`.
    ///
    /// Placeholders are numbered from `first_param`; the returned params are in
    /// placeholder order.
    pub fn to_sql(&self, column: &str, first_param: usize) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let clause = self.write_sql(column, first_param, &mut params);
        (clause, params)
    }

    fn write_sql(&self, column: &str, first: usize, params: &mut Vec<SqlParam>) -> String {
        let compare = |field: &str, op: &str, value: &Value, params: &mut Vec<SqlParam>| {
            let key = first + params.len();
            params.push(SqlParam::Text(field.to_string()));
            params.push(SqlParam::Json(value.clone()));
            format!("{column} -> ${key}::text {op} ${}::jsonb", key + 1)
        };

        match self {
            Filter::Eq(field, value) => compare(field, "=", value, params),
            Filter::Ne(field, value) => compare(field, "<>", value, params),
            Filter::In(field, options) => {
                let parts: Vec<String> = options
                    .iter()
                    .map(|value| compare(field, "=", value, params))
                    .collect();
                join_or_default(parts, " OR ", "FALSE")
            }
            Filter::And(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| c.write_sql(column, first, params))
                    .collect();
                join_or_default(parts, " AND ", "TRUE")
            }
            Filter::Or(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| c.write_sql(column, first, params))
                    .collect();
                join_or_default(parts, " OR ", "FALSE")
            }
        }
    }
}

impl TryFrom<Value> for Filter {
    type Error = FilterError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Filter::parse(&value)
    }
}

fn single_entry(obj: &Map<String, Value>) -> Result<(&String, &Value), FilterError> {
    let mut iter = obj.iter();
    match (iter.next(), iter.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(FilterError::KeyCount(obj.len())),
    }
}

fn parse_condition(field: &str, condition: &Value) -> Result<Filter, FilterError> {
    let obj = condition
        .as_object()
        .ok_or_else(|| FilterError::BadCondition(field.to_string()))?;
    let (op, operand) =
        single_entry(obj).map_err(|_| FilterError::BadCondition(field.to_string()))?;

    match op.as_str() {
        "$eq" => Ok(Filter::Eq(field.to_string(), operand.clone())),
        "$ne" => Ok(Filter::Ne(field.to_string(), operand.clone())),
        "$in" => {
            let options = operand
                .as_array()
                .filter(|options| !options.is_empty())
                .ok_or_else(|| FilterError::ExpectedArray("$in".into()))?;
            Ok(Filter::In(field.to_string(), options.clone()))
        }
        other => Err(FilterError::UnknownOperator(other.to_string())),
    }
}

fn join_or_default(parts: Vec<String>, sep: &str, empty: &str) -> String {
    if parts.is_empty() {
        empty.to_string()
    } else {
        format!("({})", parts.join(sep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image_types() -> Value {
        json!({"$or": [
            {"type": {"$eq": "jpg"}},
            {"type": {"$eq": "png"}},
        ]})
    }

    #[test]
    fn parses_or_of_eq() {
        let filter = Filter::parse(&image_types()).unwrap();
        assert_eq!(filter, Filter::any_type(&["jpg", "png"]));
    }

    #[test]
    fn matches_type_filter() {
        let filter = Filter::any_type(&["jpg", "png"]);
        assert!(filter.matches(&json!({"type": "jpg"})));
        assert!(filter.matches(&json!({"type": "png"})));
        assert!(!filter.matches(&json!({"type": "gif"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn ne_and_in_semantics() {
        let ne = Filter::parse(&json!({"type": {"$ne": "gif"}})).unwrap();
        assert!(ne.matches(&json!({"type": "png"})));
        assert!(!ne.matches(&json!({"type": "gif"})));
        assert!(!ne.matches(&json!({})), "missing field never matches");

        let within = Filter::parse(&json!({"type": {"$in": ["jpg", "png"]}})).unwrap();
        assert!(within.matches(&json!({"type": "jpg"})));
        assert!(!within.matches(&json!({"type": "webp"})));
    }

    #[test]
    fn nested_and_or() {
        let filter = Filter::parse(&json!({"$and": [
            {"type": {"$eq": "png"}},
            {"$or": [{"owner": {"$eq": "a"}}, {"owner": {"$eq": "b"}}]},
        ]}))
        .unwrap();
        assert!(filter.matches(&json!({"type": "png", "owner": "b"})));
        assert!(!filter.matches(&json!({"type": "png", "owner": "c"})));
        assert!(!filter.matches(&json!({"type": "jpg", "owner": "a"})));
    }

    #[test]
    fn rejects_malformed_filters() {
        assert_eq!(Filter::parse(&json!([])), Err(FilterError::NotAnObject));
        assert_eq!(
            Filter::parse(&json!({"a": {"$eq": 1}, "b": {"$eq": 2}})),
            Err(FilterError::KeyCount(2))
        );
        assert_eq!(
            Filter::parse(&json!({"$or": []})),
            Err(FilterError::ExpectedArray("$or".into()))
        );
        assert_eq!(
            Filter::parse(&json!({"$not": [{"a": {"$eq": 1}}]})),
            Err(FilterError::UnknownOperator("$not".into()))
        );
        assert_eq!(
            Filter::parse(&json!({"type": {"$gt": 1}})),
            Err(FilterError::UnknownOperator("$gt".into()))
        );
        assert_eq!(
            Filter::parse(&json!({"type": "png"})),
            Err(FilterError::BadCondition("type".into()))
        );
    }

    #[test]
    fn compiles_to_numbered_sql() {
        let (sql, params) = Filter::any_type(&["jpg", "png"]).to_sql("metadata", 3);
        assert_eq!(
            sql,
            "(metadata -> $3::text = $4::jsonb OR metadata -> $5::text = $6::jsonb)"
        );
        assert_eq!(
            params,
            vec![
                SqlParam::Text("type".into()),
                SqlParam::Json(json!("jpg")),
                SqlParam::Text("type".into()),
                SqlParam::Json(json!("png")),
            ]
        );
    }

    #[test]
    fn deserializes_through_serde() {
        let filter: Filter = serde_json::from_value(image_types()).unwrap();
        assert_eq!(filter, Filter::any_type(&["jpg", "png"]));
        assert!(serde_json::from_value::<Filter>(json!({"$or": 1})).is_err());
    }
}
