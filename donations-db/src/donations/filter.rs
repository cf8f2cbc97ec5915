//! Donation filter compilation
//!
//! A [`DonationFilter`] is the loosely-typed JSON object a client sends
//! (`{"item": "rice", "quantityRange": [5, null], "user": "a|b"}`). It is
//! compiled into a [`Predicate`] by walking a fixed rule table: each rule
//! names the keys it answers to and the function that turns the value into a
//! predicate. Rules run in table order and their predicates are ANDed.
//! Unknown keys and empty values (`null`, `""`, `[]`) contribute nothing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::model::DonationField;
use crate::ids::{contains_ignore_case, normalize_id, split_id_list};
use crate::repository::{
    FilterCondition, FilterValue, Predicate, RepositoryError, RepositoryOperation,
    RepositoryResult,
};

const OPERATION: RepositoryOperation = RepositoryOperation::CompileFilter;

/// Filter object for donation searches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationFilter(Map<String, Value>);

impl DonationFilter {
    /// An empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; `null` is the empty filter
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when `value` is neither an object nor `null`.
    pub fn from_value(value: Value) -> RepositoryResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(RepositoryError::validation_failed(
                OPERATION,
                format!("Filter must be an object, got {}", other),
            )),
        }
    }

    /// Set a raw key
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn id(self, id: impl ToString) -> Self {
        self.with("id", id.to_string())
    }

    #[must_use]
    pub fn item(self, needle: impl Into<String>) -> Self {
        self.with("item", needle.into())
    }

    #[must_use]
    pub fn location(self, needle: impl Into<String>) -> Self {
        self.with("location", needle.into())
    }

    #[must_use]
    pub fn quantity_range(self, min: Option<i64>, max: Option<i64>) -> Self {
        self.with("quantityRange", Value::Array(vec![min.into(), max.into()]))
    }

    #[must_use]
    pub fn active(self, active: bool) -> Self {
        self.with("active", active)
    }

    /// Restrict to donations of any of `users`
    #[must_use]
    pub fn users(self, users: &[Uuid]) -> Self {
        let ids: Vec<Value> = users.iter().map(|id| Value::String(id.to_string())).collect();
        self.with("user", Value::Array(ids))
    }

    #[must_use]
    pub fn created_at_range(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        let bound = |t: Option<DateTime<Utc>>| t.map_or(Value::Null, |t| Value::String(t.to_rfc3339()));
        self.with("createdAtRange", Value::Array(vec![bound(from), bound(to)]))
    }

    /// Raw value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compile into a predicate; `delimiter` splits `user` id lists
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for a malformed `id` or `user` entry
    /// - `ValidationFailed` for a non-numeric quantity bound or an
    ///   unparsable date bound
    pub fn compile(&self, delimiter: &str) -> RepositoryResult<Predicate<DonationField>> {
        let context = CompileContext { delimiter };
        let mut predicates = Vec::new();

        for rule in FILTER_RULES {
            let Some(value) = rule.keys.iter().find_map(|key| self.0.get(*key)) else {
                continue;
            };
            if is_empty_value(value) {
                continue;
            }
            if let Some(predicate) = (rule.compile)(value, &context)? {
                predicates.push(predicate);
            }
        }

        let ignored: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|key| !FILTER_RULES.iter().any(|rule| rule.keys.iter().any(|k| k == key)))
            .collect();
        if !ignored.is_empty() {
            tracing::debug!(?ignored, "Ignoring unknown donation filter keys");
        }

        Ok(Predicate::and(predicates))
    }
}

impl From<Map<String, Value>> for DonationFilter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

struct CompileContext<'a> {
    delimiter: &'a str,
}

type CompileFn = fn(&Value, &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>>;

struct FilterRule {
    keys: &'static [&'static str],
    compile: CompileFn,
}

static FILTER_RULES: &[FilterRule] = &[
    FilterRule {
        keys: &["id"],
        compile: compile_id,
    },
    FilterRule {
        keys: &["item"],
        compile: compile_item,
    },
    FilterRule {
        keys: &["location"],
        compile: compile_location,
    },
    FilterRule {
        keys: &["quantityRange", "quantity_range"],
        compile: compile_quantity_range,
    },
    FilterRule {
        keys: &["active"],
        compile: compile_active,
    },
    FilterRule {
        keys: &["user", "userId", "user_id"],
        compile: compile_user,
    },
    FilterRule {
        keys: &["createdAtRange", "created_at_range"],
        compile: compile_created_at_range,
    },
];

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Scalar as text; numbers are accepted since query strings lose their type
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn compile_id(value: &Value, _: &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>> {
    let raw = scalar_text(value).unwrap_or_else(|| value.to_string());
    let id = normalize_id(&raw, OPERATION)?;
    Ok(Some(FilterCondition::eq(DonationField::Id, id.to_string()).into()))
}

fn compile_item(value: &Value, _: &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>> {
    Ok(scalar_text(value).and_then(|needle| contains_ignore_case(DonationField::Item, &needle)))
}

fn compile_location(value: &Value, _: &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>> {
    Ok(scalar_text(value).and_then(|needle| contains_ignore_case(DonationField::Location, &needle)))
}

fn compile_active(value: &Value, _: &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>> {
    let active = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    };
    Ok(active.map(|active| FilterCondition::eq(DonationField::Active, active).into()))
}

fn compile_user(value: &Value, context: &CompileContext<'_>) -> RepositoryResult<Option<Predicate<DonationField>>> {
    let ids = match value {
        Value::Array(items) => {
            let mut ids: Vec<Uuid> = Vec::new();
            for item in items.iter().filter(|item| !is_empty_value(item)) {
                let raw = scalar_text(item).unwrap_or_else(|| item.to_string());
                for id in split_id_list(&raw, context.delimiter, OPERATION)? {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            ids
        }
        other => {
            let raw = scalar_text(other).unwrap_or_else(|| other.to_string());
            split_id_list(&raw, context.delimiter, OPERATION)?
        }
    };

    if ids.is_empty() {
        return Ok(None);
    }
    let ids = ids.iter().map(Uuid::to_string).collect();
    Ok(Some(FilterCondition::in_strings(DonationField::UserId, ids).into()))
}

fn compile_quantity_range(
    value: &Value,
    _: &CompileContext<'_>,
) -> RepositoryResult<Option<Predicate<DonationField>>> {
    range_predicate(DonationField::Quantity, value, parse_quantity_bound)
}

fn compile_created_at_range(
    value: &Value,
    _: &CompileContext<'_>,
) -> RepositoryResult<Option<Predicate<DonationField>>> {
    range_predicate(DonationField::CreatedAt, value, parse_timestamp_bound)
}

/// `[start, end]` into inclusive bounds; missing or empty ends are open
fn range_predicate(
    field: DonationField,
    value: &Value,
    parse: fn(&Value) -> RepositoryResult<FilterValue>,
) -> RepositoryResult<Option<Predicate<DonationField>>> {
    let Value::Array(bounds) = value else {
        tracing::warn!(field = %field, "Ignoring range filter that is not an array");
        return Ok(None);
    };

    let mut predicates: Vec<Predicate<DonationField>> = Vec::new();
    if let Some(start) = bounds.first().filter(|v| !is_empty_value(v)) {
        predicates.push(FilterCondition::gte(field, parse(start)?).into());
    }
    if let Some(end) = bounds.get(1).filter(|v| !is_empty_value(v)) {
        predicates.push(FilterCondition::lte(field, parse(end)?).into());
    }

    match Predicate::and(predicates) {
        Predicate::All => Ok(None),
        predicate => Ok(Some(predicate)),
    }
}

fn parse_quantity_bound(value: &Value) -> RepositoryResult<FilterValue> {
    let invalid = || {
        RepositoryError::validation_failed(OPERATION, format!("Quantity bound {} is not a number", value))
    };

    match value {
        Value::Number(n) => n
            .as_i64()
            .map(FilterValue::Integer)
            .or_else(|| n.as_f64().map(FilterValue::Float))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(FilterValue::Integer)
                .or_else(|_| s.parse::<f64>().map(FilterValue::Float))
                .ok()
                .filter(|v| !matches!(v, FilterValue::Float(f) if !f.is_finite()))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn parse_timestamp_bound(value: &Value) -> RepositoryResult<FilterValue> {
    let invalid = || {
        RepositoryError::validation_failed(OPERATION, format!("Date bound {} is not a valid date", value))
    };

    let timestamp = match value {
        Value::String(s) => parse_date(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    timestamp.map(FilterValue::Timestamp).ok_or_else(invalid)
}

/// RFC 3339 timestamp, or `YYYY-MM-DD` at midnight UTC
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FilterOperator, RepositoryErrorKind};
    use serde_json::json;

    const ID: &str = "4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11";
    const OTHER: &str = "d7a6f3a0-0f8e-4a32-9e6b-2f9b0f3c5a77";

    fn compile(value: Value) -> RepositoryResult<Predicate<DonationField>> {
        DonationFilter::from_value(value)?.compile("|")
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(compile(json!({})).unwrap().is_all());
        assert!(compile(Value::Null).unwrap().is_all());
        assert!(compile(json!({"item": "", "quantityRange": [], "user": null}))
            .unwrap()
            .is_all());
    }

    #[test]
    fn test_non_object_filter_is_rejected() {
        let err = compile(json!([1, 2])).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        assert!(compile(json!({"password": "x", "page": 2})).unwrap().is_all());
    }

    #[test]
    fn test_id_is_normalized() {
        let predicate = compile(json!({"id": ID.to_uppercase()})).unwrap();
        assert_eq!(
            predicate,
            Predicate::Condition(FilterCondition::eq(DonationField::Id, ID))
        );
    }

    #[test]
    fn test_malformed_id_is_an_error() {
        let err = compile(json!({"id": "rice"})).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidIdentifier);
        assert_eq!(err.operation, RepositoryOperation::CompileFilter);
    }

    #[test]
    fn test_text_fields_use_contains() {
        let predicate = compile(json!({"item": "Ri", "location": "shelf"})).unwrap();
        let conditions = predicate.conditions();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].field, DonationField::Item);
        assert_eq!(conditions[0].operator, FilterOperator::ContainsIgnoreCase);
        assert_eq!(conditions[1].field, DonationField::Location);
    }

    #[test]
    fn test_quantity_range_bounds() {
        let both = compile(json!({"quantityRange": [5, "10"]})).unwrap();
        let conditions = both.conditions();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].operator, FilterOperator::GreaterThanOrEqual);
        assert_eq!(conditions[0].value, FilterValue::Integer(5));
        assert_eq!(conditions[1].operator, FilterOperator::LessThanOrEqual);
        assert_eq!(conditions[1].value, FilterValue::Integer(10));

        let lower = compile(json!({"quantity_range": [5, null]})).unwrap();
        assert_eq!(
            lower,
            Predicate::Condition(FilterCondition::gte(DonationField::Quantity, 5_i64))
        );

        let upper = compile(json!({"quantityRange": ["", 3]})).unwrap();
        assert_eq!(
            upper,
            Predicate::Condition(FilterCondition::lte(DonationField::Quantity, 3_i64))
        );

        assert!(compile(json!({"quantityRange": [null, ""]})).unwrap().is_all());
    }

    #[test]
    fn test_non_numeric_quantity_bound_fails() {
        let err = compile(json!({"quantityRange": ["lots", null]})).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_active_only_canonical_values() {
        assert_eq!(
            compile(json!({"active": "true"})).unwrap(),
            Predicate::Condition(FilterCondition::eq(DonationField::Active, true))
        );
        assert_eq!(
            compile(json!({"active": false})).unwrap(),
            Predicate::Condition(FilterCondition::eq(DonationField::Active, false))
        );
        assert!(compile(json!({"active": "yes"})).unwrap().is_all());
        assert!(compile(json!({"active": 1})).unwrap().is_all());
    }

    #[test]
    fn test_user_list_is_split_and_normalized() {
        let raw = format!("{}||{}|{}", ID, OTHER.to_uppercase(), ID);
        let predicate = compile(json!({ "user": raw })).unwrap();
        assert_eq!(
            predicate,
            Predicate::Condition(FilterCondition::in_strings(
                DonationField::UserId,
                vec![ID.to_string(), OTHER.to_string()]
            ))
        );

        let err = compile(json!({"user": format!("{}|nope", ID)})).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidIdentifier);

        assert!(compile(json!({"user": "||"})).unwrap().is_all());
    }

    #[test]
    fn test_custom_delimiter() {
        let filter = DonationFilter::new().with("user", format!("{},{}", ID, OTHER));
        match filter.compile(",").unwrap() {
            Predicate::Condition(condition) => {
                assert_eq!(condition.value, FilterValue::StringList(vec![ID.to_string(), OTHER.to_string()]));
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_created_at_range() {
        let predicate = compile(json!({"createdAtRange": ["2024-01-01", "2024-01-31T12:00:00Z"]})).unwrap();
        let conditions = predicate.conditions();
        let expected_from = parse_date("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(conditions[0].value, FilterValue::Timestamp(expected_from));
        assert_eq!(conditions[1].field, DonationField::CreatedAt);

        let err = compile(json!({"createdAtRange": ["yesterday", null]})).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_conjunction_follows_rule_order() {
        let predicate = compile(json!({
            "createdAtRange": [null, "2024-02-01"],
            "active": true,
            "item": "rice",
        }))
        .unwrap();
        let fields: Vec<_> = predicate.conditions().iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec![DonationField::Item, DonationField::Active, DonationField::CreatedAt]
        );
    }

    #[test]
    fn test_builder_matches_json() {
        let user = Uuid::parse_str(ID).unwrap();
        let built = DonationFilter::new()
            .item("rice")
            .quantity_range(Some(5), None)
            .active(true)
            .users(&[user]);
        let parsed = DonationFilter::from_value(json!({
            "item": "rice",
            "quantityRange": [5, null],
            "active": true,
            "user": ID,
        }))
        .unwrap();
        assert_eq!(built.compile("|").unwrap(), parsed.compile("|").unwrap());
    }

    #[test]
    fn test_filter_deserializes_transparently() {
        let filter: DonationFilter = serde_json::from_str(r#"{"item":"rice"}"#).unwrap();
        assert_eq!(filter.get("item"), Some(&json!("rice")));
        assert!(!filter.is_empty());
    }
}
