//! Identifier utilities
//!
//! Entity identifiers are UUIDs stored in their canonical lowercase,
//! hyphenated form. Every identifier that crosses the repository boundary
//! goes through [`normalize_id`], so `"4F1C8E36-2E52-4B8F-9F55-0D6C9B6D3A11"`,
//! `"{4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11}"` and
//! `"4f1c8e362e524b8f9f550d6c9b6d3a11"` all address the same row.
//!
//! # Example
//!
//! ```rust
//! use donations_db::ids::{normalize_id, split_id_list};
//! use donations_db::repository::RepositoryOperation;
//!
//! let id = normalize_id(" 4F1C8E36-2E52-4B8F-9F55-0D6C9B6D3A11 ", RepositoryOperation::FindOne).unwrap();
//! assert_eq!(id.to_string(), "4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11");
//!
//! let ids = split_id_list(
//!     "4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11||4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11",
//!     "|",
//!     RepositoryOperation::FindPage,
//! )
//! .unwrap();
//! assert_eq!(ids.len(), 1);
//! ```

use uuid::Uuid;

use crate::repository::{Field, FilterCondition, Predicate, RepositoryError, RepositoryOperation, RepositoryResult};

/// Generate a fresh random (v4) identifier
#[must_use]
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

/// Parse `raw` into an identifier, failing with `InvalidIdentifier`
///
/// Surrounding whitespace is ignored.
pub fn normalize_id(raw: &str, operation: RepositoryOperation) -> RepositoryResult<Uuid> {
    try_normalize_id(raw).ok_or_else(|| RepositoryError::invalid_identifier(operation, raw))
}

/// Parse `raw` into an identifier, or `None` when it isn't one
#[must_use]
pub fn try_normalize_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Split a delimited identifier list and normalize every entry
///
/// Empty segments are skipped and duplicates collapsed, keeping first-seen
/// order. Any malformed entry fails the whole list. An empty delimiter
/// leaves `raw` unsplit.
pub fn split_id_list(
    raw: &str,
    delimiter: &str,
    operation: RepositoryOperation,
) -> RepositoryResult<Vec<Uuid>> {
    let mut ids: Vec<Uuid> = Vec::new();
    let segments: Vec<&str> = if delimiter.is_empty() {
        vec![raw]
    } else {
        raw.split(delimiter).collect()
    };
    for segment in segments {
        if segment.trim().is_empty() {
            continue;
        }
        let id = normalize_id(segment, operation)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Case-insensitive "contains" predicate for a text field
///
/// Returns `None` for an empty needle so callers can drop the filter.
pub fn contains_ignore_case<F: Field>(field: F, needle: &str) -> Option<Predicate<F>> {
    if needle.is_empty() {
        return None;
    }
    Some(FilterCondition::contains(field, needle).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FilterOperator, FilterValue, RepositoryErrorKind};

    const ID: &str = "4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Name;

    impl Field for Name {
        fn column_name(self) -> &'static str {
            "name"
        }
    }

    #[test]
    fn test_normalize_accepts_canonical_forms() {
        for raw in [
            ID,
            "4F1C8E36-2E52-4B8F-9F55-0D6C9B6D3A11",
            "4f1c8e362e524b8f9f550d6c9b6d3a11",
            "{4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11}",
            "  4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11\n",
        ] {
            let id = normalize_id(raw, RepositoryOperation::FindOne).unwrap();
            assert_eq!(id.to_string(), ID, "input {:?}", raw);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize_id("rice", RepositoryOperation::FindPage).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidIdentifier);
        assert_eq!(err.operation, RepositoryOperation::FindPage);
        assert_eq!(err.entity_id.as_deref(), Some("rice"));
        assert!(try_normalize_id("").is_none());
    }

    #[test]
    fn test_generate_id_is_v4() {
        assert_eq!(generate_id().get_version_num(), 4);
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_split_id_list() {
        let other = "d7a6f3a0-0f8e-4a32-9e6b-2f9b0f3c5a77";
        let raw = format!("{}|{}|{}|", ID, other, ID.to_uppercase());
        let ids = split_id_list(&raw, "|", RepositoryOperation::FindPage).unwrap();
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        assert_eq!(ids, vec![ID.to_string(), other.to_string()]);
    }

    #[test]
    fn test_split_id_list_fails_on_any_bad_entry() {
        let raw = format!("{}|nope", ID);
        let err = split_id_list(&raw, "|", RepositoryOperation::FindPage).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_split_id_list_custom_delimiter() {
        let raw = format!("{},{}", ID, ID);
        assert_eq!(split_id_list(&raw, ",", RepositoryOperation::FindPage).unwrap().len(), 1);
        assert!(split_id_list("", ",", RepositoryOperation::FindPage).unwrap().is_empty());
    }

    #[test]
    fn test_split_id_list_empty_delimiter_is_one_entry() {
        let ids = split_id_list(ID, "", RepositoryOperation::FindPage).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].to_string(), ID);
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case(Name, "").is_none());
        match contains_ignore_case(Name, "Ri") {
            Some(Predicate::Condition(condition)) => {
                assert_eq!(condition.operator, FilterOperator::ContainsIgnoreCase);
                assert_eq!(condition.value, FilterValue::String("Ri".to_string()));
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }
}
