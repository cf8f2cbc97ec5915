//! Predicate trees for repository queries
//!
//! A [`Predicate`] is a composable boolean expression over an entity's
//! columns. Leaves are [`FilterCondition`]s; inner nodes combine children with
//! AND / OR. Predicates are rendered into an SQLx [`QueryBuilder`] with every
//! value bound as a parameter, and column names come from a [`Field`]
//! implementation, never from caller input.
//!
//! SQLite's `LOWER()` only folds ASCII letters. A [`Field`] that keeps a
//! pre-folded copy of its text in another column names it through
//! [`Field::search_column`], and "contains" conditions on that field compare
//! against the copy instead.
//!
//! # Example
//!
//! ```rust
//! use donations_db::repository::{Field, FilterCondition, Predicate};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Col { Name, Age }
//!
//! impl Field for Col {
//!     fn column_name(self) -> &'static str {
//!         match self { Col::Name => "name", Col::Age => "age" }
//!     }
//! }
//!
//! let predicate = Predicate::and(vec![
//!     FilterCondition::contains(Col::Name, "smith").into(),
//!     FilterCondition::gte(Col::Age, 18_i64).into(),
//! ]);
//!
//! let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM people WHERE ");
//! predicate.push_sql(&mut builder);
//! assert_eq!(
//!     builder.sql(),
//!     "SELECT * FROM people WHERE (LOWER(name) LIKE ? ESCAPE '\\' AND age >= ?)"
//! );
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// A filterable, sortable column of an entity
pub trait Field: Copy + fmt::Debug + Send + Sync + 'static {
    /// The SQL column name
    fn column_name(self) -> &'static str;

    /// Column holding this field's text folded with [`str::to_lowercase`]
    fn search_column(self) -> Option<&'static str> {
        None
    }
}

/// Fold text the way search columns store it
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Case-insensitive substring match
    ContainsIgnoreCase,
    /// Value is in a list (IN)
    In,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::ContainsIgnoreCase => write!(f, "ILIKE"),
            Self::In => write!(f, "IN"),
        }
    }
}

/// A value that can be used in filter conditions
///
/// Timestamps are bound as milliseconds since the Unix epoch, which is how
/// the repositories in this crate persist them.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// UTC timestamp
    Timestamp(DateTime<Utc>),
    /// List of string values (for IN operator)
    StringList(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::StringList(list)
    }
}

impl FilterValue {
    fn push_bind(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::String(s) => {
                builder.push_bind(s.clone());
            }
            Self::Integer(n) => {
                builder.push_bind(*n);
            }
            Self::Float(n) => {
                builder.push_bind(*n);
            }
            Self::Boolean(b) => {
                builder.push_bind(*b);
            }
            Self::Timestamp(t) => {
                builder.push_bind(t.timestamp_millis());
            }
            // Lists only make sense behind IN, which renders them itself.
            Self::StringList(_) => {
                builder.push("NULL");
            }
        }
    }
}

/// A single filter condition on one column
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition<F> {
    /// The field to filter on
    pub field: F,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl<F: Field> FilterCondition<F> {
    /// Create a new filter condition
    pub fn new(field: F, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    /// Equality filter (field = value)
    pub fn eq(field: F, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Inclusive lower bound (field >= value)
    pub fn gte(field: F, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Inclusive upper bound (field <= value)
    pub fn lte(field: F, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Case-insensitive "contains" match on a text column
    ///
    /// `%`, `_` and `\` in `needle` match literally.
    pub fn contains(field: F, needle: impl AsRef<str>) -> Self {
        Self::new(
            field,
            FilterOperator::ContainsIgnoreCase,
            FilterValue::String(needle.as_ref().to_string()),
        )
    }

    /// Membership in a set of strings
    pub fn in_strings(field: F, values: Vec<String>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::StringList(values))
    }

    fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let column = self.field.column_name();
        match self.operator {
            FilterOperator::ContainsIgnoreCase => {
                let needle = match &self.value {
                    FilterValue::String(s) => s.as_str(),
                    _ => "",
                };
                match self.field.search_column() {
                    Some(search) => builder.push(search),
                    None => builder.push("LOWER(").push(column).push(")"),
                };
                builder
                    .push(" LIKE ")
                    .push_bind(like_pattern(needle))
                    .push(" ESCAPE '\\'");
            }
            FilterOperator::In => {
                let values = match &self.value {
                    FilterValue::StringList(values) => values.as_slice(),
                    _ => &[],
                };
                if values.is_empty() {
                    builder.push("1 = 0");
                    return;
                }
                builder.push(column).push(" IN (");
                let mut separated = builder.separated(", ");
                for value in values {
                    separated.push_bind(value.clone());
                }
                separated.push_unseparated(")");
            }
            operator => {
                builder.push(column).push(" ").push(operator.to_string()).push(" ");
                self.value.push_bind(builder);
            }
        }
    }
}

/// Build a `LIKE` pattern matching `needle` anywhere, with wildcard
/// characters escaped by `\`
///
/// The needle is folded with [`fold_case`].
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in fold_case(needle).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// A composable boolean expression over entity fields
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    /// Matches every row
    All,
    /// A single column condition
    Condition(FilterCondition<F>),
    /// All children must hold
    And(Vec<Predicate<F>>),
    /// At least one child must hold
    Or(Vec<Predicate<F>>),
}

impl<F> From<FilterCondition<F>> for Predicate<F> {
    fn from(condition: FilterCondition<F>) -> Self {
        Self::Condition(condition)
    }
}

impl<F: Field> Predicate<F> {
    /// Conjunction of `children`, dropping match-all members
    ///
    /// An empty conjunction is [`Predicate::All`]; a single child is returned
    /// as is.
    pub fn and(children: Vec<Predicate<F>>) -> Self {
        let mut children: Vec<_> = children.into_iter().filter(|p| !p.is_all()).collect();
        match children.len() {
            0 => Self::All,
            1 => children.remove(0),
            _ => Self::And(children),
        }
    }

    /// Disjunction of `children`
    ///
    /// Any match-all child makes the whole disjunction match-all. An empty
    /// disjunction matches nothing.
    pub fn or(mut children: Vec<Predicate<F>>) -> Self {
        if children.iter().any(Predicate::is_all) {
            return Self::All;
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Self::Or(children)
    }

    /// Whether this predicate matches every row
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Leaf conditions in evaluation order
    pub fn conditions(&self) -> Vec<&FilterCondition<F>> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a FilterCondition<F>>) {
        match self {
            Self::All => {}
            Self::Condition(condition) => out.push(condition),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
        }
    }

    /// Render this predicate into `builder` as a boolean SQL expression
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::All => {
                builder.push("1 = 1");
            }
            Self::Condition(condition) => condition.push_sql(builder),
            Self::And(children) => Self::push_joined(builder, children, " AND ", "1 = 1"),
            Self::Or(children) => Self::push_joined(builder, children, " OR ", "1 = 0"),
        }
    }

    fn push_joined(
        builder: &mut QueryBuilder<'_, Sqlite>,
        children: &[Predicate<F>],
        joiner: &str,
        empty: &str,
    ) {
        if children.is_empty() {
            builder.push(empty);
            return;
        }
        builder.push("(");
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                builder.push(joiner);
            }
            child.push_sql(builder);
        }
        builder.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Col {
        Name,
        Age,
        Owner,
        Title,
    }

    impl Field for Col {
        fn column_name(self) -> &'static str {
            match self {
                Col::Name => "name",
                Col::Age => "age",
                Col::Owner => "owner_id",
                Col::Title => "title",
            }
        }

        fn search_column(self) -> Option<&'static str> {
            match self {
                Col::Title => Some("title_search"),
                _ => None,
            }
        }
    }

    fn render(predicate: &Predicate<Col>) -> String {
        let mut builder = QueryBuilder::<Sqlite>::new("");
        predicate.push_sql(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn test_filter_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Equal), "=");
        assert_eq!(format!("{}", FilterOperator::GreaterThanOrEqual), ">=");
        assert_eq!(format!("{}", FilterOperator::LessThanOrEqual), "<=");
        assert_eq!(format!("{}", FilterOperator::In), "IN");
    }

    #[test]
    fn test_filter_value_conversions() {
        assert_eq!(FilterValue::from("a"), FilterValue::String("a".to_string()));
        assert_eq!(FilterValue::from(42_i32), FilterValue::Integer(42));
        assert_eq!(FilterValue::from(true), FilterValue::Boolean(true));
        assert_eq!(
            FilterValue::from(vec!["x".to_string()]),
            FilterValue::StringList(vec!["x".to_string()])
        );
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Rice"), "%rice%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn test_like_pattern_folds_unicode() {
        assert_eq!(like_pattern("ÉCLAIR"), "%éclair%");
        assert_eq!(like_pattern("Straße"), "%straße%");
        assert_eq!(fold_case("ÅSA"), "åsa");
    }

    #[test]
    fn test_and_simplifies() {
        let empty: Predicate<Col> = Predicate::and(vec![]);
        assert!(empty.is_all());

        let single = Predicate::and(vec![
            Predicate::All,
            FilterCondition::eq(Col::Age, 3_i64).into(),
        ]);
        assert_eq!(single, Predicate::Condition(FilterCondition::eq(Col::Age, 3_i64)));
    }

    #[test]
    fn test_or_with_match_all_child_is_match_all() {
        let predicate = Predicate::or(vec![
            FilterCondition::eq(Col::Name, "x").into(),
            Predicate::All,
        ]);
        assert!(predicate.is_all());
    }

    #[test]
    fn test_render_comparisons() {
        let predicate = Predicate::and(vec![
            FilterCondition::gte(Col::Age, 5_i64).into(),
            FilterCondition::lte(Col::Age, 10_i64).into(),
        ]);
        assert_eq!(render(&predicate), "(age >= ? AND age <= ?)");
    }

    #[test]
    fn test_render_contains() {
        let predicate: Predicate<Col> = FilterCondition::contains(Col::Name, "Ri").into();
        assert_eq!(render(&predicate), "LOWER(name) LIKE ? ESCAPE '\\'");
    }

    #[test]
    fn test_render_contains_uses_search_column() {
        let predicate: Predicate<Col> = FilterCondition::contains(Col::Title, "Éc").into();
        assert_eq!(render(&predicate), "title_search LIKE ? ESCAPE '\\'");
    }

    #[test]
    fn test_render_in_list() {
        let predicate: Predicate<Col> =
            FilterCondition::in_strings(Col::Owner, vec!["a".to_string(), "b".to_string()]).into();
        assert_eq!(render(&predicate), "owner_id IN (?, ?)");

        let empty: Predicate<Col> = FilterCondition::in_strings(Col::Owner, vec![]).into();
        assert_eq!(render(&empty), "1 = 0");
    }

    #[test]
    fn test_render_nested_or() {
        let predicate = Predicate::and(vec![
            FilterCondition::gte(Col::Age, 1_i64).into(),
            Predicate::or(vec![
                FilterCondition::eq(Col::Name, "a").into(),
                FilterCondition::contains(Col::Name, "b").into(),
            ]),
        ]);
        assert_eq!(
            render(&predicate),
            "(age >= ? AND (name = ? OR LOWER(name) LIKE ? ESCAPE '\\'))"
        );
    }

    #[test]
    fn test_render_match_all_and_empty_or() {
        assert_eq!(render(&Predicate::All), "1 = 1");
        assert_eq!(render(&Predicate::<Col>::Or(vec![])), "1 = 0");
    }

    #[test]
    fn test_conditions_are_collected_in_order() {
        let predicate = Predicate::and(vec![
            FilterCondition::eq(Col::Name, "a").into(),
            Predicate::or(vec![
                FilterCondition::gte(Col::Age, 1_i64).into(),
                FilterCondition::lte(Col::Age, 9_i64).into(),
            ]),
        ]);
        let operators: Vec<_> = predicate.conditions().iter().map(|c| c.operator).collect();
        assert_eq!(
            operators,
            vec![
                FilterOperator::Equal,
                FilterOperator::GreaterThanOrEqual,
                FilterOperator::LessThanOrEqual
            ]
        );
    }
}
