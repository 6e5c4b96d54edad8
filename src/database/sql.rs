use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, Postgres};
use std::fmt;
use thiserror::Error;

/// A column a resource allows callers to update.
///
/// Each resource declares its updatable fields as an enum, so the
/// translation from payload name to column is checked at compile time.
/// Resources only override `column_name` for fields whose column differs
/// from the logical name.
pub trait UpdateField: Copy + Eq + fmt::Debug + 'static {
    /// Every updatable field of the resource.
    const ALL: &'static [Self];

    /// Logical (camelCase) name as it appears in request payloads.
    fn field_name(self) -> &'static str;

    fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.field_name() == name)
    }

    /// Physical column name.
    fn column_name(self) -> &'static str {
        self.field_name()
    }
}

/// A value bound to a positional parameter. `None` binds a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i32>),
    Decimal(Option<Decimal>),
    Bool(Option<bool>),
}

/// Sparse set of fields to update, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<F> {
    entries: Vec<(F, SqlValue)>,
}

impl<F: UpdateField> FieldMap<F> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Sets `field`. A repeated field keeps its original position.
    pub fn insert(&mut self, field: F, value: SqlValue) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get_mut(&mut self, field: F) -> Option<&mut SqlValue> {
        self.entries
            .iter_mut()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(F, SqlValue)> {
        self.entries.iter()
    }
}

impl<F: UpdateField> Default for FieldMap<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: UpdateField> FromIterator<(F, SqlValue)> for FieldMap<F> {
    fn from_iter<I: IntoIterator<Item = (F, SqlValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (field, value) in iter {
            map.insert(field, value);
        }
        map
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("No data")]
    NoData,
}

/// SET clause plus its bindings. `values[i - 1]` is bound to `$i`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    pub set_clause: String,
    pub values: Vec<SqlValue>,
}

impl PartialUpdate {
    /// Placeholder for the first parameter after the SET values,
    /// e.g. the row key in `WHERE id = $n`.
    pub fn next_placeholder(&self) -> String {
        format!("${}", self.values.len() + 1)
    }
}

/// Build `"col1"=$1, "col2"=$2, ...` for a sparse update.
///
/// Does not touch the store. An empty map is rejected so callers never issue
/// an UPDATE with nothing to set.
pub fn sql_for_partial_update<F: UpdateField>(
    fields: &FieldMap<F>,
) -> Result<PartialUpdate, UpdateError> {
    if fields.is_empty() {
        return Err(UpdateError::NoData);
    }

    let mut cols = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    for (idx, (field, value)) in fields.iter().enumerate() {
        cols.push(format!("{}=${}", quote_identifier(field.column_name()), idx + 1));
        values.push(value.clone());
    }

    Ok(PartialUpdate {
        set_clause: cols.join(", "),
        values,
    })
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn bind_param_query_as<'q, O>(
    q: QueryAs<'q, Postgres, O, PgArguments>,
    v: SqlValue,
) -> QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        SqlValue::Text(s) => q.bind(s),
        SqlValue::Int(i) => q.bind(i),
        SqlValue::Decimal(d) => q.bind(d),
        SqlValue::Bool(b) => q.bind(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Field {
        FirstName,
        LastName,
        Email,
    }

    impl UpdateField for Field {
        const ALL: &'static [Self] = &[Field::FirstName, Field::LastName, Field::Email];

        fn field_name(self) -> &'static str {
            match self {
                Field::FirstName => "firstName",
                Field::LastName => "lastName",
                Field::Email => "email",
            }
        }

        fn column_name(self) -> &'static str {
            match self {
                Field::FirstName => "first_name",
                Field::LastName => "last_name",
                other => other.field_name(),
            }
        }
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(Some(s.to_string()))
    }

    #[test]
    fn works_one_item() {
        let fields: FieldMap<Field> = [(Field::FirstName, text("Aliya"))].into_iter().collect();
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(result.set_clause, "\"first_name\"=$1");
        assert_eq!(result.values, vec![text("Aliya")]);
    }

    #[test]
    fn works_two_items() {
        let fields: FieldMap<Field> = [
            (Field::FirstName, text("Test")),
            (Field::LastName, text("Tester")),
        ]
        .into_iter()
        .collect();
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(result.set_clause, "\"first_name\"=$1, \"last_name\"=$2");
        assert_eq!(result.values, vec![text("Test"), text("Tester")]);
        assert_eq!(result.next_placeholder(), "$3");
    }

    #[test]
    fn keeps_insertion_order() {
        let fields: FieldMap<Field> = [
            (Field::Email, text("a@b.com")),
            (Field::LastName, text("L")),
            (Field::FirstName, text("F")),
        ]
        .into_iter()
        .collect();
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(
            result.set_clause,
            "\"email\"=$1, \"last_name\"=$2, \"first_name\"=$3"
        );
        assert_eq!(result.values, vec![text("a@b.com"), text("L"), text("F")]);
    }

    #[test]
    fn untranslated_field_uses_its_name() {
        let fields: FieldMap<Field> = [(Field::Email, text("x@y.z"))].into_iter().collect();
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(result.set_clause, "\"email\"=$1");
    }

    #[test]
    fn preserves_null_values() {
        let fields: FieldMap<Field> = [
            (Field::FirstName, text("A")),
            (Field::LastName, SqlValue::Text(None)),
        ]
        .into_iter()
        .collect();
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(result.values.len(), 2);
        assert_eq!(result.values[1], SqlValue::Text(None));
    }

    #[test]
    fn repeated_field_keeps_first_position() {
        let mut fields = FieldMap::new();
        fields.insert(Field::FirstName, text("one"));
        fields.insert(Field::LastName, text("two"));
        fields.insert(Field::FirstName, text("three"));
        let result = sql_for_partial_update(&fields).unwrap();
        assert_eq!(result.set_clause, "\"first_name\"=$1, \"last_name\"=$2");
        assert_eq!(result.values, vec![text("three"), text("two")]);
    }

    #[test]
    fn rejects_empty_update() {
        let fields: FieldMap<Field> = FieldMap::new();
        assert_eq!(sql_for_partial_update(&fields), Err(UpdateError::NoData));
    }

    #[test]
    fn looks_up_fields_by_logical_name() {
        assert_eq!(Field::from_field_name("lastName"), Some(Field::LastName));
        assert_eq!(Field::from_field_name("last_name"), None);
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("title"), "\"title\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
