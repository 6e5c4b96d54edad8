//! Request payload validation.
//!
//! Bodies are read as ordered JSON objects and checked against a small
//! declarative schema. Every problem is collected, so a client sees all of
//! them in one 400 response, and the order of the body's keys is kept for
//! partial updates.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::database::sql::{FieldMap, SqlValue, UpdateField};
use crate::error::ApiError;

/// Body key that carries the auth token; never part of a resource payload.
pub const TOKEN_KEY: &str = "_token";

/// A JSON object with its keys in body order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedObject(pub Vec<(String, Value)>);

impl OrderedObject {
    pub fn without(mut self, key: &str) -> Self {
        self.0.retain(|(k, _)| k != key);
        self
    }
}

impl<'de> Deserialize<'de> for OrderedObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = OrderedObject;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.retain(|(k, _): &(String, Value)| *k != key);
                    entries.push((key, value));
                }
                Ok(OrderedObject(entries))
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}

impl OrderedObject {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ApiError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|e| ApiError::validation_error(vec![e.to_string()]))
    }
}

/// Extractor for a JSON object body with the token key removed.
pub struct JsonObject(pub OrderedObject);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(JsonObject(OrderedObject::from_slice(&bytes)?.without(TOKEN_KEY)))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Text { min_len: usize, max_len: usize },
    Email { min_len: usize, max_len: usize },
    Integer { min: i64 },
    Decimal { min: Decimal, max: Decimal },
    Boolean,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
    pub nullable: bool,
}

impl Rule {
    pub const fn required(name: &'static str, kind: Kind) -> Self {
        Self { name, kind, required: true, nullable: false }
    }

    pub const fn optional(name: &'static str, kind: Kind) -> Self {
        Self { name, kind, required: false, nullable: false }
    }

    pub const fn nullable(name: &'static str, kind: Kind) -> Self {
        Self { name, kind, required: false, nullable: true }
    }

    fn check(&self, value: Value, errors: &mut Vec<String>) -> Option<SqlValue> {
        let path = format!("instance.{}", self.name);

        if value.is_null() {
            if self.nullable {
                return Some(self.null());
            }
            errors.push(format!("{} is not of a type(s) {}", path, self.type_name()));
            return None;
        }

        match (self.kind, value) {
            (Kind::Text { min_len, max_len }, Value::String(s)) => {
                check_length(&path, &s, min_len, max_len, errors).then(|| SqlValue::Text(Some(s)))
            }
            (Kind::Email { min_len, max_len }, Value::String(s)) => {
                if !check_length(&path, &s, min_len, max_len, errors) {
                    return None;
                }
                if !looks_like_email(&s) {
                    errors.push(format!("{} does not conform to the \"email\" format", path));
                    return None;
                }
                Some(SqlValue::Text(Some(s)))
            }
            (Kind::Integer { min }, Value::Number(n)) => {
                let Some(i) = n.as_i64().and_then(|i| i32::try_from(i).ok()) else {
                    errors.push(format!("{} is not of a type(s) integer", path));
                    return None;
                };
                if i64::from(i) < min {
                    errors.push(format!("{} must be greater than or equal to {}", path, min));
                    return None;
                }
                Some(SqlValue::Int(Some(i)))
            }
            (Kind::Decimal { min, max }, Value::String(s)) => check_decimal(&path, &s, min, max, errors),
            (Kind::Decimal { min, max }, Value::Number(n)) => {
                check_decimal(&path, &n.to_string(), min, max, errors)
            }
            (Kind::Boolean, Value::Bool(b)) => Some(SqlValue::Bool(Some(b))),
            _ => {
                errors.push(format!("{} is not of a type(s) {}", path, self.type_name()));
                None
            }
        }
    }

    fn null(&self) -> SqlValue {
        match self.kind {
            Kind::Text { .. } | Kind::Email { .. } => SqlValue::Text(None),
            Kind::Integer { .. } => SqlValue::Int(None),
            Kind::Decimal { .. } => SqlValue::Decimal(None),
            Kind::Boolean => SqlValue::Bool(None),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            Kind::Text { .. } | Kind::Email { .. } => "string",
            Kind::Integer { .. } => "integer",
            Kind::Decimal { .. } => "string,number",
            Kind::Boolean => "boolean",
        }
    }
}

fn check_length(path: &str, s: &str, min_len: usize, max_len: usize, errors: &mut Vec<String>) -> bool {
    let len = s.chars().count();
    if len < min_len {
        errors.push(format!("{} does not meet minimum length of {}", path, min_len));
        return false;
    }
    if len > max_len {
        errors.push(format!("{} does not meet maximum length of {}", path, max_len));
        return false;
    }
    true
}

fn check_decimal(path: &str, s: &str, min: Decimal, max: Decimal, errors: &mut Vec<String>) -> Option<SqlValue> {
    let s = s.trim();
    // JSON numbers such as 1e-7 arrive in exponent form
    let Ok(d) = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) else {
        errors.push(format!("{} is not a valid decimal", path));
        return None;
    };
    if d < min || d > max {
        errors.push(format!("{} must be between {} and {}", path, min, max));
        return None;
    }
    Some(SqlValue::Decimal(Some(d)))
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// A named set of rules for one payload shape.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub rules: &'static [Rule],
}

impl Schema {
    pub const fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    /// Check `object` and return its values in body order.
    pub fn validate(&self, object: OrderedObject) -> Result<Validated, ApiError> {
        let mut errors = Vec::new();
        let mut values = Vec::with_capacity(object.0.len());

        for (key, value) in object.0 {
            match self.rules.iter().find(|r| r.name == key) {
                Some(rule) => {
                    if let Some(v) = rule.check(value, &mut errors) {
                        values.push((rule.name, v));
                    }
                }
                None => errors.push(format!(
                    "instance is not allowed to have the additional property \"{}\"",
                    key
                )),
            }
        }

        for rule in self.rules.iter().filter(|r| r.required) {
            if !values.iter().any(|(name, _)| *name == rule.name)
                && !errors.iter().any(|e| e.starts_with(&format!("instance.{} ", rule.name)))
            {
                errors.push(format!("instance requires property \"{}\"", rule.name));
            }
        }

        if errors.is_empty() {
            Ok(Validated(values))
        } else {
            Err(ApiError::validation_error(errors))
        }
    }
}

/// Values that passed a [`Schema`], in body order.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated(Vec<(&'static str, SqlValue)>);

impl Validated {
    fn get(&self, name: &str) -> Option<&SqlValue> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name) {
            Some(SqlValue::Text(v)) => v.clone(),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name) {
            Some(SqlValue::Int(v)) => *v,
            _ => None,
        }
    }

    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        match self.get(name) {
            Some(SqlValue::Decimal(v)) => *v,
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(SqlValue::Bool(v)) => *v,
            _ => None,
        }
    }

    /// Map onto a resource's updatable fields, keeping body order.
    pub fn into_field_map<F: UpdateField>(self) -> FieldMap<F> {
        self.0
            .into_iter()
            .filter_map(|(name, value)| F::from_field_name(name).map(|f| (f, value)))
            .collect()
    }
}
