use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::sql::{SqlValue, UpdateField};
use crate::validation::{Kind, Rule, Schema, Validated};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i32,
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<Decimal>,
    pub company_handle: String,
}

/// Columns selected for every job read.
pub const JOB_COLUMNS: &str = "id, title, salary, equity, company_handle";

#[derive(Debug, Clone, PartialEq)]
pub struct JobNew {
    pub title: String,
    pub salary: Option<i32>,
    pub equity: Option<Decimal>,
    pub company_handle: String,
}

const TITLE: Kind = Kind::Text { min_len: 1, max_len: 255 };
const SALARY: Kind = Kind::Integer { min: 0 };
const EQUITY: Kind = Kind::Decimal { min: Decimal::ZERO, max: Decimal::ONE };

pub const JOB_NEW_SCHEMA: Schema = Schema::new(&[
    Rule::required("title", TITLE),
    Rule::nullable("salary", SALARY),
    Rule::nullable("equity", EQUITY),
    Rule::required("companyHandle", Kind::Text { min_len: 1, max_len: 25 }),
]);

pub const JOB_UPDATE_SCHEMA: Schema = Schema::new(&[
    Rule::optional("title", TITLE),
    Rule::nullable("salary", SALARY),
    Rule::nullable("equity", EQUITY),
]);

impl From<Validated> for JobNew {
    fn from(v: Validated) -> Self {
        Self {
            title: v.text("title").unwrap_or_default(),
            salary: v.int("salary"),
            equity: v.decimal("equity"),
            company_handle: v.text("companyHandle").unwrap_or_default(),
        }
    }
}

/// Job columns open to partial update. Names match their columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobField {
    Title,
    Salary,
    Equity,
}

impl UpdateField for JobField {
    const ALL: &'static [Self] = &[JobField::Title, JobField::Salary, JobField::Equity];

    fn field_name(self) -> &'static str {
        match self {
            JobField::Title => "title",
            JobField::Salary => "salary",
            JobField::Equity => "equity",
        }
    }
}

/// Optional search criteria for listing jobs; all given criteria must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub title: Option<String>,
    pub min_salary: Option<i32>,
    pub has_equity: bool,
}

impl JobFilter {
    /// WHERE clause (empty when unfiltered) and its bindings.
    pub fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut expressions = Vec::new();
        let mut values = Vec::new();

        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            values.push(SqlValue::Text(Some(format!("%{}%", title))));
            expressions.push(format!("title ILIKE ${}", values.len()));
        }

        if let Some(min_salary) = self.min_salary {
            values.push(SqlValue::Int(Some(min_salary)));
            expressions.push(format!("salary >= ${}", values.len()));
        }

        if self.has_equity {
            expressions.push("equity > 0".to_string());
        }

        if expressions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", expressions.join(" AND ")), values)
        }
    }
}
