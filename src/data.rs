use std::{cmp::Ordering, fmt};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    error::EtlError,
    schema::{ColumnType, TableSchema},
};

#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

pub type Row = Vec<Option<Value>>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            Value::Date(_) => None,
        }
    }

    /// Converts the value to `ty` the way a permissive SQL cast would:
    /// anything that cannot be represented becomes `None`.
    pub fn cast(&self, ty: &ColumnType) -> Option<Value> {
        match (self, ty) {
            (Value::String(_), ColumnType::String)
            | (Value::Integer(_), ColumnType::Integer)
            | (Value::Float(_), ColumnType::Float)
            | (Value::Date(_), ColumnType::Date) => Some(self.clone()),
            (Value::String(s), _) => parse_typed_value(s, ty).ok().flatten(),
            (other, ColumnType::String) => Some(Value::String(other.as_display())),
            (Value::Integer(i), ColumnType::Float) => Some(Value::Float(*i as f64)),
            (Value::Float(f), ColumnType::Integer) => truncate_float(*f).map(Value::Integer),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::Date(_) => 3,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows `Ord` so that NaN cells deduplicate like any other value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.schema.headers()
    }

    pub fn column(&self, name: &str) -> crate::error::Result<usize> {
        self.schema
            .column_index(name)
            .ok_or_else(|| EtlError::UnknownField {
                field: name.to_string(),
                available: self.headers(),
            })
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.schema.name = name.into();
        self
    }
}

pub fn compare_cells(left: &Option<Value>, right: &Option<Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => l.cmp(r),
    }
}

fn truncate_float(value: f64) -> Option<i64> {
    if value.is_finite() && value.abs() < i64::MAX as f64 {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    parse_naive_datetime(value)
        .map(|dt| dt.date())
        .map_err(|_| anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => match trimmed.parse::<i64>() {
            Ok(parsed) => Value::Integer(parsed),
            Err(_) => {
                let float: f64 = trimmed
                    .parse()
                    .with_context(|| format!("Failed to parse '{value}' as integer"))?;
                let truncated = truncate_float(float)
                    .ok_or_else(|| anyhow!("Integer '{value}' is out of range"))?;
                Value::Integer(truncated)
            }
        },
        ColumnType::Float => {
            let parsed: f64 = trimmed
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Date => Value::Date(parse_naive_date(trimmed)?),
    };
    Ok(Some(parsed))
}
