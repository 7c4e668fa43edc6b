use crate::schema::{ColumnSpec, ColumnType, TableSchema};

pub const IMMIGRATION: &str = "immigration";
pub const DATE: &str = "date";
pub const TEMPERATURE: &str = "temperature";
pub const COUNTRY: &str = "country";
pub const STATE: &str = "state";

pub const REFERENCE_KEY: &str = "code";

/// Columns kept from the raw I-94 extract, in output order.
pub const IMMIGRATION_COLUMNS: [&str; 14] = [
    "cicid", "i94yr", "i94mon", "i94cit", "i94res", "arrdate", "i94addr", "depdate", "dtadfile",
    "biryear", "gender", "airline", "fltno", "visatype",
];

pub const IMMIGRATION_PARTITIONS: [&str; 2] = ["i94yr", "i94mon"];

pub fn immigration_source() -> Vec<ColumnSpec> {
    use ColumnType::*;
    [
        ("cicid", Float),
        ("i94yr", Float),
        ("i94mon", Float),
        ("i94cit", Float),
        ("i94res", Float),
        ("arrdate", Float),
        ("i94addr", String),
        ("depdate", Float),
        ("dtadfile", String),
        ("biryear", Float),
        ("gender", String),
        ("airline", String),
        ("fltno", String),
        ("visatype", String),
    ]
    .into_iter()
    .map(|(name, ty)| ColumnSpec::new(name, ty))
    .collect()
}

pub fn immigration() -> TableSchema {
    use ColumnType::*;
    let columns = [
        ("cicid", Integer),
        ("i94yr", Float),
        ("i94mon", Float),
        ("i94cit", Integer),
        ("i94res", Integer),
        ("arrdate", Date),
        ("i94addr", String),
        ("depdate", Float),
        ("dtadfile", Integer),
        ("biryear", Float),
        ("gender", String),
        ("airline", String),
        ("fltno", String),
        ("visatype", String),
    ]
    .into_iter()
    .map(|(name, ty)| ColumnSpec::new(name, ty))
    .collect();
    TableSchema::new(IMMIGRATION, columns).partitioned_by(IMMIGRATION_PARTITIONS)
}

pub fn date_dimension() -> TableSchema {
    let mut columns = vec![ColumnSpec::new("date", ColumnType::Date)];
    columns.extend(
        ["day", "week", "month", "year", "weekday"]
            .into_iter()
            .map(|name| ColumnSpec::new(name, ColumnType::Integer)),
    );
    TableSchema::new(DATE, columns)
}

pub fn temperature_source() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("dt", ColumnType::Date),
        ColumnSpec::new("AverageTemperature", ColumnType::Float),
        ColumnSpec::string("Country"),
        ColumnSpec::string("Latitude"),
        ColumnSpec::string("Longitude"),
    ]
}

pub fn temperature() -> TableSchema {
    TableSchema::new(
        TEMPERATURE,
        vec![
            ColumnSpec::string("Country"),
            ColumnSpec::new("Month", ColumnType::Integer),
            ColumnSpec::new("AverageTemperature", ColumnType::Float),
            ColumnSpec::string("Latitude"),
            ColumnSpec::string("Longitude"),
        ],
    )
}

pub fn reference_source() -> Vec<ColumnSpec> {
    vec![ColumnSpec::string(REFERENCE_KEY)]
}

pub fn reference(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![ColumnSpec::string(REFERENCE_KEY), ColumnSpec::string(name)],
    )
}

pub fn catalog() -> Vec<TableSchema> {
    vec![
        immigration(),
        date_dimension(),
        temperature(),
        reference(COUNTRY),
        reference(STATE),
    ]
}
