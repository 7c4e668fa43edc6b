use std::collections::BTreeSet;

use log::{info, warn};

use crate::{
    aggregate::{distinct_table, duplicate_keys, sort_by_columns},
    context::ExecutionContext,
    data::{Row, Table, Value},
    dates::{DateParts, sas_date},
    error::Result,
    project::{drop_empty_rows, project},
    source::read_source,
    tables::{self, IMMIGRATION_COLUMNS, IMMIGRATION_PARTITIONS},
    writer::{WriteSummary, write_table},
};

#[derive(Debug, Clone)]
pub struct ImmigrationTables {
    pub immigration: Table,
    pub dates: Table,
}

pub fn run(ctx: &ExecutionContext) -> Result<Vec<WriteSummary>> {
    let (path, format) = ctx.immigration_source();
    info!("Reading immigration data from {path:?}");
    let raw = read_source(&path, &format, &tables::immigration_source())?;
    let output = transform(&raw)?;

    let immigration = write_table(
        &output.immigration,
        &ctx.output_path(tables::IMMIGRATION),
        ctx.overwrite(),
    )?;
    info!(
        "Wrote {} immigration row(s) across {} partition(s)",
        immigration.rows,
        immigration.partitions.len()
    );
    let dates = write_table(&output.dates, &ctx.output_path(tables::DATE), ctx.overwrite())?;
    info!("Wrote {} date row(s)", dates.rows);
    Ok(vec![immigration, dates])
}

pub fn transform(raw: &Table) -> Result<ImmigrationTables> {
    let mut cleaned = project(raw, &IMMIGRATION_COLUMNS)?;
    let dropped = drop_empty_rows(&mut cleaned);
    if dropped > 0 {
        info!("Dropped {dropped} immigration row(s) with no values");
    }

    let arrdate = cleaned.column("arrdate")?;
    let arrival = |row: &Row| sas_date(row[arrdate].as_ref().and_then(Value::as_f64));

    let dates = date_dimension(cleaned.rows.iter().filter_map(arrival));

    let schema = tables::immigration();
    let sources = schema
        .columns
        .iter()
        .map(|column| cleaned.column(&column.name))
        .collect::<Result<Vec<_>>>()?;
    let rows = cleaned
        .rows
        .iter()
        .map(|row| {
            schema
                .columns
                .iter()
                .zip(&sources)
                .map(|(column, &idx)| {
                    if idx == arrdate {
                        arrival(row).map(Value::Date)
                    } else {
                        row[idx].as_ref().and_then(|value| value.cast(&column.datatype))
                    }
                })
                .collect()
        })
        .collect();

    let mut immigration = distinct_table(Table::new(schema, rows));
    sort_by_columns(&mut immigration, &IMMIGRATION_PARTITIONS)?;

    let conflicting = duplicate_keys(&immigration, "cicid")?;
    if conflicting > 0 {
        warn!("{conflicting} cicid value(s) appear on more than one distinct immigration row");
    }

    Ok(ImmigrationTables { immigration, dates })
}

pub fn date_dimension(dates: impl IntoIterator<Item = chrono::NaiveDate>) -> Table {
    let rows = dates
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|date| {
            let parts = DateParts::from_date(date);
            vec![
                Some(Value::Date(parts.date)),
                Some(Value::Integer(i64::from(parts.day))),
                Some(Value::Integer(i64::from(parts.week))),
                Some(Value::Integer(i64::from(parts.month))),
                Some(Value::Integer(i64::from(parts.year))),
                Some(Value::Integer(i64::from(parts.weekday))),
            ]
        })
        .collect();
    Table::new(tables::date_dimension(), rows)
}
