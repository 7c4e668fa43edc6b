use chrono::Datelike;
use log::{info, warn};

use crate::{
    aggregate::GroupAggregate,
    context::ExecutionContext,
    data::{Table, Value},
    error::Result,
    project::project,
    schema::{ColumnSpec, ColumnType, TableSchema},
    source::read_source,
    tables,
    writer::{WriteSummary, write_table},
};

pub fn run(ctx: &ExecutionContext) -> Result<Vec<WriteSummary>> {
    let path = ctx.input_path(&ctx.config().temperature);
    info!("Reading temperature data from {path:?}");
    let raw = read_source(&path, &ctx.text_format(), &tables::temperature_source())?;
    let table = transform(&raw)?;
    let summary = write_table(&table, &ctx.output_path(tables::TEMPERATURE), ctx.overwrite())?;
    info!("Wrote {} temperature row(s)", summary.rows);
    Ok(vec![summary])
}

/// Groups by (Country, Month). Latitude and longitude come from the first
/// observation of each group in file order. Rows without a parseable `dt`
/// form a null-month group per country.
pub fn transform(raw: &Table) -> Result<Table> {
    let observations = project(
        raw,
        &["dt", "Country", "AverageTemperature", "Latitude", "Longitude"],
    )?;

    let mut undated = 0usize;
    let rows = observations
        .rows
        .into_iter()
        .map(|mut row| {
            row[0] = match row[0].take() {
                Some(Value::Date(date)) => Some(Value::Integer(i64::from(date.month()))),
                _ => {
                    undated += 1;
                    None
                }
            };
            row
        })
        .collect();
    if undated > 0 {
        warn!("{undated} temperature row(s) without a valid dt were grouped under a null Month");
    }

    let monthly = Table::new(
        TableSchema::new(
            tables::TEMPERATURE,
            vec![
                ColumnSpec::new("Month", ColumnType::Integer),
                ColumnSpec::string("Country"),
                ColumnSpec::new("AverageTemperature", ColumnType::Float),
                ColumnSpec::string("Latitude"),
                ColumnSpec::string("Longitude"),
            ],
        ),
        rows,
    );

    let aggregate = GroupAggregate::new(
        ["Country", "Month"],
        "AverageTemperature",
        ["Latitude", "Longitude"],
    );
    let mut table = aggregate.apply(&monthly)?;
    table.schema = tables::temperature();
    Ok(table)
}
