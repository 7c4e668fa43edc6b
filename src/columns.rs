//! Table listing for the `tables` command.
//!
//! Renders the output catalog, or the columns of one table, as an ASCII
//! table.

use anyhow::{Result, bail};
use log::info;

use crate::{cli::TablesArgs, schema::TableSchema, table, tables};

pub fn execute(args: &TablesArgs) -> Result<()> {
    let catalog = tables::catalog();
    match &args.table {
        Some(name) => {
            let Some(schema) = catalog.iter().find(|schema| &schema.name == name) else {
                let known = catalog.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
                bail!("Unknown table '{name}'. Known tables: {}", known.join(", "));
            };
            list_columns(schema);
        }
        None => list_tables(&catalog),
    }
    Ok(())
}

fn list_tables(catalog: &[TableSchema]) {
    let rows = catalog
        .iter()
        .map(|schema| {
            vec![
                schema.name.clone(),
                schema.partition_by.join(", "),
                schema.headers().join(", "),
            ]
        })
        .collect::<Vec<_>>();
    let headers = vec![
        "table".to_string(),
        "partitioned by".to_string(),
        "columns".to_string(),
    ];
    table::print_table(&headers, &rows);
    info!("Listed {} table(s)", catalog.len());
}

fn list_columns(schema: &TableSchema) {
    let rows = schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let partition = if schema.partition_by.contains(&column.name) {
                "yes".to_string()
            } else {
                String::new()
            };
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                column.datatype.to_string(),
                partition,
            ]
        })
        .collect::<Vec<_>>();
    let headers = vec![
        "#".to_string(),
        "name".to_string(),
        "type".to_string(),
        "partition".to_string(),
    ];
    table::print_table(&headers, &rows);
    info!(
        "Listed {} column(s) of table '{}'",
        schema.columns.len(),
        schema.name
    );
}
