use anyhow::{Context, Result};
use log::info;

use crate::{cli::PreviewArgs, source, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let data = source::read_table_dir(&args.table)
        .with_context(|| format!("Reading table from {:?}", args.table))?;
    let headers = data.headers();
    let rows = data
        .rows
        .iter()
        .take(args.rows)
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map(|value| value.as_display()).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    table::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        data.len(),
        args.table
    );
    Ok(())
}
