use std::path::Path;

use log::{info, warn};

use crate::{
    aggregate::{distinct_table, duplicate_keys},
    context::ExecutionContext,
    data::Table,
    error::Result,
    source::read_source,
    tables::{self, REFERENCE_KEY},
    writer::{WriteSummary, write_table},
};

pub fn run_country(ctx: &ExecutionContext) -> Result<Vec<WriteSummary>> {
    run(ctx, &ctx.config().countries, tables::COUNTRY)
}

pub fn run_state(ctx: &ExecutionContext) -> Result<Vec<WriteSummary>> {
    run(ctx, &ctx.config().states, tables::STATE)
}

fn run(ctx: &ExecutionContext, input: &Path, name: &str) -> Result<Vec<WriteSummary>> {
    let path = ctx.input_path(input);
    info!("Reading {name} lookup from {path:?}");
    let raw = read_source(&path, &ctx.text_format(), &tables::reference_source())?;
    let table = transform(raw, name)?;
    let summary = write_table(&table, &ctx.output_path(name), ctx.overwrite())?;
    info!("Wrote {} {name} row(s)", summary.rows);
    Ok(vec![summary])
}

pub fn transform(raw: Table, name: &str) -> Result<Table> {
    let table = distinct_table(raw.renamed(name));
    let conflicting = duplicate_keys(&table, REFERENCE_KEY)?;
    if conflicting > 0 {
        warn!("{conflicting} {REFERENCE_KEY} value(s) map to more than one {name} row");
    }
    Ok(table)
}
