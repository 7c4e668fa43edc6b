use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::{
    data::{Row, Table, Value, compare_cells},
    error::{EtlError, Result},
    schema::{ColumnSpec, ColumnType, TableSchema},
};

pub fn distinct(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = BTreeSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

pub fn distinct_table(table: Table) -> Table {
    let Table { schema, rows } = table;
    Table::new(schema, distinct(rows))
}

pub fn sort_by_columns<S: AsRef<str>>(table: &mut Table, keys: &[S]) -> Result<()> {
    let indices = keys
        .iter()
        .map(|key| table.column(key.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    table.rows.sort_by(|left, right| {
        indices
            .iter()
            .map(|&idx| compare_cells(&left[idx], &right[idx]))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(())
}

/// Number of distinct non-null values of `key` that occur on more than one row.
pub fn duplicate_keys(table: &Table, key: &str) -> Result<usize> {
    let idx = table.column(key)?;
    let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
    for value in table.rows.iter().filter_map(|row| row[idx].as_ref()) {
        *counts.entry(value).or_insert(0) += 1;
    }
    Ok(counts.values().filter(|count| **count > 1).count())
}

/// Group-by with one averaged measurement and companion columns taken from
/// the first row of each group in input order.
#[derive(Debug, Clone)]
pub struct GroupAggregate {
    keys: Vec<String>,
    mean: String,
    first: Vec<String>,
}

impl GroupAggregate {
    pub fn new<S: Into<String>>(
        keys: impl IntoIterator<Item = S>,
        mean: impl Into<String>,
        first: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            mean: mean.into(),
            first: first.into_iter().map(Into::into).collect(),
        }
    }

    /// Output columns are the keys, then the mean (as float), then the
    /// companion columns. Rows come out ordered by the keys.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let key_indices = self
            .keys
            .iter()
            .map(|key| table.column(key))
            .collect::<Result<Vec<_>>>()?;
        let mean_index = table.column(&self.mean)?;
        let first_indices = self
            .first
            .iter()
            .map(|name| table.column(name))
            .collect::<Result<Vec<_>>>()?;

        let mut groups: BTreeMap<Row, Vec<usize>> = BTreeMap::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let key = key_indices.iter().map(|&idx| row[idx].clone()).collect();
            groups.entry(key).or_default().push(row_idx);
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let Some(&representative) = members.first() else {
                return Err(EtlError::EmptyGroup {
                    key: describe_key(&key),
                });
            };
            let mut output = key;
            output.push(mean_of(
                members
                    .iter()
                    .map(|&row_idx| table.rows[row_idx][mean_index].as_ref()),
            ));
            output.extend(
                first_indices
                    .iter()
                    .map(|&idx| table.rows[representative][idx].clone()),
            );
            rows.push(output);
        }

        let mut columns = key_indices
            .iter()
            .map(|&idx| table.schema.columns[idx].clone())
            .collect::<Vec<_>>();
        columns.push(ColumnSpec::new(self.mean.clone(), ColumnType::Float));
        columns.extend(
            first_indices
                .iter()
                .map(|&idx| table.schema.columns[idx].clone()),
        );
        Ok(Table::new(
            TableSchema::new(table.schema.name.clone(), columns),
            rows,
        ))
    }
}

fn mean_of<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Option<Value> {
    let (sum, count) = values
        .flatten()
        .filter_map(Value::as_f64)
        .fold((0.0_f64, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| Value::Float(sum / count as f64))
}

fn describe_key(key: &Row) -> String {
    let parts = key
        .iter()
        .map(|cell| cell.as_ref().map_or_else(|| "null".to_string(), Value::as_display))
        .join(", ");
    format!("({parts})")
}
