//! Partitioned Parquet output with replace-on-write semantics.
//!
//! A table is written as a Hive-style directory tree: one nested
//! `column=value` directory per partition key, each leaf holding a single
//! `part-00000.parquet` file without the partition columns. Every unit that
//! is replaced (the whole table, or one partition) is first written to a
//! hidden sibling staging directory and then swapped in with renames, so a
//! failed write never leaves a unit half old and half new.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray},
    error::ArrowError,
    record_batch::{RecordBatch, RecordBatchOptions},
};
use clap::ValueEnum;
use log::debug;
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    data::{Row, Table, Value},
    dates,
    error::{BoxError, EtlError, Result},
    schema::{ColumnType, TableSchema},
};

pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";
pub const DATA_FILE_NAME: &str = "part-00000.parquet";
pub const SUCCESS_MARKER: &str = "_SUCCESS";
const ZSTD_LEVEL: i32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "kebab-case")]
pub enum OverwriteMode {
    /// Replace the whole table directory.
    #[default]
    Table,
    /// Replace only the partitions present in the new data.
    Partitions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
    /// Relative partition paths written, e.g. `i94yr=2016/i94mon=4`. Empty
    /// for unpartitioned tables.
    pub partitions: Vec<String>,
}

pub fn write_table(table: &Table, dest: &Path, mode: OverwriteMode) -> Result<WriteSummary> {
    let partition_indices = table
        .schema
        .partition_by
        .iter()
        .map(|key| table.column(key))
        .collect::<Result<Vec<_>>>()?;
    let data_indices = (0..table.schema.columns.len())
        .filter(|idx| !partition_indices.contains(idx))
        .collect::<Vec<_>>();

    let mut groups: BTreeMap<Row, Vec<&Row>> = BTreeMap::new();
    if partition_indices.is_empty() {
        groups.insert(Vec::new(), table.rows.iter().collect());
    } else {
        for row in &table.rows {
            let key = partition_indices.iter().map(|&idx| row[idx].clone()).collect();
            groups.entry(key).or_default().push(row);
        }
    }

    // Distinct keys can render to the same directory (null and "", 0.0 and
    // -0.0). Those groups share one partition file.
    let mut layout: Vec<(String, Vec<&Row>)> = Vec::with_capacity(groups.len());
    let mut slots: BTreeMap<String, usize> = BTreeMap::new();
    for (key, rows) in groups {
        let relative = partition_path(&table.schema, &partition_indices, &key);
        match slots.get(&relative) {
            Some(&slot) => layout[slot].1.extend(rows),
            None => {
                slots.insert(relative.clone(), layout.len());
                layout.push((relative, rows));
            }
        }
    }

    let replace_whole_table = mode == OverwriteMode::Table || partition_indices.is_empty();
    if replace_whole_table {
        let staging = staging_path(dest)?;
        let written = layout.iter().try_for_each(|(relative, rows)| {
            write_partition(&table.schema, &data_indices, rows, &staging.join(relative))
        });
        let written = written.and_then(|_| touch_success(&staging));
        if let Err(err) = written {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
        swap_into_place(&staging, dest)?;
    } else {
        fs::create_dir_all(dest).map_err(|err| EtlError::write_failure(dest, err))?;
        for (relative, rows) in &layout {
            let target = dest.join(relative);
            let staging = staging_path(&target)?;
            if let Err(err) = write_partition(&table.schema, &data_indices, rows, &staging) {
                let _ = fs::remove_dir_all(&staging);
                return Err(err);
            }
            swap_into_place(&staging, &target)?;
        }
        touch_success(dest)?;
    }

    Ok(WriteSummary {
        table: table.schema.name.clone(),
        path: dest.to_path_buf(),
        rows: table.rows.len(),
        partitions: if partition_indices.is_empty() {
            Vec::new()
        } else {
            layout.into_iter().map(|(relative, _)| relative).collect()
        },
    })
}

fn partition_path(schema: &TableSchema, indices: &[usize], key: &Row) -> String {
    indices
        .iter()
        .zip(key)
        .map(|(&idx, cell)| {
            let value = cell
                .as_ref()
                .map(Value::as_display)
                .filter(|display| !display.is_empty())
                .map(|display| escape_partition_value(&display))
                .unwrap_or_else(|| HIVE_DEFAULT_PARTITION.to_string());
            format!("{}={}", escape_partition_value(&schema.columns[idx].name), value)
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn needs_escape(ch: char) -> bool {
    ch.is_ascii_control()
        || matches!(
            ch,
            '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
        )
}

pub fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if needs_escape(ch) {
            escaped.push_str(&format!("%{:02X}", ch as u32));
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

pub fn unescape_partition_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%'
            && let Some(byte) = value
                .get(idx + 1..idx + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            decoded.push(byte);
            idx += 3;
            continue;
        }
        decoded.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn staging_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|err| EtlError::write_failure(parent, err))?;
    }
    let leaf = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    Ok(parent.join(format!(".{leaf}.staging-{}", Uuid::new_v4().simple())))
}

/// Moves `staging` to `target`, replacing whatever was there. The previous
/// content is restored if the final rename fails.
fn swap_into_place(staging: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        return fs::rename(staging, target).map_err(|err| EtlError::write_failure(target, err));
    }
    let retired = target.with_file_name(format!(
        ".{}.retired-{}",
        target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Uuid::new_v4().simple()
    ));
    fs::rename(target, &retired).map_err(|err| EtlError::write_failure(target, err))?;
    if let Err(err) = fs::rename(staging, target) {
        let _ = fs::rename(&retired, target);
        let _ = fs::remove_dir_all(staging);
        return Err(EtlError::write_failure(target, err));
    }
    if retired.is_dir() {
        fs::remove_dir_all(&retired).map_err(|err| EtlError::write_failure(&retired, err))?;
    } else {
        fs::remove_file(&retired).map_err(|err| EtlError::write_failure(&retired, err))?;
    }
    Ok(())
}

fn touch_success(dir: &Path) -> Result<()> {
    let marker = dir.join(SUCCESS_MARKER);
    fs::create_dir_all(dir).map_err(|err| EtlError::write_failure(dir, err))?;
    File::create(&marker).map_err(|err| EtlError::write_failure(&marker, err))?;
    Ok(())
}

fn write_partition(
    schema: &TableSchema,
    data_indices: &[usize],
    rows: &[&Row],
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|err| EtlError::write_failure(dir, err))?;
    let path = dir.join(DATA_FILE_NAME);
    let batch = build_batch(schema, data_indices, rows)
        .map_err(|err| EtlError::write_failure(&path, err))?;
    write_parquet(&path, &batch).map_err(|err| EtlError::write_failure(&path, err))?;
    debug!("Wrote {} row(s) to {:?}", rows.len(), path);
    Ok(())
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> std::result::Result<(), BoxError> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(ZSTD_LEVEL)?))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

pub fn build_batch(
    schema: &TableSchema,
    indices: &[usize],
    rows: &[&Row],
) -> std::result::Result<RecordBatch, ArrowError> {
    let arrays = indices
        .iter()
        .map(|&idx| {
            let datatype = schema.columns[idx].datatype;
            build_array(datatype, rows.iter().map(|row| row[idx].as_ref()))
        })
        .collect::<Vec<_>>();
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema.arrow_schema_for(indices), arrays, &options)
}

fn build_array<'a>(datatype: ColumnType, cells: impl Iterator<Item = Option<&'a Value>>) -> ArrayRef {
    let typed = cells.map(|cell| match cell {
        Some(value) => value.cast(&datatype),
        None => None,
    });
    match datatype {
        ColumnType::String => Arc::new(StringArray::from(
            typed
                .map(|cell| match cell {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Integer => Arc::new(Int64Array::from(
            typed
                .map(|cell| match cell {
                    Some(Value::Integer(i)) => Some(i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Float => Arc::new(Float64Array::from(
            typed
                .map(|cell| match cell {
                    Some(Value::Float(f)) => Some(f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Date => Arc::new(Date32Array::from(
            typed
                .map(|cell| match cell {
                    Some(Value::Date(d)) => Some(dates::to_unix_days(d)),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
    }
}
