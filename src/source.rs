//! Source reading: delimited text with a header row, or Parquet.
//!
//! Readers check that every expected column is present and parse expected
//! columns into their declared types. Parsing is permissive: a cell that
//! cannot be converted becomes null and the per-column count is logged.
//! Columns the caller did not ask for are carried along as read.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, AsArray},
    compute::cast,
    datatypes::{Date32Type, Float64Type, Int64Type},
    record_batch::RecordBatch,
};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::{
    data::{Row, Table, Value, parse_typed_value},
    dates,
    error::{EtlError, Result},
    io_utils,
    schema::{ColumnSpec, ColumnType, TableSchema},
    writer::{HIVE_DEFAULT_PARTITION, unescape_partition_value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text with a header row. A `None` delimiter is resolved
    /// from the file extension.
    Delimited {
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    },
    /// A Parquet file, or a directory tree of Parquet files.
    Parquet,
}

impl SourceFormat {
    pub fn csv() -> Self {
        SourceFormat::Delimited {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn read_source(path: &Path, format: &SourceFormat, expected: &[ColumnSpec]) -> Result<Table> {
    let table = match format {
        SourceFormat::Delimited {
            delimiter,
            encoding,
        } => read_delimited(path, *delimiter, encoding, expected)?,
        SourceFormat::Parquet => read_parquet(path, expected)?,
    };
    debug!(
        "Read {} row(s) x {} column(s) from {:?}",
        table.len(),
        table.schema.columns.len(),
        path
    );
    Ok(table)
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("source")
        .to_string()
}

fn check_expected(path: &Path, headers: &[String], expected: &[ColumnSpec]) -> Result<()> {
    let missing = expected
        .iter()
        .filter(|spec| !headers.iter().any(|h| *h == spec.name))
        .map(|spec| spec.name.clone())
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::SchemaMismatch {
            path: path.to_path_buf(),
            missing,
        })
    }
}

fn report_rejections(path: &Path, rejected: &BTreeMap<String, usize>) {
    for (column, count) in rejected {
        warn!("{count} value(s) in column '{column}' of {path:?} could not be converted and were set to null");
    }
}

fn read_delimited(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    expected: &[ColumnSpec],
) -> Result<Table> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)
        .map_err(|err| EtlError::source_unavailable(path, err))?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|err| EtlError::source_unavailable(path, err))?;
    check_expected(path, &headers, expected)?;

    let columns = headers
        .iter()
        .map(|header| {
            expected
                .iter()
                .find(|spec| spec.name == *header)
                .cloned()
                .unwrap_or_else(|| ColumnSpec::string(header.clone()))
        })
        .collect::<Vec<_>>();

    let mut rejected: BTreeMap<String, usize> = BTreeMap::new();
    let mut ragged = 0usize;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            EtlError::source_unavailable(path, format!("row {}: {err}", row_idx + 2))
        })?;
        let decoded = io_utils::decode_record(&record, encoding).map_err(|err| {
            EtlError::source_unavailable(path, format!("row {}: {err}", row_idx + 2))
        })?;
        if decoded.len() != columns.len() {
            ragged += 1;
        }
        // Missing trailing fields read as null; surplus fields are ignored.
        let row = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let raw = decoded.get(idx)?;
                match parse_typed_value(raw, &column.datatype) {
                    Ok(value) => value,
                    Err(_) => {
                        *rejected.entry(column.name.clone()).or_insert(0) += 1;
                        None
                    }
                }
            })
            .collect::<Row>();
        rows.push(row);
    }
    if ragged > 0 {
        warn!("{ragged} row(s) of {path:?} did not match the header width and were padded or cut");
    }
    report_rejections(path, &rejected);

    Ok(Table::new(TableSchema::new(table_name(path), columns), rows))
}

fn read_parquet(path: &Path, expected: &[ColumnSpec]) -> Result<Table> {
    let files = parquet_files(path)?;
    let mut combined: Option<Table> = None;
    for file in &files {
        let table = read_parquet_file(file)?;
        combined = Some(match combined {
            None => table,
            Some(mut acc) => {
                append_aligned(&mut acc, table, file)?;
                acc
            }
        });
    }
    let Some(mut table) = combined else {
        return Err(EtlError::source_unavailable(path, "no parquet files found"));
    };
    check_expected(path, &table.headers(), expected)?;
    coerce_expected(path, &mut table, expected);
    Ok(table.renamed(table_name(path)))
}

fn append_aligned(acc: &mut Table, next: Table, file: &Path) -> Result<()> {
    let mapping = acc
        .schema
        .columns
        .iter()
        .map(|column| next.schema.column_index(&column.name))
        .collect::<Vec<_>>();
    let missing = acc
        .schema
        .columns
        .iter()
        .zip(&mapping)
        .filter(|(_, idx)| idx.is_none())
        .map(|(column, _)| column.name.clone())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(EtlError::SchemaMismatch {
            path: file.to_path_buf(),
            missing,
        });
    }
    for row in next.rows {
        let aligned = mapping
            .iter()
            .zip(&acc.schema.columns)
            .map(|(idx, column)| {
                idx.and_then(|idx| row[idx].clone())
                    .and_then(|value| value.cast(&column.datatype))
            })
            .collect();
        acc.rows.push(aligned);
    }
    Ok(())
}

fn coerce_expected(path: &Path, table: &mut Table, expected: &[ColumnSpec]) {
    let mut rejected: BTreeMap<String, usize> = BTreeMap::new();
    for spec in expected {
        let Some(idx) = table.schema.column_index(&spec.name) else {
            continue;
        };
        if table.schema.columns[idx].datatype == spec.datatype {
            continue;
        }
        table.schema.columns[idx].datatype = spec.datatype;
        for row in &mut table.rows {
            if let Some(value) = row[idx].take() {
                row[idx] = value.cast(&spec.datatype);
                if row[idx].is_none() {
                    *rejected.entry(spec.name.clone()).or_insert(0) += 1;
                }
            }
        }
    }
    report_rejections(path, &rejected);
}

pub fn parquet_files(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path).map_err(|err| EtlError::source_unavailable(path, err))?;
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    collect_parquet_files(path, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_parquet_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|err| EtlError::source_unavailable(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| EtlError::source_unavailable(dir, err))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_parquet_files(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn read_parquet_file(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|err| EtlError::source_unavailable(path, err))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|err| EtlError::source_unavailable(path, err))?;
    let arrow_schema = Arc::clone(builder.schema());
    let reader = builder
        .build()
        .map_err(|err| EtlError::source_unavailable(path, err))?;

    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| ColumnSpec::new(field.name().clone(), ColumnType::from_arrow(field.data_type())))
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|err| EtlError::source_unavailable(path, err))?;
        append_batch(&batch, &columns, &mut rows)
            .map_err(|err| EtlError::source_unavailable(path, err))?;
    }
    Ok(Table::new(TableSchema::new(table_name(path), columns), rows))
}

fn append_batch(
    batch: &RecordBatch,
    columns: &[ColumnSpec],
    rows: &mut Vec<Row>,
) -> std::result::Result<(), arrow::error::ArrowError> {
    let start = rows.len();
    rows.extend((0..batch.num_rows()).map(|_| Vec::with_capacity(columns.len())));
    for (array, column) in batch.columns().iter().zip(columns) {
        let cells = array_to_cells(array, column.datatype)?;
        for (row, cell) in rows[start..].iter_mut().zip(cells) {
            row.push(cell);
        }
    }
    Ok(())
}

fn array_to_cells(
    array: &ArrayRef,
    datatype: ColumnType,
) -> std::result::Result<Vec<Option<Value>>, arrow::error::ArrowError> {
    let normalized = cast(array, &datatype.arrow_type())?;
    let cells = match datatype {
        ColumnType::Integer => normalized
            .as_primitive::<Int64Type>()
            .iter()
            .map(|cell| cell.map(Value::Integer))
            .collect(),
        ColumnType::Float => normalized
            .as_primitive::<Float64Type>()
            .iter()
            .map(|cell| cell.map(Value::Float))
            .collect(),
        ColumnType::Date => normalized
            .as_primitive::<Date32Type>()
            .iter()
            .map(|cell| cell.and_then(dates::from_unix_days).map(Value::Date))
            .collect(),
        ColumnType::String => normalized
            .as_string::<i32>()
            .iter()
            .map(|cell| cell.map(|text| Value::String(text.to_string())))
            .collect(),
    };
    Ok(cells)
}

/// Reads a table written by [`crate::writer`], restoring partition columns
/// from `key=value` directory names. Partition values are typed as integer,
/// then float, then text, whichever parses first.
pub fn read_table_dir(dir: &Path) -> Result<Table> {
    let files = parquet_files(dir)?;
    let mut combined: Option<Table> = None;
    let mut partition_keys: Vec<String> = Vec::new();

    for file in &files {
        let partitions = partition_values(dir, file);
        if combined.is_none() {
            partition_keys = partitions.iter().map(|(key, _)| key.clone()).collect();
        }
        let mut table = read_parquet_file(file)?;
        for (key, raw) in &partitions {
            let value = raw.as_deref().and_then(infer_partition_value);
            let datatype = match &value {
                Some(Value::Integer(_)) => ColumnType::Integer,
                Some(Value::Float(_)) => ColumnType::Float,
                Some(_) => ColumnType::String,
                // A null partition says nothing about the type.
                None => combined
                    .as_ref()
                    .and_then(|acc| {
                        let idx = acc.schema.column_index(key)?;
                        Some(acc.schema.columns[idx].datatype)
                    })
                    .unwrap_or(ColumnType::Integer),
            };
            table.schema.columns.push(ColumnSpec::new(key.clone(), datatype));
            for row in &mut table.rows {
                row.push(value.clone());
            }
        }
        combined = Some(match combined {
            None => table,
            Some(mut acc) => {
                widen_partition_types(&mut acc, &table);
                append_aligned(&mut acc, table, file)?;
                acc
            }
        });
    }

    let table = combined.ok_or_else(|| EtlError::source_unavailable(dir, "no parquet files found"))?;
    let mut table = table.renamed(table_name(dir));
    table.schema.partition_by = partition_keys;
    Ok(table)
}

// A partition column typed Integer in one directory may be Float or text in
// another; widen the accumulated type so no value is lost on append.
fn widen_partition_types(acc: &mut Table, next: &Table) {
    for (idx, column) in acc.schema.columns.clone().iter().enumerate() {
        let Some(other) = next.schema.column_index(&column.name) else {
            continue;
        };
        let widened = match (column.datatype, next.schema.columns[other].datatype) {
            (a, b) if a == b => continue,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::String,
        };
        acc.schema.columns[idx].datatype = widened;
        for row in &mut acc.rows {
            row[idx] = row[idx].take().and_then(|value| value.cast(&widened));
        }
    }
}

fn partition_values(root: &Path, file: &Path) -> Vec<(String, Option<String>)> {
    let Ok(relative) = file.strip_prefix(root) else {
        return Vec::new();
    };
    relative
        .parent()
        .into_iter()
        .flat_map(|parent| parent.components())
        .filter_map(|component| {
            let segment = component.as_os_str().to_str()?;
            let (key, raw) = segment.split_once('=')?;
            let value = (raw != HIVE_DEFAULT_PARTITION).then(|| unescape_partition_value(raw));
            Some((unescape_partition_value(key), value))
        })
        .collect()
}

fn infer_partition_value(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    [ColumnType::Integer, ColumnType::Float]
        .iter()
        .find_map(|ty| {
            // Only accept integers spelled without a fraction.
            if *ty == ColumnType::Integer && !raw.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
                return None;
            }
            parse_typed_value(raw, ty).ok().flatten()
        })
        .or_else(|| Some(Value::String(raw.to_string())))
}
