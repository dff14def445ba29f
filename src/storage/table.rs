//! Table readers for uploaded files.
//!
//! Every reader produces a [`RawTable`]; typing decisions beyond what the
//! file itself records are left to the ingest step.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use axum::body::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StorageError, TableFormat};
use crate::models::{RawCell, RawTable};

/// JSON upload layout: a header list and positional rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Read upload bytes in the given format.
pub fn read_table(bytes: &[u8], format: TableFormat) -> Result<RawTable, StorageError> {
    let table = match format {
        TableFormat::Csv => read_csv(bytes)?,
        TableFormat::Parquet => read_parquet(bytes)?,
        TableFormat::Json => read_json(bytes)?,
    };
    debug!(
        "Read {} table: {} columns, {} rows",
        format,
        table.headers.len(),
        table.len()
    );
    Ok(table)
}

/// CSV: every column is read as text, then typed per cell.
fn read_csv(bytes: &[u8]) -> Result<RawTable, StorageError> {
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(Cursor::new(bytes), Some(0))?;
    if inferred.fields().is_empty() {
        return Err(StorageError::InvalidTable("CSV has no header row".to_string()));
    }

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    batches_to_table(&schema, &batches, true)
}

fn read_parquet(bytes: &[u8]) -> Result<RawTable, StorageError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    batches_to_table(&schema, &batches, false)
}

fn read_json(bytes: &[u8]) -> Result<RawTable, StorageError> {
    let parsed: JsonTable = serde_json::from_slice(bytes)?;
    if parsed.columns.is_empty() {
        return Err(StorageError::InvalidTable("JSON table has no columns".to_string()));
    }
    let rows = parsed
        .rows
        .iter()
        .map(|row| row.iter().map(RawCell::from).collect())
        .collect();
    Ok(RawTable::new(parsed.columns, rows))
}

fn batches_to_table(
    schema: &Schema,
    batches: &[RecordBatch],
    infer_text: bool,
) -> Result<RawTable, StorageError> {
    let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut rows: Vec<Vec<RawCell>> = Vec::new();

    for batch in batches {
        let columns = batch
            .columns()
            .iter()
            .map(|c| column_cells(c, infer_text))
            .collect::<Result<Vec<_>, _>>()?;

        for i in 0..batch.num_rows() {
            rows.push(columns.iter().map(|col| col[i].clone()).collect());
        }
    }

    Ok(RawTable::new(headers, rows))
}

/// Convert one arrow column into raw cells.
fn column_cells(array: &ArrayRef, infer_text: bool) -> Result<Vec<RawCell>, StorageError> {
    let len = array.len();
    let cells = match array.data_type() {
        DataType::Null => vec![RawCell::Missing; len],
        DataType::Utf8 | DataType::LargeUtf8 => {
            let strings = cast(array.as_ref(), &DataType::Utf8)?;
            let strings = strings.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if strings.is_null(i) {
                        RawCell::Missing
                    } else if infer_text {
                        RawCell::infer(strings.value(i))
                    } else {
                        RawCell::text(strings.value(i))
                    }
                })
                .collect()
        }
        DataType::Duration(unit) => {
            let unit = *unit;
            let raw = cast(array.as_ref(), &DataType::Int64)?;
            let raw = raw.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if raw.is_null(i) {
                        RawCell::Missing
                    } else {
                        to_duration(raw.value(i), unit)
                            .map(RawCell::Duration)
                            .unwrap_or_default()
                    }
                })
                .collect()
        }
        dt if dt.is_numeric() => {
            let floats = cast(array.as_ref(), &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if floats.is_null(i) {
                        RawCell::Missing
                    } else {
                        RawCell::Number(floats.value(i))
                    }
                })
                .collect()
        }
        _ => (0..len)
            .map(|i| {
                if array.is_null(i) {
                    Ok(RawCell::Missing)
                } else {
                    array_value_to_string(array.as_ref(), i).map(RawCell::text)
                }
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(cells)
}

fn to_duration(value: i64, unit: TimeUnit) -> Option<Duration> {
    let value = u64::try_from(value).ok()?;
    Some(match unit {
        TimeUnit::Second => Duration::from_secs(value),
        TimeUnit::Millisecond => Duration::from_millis(value),
        TimeUnit::Microsecond => Duration::from_micros(value),
        TimeUnit::Nanosecond => Duration::from_nanos(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DurationSecondArray, Float64Array, StringArray};
    use parquet::arrow::ArrowWriter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_csv_types_cells() {
        let csv = "Periode,Vendor,SLA KEUANGAN,SLA VENDOR\n\
                   2024-01,PT A,1 day 02:00:00,0.5\n\
                   2024,PT B,,\n";
        let table = read_table(csv.as_bytes(), TableFormat::Csv).unwrap();

        assert_eq!(
            table.headers,
            vec!["Periode", "Vendor", "SLA KEUANGAN", "SLA VENDOR"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), &RawCell::Text("2024-01".to_string()));
        assert_eq!(
            table.cell(0, 2),
            &RawCell::Text("1 day 02:00:00".to_string())
        );
        assert_eq!(table.cell(0, 3), &RawCell::Number(0.5));
        assert_eq!(table.cell(1, 0), &RawCell::Number(2024.0));
        assert_eq!(table.cell(1, 2), &RawCell::Missing);
        assert_eq!(table.cell(1, 3), &RawCell::Missing);
    }

    #[test]
    fn test_read_csv_quoted_fields() {
        let csv = "Periode,Jenis Transaksi\n\"Januari 2024\",\"Pengadaan, Jasa\"\n";
        let table = read_table(csv.as_bytes(), TableFormat::Csv).unwrap();
        assert_eq!(
            table.cell(0, 1),
            &RawCell::Text("Pengadaan, Jasa".to_string())
        );
    }

    #[test]
    fn test_read_csv_empty_is_error() {
        assert!(read_table(b"", TableFormat::Csv).is_err());
    }

    #[test]
    fn test_read_json() {
        let json = r#"{
            "columns": ["Periode", "SLA KEUANGAN"],
            "rows": [["2024-01", "14:02"], ["2024-02", null], ["2024-03", 1.5]]
        }"#;
        let table = read_table(json.as_bytes(), TableFormat::Json).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(1, 1), &RawCell::Missing);
        assert_eq!(table.cell(2, 1), &RawCell::Number(1.5));
    }

    #[test]
    fn test_read_json_without_columns_is_error() {
        let json = r#"{"columns": [], "rows": []}"#;
        assert!(read_table(json.as_bytes(), TableFormat::Json).is_err());
    }

    #[test]
    fn test_read_parquet_native_types() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Periode", DataType::Utf8, false),
            Field::new("SLA VENDOR", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["2024-01", "2024-02"])) as ArrayRef,
                Arc::new(Float64Array::from(vec![Some(0.25), None])) as ArrayRef,
            ],
        )
        .unwrap();

        let mut writer = ArrowWriter::try_new(Vec::new(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        let bytes = writer.into_inner().unwrap();

        let table = read_table(&bytes, TableFormat::Parquet).unwrap();
        assert_eq!(table.headers, vec!["Periode", "SLA VENDOR"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), &RawCell::Text("2024-01".to_string()));
        assert_eq!(table.cell(0, 1), &RawCell::Number(0.25));
        assert_eq!(table.cell(1, 1), &RawCell::Missing);
    }

    #[test]
    fn test_duration_column_cells() {
        let array: ArrayRef = Arc::new(DurationSecondArray::from(vec![Some(93_600), None]));
        let cells = column_cells(&array, false).unwrap();
        assert_eq!(
            cells,
            vec![
                RawCell::Duration(Duration::from_secs(93_600)),
                RawCell::Missing
            ]
        );
    }

    #[test]
    fn test_other_types_render_as_text() {
        let array: ArrayRef = Arc::new(arrow::array::BooleanArray::from(vec![Some(true), None]));
        let cells = column_cells(&array, false).unwrap();
        assert_eq!(cells, vec![RawCell::Text("true".to_string()), RawCell::Missing]);
    }

    #[test]
    fn test_to_duration_units() {
        assert_eq!(
            to_duration(1_500, TimeUnit::Millisecond),
            Some(Duration::from_millis(1_500))
        );
        assert_eq!(to_duration(-1, TimeUnit::Second), None);
    }
}
