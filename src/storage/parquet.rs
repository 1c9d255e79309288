//! Parquet serialization of tick tables.
//!
//! The merged tick table is cached as one Snappy-compressed Parquet file.
//! The schema is built dynamically: four identity columns followed by the
//! telemetry columns in name order. Vector columns are flattened to one
//! Float64 column per component (`name.0`, `name.1`, ...) and their
//! dimensions recorded in the Arrow schema metadata, so a read round-trips
//! to the original column set.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::StorageError;
use crate::models::{Column, TickTable};

/// Schema metadata key listing vector columns as `name=dim` pairs.
const VECTOR_META_KEY: &str = "vector_columns";

const IDENTITY_COLUMNS: usize = 4;

/// Write a tick table to a Parquet file.
pub fn write_ticks(path: &Path, table: &TickTable) -> Result<(), StorageError> {
    let mut fields = vec![
        Field::new("match_id", DataType::Utf8, false),
        Field::new("map_name", DataType::Utf8, false),
        Field::new("player_name", DataType::Utf8, false),
        Field::new("steam_id", DataType::UInt64, false),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        string_array(table.match_ids()),
        string_array(table.map_names()),
        string_array(table.player_names()),
        Arc::new(UInt64Array::from(table.steam_ids().to_vec())),
    ];

    let mut vector_meta = Vec::new();
    for (name, column) in table.columns() {
        match column {
            Column::Scalar(values) => {
                fields.push(Field::new(name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(values.clone())));
            }
            Column::Vector { dim, values } => {
                vector_meta.push(format!("{}={}", name, dim));
                for axis in 0..*dim {
                    let component: Vec<f64> = values.iter().map(|v| v[axis]).collect();
                    fields.push(Field::new(
                        format!("{}.{}", name, axis),
                        DataType::Float64,
                        false,
                    ));
                    arrays.push(Arc::new(Float64Array::from(component)));
                }
            }
        }
    }

    let mut metadata = HashMap::new();
    if !vector_meta.is_empty() {
        metadata.insert(VECTOR_META_KEY.to_string(), vector_meta.join(","));
    }
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!("Wrote {} tick rows to {:?}", table.len(), path);
    Ok(())
}

/// Read a tick table back from a Parquet file.
pub fn read_ticks(path: &Path) -> Result<TickTable, StorageError> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    let batches = batches?;

    let mut match_id = Vec::new();
    let mut map_name = Vec::new();
    let mut player_name = Vec::new();
    let mut steam_id = Vec::new();
    let mut flat: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for batch in &batches {
        extend_strings(batch, 0, &mut match_id)?;
        extend_strings(batch, 1, &mut map_name)?;
        extend_strings(batch, 2, &mut player_name)?;

        let ids = batch
            .column(3)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| cast_error("steam_id"))?;
        steam_id.extend((0..ids.len()).map(|i| ids.value(i)));

        for (idx, field) in schema.fields().iter().enumerate().skip(IDENTITY_COLUMNS) {
            let values = batch
                .column(idx)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| cast_error(field.name()))?;
            let target = flat.entry(field.name().clone()).or_default();
            target.extend((0..values.len()).map(|i| values.value(i)));
        }
    }

    // Reassemble vector columns from their per-component parts.
    let mut columns: BTreeMap<String, Column> = BTreeMap::new();
    for (name, dim) in parse_vector_meta(schema.metadata().get(VECTOR_META_KEY)) {
        let mut components = Vec::with_capacity(dim);
        for axis in 0..dim {
            let key = format!("{}.{}", name, axis);
            let component = flat.remove(&key).ok_or_else(|| cast_error(&key))?;
            components.push(component);
        }
        let rows = components[0].len();
        let values: Vec<[f64; 3]> = (0..rows)
            .map(|row| {
                let mut v = [0.0; 3];
                for (axis, component) in components.iter().enumerate() {
                    v[axis] = component[row];
                }
                v
            })
            .collect();
        columns.insert(name, Column::Vector { dim, values });
    }
    for (name, values) in flat {
        columns.insert(name, Column::Scalar(values));
    }

    let table = TickTable::from_parts(match_id, map_name, player_name, steam_id, columns)?;
    debug!("Read {} tick rows from {:?}", table.len(), path);
    Ok(table)
}

fn string_array(values: &[String]) -> ArrayRef {
    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
    Arc::new(StringArray::from(refs))
}

fn extend_strings(
    batch: &RecordBatch,
    index: usize,
    target: &mut Vec<String>,
) -> Result<(), StorageError> {
    let column = batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| cast_error(batch.schema().field(index).name()))?;
    target.extend((0..column.len()).map(|i| column.value(i).to_string()));
    Ok(())
}

fn cast_error(name: &str) -> StorageError {
    StorageError::Arrow(ArrowError::SchemaError(format!(
        "unexpected type for column {}",
        name
    )))
}

fn parse_vector_meta(raw: Option<&String>) -> Vec<(String, usize)> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|pair| {
            let (name, dim) = pair.split_once('=')?;
            Some((name.to_string(), dim.parse().ok()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_table() -> TickTable {
        let mut columns = BTreeMap::new();
        columns.insert(
            "velocity".to_string(),
            Column::Scalar(vec![0.0, 120.5, 250.0]),
        );
        columns.insert(
            "aim_punch_angle".to_string(),
            Column::Vector {
                dim: 3,
                values: vec![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6], [0.7, 0.8, 0.9]],
            },
        );
        columns.insert(
            "aim_punch_angle_vel".to_string(),
            Column::Vector {
                dim: 2,
                values: vec![[1.0, 2.0, 0.0], [3.0, 4.0, 0.0], [5.0, 6.0, 0.0]],
            },
        );
        TickTable::from_parts(
            vec!["grp_g1".into(), "grp_g1".into(), "grp_g2".into()],
            vec!["de_dust2".into(), "de_dust2".into(), "de_mirage".into()],
            vec!["alpha".into(), "beta".into(), "alpha".into()],
            vec![101, 102, 101],
            columns,
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_rows_and_vectors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ticks.parquet");

        let table = sample_table();
        write_ticks(&path, &table).unwrap();
        let back = read_ticks(&path).unwrap();

        assert_eq!(table, back);
    }

    #[test]
    fn test_roundtrip_nan_scalar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ticks.parquet");

        let mut columns = BTreeMap::new();
        columns.insert(
            "health".to_string(),
            Column::Scalar(vec![100.0, f64::NAN]),
        );
        let table = TickTable::from_parts(
            vec!["m".into(), "m".into()],
            vec!["map".into(), "map".into()],
            vec!["a".into(), "a".into()],
            vec![1, 1],
            columns,
        )
        .unwrap();

        write_ticks(&path, &table).unwrap();
        let back = read_ticks(&path).unwrap();
        let health = back.scalar("health").unwrap();
        assert_eq!(health[0], 100.0);
        assert!(health[1].is_nan());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_ticks(&dir.path().join("absent.parquet"));
        assert!(matches!(err, Err(StorageError::PathNotFound(_))));
    }

    #[test]
    fn test_roundtrip_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ticks.parquet");

        let table = TickTable::new();
        write_ticks(&path, &table).unwrap();
        let back = read_ticks(&path).unwrap();
        assert!(back.is_empty());
    }
}
