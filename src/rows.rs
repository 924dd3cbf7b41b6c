//! Row-oriented I/O boundary.
//!
//! The core consumes and produces flat column→value maps; the schema
//! mapping is the only place where external column names meet the
//! closed [`Field`] set. The CSV reading and writing here is thin glue
//! for the binary — nothing in the engine depends on the storage
//! format.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::engine::InputRecord;
use crate::models::{Candidate, Field};

/// One flat attribute row, keyed by external column name.
pub type Row = BTreeMap<String, String>;

/// One (external column, candidate field) pair.
#[derive(Debug, Clone)]
pub struct SchemaItem {
    pub column: String,
    pub field: Field,
}

impl SchemaItem {
    fn new(column: &str, field: Field) -> Self {
        Self {
            column: column.to_string(),
            field,
        }
    }
}

/// Ordered sequence of schema items; the order fixes the output column
/// order.
pub type Schema = Vec<SchemaItem>;

/// Columns of the registry's person import format.
pub fn output_schema() -> Schema {
    vec![
        SchemaItem::new("Nachname", Field::Surname),
        SchemaItem::new("Vorname", Field::Forename),
        SchemaItem::new("Daten1_Datum", Field::Birth),
        SchemaItem::new("Daten2_Datum", Field::Death),
        SchemaItem::new("Geschlecht", Field::Gender),
        SchemaItem::new("Daten1_Ort", Field::PlaceOfBirth),
        SchemaItem::new("Daten2_Ort", Field::PlaceOfDeath),
        SchemaItem::new("Zeitraum", Field::Era),
        SchemaItem::new("Lebensdaten", Field::LifeData),
        SchemaItem::new("Input", Field::InputName),
        SchemaItem::new("Website", Field::Link),
    ]
}

/// Columns for records that already exist in the registry.
pub fn existing_schema() -> Schema {
    vec![
        SchemaItem::new("ID", Field::LocalId),
        SchemaItem::new("Person", Field::Name),
        SchemaItem::new("Input", Field::InputName),
    ]
}

/// Columns for candidates no source could resolve.
pub fn unknown_schema() -> Schema {
    vec![
        SchemaItem::new("Name", Field::Name),
        SchemaItem::new("Lebte vor", Field::LivedBefore),
        SchemaItem::new("Lebte nach", Field::LivedAfter),
    ]
}

/// Project a candidate onto a row; empty fields are left out.
pub fn to_row(candidate: &mut Candidate, schema: &Schema) -> Row {
    candidate.refresh_derived();
    let mut row = Row::new();
    for item in schema {
        let value = candidate.get(item.field);
        if !value.is_empty() {
            row.insert(item.column.clone(), value.to_string());
        }
    }
    row
}

/// Rebuild a candidate from a previously written row, for refresh runs.
pub fn from_row(row: &Row, schema: &Schema) -> Candidate {
    let mut candidate = Candidate::default();
    for item in schema {
        if let Some(value) = row.get(&item.column) {
            candidate.set(item.field, value);
        }
    }
    candidate
}

/// Read input rows into name/date records. Two header shapes are
/// understood: `Name`/`Vor`/`Nach` (one name, two date columns) and
/// `Artist`/`Date` (exhibition exports).
pub fn read_records(path: &Path) -> Result<Vec<InputRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let mut records = Vec::new();
    if let (Some(name), Some(before), Some(after)) =
        (column("Name"), column("Vor"), column("Nach"))
    {
        for row in reader.records() {
            let row = row?;
            records.push(InputRecord {
                name: row.get(name).unwrap_or("").to_string(),
                dates: vec![
                    row.get(before).unwrap_or("").to_string(),
                    row.get(after).unwrap_or("").to_string(),
                ],
            });
        }
    } else if let (Some(name), Some(date)) = (column("Artist"), column("Date")) {
        for row in reader.records() {
            let row = row?;
            records.push(InputRecord {
                name: row.get(name).unwrap_or("").to_string(),
                dates: vec![row.get(date).unwrap_or("").to_string()],
            });
        }
    } else {
        bail!(
            "unrecognized input header: expected Name/Vor/Nach or Artist/Date columns in {}",
            path.display()
        );
    }
    Ok(records)
}

/// Read previously written rows back, keyed by the given schema.
pub fn read_rows(path: &Path, schema: &Schema) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for item in schema {
            if let Some(position) = headers.iter().position(|h| h == item.column) {
                let value = record.get(position).unwrap_or("");
                if !value.is_empty() {
                    row.insert(item.column.clone(), value.to_string());
                }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Write candidates to a CSV file under the given schema.
pub fn write_candidates(
    path: &Path,
    candidates: &mut [Candidate],
    schema: &Schema,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    writer.write_record(schema.iter().map(|item| item.column.as_str()))?;
    for candidate in candidates {
        let row = to_row(candidate, schema);
        writer.write_record(
            schema
                .iter()
                .map(|item| row.get(&item.column).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;
    Ok(())
}
