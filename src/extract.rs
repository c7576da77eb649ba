use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};
use crate::store::StoredFile;
use crate::table::{FIELD_DELIMITER, ROW_DELIMITER};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// First sheet of an uploaded file, flattened to table text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedTable {
    pub name: String,
    pub raw_table: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<ExtractedTable> for StoredFile {
    fn from(table: ExtractedTable) -> Self {
        StoredFile {
            name: table.name,
            raw_table: table.raw_table,
            uploaded_at: table.uploaded_at,
        }
    }
}

fn normalized_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported(name: &str) -> bool {
    normalized_extension(name)
        .as_deref()
        .is_some_and(|ext| ext == "csv" || WORKBOOK_EXTENSIONS.contains(&ext))
}

/// Read the first sheet of `bytes` into tab/newline table text.
///
/// Workbooks go through calamine, `.csv` through the csv reader. The file
/// name only picks the reader; the bytes decide whether it parses.
///
/// # Examples
/// ```
/// use sheet_search::extract::extract_table;
///
/// let table = extract_table("sales.csv", b"Region,Amount\nEast,100\n").unwrap();
/// assert_eq!(table.raw_table, "Region\tAmount\nEast\t100");
/// ```
pub fn extract_table(name: &str, bytes: &[u8]) -> Result<ExtractedTable> {
    let ext = normalized_extension(name)
        .ok_or_else(|| Error::extraction(name, "file has no extension"))?;

    let rows = if ext == "csv" {
        read_csv_rows(name, bytes)?
    } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        read_workbook_rows(name, bytes)?
    } else {
        return Err(Error::extraction(
            name,
            format!("unsupported file extension: {}", ext),
        ));
    };

    log::debug!("extracted {} lines from '{}'", rows.len(), name);

    Ok(ExtractedTable {
        name: name.to_string(),
        raw_table: join_rows(&rows),
        uploaded_at: Utc::now(),
    })
}

fn read_workbook_rows(name: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::extraction(name, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::extraction(name, "no sheets found"))?
        .map_err(|e| Error::extraction(name, e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => clean_field(&other.to_string()),
    }
}

fn read_csv_rows(name: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(clean_field).collect::<Vec<String>>())
                .map_err(|e| Error::extraction(name, e))
        })
        .collect()
}

// tabs and line breaks inside a cell would split it in the table text
fn clean_field(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c == FIELD_DELIMITER || c == ROW_DELIMITER || c == '\r' {
                ' '
            } else {
                c
            }
        })
        .collect()
}

fn join_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join(&FIELD_DELIMITER.to_string()))
        .collect::<Vec<_>>()
        .join(&ROW_DELIMITER.to_string())
}
