use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::search::SearchOutcome;

/// Header of the serial-number column in every exported sheet
pub const SERIAL_HEADER: &str = "S.NO";

/// One exported cell: the serial number column is numeric, the rest is text
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExportCell {
    Number(usize),
    Text(String),
}

impl ExportCell {
    fn text(value: &str) -> Self {
        ExportCell::Text(value.to_string())
    }
}

impl std::fmt::Display for ExportCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportCell::Number(n) => write!(f, "{}", n),
            ExportCell::Text(t) => f.write_str(t),
        }
    }
}

/// A sheet of the export workbook, header row first
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportSheet {
    pub name: String,
    pub source_file: String,
    pub rows: Vec<Vec<ExportCell>>,
}

/// Lay out search results as export sheets
///
/// One sheet per file result, named `Results 1`, `Results 2`, ... The first row
/// is `S.NO` followed by the file's own headers; each match contributes its
/// serial number and the plain text of its cells. Highlights are not part of
/// the exported text.
///
/// # Examples
/// ```
/// use sheet_search::downloader::export_sheets;
/// use sheet_search::search::search;
/// use sheet_search::store::StoredFile;
///
/// let files = vec![StoredFile::new("sales.csv", "Region\tAmount\nEast\t100")];
/// let sheets = export_sheets(&search(&files, "east"));
/// assert_eq!(sheets[0].rows.len(), 2);
/// ```
pub fn export_sheets(outcome: &SearchOutcome) -> Vec<ExportSheet> {
    outcome
        .results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let header: Vec<ExportCell> = std::iter::once(ExportCell::text(SERIAL_HEADER))
                .chain(result.headers.iter().map(|h| ExportCell::text(h)))
                .collect();

            let rows: Vec<Vec<ExportCell>> = std::iter::once(header)
                .chain(result.matches.iter().map(|m| {
                    std::iter::once(ExportCell::Number(m.serial_number))
                        .chain(m.cells.iter().map(|c| ExportCell::text(&c.text)))
                        .collect::<Vec<_>>()
                }))
                .collect();

            ExportSheet {
                name: format!("Results {}", idx + 1),
                source_file: result.file_name.clone(),
                rows,
            }
        })
        .collect()
}

/// Convert export sheets to XLSX format
///
/// Returns `None` when there is nothing to export, which callers show as
/// "No results to export." rather than an error.
///
/// # Examples
/// ```
/// use sheet_search::downloader::to_xlsx;
///
/// assert!(to_xlsx(&[]).unwrap().is_none());
/// ```
pub fn to_xlsx(sheets: &[ExportSheet]) -> Result<Option<Vec<u8>>> {
    if sheets.is_empty() {
        return Ok(None);
    }

    let mut workbook = Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = u32::try_from(r)
                .map_err(|_| Error::Xlsx(format!("{}: too many rows", sheet.name)))?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)
                    .map_err(|_| Error::Xlsx(format!("{}: too many columns", sheet.name)))?;
                match cell {
                    ExportCell::Number(n) => {
                        worksheet.write_number(r, c, *n as f64)?;
                    }
                    ExportCell::Text(t) => {
                        worksheet.write_string(r, c, t)?;
                    }
                }
            }
        }
    }

    let buffer = workbook.save_to_buffer()?;
    log::info!("exported {} sheets ({} bytes)", sheets.len(), buffer.len());
    Ok(Some(buffer))
}

/// Convert one export sheet to CSV format
///
/// Fields containing commas, quotes or line breaks are quoted, with inner
/// quotes doubled.
pub fn to_csv(sheet: &ExportSheet) -> String {
    let mut csv_content = String::new();
    for row in &sheet.rows {
        let line: Vec<String> = row.iter().map(|cell| escape_csv(&cell.to_string())).collect();
        csv_content.push_str(&line.join(","));
        csv_content.push('\n');
    }
    csv_content
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::search;
    use crate::store::StoredFile;

    fn sales_outcome() -> SearchOutcome {
        let files = vec![StoredFile::new(
            "sales.csv",
            "Region\tAmount\nEast\t100\nWest\t200\nEast\t300",
        )];
        search(&files, "east")
    }

    fn text(s: &str) -> ExportCell {
        ExportCell::Text(s.to_string())
    }

    #[test]
    fn sales_export_rows() {
        let sheets = export_sheets(&sales_outcome());
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Results 1");
        assert_eq!(sheets[0].source_file, "sales.csv");
        assert_eq!(
            sheets[0].rows,
            vec![
                vec![text("S.NO"), text("Region"), text("Amount")],
                vec![ExportCell::Number(1), text("East"), text("100")],
                vec![ExportCell::Number(2), text("East"), text("300")],
            ]
        );
    }

    #[test]
    fn one_sheet_per_file_result() {
        let files = vec![
            StoredFile::new("a", "H\nkey"),
            StoredFile::new("b", "H\nnone"),
            StoredFile::new("c", "H\tI\nx\tkey"),
        ];
        let sheets = export_sheets(&search(&files, "key"));
        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Results 1", "Results 2"]);
        assert_eq!(sheets[1].source_file, "c");
        assert_eq!(sheets[1].rows[1][0], ExportCell::Number(2));
    }

    #[test]
    fn empty_outcome_exports_nothing() {
        let sheets = export_sheets(&SearchOutcome::default());
        assert!(sheets.is_empty());
        assert!(to_xlsx(&sheets).unwrap().is_none());
    }

    #[test]
    fn xlsx_is_a_zip_archive() {
        let bytes = to_xlsx(&export_sheets(&sales_outcome())).unwrap().unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn too_wide_sheet_is_an_export_error() {
        let wide: Vec<ExportCell> = (0..70_000).map(|_| text("x")).collect();
        let sheet = ExportSheet {
            name: "Results 1".into(),
            source_file: "wide.csv".into(),
            rows: vec![wide],
        };
        assert!(matches!(to_xlsx(&[sheet]), Err(Error::Xlsx(_))));
    }

    #[test]
    fn csv_quotes_special_fields() {
        let sheet = ExportSheet {
            name: "Results 1".into(),
            source_file: "f".into(),
            rows: vec![
                vec![text("S.NO"), text("Note")],
                vec![ExportCell::Number(1), text("a, \"b\"")],
            ],
        };
        assert_eq!(to_csv(&sheet), "S.NO,Note\n1,\"a, \"\"b\"\"\"\n");
    }
}
