//! Spreadsheet text extraction
//!
//! Workbooks are read cell by cell with calamine: one header line per
//! sheet, then one tab-separated line per non-empty row.

use calamine::{open_workbook_from_rs, DataType, Ods, Range, Reader, Xls, Xlsb, Xlsx};
use std::fmt::Display;
use std::io::Cursor;
use studyforge_utils::{StudyError, StudyResult};

/// Plain text of every sheet in the workbook. `extension` picks the reader.
pub fn extract_spreadsheet_text(data: &[u8], extension: &str) -> StudyResult<String> {
    match extension {
        "xlsx" | "xlsm" => workbook_text::<Xlsx<_>>(data),
        "xlsb" => workbook_text::<Xlsb<_>>(data),
        "xls" => workbook_text::<Xls<_>>(data),
        "ods" => workbook_text::<Ods<_>>(data),
        other => Err(StudyError::document_processing(format!(
            "Unsupported spreadsheet format: {}",
            other
        ))),
    }
}

fn workbook_text<'a, R>(data: &'a [u8]) -> StudyResult<String>
where
    R: Reader<Cursor<&'a [u8]>>,
    R::Error: Display,
{
    let mut workbook: R = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e| StudyError::document_processing(format!("Failed to open workbook: {}", e)))?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Some(range) => range.map_err(|e| {
                StudyError::document_processing(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?,
            None => continue,
        };

        let rows = range_text(&range);
        if !rows.is_empty() {
            sheets.push(format!("{}\n{}", sheet_name, rows));
        }
    }

    Ok(sheets.join("\n\n"))
}

/// Tab-joined cells, one line per row that has any content.
fn range_text(range: &Range<DataType>) -> String {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect::<Vec<_>>()
                .join("\t")
                .trim_end()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
