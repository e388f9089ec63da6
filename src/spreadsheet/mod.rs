//! # Spreadsheet Reading Module
//!
//! Reads the register of documents from Excel 2007+ workbooks (`.xlsx`, `.xlsm`)
//! and turns the selected worksheet into a text [`Table`]. Workbooks can come
//! from a local path or from uploaded bytes.
use crate::error::RustyCoverError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::xlsx::Workbook;
use crate::table::Table;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod cell;
mod criteria;
mod reference;
mod sheet;
mod xlsx;

pub use criteria::Criteria;

/// Custom error types for spreadsheet operations.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file format
    #[error("Cannot detect spreadsheet format for '{0}'")]
    InvalidFileFormat(String),

    /// A required part is missing from the workbook package
    #[error("Missing '{0}' in spreadsheet package")]
    FileError(String),

    /// Workbook declares no worksheets
    #[error("Spreadsheet '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    /// No worksheet matches the configured criteria
    #[error("No matching sheet found in '{0}'")]
    SheetNotFound(String),

    /// The selected worksheet holds no data
    #[error("Sheet '{1}' in '{0}' is empty")]
    SheetEmptyError(String, String),

    /// Error cell or dangling reference
    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: {3}")]
    CellValueError(String, String, String, String),
}

/// Returns true when the file name has a supported workbook extension.
pub fn is_supported(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| matches!(extension.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
        .unwrap_or(false)
}

/// Reads a table from a workbook, local or uploaded.
///
/// The format is detected from `file_name`; `reader` supplies the content.
pub fn read_table(file_name: &str, reader: UnifiedReader, criteria: &Criteria) -> Result<Table, RustyCoverError> {
    if !is_supported(file_name) {
        Err(SpreadsheetError::InvalidFileFormat(file_name.to_owned()))?
    }
    let mut workbook = Workbook::open(file_name, reader)?;
    debug!(file = file_name, sheets = ?workbook.sheet_names(), "opened workbook");
    let sheet = workbook.read_sheet(criteria)?;
    let table = sheet.to_table(criteria.with_header, criteria.skip_empty_rows);
    debug!(
        file = %sheet.file_name,
        sheet = %sheet.name,
        columns = table.columns().len(),
        rows = table.len(),
        "read sheet"
    );
    Ok(table)
}

/// Reads a table from a workbook on disk.
pub fn open_table<P: AsRef<Path>>(path: P, criteria: &Criteria) -> Result<Table, RustyCoverError> {
    let file_name = path.as_ref().to_string_lossy().to_string();
    read_table(&file_name, UnifiedReader::open(path)?, criteria)
}

/// Reads a table from uploaded workbook bytes.
pub fn read_table_from_bytes(file_name: &str, bytes: Vec<u8>, criteria: &Criteria) -> Result<Table, RustyCoverError> {
    read_table(file_name, UnifiedReader::from_bytes(bytes), criteria)
}

/// In-memory single-sheet workbook for unit tests; cells are inline strings.
#[cfg(test)]
pub(crate) fn sample_xlsx(rows: &[&[&str]]) -> Vec<u8> {
    use quick_xml::escape::escape;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut sheet = String::from(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
    for (row, cells) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, text) in cells.iter().enumerate().filter(|(_, text)| !text.is_empty()) {
            let reference = reference::index_to_reference(row, col);
            sheet.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(*text)));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        (
            "xl/workbook.xml",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Лист1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
