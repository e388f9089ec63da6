use crate::error::RustyCoverError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

const RELATIONSHIP: &[u8] = b"Relationship";
const NUM_FMTS: QName = QName(b"numFmts");
const NUM_FMT: QName = QName(b"numFmt");
const CELL_XFS: QName = QName(b"cellXfs");
const XF: QName = QName(b"xf");
const STRING_ITEM: QName = QName(b"si");
const PHONETIC_RUN: QName = QName(b"rPh");
const TEXT: QName = QName(b"t");
const WORKBOOK_PR: QName = QName(b"workbookPr");
const SHEET: QName = QName(b"sheet");
const ROW: QName = QName(b"row");
const CELL: QName = QName(b"c");
const INLINE_STRING: QName = QName(b"is");
const VALUE: QName = QName(b"v");

/// A worksheet declared by the workbook and the package part holding it.
#[derive(Clone, Debug)]
struct SheetEntry {
    name: String,
    part: String,
}

/// An opened `.xlsx` register.
pub(crate) struct Workbook {
    file_name: String,
    archive: ZipArchive<UnifiedReader>,
    /// Cell type per style index (`s` attribute)
    styles: Vec<CellType>,
    sheets: Vec<SheetEntry>,
}

impl Workbook {
    /// Opens the package and loads the sheet list and cell styles.
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<Workbook, RustyCoverError> {
        let mut archive = ZipArchive::new(reader)?;
        let (sheets, is_1904) = sheet_entries(&mut archive)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }
        let styles = cell_styles(&mut archive, is_1904)?;
        Ok(Workbook {
            file_name: file_name.to_owned(),
            archive,
            styles,
            sheets,
        })
    }

    pub(crate) fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|entry| entry.name.as_str()).collect()
    }

    fn shared_strings(&mut self) -> Result<Vec<String>, RustyCoverError> {
        let Some(mut reader) = self.archive.xml_reader(SHARED_STRINGS_PART)? else {
            return Ok(Vec::new());
        };
        let mut strings = Vec::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == STRING_ITEM => {
                strings.push(read_rich_text(&mut reader, STRING_ITEM, false)?);
            }
        });
        Ok(strings)
    }

    /// Reads the first worksheet whose name the criteria accept.
    ///
    /// Shared string references are resolved, so every cell in the result
    /// carries its own value.
    pub(crate) fn read_sheet(&mut self, criteria: &Criteria) -> Result<Sheet, RustyCoverError> {
        let entry = self
            .sheets
            .iter()
            .find(|entry| criteria.accept(&entry.name))
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFound(self.file_name.to_owned()))?;
        let strings = self.shared_strings()?;
        let mut sheet = Sheet::new(&self.file_name, &entry.name);

        let mut reader = self
            .archive
            .xml_reader(&entry.part)?
            .ok_or_else(|| SpreadsheetError::FileError(entry.part.to_owned()))?;
        let mut cursor = (0usize, 0usize);
        let mut pending: Option<PendingCell> = None;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == ROW => {
                let row = event.parse_attribute_value::<usize>("r")?.filter(|row| (1..=MAX_ROWS).contains(row));
                cursor = (row.map(|row| row - 1).unwrap_or(cursor.0), 0);
            }
            Event::End(event) if event.name() == ROW => cursor.0 += 1,
            Event::Start(event) if event.name() == CELL => {
                let cell = PendingCell::start(&event, cursor, &self.styles, criteria.error_as_null)?;
                cursor.1 = cell.col + 1;
                pending = Some(cell);
            }
            Event::Start(event) if event.name() == INLINE_STRING => {
                if let Some(cell) = pending.as_mut().filter(|cell| cell.kind != CellType::Empty) {
                    cell.value = read_rich_text(&mut reader, INLINE_STRING, false)?;
                }
            }
            Event::Start(event) if event.name() == VALUE => {
                if let Some(cell) = pending.as_mut().filter(|cell| cell.kind != CellType::Empty) {
                    cell.value = read_rich_text(&mut reader, VALUE, true)?;
                }
            }
            Event::End(event) if event.name() == CELL => {
                if let Some(cell) = pending.take() {
                    if let Some(cell) = cell.finish(&sheet, &strings)? {
                        sheet.push(cell);
                    }
                }
            }
        });

        if sheet.is_empty() {
            Err(SpreadsheetError::SheetEmptyError(self.file_name.to_owned(), entry.name))?
        }
        Ok(sheet)
    }
}

/// A `<c>` element being read.
struct PendingCell {
    row: usize,
    col: usize,
    kind: CellType,
    value: String,
}

impl PendingCell {
    /// Position comes from the `r` attribute, or follows the previous cell.
    fn start(
        event: &BytesStart,
        cursor: (usize, usize),
        styles: &[CellType],
        error_as_null: bool,
    ) -> Result<Self, RustyCoverError> {
        let (row, col) = event
            .get_attribute_value("r")?
            .and_then(|reference| reference_to_index(&reference))
            .unwrap_or(cursor);
        let mut kind = match event.get_attribute_value("t")?.as_deref() {
            Some("inlineStr" | "str") => CellType::InlineString,
            Some("s") => CellType::SharedString,
            Some("d") => CellType::IsoDateTime,
            Some("b") => CellType::Boolean,
            Some("e") if error_as_null => CellType::Empty,
            Some("e") => CellType::Error,
            _ => CellType::Number,
        };
        if kind == CellType::Number {
            if let Some(style) = event.get_attribute_value("s")?.filter(|style| !style.is_empty()) {
                kind = styles.get(style.parse::<usize>()?).copied().unwrap_or(CellType::Number);
            }
        }
        Ok(PendingCell { row, col, kind, value: String::new() })
    }

    fn invalid(&self, sheet: &Sheet, message: String) -> SpreadsheetError {
        SpreadsheetError::CellValueError(
            sheet.file_name.to_owned(),
            sheet.name.to_owned(),
            index_to_reference(self.row, self.col),
            message,
        )
    }

    /// Resolves the final value; blank and suppressed cells yield nothing.
    fn finish(self, sheet: &Sheet, strings: &[String]) -> Result<Option<Cell>, RustyCoverError> {
        if self.kind == CellType::Empty || self.value.is_empty() {
            return Ok(None);
        }
        let (kind, value) = match self.kind {
            CellType::Error => Err(self.invalid(sheet, self.value.to_owned()))?,
            CellType::SharedString => {
                let index = self.value.parse::<usize>()?;
                let text = strings
                    .get(index)
                    .cloned()
                    .ok_or_else(|| self.invalid(sheet, format!("missing shared string #{index}")))?;
                (CellType::InlineString, text)
            }
            kind => (kind, self.value),
        };
        Ok(Some(Cell { row: self.row, col: self.col, kind, value }))
    }
}

/// Worksheet part path per relationship id.
fn worksheet_targets(archive: &mut ZipArchive<UnifiedReader>) -> Result<HashMap<String, String>, RustyCoverError> {
    let mut reader = archive
        .xml_reader(WORKBOOK_RELS_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_RELS_PART.to_owned()))?;
    let mut targets = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == RELATIONSHIP => {
            let is_worksheet = event
                .get_attribute_value("Type")?
                .map(|kind| kind.ends_with("/worksheet"))
                .unwrap_or(true);
            let id = event.get_attribute_value("Id")?;
            let target = event.get_attribute_value("Target")?;
            if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                targets.insert(id.into_owned(), part_path(&target));
            }
        }
    });
    Ok(targets)
}

/// Relationship targets are relative to `xl/` unless rooted.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(rooted) => rooted.to_owned(),
        None if target.starts_with("xl/") => target.to_owned(),
        None => format!("xl/{target}"),
    }
}

/// Sheets in workbook order, plus the `date1904` flag.
fn sheet_entries(archive: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<SheetEntry>, bool), RustyCoverError> {
    let targets = worksheet_targets(archive)?;
    let mut reader = archive
        .xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_owned()))?;
    let mut sheets = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == SHEET => {
            let mut name = None;
            let mut id = None;
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?.into_owned()),
                    b"id" => id = Some(attribute.get_value()?.into_owned()),
                    _ => (),
                }
            }
            if let Some((name, part)) = name.zip(id.and_then(|id| targets.get(&id).cloned())) {
                sheets.push(SheetEntry { name, part });
            }
        }
        Event::Start(event) if event.name() == WORKBOOK_PR => {
            is_1904 = matches!(event.get_attribute_value("date1904")?.as_deref(), Some("1" | "true"));
        }
    });
    Ok((sheets, is_1904))
}

/// Cell type per `cellXfs` entry, used to show date-formatted numbers as dates.
fn cell_styles(archive: &mut ZipArchive<UnifiedReader>, is_1904: bool) -> Result<Vec<CellType>, RustyCoverError> {
    let Some(mut reader) = archive.xml_reader(STYLES_PART)? else {
        return Ok(Vec::new());
    };
    let mut in_num_fmts = false;
    let mut in_cell_xfs = false;
    let mut custom = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == NUM_FMTS => in_num_fmts = true,
        Event::End(event) if event.name() == NUM_FMTS => in_num_fmts = false,
        Event::Start(event) if event.name() == CELL_XFS => in_cell_xfs = true,
        Event::End(event) if event.name() == CELL_XFS => in_cell_xfs = false,
        Event::Start(event) if in_num_fmts && event.name() == NUM_FMT => {
            let id = event.get_attribute_value("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom.insert(id.into_owned(), CellType::parse_custom_number_format(&code, is_1904));
            }
        }
        Event::Start(event) if in_cell_xfs && event.name() == XF => {
            if let Some(id) = event.get_attribute_value("numFmtId")? {
                format_ids.push(id.into_owned());
            }
        }
    });

    let styles = format_ids
        .iter()
        .map(|id| match custom.get(id) {
            Some(kind) => *kind,
            None => CellType::parse_builtin_number_format_id(id, is_1904).unwrap_or(CellType::Number),
        })
        .collect();
    Ok(styles)
}

/// Concatenates the text of a string element up to `end`.
///
/// Phonetic runs are skipped. `bare_text` is set for `<v>`, whose content is
/// read without a surrounding `<t>`.
fn read_rich_text<R: BufRead>(reader: &mut XmlReader<R>, end: QName, bare_text: bool) -> Result<String, RustyCoverError> {
    let mut in_phonetic = false;
    let mut in_text = bare_text;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end => break,
        Event::Start(event) if event.name() == PHONETIC_RUN => in_phonetic = true,
        Event::End(event) if event.name() == PHONETIC_RUN => in_phonetic = false,
        Event::Start(event) if !in_phonetic && event.name() == TEXT => in_text = true,
        Event::End(event) if in_text && event.name() == TEXT => in_text = false,
        Event::Text(event) if in_text => text.push_bytes_text(&event)?,
        Event::CData(event) if in_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if in_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_targets_resolve_under_xl() {
        assert_eq!(part_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(part_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(part_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn rich_text_skips_phonetic_runs() -> Result<(), RustyCoverError> {
        let mut reader = XmlReader::new("<si><t>Раздел</t><rPh><t>x</t></rPh><t> 1</t></si>".as_bytes());
        reader.next()?;
        assert_eq!(read_rich_text(&mut reader, STRING_ITEM, false)?, "Раздел 1");
        Ok(())
    }

    #[test]
    fn bare_value_text() -> Result<(), RustyCoverError> {
        let mut reader = XmlReader::new("<v>12.5</v>".as_bytes());
        reader.next()?;
        assert_eq!(read_rich_text(&mut reader, VALUE, true)?, "12.5");
        Ok(())
    }
}
