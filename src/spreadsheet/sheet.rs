use crate::spreadsheet::cell::Cell;
use crate::table::Row;
use crate::table::Table;
use std::ops::RangeInclusive;

/// Smallest rectangle holding every cell read so far.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Bounds {
    pub(crate) rows: RangeInclusive<usize>,
    pub(crate) cols: RangeInclusive<usize>,
}

impl Bounds {
    fn at(row: usize, col: usize) -> Self {
        Bounds { rows: row..=row, cols: col..=col }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.rows = *self.rows.start().min(&row)..=*self.rows.end().max(&row);
        self.cols = *self.cols.start().min(&col)..=*self.cols.end().max(&col);
    }

    fn width(&self) -> usize {
        self.cols.end() - self.cols.start() + 1
    }
}

/// The selected worksheet of a register, cells in reading order.
pub(crate) struct Sheet {
    pub(crate) file_name: String,
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
    pub(crate) bounds: Option<Bounds>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            bounds: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(super) fn push(&mut self, cell: Cell) {
        self.bounds
            .get_or_insert_with(|| Bounds::at(cell.row, cell.col))
            .include(cell.row, cell.col);
        self.cells.push(cell);
    }

    /// One record per row of the bounding rectangle, gaps included.
    ///
    /// Each record is `(row index, cells)` with `None` for missing cells.
    pub(crate) fn records(&self) -> Vec<(usize, Vec<Option<&Cell>>)> {
        let Some(bounds) = &self.bounds else {
            return Vec::new();
        };
        let (top, left) = (*bounds.rows.start(), *bounds.cols.start());
        let mut records: Vec<_> = bounds.rows.clone().map(|row| (row, vec![None; bounds.width()])).collect();
        for cell in &self.cells {
            records[cell.row - top].1[cell.col - left] = Some(cell);
        }
        records
    }

    /// Converts the sheet into a text table.
    ///
    /// With a header, the first record provides the column names (blank header
    /// cells become `columnN`); otherwise every record is data. Row numbers are
    /// the 1-based sheet rows.
    pub(crate) fn to_table(&self, with_header: bool, skip_empty_rows: bool) -> Table {
        let width = self.bounds.as_ref().map(Bounds::width).unwrap_or(0);
        let mut records = self.records().into_iter();
        let header = if with_header { records.next() } else { None };
        let header_text = |index: usize| {
            header
                .as_ref()
                .and_then(|(_, cells)| cells[index])
                .and_then(Cell::to_text)
        };
        let columns = (0..width)
            .map(|index| header_text(index).unwrap_or_else(|| format!("column{}", index + 1)))
            .collect();
        let rows = records
            .map(|(row, cells)| Row::new(row + 1, cells.into_iter().map(|cell| cell.and_then(Cell::to_text)).collect()))
            .filter(|row| !skip_empty_rows || !row.is_blank())
            .collect();
        Table::new(columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn push(sheet: &mut Sheet, row: usize, col: usize, value: &str) {
        sheet.push(Cell {
            row,
            col,
            kind: CellType::InlineString,
            value: value.to_owned(),
        });
    }

    #[test]
    fn new_sheet_has_no_bounds() {
        let sheet = Sheet::new("", "");
        assert!(sheet.is_empty());
        assert_eq!(sheet.bounds, None);
        assert!(sheet.records().is_empty());
    }

    #[test]
    fn bounds_grow_with_cells() {
        let mut sheet = Sheet::new("", "");
        push(&mut sheet, 1, 3, "b");
        push(&mut sheet, 1, 1, "a");
        push(&mut sheet, 3, 3, "d");

        assert_eq!(sheet.bounds, Some(Bounds { rows: 1..=3, cols: 1..=3 }));
        let records = sheet.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].1.len(), 3);
        assert!(records[1].1.iter().all(Option::is_none));
        assert_eq!(records[2].1[2].map(|cell| cell.value.as_str()), Some("d"));
    }

    #[test]
    fn header_row_names_columns() {
        let mut sheet = Sheet::new("", "");
        push(&mut sheet, 0, 0, "Том");
        push(&mut sheet, 0, 2, "Часть");
        push(&mut sheet, 1, 0, "1");
        push(&mut sheet, 3, 2, "x");

        let table = sheet.to_table(true, true);
        assert_eq!(table.columns(), ["Том", "column2", "Часть"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].number(), 2);
        assert_eq!(table.rows()[1].number(), 4);
        assert_eq!(table.rows()[1].get(2), Some("x"));

        assert_eq!(sheet.to_table(true, false).len(), 3);
    }
}
