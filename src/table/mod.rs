//! Text tables handed from the spreadsheet reader to the segmenter.
pub mod segment;

/// One spreadsheet row: text-or-empty cells aligned to the table columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// 1-based row number in the source sheet
    number: usize,
    cells: Vec<Option<String>>,
}

impl Row {
    pub fn new(number: usize, cells: Vec<Option<String>>) -> Self {
        Row { number, cells }
    }

    /// 1-based row number in the source sheet, used in error messages.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    /// Text of the cell at `index`, `None` when blank or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|cell| cell.as_deref())
    }

    /// Text of the cell at `index`, empty when blank.
    pub fn text(&self, index: usize) -> &str {
        self.get(index).unwrap_or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Keeps only the first `width` cells, padding with blanks.
    fn truncated(&self, width: usize) -> Row {
        let mut cells: Vec<Option<String>> = self.cells.iter().take(width).cloned().collect();
        cells.resize(width, None);
        Row::new(self.number, cells)
    }
}

/// Ordered rows plus their column schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Text of the named column in `row`, `None` when blank or the column is unknown.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a str> {
        self.column_index(column).and_then(|index| row.get(index))
    }

    /// Builds a table over `rows` whose first columns are renamed to `schema`.
    pub(crate) fn with_schema<'a, I>(schema: &[&str], rows: I) -> Table
    where
        I: IntoIterator<Item = &'a Row>,
    {
        Table {
            columns: schema.iter().map(|name| name.to_string()).collect(),
            rows: rows.into_iter().map(|row| row.truncated(schema.len())).collect(),
        }
    }
}
