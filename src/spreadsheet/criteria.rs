use crate::error::RustyCoverError;
use glob::Pattern;

/// Criteria for selecting and shaping data read from a spreadsheet.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name patterns; the first matching sheet is read.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Treat the first row as column names.
    pub with_header: bool,

    /// Skip rows where all columns are empty.
    pub skip_empty_rows: bool,

    /// Convert error cells to blanks instead of failing.
    pub error_as_null: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_patterns: None,
            with_header: true,
            skip_empty_rows: true,
            error_as_null: false,
        }
    }
}

impl Criteria {
    /// Builds criteria from a single sheet name glob.
    pub fn with_sheet_pattern(mut self, pattern: Option<&str>) -> Result<Self, RustyCoverError> {
        self.sheet_name_patterns = pattern
            .map(|pattern| Pattern::new(pattern).map(|pattern| vec![pattern]))
            .transpose()?;
        Ok(self)
    }

    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        if let Some(patterns) = &self.sheet_name_patterns {
            patterns.iter().any(|pattern| pattern.matches(sheet_name))
        } else {
            true
        }
    }
}
