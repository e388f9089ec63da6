//! Runtime settings, loaded from TOML; every field has a default.
//!
//! ```toml
//! [vocabulary]
//! section_keyword = "Раздел"
//!
//! [batch]
//! archive_name = "titles"
//! on_row_error = "skip"
//! timeout_secs = 120
//! ```
use crate::error::RustyCoverError;
use crate::error::ResultMessage;
use crate::spreadsheet::Criteria;
use crate::substitute::SubstitutionRules;
use crate::table::segment::SegmentRules;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Marker keywords, anchor and placeholder tokens.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Vocabulary {
    pub section_keyword: String,
    pub subsection_keyword: String,
    pub general_plan_keyword: String,
    /// Run text marking the volume line that blank lines follow
    pub anchor: String,
    pub tokens: Tokens,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            section_keyword: "Раздел".to_owned(),
            subsection_keyword: "Подраздел".to_owned(),
            general_plan_keyword: "Генеральный план".to_owned(),
            anchor: "Том".to_owned(),
            tokens: Tokens::default(),
        }
    }
}

/// Placeholder tokens as they appear in templates.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tokens {
    pub number: String,
    pub cipher: String,
    pub part: String,
    pub section: String,
    pub subsection: String,
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens {
            number: "Номер".to_owned(),
            cipher: "Название шифра".to_owned(),
            part: "Название части".to_owned(),
            section: "Название раздела".to_owned(),
            subsection: "Название подраздела".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Layout {
    /// Values with more words than this suppress blank-line insertion
    pub word_limit: usize,
    pub anchor_blank_lines: usize,
    pub section_blank_lines: usize,
    /// Working-stage rows need a longer first cell than this
    pub min_cipher_length: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            word_limit: 12,
            anchor_blank_lines: 4,
            section_blank_lines: 2,
            min_cipher_length: 7,
        }
    }
}

/// What a batch does when one row fails.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Stop the whole batch at the first failure
    #[default]
    Abort,
    /// Leave the row out, report it and carry on
    Skip,
}

/// Archive base name when none is configured, or when it has no usable characters.
pub const DEFAULT_ARCHIVE_NAME: &str = "documents";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchSettings {
    /// Archive base name, `.zip` is appended; separators become `_`
    pub archive_name: String,
    /// File name used when a row has no cipher
    pub fallback_name: String,
    pub on_row_error: RowErrorPolicy,
    /// Wall-clock bound for one batch, 0 disables it
    pub timeout_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            archive_name: DEFAULT_ARCHIVE_NAME.to_owned(),
            fallback_name: "без_шифра".to_owned(),
            on_row_error: RowErrorPolicy::Abort,
            timeout_secs: 600,
        }
    }
}

impl BatchSettings {
    pub fn timeout(&self) -> Option<Duration> {
        Some(self.timeout_secs)
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderSettings {
    /// Glob selecting the worksheet, first sheet when unset
    pub sheet: Option<String>,
    /// First row holds column names; otherwise columns are `column1`, `column2`, ...
    pub header: bool,
    pub skip_empty_rows: bool,
    /// Read `#N/A`-style error cells as blanks instead of failing the read
    pub error_cells_as_blank: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            sheet: None,
            header: true,
            skip_empty_rows: true,
            error_cells_as_blank: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub vocabulary: Vocabulary,
    pub layout: Layout,
    pub batch: BatchSettings,
    pub reader: ReaderSettings,
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, RustyCoverError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RustyCoverError> {
        let prefix = format!("Load settings '{}' failed", path.as_ref().display());
        std::fs::read_to_string(path)
            .map_err(RustyCoverError::from)
            .and_then(|text| Self::from_toml(&text))
            .with_prefix(&prefix)
    }

    pub fn criteria(&self) -> Result<Criteria, RustyCoverError> {
        let mut criteria = Criteria::default().with_sheet_pattern(self.reader.sheet.as_deref())?;
        criteria.with_header = self.reader.header;
        criteria.skip_empty_rows = self.reader.skip_empty_rows;
        criteria.error_as_null = self.reader.error_cells_as_blank;
        Ok(criteria)
    }

    pub fn segment_rules(&self) -> SegmentRules {
        SegmentRules {
            section_keyword: self.vocabulary.section_keyword.to_owned(),
            subsection_keyword: self.vocabulary.subsection_keyword.to_owned(),
            general_plan_keyword: self.vocabulary.general_plan_keyword.to_owned(),
            min_cipher_length: self.layout.min_cipher_length,
        }
    }

    pub fn substitution_rules(&self) -> SubstitutionRules {
        SubstitutionRules {
            anchor: self.vocabulary.anchor.to_owned(),
            part_token: self.vocabulary.tokens.part.to_owned(),
            section_token: self.vocabulary.tokens.section.to_owned(),
            word_limit: self.layout.word_limit,
            anchor_blank_lines: self.layout.anchor_blank_lines,
            section_blank_lines: self.layout.section_blank_lines,
        }
    }
}
