//! Splits a register table into labeled groups of document rows.
//!
//! Project registers are hierarchical: a row whose third cell contains the
//! section keyword opens a section, and inside a section a row whose third
//! cell contains the subsection keyword (any case) opens a subsection. Marker
//! rows only carry labels and never end up inside a group.
//!
//! Working registers are flat: everything after the general plan row whose
//! first cell looks like a real cipher forms a single group.
use crate::error::RustyCoverError;
use crate::stage::Stage;
use crate::table::Row;
use crate::table::Table;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

pub const COLUMN_VOLUME: &str = "Том";
pub const COLUMN_CIPHER: &str = "Шифр";
pub const COLUMN_PART: &str = "Часть";
pub const COLUMN_SECTION: &str = "Раздел";

/// Column names of project-stage groups
pub const PROJECT_SCHEMA: [&str; 3] = [COLUMN_VOLUME, COLUMN_CIPHER, COLUMN_PART];
/// Column names of the working-stage group
pub const WORKING_SCHEMA: [&str; 2] = [COLUMN_CIPHER, COLUMN_SECTION];

/// Marker column of project registers (third column)
const PROJECT_MARKER_COLUMN: usize = 2;
/// Marker column of working registers (second column)
const WORKING_MARKER_COLUMN: usize = 1;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{stage} register needs at least {expected} columns, found {found}")]
    TooFewColumns {
        stage: Stage,
        expected: usize,
        found: usize,
    },

    #[error("{stage} register has no row containing '{keyword}' in column '{column}'")]
    MissingMarker {
        stage: Stage,
        keyword: String,
        column: String,
    },

    #[error("{stage} register has no document rows after the '{keyword}' row")]
    NoRecords { stage: Stage, keyword: String },
}

/// Keywords and thresholds used to find marker rows.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentRules {
    /// Case-sensitive section keyword of project registers
    pub section_keyword: String,
    /// Case-insensitive subsection keyword of project registers
    pub subsection_keyword: String,
    /// Case-sensitive cut marker of working registers
    pub general_plan_keyword: String,
    /// Working rows need a first cell longer than this many characters
    pub min_cipher_length: usize,
}

impl Default for SegmentRules {
    fn default() -> Self {
        SegmentRules {
            section_keyword: "Раздел".to_owned(),
            subsection_keyword: "Подраздел".to_owned(),
            general_plan_keyword: "Генеральный план".to_owned(),
            min_cipher_length: 7,
        }
    }
}

/// Document rows sharing a section/subsection label.
///
/// Working-stage groups carry no labels: each row names its own section.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub table: Table,
}

impl Group {
    /// Human readable label for logs and error messages.
    pub fn label(&self) -> String {
        match (&self.section, &self.subsection) {
            (Some(section), Some(subsection)) => format!("{section} / {subsection}"),
            (Some(section), None) => section.to_owned(),
            (None, _) => "register".to_owned(),
        }
    }
}

/// Segments `table` with the algorithm selected by `stage`.
pub fn segment(table: &Table, stage: Stage, rules: &SegmentRules) -> Result<Vec<Group>, RustyCoverError> {
    match stage {
        Stage::Project => split_sections(table, rules),
        Stage::Working => split_working(table, rules).map(|group| vec![group]),
    }
}

/// Hierarchical split of a project register into section/subsection groups.
pub fn split_sections(table: &Table, rules: &SegmentRules) -> Result<Vec<Group>, RustyCoverError> {
    check_columns(table, Stage::Project, PROJECT_SCHEMA.len())?;
    let rows = table.rows();
    let mut sections: Vec<usize> = marker_positions(rows, |text| text.contains(rules.section_keyword.as_str()));
    if sections.is_empty() {
        Err(SchemaError::MissingMarker {
            stage: Stage::Project,
            keyword: rules.section_keyword.to_owned(),
            column: table.columns()[PROJECT_MARKER_COLUMN].to_owned(),
        })?
    }
    if sections[0] > 0 {
        warn!(rows = sections[0], "rows before the first section are ignored");
    }
    sections.push(rows.len());

    let subsection_keyword = rules.subsection_keyword.to_lowercase();
    let mut groups = Vec::<Group>::new();
    for bounds in sections.windows(2) {
        let (start, end) = (bounds[0], bounds[1]);
        let section = rows[start].text(PROJECT_MARKER_COLUMN).to_owned();
        let body = &rows[start + 1..end];

        let mut subsections = marker_positions(body, |text| text.to_lowercase().contains(&subsection_keyword));
        if subsections.is_empty() {
            debug!(section = %section, rows = body.len(), "section without subsections");
            groups.push(Group {
                section: Some(section),
                subsection: None,
                table: Table::with_schema(&PROJECT_SCHEMA, body),
            });
            continue;
        }
        if subsections[0] > 0 {
            warn!(section = %section, rows = subsections[0], "rows before the first subsection are ignored");
        }
        subsections.push(body.len());
        for bounds in subsections.windows(2) {
            let (start, end) = (bounds[0], bounds[1]);
            let subsection = body[start].text(PROJECT_MARKER_COLUMN).to_owned();
            debug!(section = %section, subsection = %subsection, rows = end - start - 1, "subsection");
            groups.push(Group {
                section: Some(section.to_owned()),
                subsection: Some(subsection),
                table: Table::with_schema(&PROJECT_SCHEMA, &body[start + 1..end]),
            });
        }
    }
    Ok(groups)
}

/// Flat split of a working register: the rows from the general plan marker on.
///
/// The marker row itself stays when its first cell is a real cipher.
pub fn split_working(table: &Table, rules: &SegmentRules) -> Result<Group, RustyCoverError> {
    check_columns(table, Stage::Working, WORKING_SCHEMA.len())?;
    let rows = table.rows();
    let cut = rows
        .iter()
        .position(|row| row.text(WORKING_MARKER_COLUMN).contains(rules.general_plan_keyword.as_str()))
        .ok_or_else(|| SchemaError::MissingMarker {
            stage: Stage::Working,
            keyword: rules.general_plan_keyword.to_owned(),
            column: table.columns()[WORKING_MARKER_COLUMN].to_owned(),
        })?;

    let records: Vec<&Row> = rows[cut..]
        .iter()
        .filter(|row| row.text(0).chars().count() > rules.min_cipher_length)
        .collect();
    if records.is_empty() {
        Err(SchemaError::NoRecords {
            stage: Stage::Working,
            keyword: rules.general_plan_keyword.to_owned(),
        })?
    }
    debug!(cut = rows[cut].number(), rows = records.len(), "working register");
    Ok(Group {
        section: None,
        subsection: None,
        table: Table::with_schema(&WORKING_SCHEMA, records),
    })
}

fn check_columns(table: &Table, stage: Stage, expected: usize) -> Result<(), SchemaError> {
    let found = table.columns().len();
    if found < expected {
        Err(SchemaError::TooFewColumns { stage, expected, found })
    } else {
        Ok(())
    }
}

fn marker_positions<F>(rows: &[Row], is_marker: F) -> Vec<usize>
where
    F: Fn(&str) -> bool,
{
    rows.iter()
        .enumerate()
        .filter(|(_, row)| is_marker(row.text(PROJECT_MARKER_COLUMN)))
        .map(|(index, _)| index)
        .collect()
}
