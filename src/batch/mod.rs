//! # Document Batch Module
//!
//! Turns segmented groups into one filled-in document per row and folds them
//! into a single archive. Per-row files live in a batch-scoped temporary
//! directory that is removed however the batch ends.
use crate::config::BatchSettings;
use crate::config::DEFAULT_ARCHIVE_NAME;
use crate::config::RowErrorPolicy;
use crate::config::Settings;
use crate::config::Tokens;
use crate::document::TemplateDocument;
use crate::error::RustyCoverError;
use crate::stage::Stage;
use crate::substitute::substitute;
use crate::substitute::Replacements;
use crate::substitute::SubstitutionOutcome;
use crate::substitute::SubstitutionRules;
use crate::table::segment::Group;
use crate::table::segment::COLUMN_CIPHER;
use crate::table::segment::COLUMN_PART;
use crate::table::segment::COLUMN_SECTION;
use crate::table::segment::COLUMN_VOLUME;
use crate::table::Row;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

mod archive;
mod naming;

pub use naming::FileNamer;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{stage} document for '{group}' row {row} failed: {source}")]
    RowFailed {
        stage: Stage,
        group: String,
        row: usize,
        source: Box<RustyCoverError>,
    },

    #[error("{stage} batch exceeded {limit:?} after {documents} documents")]
    Timeout {
        stage: Stage,
        limit: Duration,
        documents: usize,
    },

    #[error("{stage} batch produced no documents")]
    Empty { stage: Stage },
}

/// One generated document.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedDocument {
    pub file_name: String,
    pub group: String,
    /// Source spreadsheet row
    pub row: usize,
    pub outcome: SubstitutionOutcome,
}

/// A row left out under the `skip` policy.
#[derive(Clone, Debug, PartialEq)]
pub struct RowFailure {
    pub group: String,
    pub row: usize,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct BatchReport {
    pub stage: Stage,
    pub documents: Vec<GeneratedDocument>,
    pub skipped: Vec<RowFailure>,
    /// Path of the written archive
    pub archive: PathBuf,
}

/// Builds document batches from segmented groups and a template.
#[derive(Clone, Debug)]
pub struct BatchBuilder {
    tokens: Tokens,
    rules: SubstitutionRules,
    settings: BatchSettings,
    timeout: Option<Duration>,
}

impl BatchBuilder {
    pub fn new(settings: &Settings) -> BatchBuilder {
        BatchBuilder {
            tokens: settings.vocabulary.tokens.clone(),
            rules: settings.substitution_rules(),
            settings: settings.batch.clone(),
            timeout: settings.batch.timeout(),
        }
    }

    pub fn with_archive_name(mut self, name: &str) -> Self {
        self.settings.archive_name = name.to_owned();
        self
    }

    pub fn with_policy(mut self, policy: RowErrorPolicy) -> Self {
        self.settings.on_row_error = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<archive-name>.zip`, the name reduced to file-name-safe characters.
    pub fn archive_file_name(&self) -> Result<String, RustyCoverError> {
        let stem = FileNamer::new(DEFAULT_ARCHIVE_NAME)?.sanitize(Some(&self.settings.archive_name));
        Ok(format!("{stem}.zip"))
    }

    /// Token mapping of one row.
    ///
    /// Project rows map blank cells and a missing subsection to absent values;
    /// working rows map blank cells to empty text.
    pub fn replacements(&self, stage: Stage, group: &Group, row: &Row) -> Replacements {
        let table = &group.table;
        let cell = |column: &str| table.value(row, column).map(str::to_owned);
        match stage {
            Stage::Project => Replacements::new()
                .with(self.tokens.number.as_str(), cell(COLUMN_VOLUME))
                .with(self.tokens.cipher.as_str(), cell(COLUMN_CIPHER))
                .with(self.tokens.part.as_str(), cell(COLUMN_PART))
                .with(self.tokens.section.as_str(), group.section.to_owned())
                .with(self.tokens.subsection.as_str(), group.subsection.to_owned()),
            Stage::Working => Replacements::new()
                .with(self.tokens.cipher.as_str(), Some(cell(COLUMN_CIPHER).unwrap_or_default()))
                .with(self.tokens.section.as_str(), Some(cell(COLUMN_SECTION).unwrap_or_default())),
        }
    }

    /// Generates every document and writes `<archive-name>.zip` into `output`.
    ///
    /// Per-row files are staged in a temporary directory inside `output`,
    /// which is removed whether the batch succeeds or not.
    pub fn build(
        &self,
        stage: Stage,
        groups: &[Group],
        template: &TemplateDocument,
        output: &Path,
    ) -> Result<BatchReport, RustyCoverError> {
        let started = Instant::now();
        let archive = output.join(self.archive_file_name()?);
        let staging = tempfile::Builder::new().prefix(".rusty-cover-").tempdir_in(output)?;
        let mut namer = FileNamer::new(&self.settings.fallback_name)?;
        let mut documents = Vec::<GeneratedDocument>::new();
        let mut skipped = Vec::<RowFailure>::new();

        for group in groups {
            let label = group.label();
            debug!(group = %label, rows = group.table.len(), "building group");
            for row in group.table.rows() {
                if let Some(limit) = self.timeout.filter(|limit| started.elapsed() > *limit) {
                    Err(BatchError::Timeout {
                        stage,
                        limit,
                        documents: documents.len(),
                    })?
                }

                let result = self.render(stage, group, row, template).and_then(|(bytes, outcome)| {
                    let file_name = namer.candidate(group.table.value(row, COLUMN_CIPHER));
                    std::fs::write(staging.path().join(&file_name), bytes)?;
                    namer.reserve(&file_name);
                    Ok((file_name, outcome))
                });
                match result {
                    Ok((file_name, outcome)) => {
                        debug!(file = %file_name, row = row.number(), "document written");
                        documents.push(GeneratedDocument {
                            file_name,
                            group: label.to_owned(),
                            row: row.number(),
                            outcome,
                        });
                    }
                    Err(error) if self.settings.on_row_error == RowErrorPolicy::Skip => {
                        warn!(group = %label, row = row.number(), error = %error, "row skipped");
                        skipped.push(RowFailure {
                            group: label.to_owned(),
                            row: row.number(),
                            message: error.to_string(),
                        });
                    }
                    Err(error) => Err(BatchError::RowFailed {
                        stage,
                        group: label.to_owned(),
                        row: row.number(),
                        source: Box::new(error),
                    })?,
                }
            }
        }

        if documents.is_empty() {
            Err(BatchError::Empty { stage })?
        }
        let names: Vec<String> = documents.iter().map(|document| document.file_name.to_owned()).collect();
        if let Err(error) = archive::write_archive(staging.path(), &names, &archive) {
            // no partial archive is left behind
            let _ = std::fs::remove_file(&archive);
            return Err(error);
        }
        info!(
            stage = %stage,
            documents = documents.len(),
            skipped = skipped.len(),
            archive = %archive.display(),
            elapsed = ?started.elapsed(),
            "batch finished"
        );
        Ok(BatchReport {
            stage,
            documents,
            skipped,
            archive,
        })
    }

    fn render(
        &self,
        stage: Stage,
        group: &Group,
        row: &Row,
        template: &TemplateDocument,
    ) -> Result<(Vec<u8>, SubstitutionOutcome), RustyCoverError> {
        let mut document = template.clone();
        let outcome = substitute(&mut document, stage, &self.replacements(stage, group, row), &self.rules)?;
        Ok((document.to_bytes()?, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::sample_docx;
    use crate::table::Table;
    use std::fs::File;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn group(section: Option<&str>, subsection: Option<&str>, columns: &[&str], rows: &[&[&str]]) -> Group {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, cells)| {
                let cells = cells.iter().map(|text| Some(text.to_string()).filter(|text| !text.is_empty())).collect();
                Row::new(index + 10, cells)
            })
            .collect();
        Group {
            section: section.map(str::to_owned),
            subsection: subsection.map(str::to_owned),
            table: Table::new(columns.iter().map(|name| name.to_string()).collect(), rows),
        }
    }

    fn project_groups() -> Vec<Group> {
        vec![
            group(Some("Раздел 1"), None, &["Том", "Шифр", "Часть"], &[&["1", "ПЗ-1", "Записка"], &["2", "ПЗ-1", ""]]),
            group(Some("Раздел 2"), Some("Подраздел 1"), &["Том", "Шифр", "Часть"], &[&["3", "", "Расчёты"]]),
        ]
    }

    fn template() -> TemplateDocument {
        let paragraphs: &[&[&str]] = &[
            &["Название раздела"],
            &["Название подраздела"],
            &["Название части"],
            &["Том Номер"],
            &["Название шифра"],
        ];
        TemplateDocument::from_bytes(&sample_docx(paragraphs)).unwrap()
    }

    #[test]
    fn project_mapping_marks_blank_cells_absent() {
        let builder = BatchBuilder::new(&Settings::default());
        let groups = project_groups();
        let replacements = builder.replacements(Stage::Project, &groups[0], &groups[0].table.rows()[1]);
        assert_eq!(replacements.len(), 5);
        assert_eq!(replacements.get("Номер"), Some(Some("2")));
        assert_eq!(replacements.get("Название части"), Some(None));
        assert_eq!(replacements.get("Название раздела"), Some(Some("Раздел 1")));
        assert_eq!(replacements.get("Название подраздела"), Some(None));
    }

    #[test]
    fn working_mapping_uses_empty_text() {
        let builder = BatchBuilder::new(&Settings::default());
        let group = group(None, None, &["Шифр", "Раздел"], &[&["123-45-АР", ""]]);
        let replacements = builder.replacements(Stage::Working, &group, &group.table.rows()[0]);
        assert_eq!(replacements.len(), 2);
        assert_eq!(replacements.get("Название шифра"), Some(Some("123-45-АР")));
        assert_eq!(replacements.get("Название раздела"), Some(Some("")));
    }

    #[test]
    fn build_writes_one_entry_per_row() {
        let output = TempDir::new().unwrap();
        let builder = BatchBuilder::new(&Settings::default()).with_archive_name("titles");
        let report = builder.build(Stage::Project, &project_groups(), &template(), output.path()).unwrap();

        let names: Vec<&str> = report.documents.iter().map(|document| document.file_name.as_str()).collect();
        assert_eq!(names, ["ПЗ_1.docx", "ПЗ_1_2.docx", "без_шифра.docx"]);
        assert_eq!(report.archive, output.path().join("titles.zip"));
        assert!(report.skipped.is_empty());
        assert_eq!(report.documents[2].group, "Раздел 2 / Подраздел 1");
        assert_eq!(report.documents[2].row, 10);

        let archive = ZipArchive::new(File::open(&report.archive).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        let mut entries: Vec<&str> = archive.file_names().collect();
        entries.sort();
        assert_eq!(entries, ["ПЗ_1.docx", "ПЗ_1_2.docx", "без_шифра.docx"]);
    }

    #[test]
    fn empty_token_aborts_with_row_context() {
        let output = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.vocabulary.tokens.number = String::new();
        let error = BatchBuilder::new(&settings)
            .build(Stage::Project, &project_groups(), &template(), output.path())
            .unwrap_err();
        match error {
            RustyCoverError::BatchError(BatchError::RowFailed { stage, group, row, .. }) => {
                assert_eq!(stage, Stage::Project);
                assert_eq!(group, "Раздел 1");
                assert_eq!(row, 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!output.path().join("documents.zip").exists());
    }

    #[test]
    fn skip_policy_still_requires_one_document() {
        let output = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.vocabulary.tokens.cipher = String::new();
        let error = BatchBuilder::new(&settings)
            .with_policy(RowErrorPolicy::Skip)
            .build(Stage::Project, &project_groups(), &template(), output.path())
            .unwrap_err();
        assert!(matches!(error, RustyCoverError::BatchError(BatchError::Empty { .. })));
    }

    fn entries(directory: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(directory)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn output_holds_only_the_archive() {
        let output = TempDir::new().unwrap();
        BatchBuilder::new(&Settings::default())
            .build(Stage::Project, &project_groups(), &template(), output.path())
            .unwrap();
        assert_eq!(entries(output.path()), ["documents.zip"]);
    }

    #[test]
    fn elapsed_limit_aborts_and_cleans_up() {
        let output = TempDir::new().unwrap();
        let error = BatchBuilder::new(&Settings::default())
            .with_timeout(Some(Duration::from_nanos(1)))
            .build(Stage::Project, &project_groups(), &template(), output.path())
            .unwrap_err();
        match error {
            RustyCoverError::BatchError(BatchError::Timeout { stage, limit, documents }) => {
                assert_eq!(stage, Stage::Project);
                assert_eq!(limit, Duration::from_nanos(1));
                assert_eq!(documents, 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(entries(output.path()).is_empty());
    }

    #[test]
    fn aborted_batch_leaves_nothing() {
        let output = TempDir::new().unwrap();
        let groups = vec![group(Some("Раздел 1"), None, &["Том", "Шифр", "Часть"], &[&["1", "ПЗ-1", "Записка\u{1}"]])];
        BatchBuilder::new(&Settings::default())
            .build(Stage::Project, &groups, &template(), output.path())
            .unwrap_err();
        assert!(entries(output.path()).is_empty());
    }

    #[test]
    fn skipped_row_is_reported_and_its_name_stays_free() {
        let output = TempDir::new().unwrap();
        let groups = vec![group(
            Some("Раздел 1"),
            None,
            &["Том", "Шифр", "Часть"],
            &[&["1", "ПЗ-1", "Записка\u{1}"], &["2", "ПЗ-1", "Записка"]],
        )];
        let report = BatchBuilder::new(&Settings::default())
            .with_policy(RowErrorPolicy::Skip)
            .build(Stage::Project, &groups, &template(), output.path())
            .unwrap();

        let names: Vec<&str> = report.documents.iter().map(|document| document.file_name.as_str()).collect();
        assert_eq!(names, ["ПЗ_1.docx"]);
        assert_eq!(report.documents[0].row, 11);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].group, "Раздел 1");
        assert_eq!(report.skipped[0].row, 10);
        assert!(report.skipped[0].message.contains("U+0001"), "{}", report.skipped[0].message);

        let archive = ZipArchive::new(File::open(&report.archive).unwrap()).unwrap();
        assert_eq!(archive.file_names().collect::<Vec<_>>(), ["ПЗ_1.docx"]);
        assert_eq!(entries(output.path()), ["documents.zip"]);
    }

    #[test]
    fn archive_name_cannot_leave_the_output_directory() {
        let output = TempDir::new().unwrap();
        let builder = BatchBuilder::new(&Settings::default()).with_archive_name("../x");
        assert_eq!(builder.archive_file_name().unwrap(), "_x.zip");
        let report = builder.build(Stage::Project, &project_groups(), &template(), output.path()).unwrap();
        assert_eq!(report.archive, output.path().join("_x.zip"));
        assert_eq!(entries(output.path()), ["_x.zip"]);

        let blank = BatchBuilder::new(&Settings::default()).with_archive_name(" ");
        assert_eq!(blank.archive_file_name().unwrap(), "documents.zip");
    }

    #[test]
    fn failed_archive_write_leaves_no_file() {
        let output = TempDir::new().unwrap();
        // a directory in the archive's place makes the write fail
        std::fs::create_dir(output.path().join("documents.zip")).unwrap();
        BatchBuilder::new(&Settings::default())
            .build(Stage::Project, &project_groups(), &template(), output.path())
            .unwrap_err();
        assert_eq!(entries(output.path()), ["documents.zip"]);
        assert!(output.path().join("documents.zip").is_dir());
    }

    #[test]
    fn empty_batch() {
        let output = TempDir::new().unwrap();
        let groups = vec![group(Some("Раздел 1"), None, &["Том", "Шифр", "Часть"], &[])];
        let error = BatchBuilder::new(&Settings::default())
            .build(Stage::Project, &groups, &template(), output.path())
            .unwrap_err();
        assert!(matches!(error, RustyCoverError::BatchError(BatchError::Empty { stage: Stage::Project })));
    }
}
