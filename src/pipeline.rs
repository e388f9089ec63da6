//! Application context shared by the command line and the conversation layer.
use crate::batch::BatchBuilder;
use crate::batch::BatchReport;
use crate::config::Settings;
use crate::document::TemplateDocument;
use crate::error::RustyCoverError;
use crate::spreadsheet;
use crate::spreadsheet::Criteria;
use crate::stage::Stage;
use crate::table::segment;
use crate::table::segment::Group;
use crate::table::segment::SegmentRules;
use crate::table::Table;
use std::path::Path;
use tempfile::TempDir;
use tracing::info;

/// Reader criteria, segmentation rules and batch builder derived once from [`Settings`].
#[derive(Clone, Debug)]
pub struct Pipeline {
    settings: Settings,
    criteria: Criteria,
    rules: SegmentRules,
    builder: BatchBuilder,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Result<Pipeline, RustyCoverError> {
        Ok(Pipeline {
            criteria: settings.criteria()?,
            rules: settings.segment_rules(),
            builder: BatchBuilder::new(&settings),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the batch builder, e.g. to apply command line overrides.
    pub fn with_builder(mut self, builder: BatchBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn builder(&self) -> &BatchBuilder {
        &self.builder
    }

    /// Reads the register from uploaded workbook bytes.
    pub fn read_table(&self, file_name: &str, bytes: Vec<u8>) -> Result<Table, RustyCoverError> {
        spreadsheet::read_table_from_bytes(file_name, bytes, &self.criteria)
    }

    /// Reads the register from a workbook on disk.
    pub fn open_table<P: AsRef<Path>>(&self, path: P) -> Result<Table, RustyCoverError> {
        spreadsheet::open_table(path, &self.criteria)
    }

    pub fn segment(&self, table: &Table, stage: Stage) -> Result<Vec<Group>, RustyCoverError> {
        segment::segment(table, stage, &self.rules)
    }

    /// Segments `table` and writes the archive into `output`.
    pub fn generate_into(
        &self,
        stage: Stage,
        table: &Table,
        template: &TemplateDocument,
        output: &Path,
    ) -> Result<BatchReport, RustyCoverError> {
        let groups = self.segment(table, stage)?;
        info!(stage = %stage, groups = groups.len(), rows = table.len(), "generating documents");
        self.builder.build(stage, &groups, template, output)
    }

    /// Segments `table` and builds the archive in a directory owned by the
    /// returned [`Artifact`].
    pub fn generate(&self, stage: Stage, table: &Table, template: &[u8]) -> Result<Artifact, RustyCoverError> {
        let template = TemplateDocument::from_bytes(template)?;
        let directory = tempfile::Builder::new().prefix("rusty-cover-archive-").tempdir()?;
        let report = self.generate_into(stage, table, &template, directory.path())?;
        Ok(Artifact { directory, report })
    }
}

/// A finished archive; its directory is removed when the artifact is dropped.
#[derive(Debug)]
pub struct Artifact {
    directory: TempDir,
    report: BatchReport,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.report.archive
    }

    pub fn file_name(&self) -> String {
        self.report
            .archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn directory(&self) -> &Path {
        self.directory.path()
    }

    pub fn read(&self) -> Result<Vec<u8>, RustyCoverError> {
        Ok(std::fs::read(self.path())?)
    }
}
