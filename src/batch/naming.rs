use crate::error::RustyCoverError;
use regex::Regex;
use std::collections::HashSet;

const EXTENSION: &str = "docx";

/// Derives unique output file names from cipher codes.
pub struct FileNamer {
    separators: Regex,
    fallback: String,
    used: HashSet<String>,
}

impl FileNamer {
    pub fn new(fallback: &str) -> Result<FileNamer, RustyCoverError> {
        Ok(FileNamer {
            separators: Regex::new(r"[^А-Яа-яЁёA-Za-z0-9_]+")?,
            fallback: fallback.to_owned(),
            used: HashSet::new(),
        })
    }

    /// Collapses every run of unsupported characters into `_`.
    ///
    /// Blank or missing codes give the fallback name.
    pub fn sanitize(&self, code: Option<&str>) -> String {
        match code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => self.separators.replace_all(code, "_").into_owned(),
            None => self.fallback.to_owned(),
        }
    }

    /// First free file name for `code`; repeats get `_2`, `_3`, ...
    ///
    /// Nothing is reserved until [`FileNamer::reserve`].
    pub fn candidate(&self, code: Option<&str>) -> String {
        let stem = self.sanitize(code);
        let mut candidate = stem.to_owned();
        let mut counter = 1;
        while self.used.contains(&candidate.to_lowercase()) {
            counter += 1;
            candidate = format!("{stem}_{counter}");
        }
        format!("{candidate}.{EXTENSION}")
    }

    /// Marks a name returned by [`FileNamer::candidate`] as taken.
    pub fn reserve(&mut self, file_name: &str) {
        let stem = file_name.strip_suffix(&format!(".{EXTENSION}")).unwrap_or(file_name);
        self.used.insert(stem.to_lowercase());
    }

    pub fn next_name(&mut self, code: Option<&str>) -> String {
        let file_name = self.candidate(code);
        self.reserve(&file_name);
        file_name
    }
}
