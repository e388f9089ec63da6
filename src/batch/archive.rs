//! Folds generated files into one archive with top-level entries.
use crate::error::RustyCoverError;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// Writes `names` from `directory` into the archive at `destination`.
pub(crate) fn write_archive(directory: &Path, names: &[String], destination: &Path) -> Result<(), RustyCoverError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let mut zip = ZipWriter::new(BufWriter::new(File::create(destination)?));
    for name in names {
        let mut reader = BufReader::new(File::open(directory.join(name))?);
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut reader, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn entries_are_top_level_and_ordered() {
        let staging = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let names = vec!["б.docx".to_owned(), "a.docx".to_owned()];
        for name in &names {
            std::fs::write(staging.path().join(name), name.as_bytes()).unwrap();
        }

        let destination = output.path().join("documents.zip");
        write_archive(staging.path(), &names, &destination).unwrap();

        let mut archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_index(0).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "б.docx");
        assert_eq!(archive.by_index(1).unwrap().name(), "a.docx");
    }

    #[test]
    fn missing_file_fails() {
        let staging = TempDir::new().unwrap();
        let destination = staging.path().join("documents.zip");
        assert!(write_archive(staging.path(), &["absent.docx".to_owned()], &destination).is_err());
    }
}
