//! # Template Document Module
//!
//! Loads a Word 2007+ template (`.docx`), exposes its body paragraphs and runs
//! for editing, and serializes the edited copy back to a package. A
//! [`TemplateDocument`] is cloned once per generated document; clones share
//! nothing.
use crate::error::RustyCoverError;
use crate::error::ResultMessage;
use crate::document::body::Body;
use crate::document::package::Package;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

mod body;
mod package;

pub use body::Paragraph;
pub use body::ParagraphId;
pub use body::Run;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Missing '{0}' in document package")]
    MissingPart(String),

    #[error("Main document part has no body")]
    MissingBody,

    #[error("Paragraph #{0} is not part of the document")]
    ParagraphNotFound(usize),
}

/// Returns true when the file name has the `.docx` extension.
pub fn is_supported(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// A parsed template: the package plus an editable main part.
#[derive(Clone, Debug)]
pub struct TemplateDocument {
    package: Package,
    main_part: String,
    body: Body,
}

impl TemplateDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<TemplateDocument, RustyCoverError> {
        let package = Package::read(Cursor::new(bytes))?;
        let main_part = package.main_part_name()?;
        let body = match package.part(&main_part) {
            Some(xml) => Body::parse(xml).with_prefix(&format!("Parse '{main_part}' failed"))?,
            None => Err(DocumentError::MissingPart(main_part.to_owned()))?,
        };
        Ok(TemplateDocument {
            package,
            main_part,
            body,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<TemplateDocument, RustyCoverError> {
        let prefix = format!("Open template '{}' failed", path.as_ref().display());
        std::fs::read(path)
            .map_err(RustyCoverError::from)
            .and_then(|bytes| Self::from_bytes(&bytes))
            .with_prefix(&prefix)
    }

    /// Body paragraphs in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.paragraphs()
    }

    pub fn paragraph_ids(&self) -> Vec<ParagraphId> {
        self.body.paragraphs().map(Paragraph::id).collect()
    }

    pub fn paragraph_mut(&mut self, id: ParagraphId) -> Option<&mut Paragraph> {
        self.body.paragraph_mut(id)
    }

    pub fn remove_paragraph(&mut self, id: ParagraphId) -> Result<(), RustyCoverError> {
        Ok(self.body.remove_paragraph(id)?)
    }

    /// Inserts `count` empty paragraphs immediately after paragraph `id`.
    pub fn insert_blank_paragraphs_after(&mut self, id: ParagraphId, count: usize) -> Result<(), RustyCoverError> {
        Ok(self.body.insert_blank_paragraphs_after(id, count)?)
    }

    /// Paragraph texts joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs().map(Paragraph::text).collect::<Vec<_>>().join("\n")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RustyCoverError> {
        let xml = self.body.to_bytes()?;
        self.package.to_bytes(&self.main_part, &xml)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RustyCoverError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

/// In-memory templates for unit tests: one paragraph per slice, one run per string.
#[cfg(test)]
pub(crate) fn sample_docx(paragraphs: &[&[&str]]) -> Vec<u8> {
    use quick_xml::escape::escape;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#);
    for runs in paragraphs {
        xml.push_str("<w:p>");
        for run in runs.iter() {
            xml.push_str(&format!(r#"<w:r><w:rPr><w:sz w:val="28"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#, escape(*run)));
        }
        xml.push_str("</w:p>");
    }
    xml.push_str("<w:sectPr/></w:body></w:document>");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn docx(document: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("[Content_Types].xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    const DOCUMENT: &str = concat!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        r#"<w:p><w:r><w:t>Название шифра</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>Том Номер</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#,
    );

    #[test]
    fn clones_are_independent() {
        let template = TemplateDocument::from_bytes(&docx(DOCUMENT)).unwrap();
        let mut copy = template.clone();
        let id = copy.paragraph_ids()[0];
        copy.remove_paragraph(id).unwrap();

        assert_eq!(template.text(), "Название шифра\nТом Номер");
        assert_eq!(copy.text(), "Том Номер");
    }

    #[test]
    fn edited_copy_round_trips_through_bytes() {
        let template = TemplateDocument::from_bytes(&docx(DOCUMENT)).unwrap();
        let mut copy = template.clone();
        let id = copy.paragraph_ids()[1];
        copy.paragraph_mut(id).unwrap().runs_mut().for_each(|run| run.set_text("Том 3"));
        copy.insert_blank_paragraphs_after(id, 4).unwrap();

        let reopened = TemplateDocument::from_bytes(&copy.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.paragraph_ids().len(), 6);
        assert_eq!(reopened.text(), "Название шифра\nТом 3\n\n\n\n");
    }

    #[test]
    fn not_a_package() {
        assert!(TemplateDocument::from_bytes(b"plain text").is_err());
    }

    #[test]
    fn docx_extension() {
        assert!(is_supported("Шаблон.DOCX"));
        assert!(!is_supported("template.doc"));
    }
}
