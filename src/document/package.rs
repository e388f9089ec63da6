//! Zip container of an Office Open XML document, kept entry by entry so that
//! untouched parts are written back byte for byte.
use crate::document::DocumentError;
use crate::error::RustyCoverError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::match_xml_events;
use quick_xml::events::Event;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

const PACKAGE_RELATIONSHIPS: &str = "_rels/.rels";
const OFFICE_DOCUMENT: &str = "/officeDocument";
const DEFAULT_MAIN_PART: &str = "word/document.xml";

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    compression: CompressionMethod,
    is_dir: bool,
    data: Vec<u8>,
}

/// Every entry of the package in archive order.
#[derive(Clone, Debug)]
pub(crate) struct Package {
    entries: Vec<Entry>,
}

impl Package {
    pub(crate) fn read<RS: Read + Seek>(reader: RS) -> Result<Package, RustyCoverError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            entries.push(Entry {
                name: file.name().to_owned(),
                compression,
                is_dir: file.is_dir(),
                data,
            });
        }
        Ok(Package { entries })
    }

    /// Content of the entry `name`, matched case-insensitively.
    pub(crate) fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.replace('\\', "/");
        self.entries
            .iter()
            .find(|entry| !entry.is_dir && entry.name.eq_ignore_ascii_case(&name))
            .map(|entry| entry.data.as_slice())
    }

    /// Name of the main document part, as declared by the package relationships.
    pub(crate) fn main_part_name(&self) -> Result<String, RustyCoverError> {
        let declared = match self.part(PACKAGE_RELATIONSHIPS) {
            Some(xml) => find_office_document(xml)?,
            None => None,
        };
        let name = declared.unwrap_or_else(|| DEFAULT_MAIN_PART.to_owned());
        match self.part(&name) {
            Some(_) => Ok(name),
            None => Err(DocumentError::MissingPart(name))?,
        }
    }

    /// Writes the package with `content` in place of the part `replaced`.
    pub(crate) fn to_bytes(&self, replaced: &str, content: &[u8]) -> Result<Vec<u8>, RustyCoverError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options = SimpleFileOptions::default()
                .compression_method(entry.compression)
                .last_modified_time(zip::DateTime::default());
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)?;
            if entry.name.eq_ignore_ascii_case(replaced) {
                zip.write_all(content)?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// Target of the `officeDocument` relationship, without a leading slash.
fn find_office_document(xml: &[u8]) -> Result<Option<String>, RustyCoverError> {
    let mut reader = XmlReader::new(xml);
    let mut target = None;
    match_xml_events!(reader => {
        Event::Start(event) if event.name().as_ref() == b"Relationship" => {
            let is_main = event
                .get_attribute_value("Type")?
                .map(|kind| kind.ends_with(OFFICE_DOCUMENT))
                .unwrap_or(false);
            if is_main && target.is_none() {
                target = event
                    .get_attribute_value("Target")?
                    .map(|path| path.trim_start_matches('/').to_owned());
            }
        },
    });
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &[(&str, &str, CompressionMethod)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content, compression) in entries {
            zip.start_file(*name, SimpleFileOptions::default().compression_method(*compression))
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/main.xml"/>
</Relationships>"#;

    #[test]
    fn main_part_from_relationships() {
        let bytes = archive(&[
            ("_rels/.rels", RELS, CompressionMethod::Deflated),
            ("word/main.xml", "<w:document/>", CompressionMethod::Deflated),
        ]);
        let package = Package::read(Cursor::new(bytes)).unwrap();
        assert_eq!(package.main_part_name().unwrap(), "word/main.xml");
    }

    #[test]
    fn main_part_falls_back_to_default_name() {
        let bytes = archive(&[("word/document.xml", "<w:document/>", CompressionMethod::Stored)]);
        let package = Package::read(Cursor::new(bytes)).unwrap();
        assert_eq!(package.main_part_name().unwrap(), DEFAULT_MAIN_PART);
    }

    #[test]
    fn missing_main_part() {
        let bytes = archive(&[("_rels/.rels", RELS, CompressionMethod::Stored)]);
        let package = Package::read(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            package.main_part_name(),
            Err(RustyCoverError::DocumentError(DocumentError::MissingPart(name))) if name == "word/main.xml"
        ));
    }

    #[test]
    fn rewrite_keeps_order_and_compression() {
        let bytes = archive(&[
            ("[Content_Types].xml", "<Types/>", CompressionMethod::Stored),
            ("word/document.xml", "<old/>", CompressionMethod::Deflated),
            ("word/styles.xml", "<w:styles/>", CompressionMethod::Deflated),
        ]);
        let package = Package::read(Cursor::new(bytes)).unwrap();
        let rewritten = package.to_bytes("word/document.xml", b"<new/>").unwrap();

        let mut archive = ZipArchive::new(Cursor::new(rewritten)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 3);
        assert_eq!(archive.by_index(0).unwrap().name(), "[Content_Types].xml");
        assert_eq!(archive.by_index(0).unwrap().compression(), CompressionMethod::Stored);
        let mut content = String::new();
        archive.by_name("word/document.xml").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<new/>");
    }

    #[test]
    fn rewrite_is_deterministic() {
        let bytes = archive(&[("word/document.xml", "<old/>", CompressionMethod::Deflated)]);
        let package = Package::read(Cursor::new(bytes)).unwrap();
        let first = package.to_bytes("word/document.xml", b"<new/>").unwrap();
        let second = package.clone().to_bytes("word/document.xml", b"<new/>").unwrap();
        assert_eq!(first, second);
    }
}
