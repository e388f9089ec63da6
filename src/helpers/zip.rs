//! Part lookup inside Office Open XML packages

use crate::error::RustyCoverError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) type PartReader<'a, RS> = XmlReader<BufReader<ZipFile<'a, RS>>>;

/// Package parts addressed the way relationship targets spell them.
///
/// Names compare ASCII case-insensitively, and `\` counts as `/`.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// The stored entry name matching `name`, if any.
    fn entry_name(&self, name: &str) -> Option<String>;

    /// XML reader over the part, or `None` when the package lacks it.
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<PartReader<'_, RS>>, RustyCoverError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn entry_name(&self, name: &str) -> Option<String> {
        let wanted = name.replace('\\', "/");
        self.file_names()
            .find(|stored| stored.eq_ignore_ascii_case(&wanted))
            .map(str::to_owned)
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<PartReader<'_, RS>>, RustyCoverError> {
        let Some(stored) = self.entry_name(name) else {
            return Ok(None);
        };
        match self.by_name(&stored) {
            Ok(part) => Ok(Some(XmlReader::new(BufReader::new(part)))),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}
