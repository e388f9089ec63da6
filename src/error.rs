use thiserror::Error;

/// Error type for every fallible operation of the crate.
///
/// Dependency errors convert transparently; module errors keep their own enums
/// so callers can match on the stage that failed.
#[derive(Error, Debug)]
pub enum RustyCoverError {
    #[error("{0}")]
    WithContextError(String),

    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    RegexError(#[from] regex::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // register reading
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    SchemaError(#[from] crate::table::segment::SchemaError),

    // template editing
    #[error("{0}")]
    DocumentError(#[from] crate::document::DocumentError),

    #[error("{0}")]
    SubstitutionError(#[from] crate::substitute::SubstitutionError),

    #[error("{0}")]
    BatchError(#[from] crate::batch::BatchError),
}

/// Prefixes an error with the operation that produced it.
pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustyCoverError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|error| RustyCoverError::WithContextError(format!("{message}: {error}")))
    }
}
