//! Event-level XML access for the workbook reader and the docx body model

use crate::error::RustyCoverError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),

    #[error("Unexpected end of document inside '{0}'")]
    UnexpectedEofError(String),
}

/// XML reader wrapper with a configuration that keeps documents round-trippable
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader; whitespace is kept and empty elements are expanded
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyCoverError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(RustyCoverError::XmlError(error)),
        }
    }

    /// Reads the next XML event detached from the internal buffer
    pub(crate) fn next_owned(&mut self) -> Result<Option<Event<'static>>, RustyCoverError> {
        Ok(self.next()?.map(Event::into_owned))
    }

    /// Collects `start` and every event up to its matching end tag
    pub(crate) fn read_element(&mut self, start: BytesStart<'static>) -> Result<Vec<Event<'static>>, RustyCoverError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut events = vec![Event::Start(start)];
        let mut depth = 1usize;
        while depth > 0 {
            let event = self
                .next_owned()?
                .ok_or_else(|| XmlError::UnexpectedEofError(name.to_owned()))?;
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                _ => (),
            }
            events.push(event);
        }
        Ok(events)
    }
}

/// Unescaped and parsed attribute values
pub(crate) trait XmlAttributeHelper<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyCoverError>;

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyCoverError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyCoverError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyCoverError> {
        let value = self.get_value()?;
        match value.parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(XmlError::ParseAttributeValueError(value.into_owned()))?,
        }
    }
}

/// Attribute lookup by qualified name on a start tag
pub(crate) trait XmlNodeHelper<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyCoverError>;

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyCoverError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyCoverError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => attribute.get_value().map(Some),
            None => Ok(None),
        }
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyCoverError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => attribute.parse_value().map(Some),
            None => Ok(None),
        }
    }
}

/// Accumulates element text; entity references arrive as separate events
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyCoverError>;

    /// `&amp;`, `&#1041;` and `&#x411;` forms
    fn push_bytes_ref(&mut self, reference: &BytesRef) -> Result<(), RustyCoverError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyCoverError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, reference: &BytesRef) -> Result<(), RustyCoverError> {
        let name = reference.xml_content()?;
        let Some(numeric) = name.strip_prefix('#') else {
            let entity = resolve_xml_entity(&name).ok_or_else(|| XmlError::ParseEntityError(name.to_string()))?;
            self.push_str(entity);
            return Ok(());
        };
        let code = match numeric.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16)?,
            None => numeric.parse::<u32>()?,
        };
        // invalid code points are dropped
        self.extend(char::from_u32(code));
        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
