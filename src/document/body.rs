//! Editable view of the main document part.
//!
//! Only paragraphs directly under `w:body` and runs directly under those
//! paragraphs are modeled. Everything else is kept as the XML events it was
//! read from and written back unchanged.
use crate::document::DocumentError;
use crate::error::RustyCoverError;
use crate::helpers::xml::XmlError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::io::BufRead;
use std::io::Write;

const BODY: &[u8] = b"w:body";
const PARAGRAPH: &[u8] = b"w:p";
const PARAGRAPH_PROPERTIES: &str = "w:pPr";
const RUN: &[u8] = b"w:r";
const TEXT: &[u8] = b"w:t";

/// Stable handle of a body paragraph; survives removal of other paragraphs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParagraphId(usize);

#[derive(Clone, Debug)]
enum RunPart {
    Text { start: BytesStart<'static>, text: String },
    Opaque(Event<'static>),
}

/// A `w:r` element; its text is the concatenation of its `w:t` children.
#[derive(Clone, Debug)]
pub struct Run {
    start: BytesStart<'static>,
    parts: Vec<RunPart>,
}

impl Run {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                RunPart::Text { text, .. } => Some(text.as_str()),
                RunPart::Opaque(_) => None,
            })
            .collect()
    }

    /// Replaces the run text, keeping the run formatting.
    ///
    /// The new text goes to the first `w:t`; the remaining ones are dropped.
    /// A run without text gets a fresh `w:t` at its end.
    pub fn set_text(&mut self, value: &str) {
        let mut written = false;
        self.parts.retain_mut(|part| match part {
            RunPart::Text { start, text } if !written => {
                *start = preserve_space(start);
                *text = value.to_owned();
                written = true;
                true
            }
            RunPart::Text { .. } => false,
            RunPart::Opaque(_) => true,
        });
        if !written {
            self.parts.push(RunPart::Text {
                start: preserve_space(&BytesStart::new("w:t")),
                text: value.to_owned(),
            });
        }
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), RustyCoverError> {
        writer.write_event(Event::Start(self.start.borrow()))?;
        for part in &self.parts {
            match part {
                RunPart::Text { start, text } => {
                    writer.write_event(Event::Start(start.borrow()))?;
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                    writer.write_event(Event::End(start.to_end()))?;
                }
                RunPart::Opaque(event) => writer.write_event(event.borrow())?,
            }
        }
        writer.write_event(Event::End(self.start.to_end()))?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum ParagraphPart {
    Run(Run),
    Opaque(Event<'static>),
}

/// A body-level `w:p` element.
#[derive(Clone, Debug)]
pub struct Paragraph {
    id: ParagraphId,
    start: BytesStart<'static>,
    parts: Vec<ParagraphPart>,
}

impl Paragraph {
    pub fn id(&self) -> ParagraphId {
        self.id
    }

    /// Concatenated text of the direct runs.
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.parts.iter().filter_map(|part| match part {
            ParagraphPart::Run(run) => Some(run),
            ParagraphPart::Opaque(_) => None,
        })
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.parts.iter_mut().filter_map(|part| match part {
            ParagraphPart::Run(run) => Some(run),
            ParagraphPart::Opaque(_) => None,
        })
    }

    /// `<w:p><w:pPr/></w:p>`
    fn blank(id: ParagraphId) -> Paragraph {
        let properties = BytesStart::new(PARAGRAPH_PROPERTIES);
        let end = Event::End(properties.to_end().into_owned());
        Paragraph {
            id,
            start: BytesStart::new("w:p"),
            parts: vec![ParagraphPart::Opaque(Event::Start(properties)), ParagraphPart::Opaque(end)],
        }
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), RustyCoverError> {
        writer.write_event(Event::Start(self.start.borrow()))?;
        for part in &self.parts {
            match part {
                ParagraphPart::Run(run) => run.write(writer)?,
                ParagraphPart::Opaque(event) => writer.write_event(event.borrow())?,
            }
        }
        writer.write_event(Event::End(self.start.to_end()))?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum Block {
    Paragraph(Paragraph),
    Opaque(Vec<Event<'static>>),
}

/// The parsed main part: events before the body content, the body blocks
/// and the events from `</w:body>` on.
#[derive(Clone, Debug)]
pub(crate) struct Body {
    prologue: Vec<Event<'static>>,
    blocks: Vec<Block>,
    epilogue: Vec<Event<'static>>,
    next_id: usize,
}

impl Body {
    pub(crate) fn parse(xml: &[u8]) -> Result<Body, RustyCoverError> {
        let mut reader = XmlReader::new(xml);

        let mut prologue = Vec::new();
        loop {
            let event = reader.next_owned()?.ok_or(DocumentError::MissingBody)?;
            let is_body = matches!(&event, Event::Start(start) if start.name().as_ref() == BODY);
            prologue.push(event);
            if is_body {
                break;
            }
        }

        let mut blocks = Vec::new();
        let mut next_id = 0;
        let mut epilogue = Vec::new();
        loop {
            let event = reader
                .next_owned()?
                .ok_or_else(|| XmlError::UnexpectedEofError("w:body".to_owned()))?;
            match event {
                Event::Start(start) if start.name().as_ref() == PARAGRAPH => {
                    let paragraph = read_paragraph(&mut reader, ParagraphId(next_id), start)?;
                    next_id += 1;
                    blocks.push(Block::Paragraph(paragraph));
                }
                Event::Start(start) => blocks.push(Block::Opaque(reader.read_element(start)?)),
                Event::End(end) => {
                    epilogue.push(Event::End(end));
                    break;
                }
                event => blocks.push(Block::Opaque(vec![event])),
            }
        }
        while let Some(event) = reader.next_owned()? {
            epilogue.push(event);
        }

        Ok(Body {
            prologue,
            blocks,
            epilogue,
            next_id,
        })
    }

    pub(crate) fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            Block::Opaque(_) => None,
        })
    }

    pub(crate) fn paragraph_mut(&mut self, id: ParagraphId) -> Option<&mut Paragraph> {
        self.blocks.iter_mut().find_map(|block| match block {
            Block::Paragraph(paragraph) if paragraph.id == id => Some(paragraph),
            _ => None,
        })
    }

    fn position(&self, id: ParagraphId) -> Result<usize, DocumentError> {
        self.blocks
            .iter()
            .position(|block| matches!(block, Block::Paragraph(paragraph) if paragraph.id == id))
            .ok_or(DocumentError::ParagraphNotFound(id.0))
    }

    pub(crate) fn remove_paragraph(&mut self, id: ParagraphId) -> Result<(), DocumentError> {
        let position = self.position(id)?;
        self.blocks.remove(position);
        Ok(())
    }

    /// Places `count` blank paragraphs right after paragraph `id`.
    pub(crate) fn insert_blank_paragraphs_after(&mut self, id: ParagraphId, count: usize) -> Result<(), DocumentError> {
        let position = self.position(id)?;
        let blanks: Vec<Block> = (0..count)
            .map(|offset| Block::Paragraph(Paragraph::blank(ParagraphId(self.next_id + offset))))
            .collect();
        self.next_id += count;
        self.blocks.splice(position + 1..position + 1, blanks);
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, RustyCoverError> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.prologue {
            writer.write_event(event.borrow())?;
        }
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => paragraph.write(&mut writer)?,
                Block::Opaque(events) => {
                    for event in events {
                        writer.write_event(event.borrow())?;
                    }
                }
            }
        }
        for event in &self.epilogue {
            writer.write_event(event.borrow())?;
        }
        Ok(writer.into_inner())
    }
}

fn read_paragraph<R: BufRead>(
    reader: &mut XmlReader<R>,
    id: ParagraphId,
    start: BytesStart<'static>,
) -> Result<Paragraph, RustyCoverError> {
    let mut parts = Vec::new();
    loop {
        let event = reader
            .next_owned()?
            .ok_or_else(|| XmlError::UnexpectedEofError("w:p".to_owned()))?;
        match event {
            Event::Start(start) if start.name().as_ref() == RUN => parts.push(ParagraphPart::Run(read_run(reader, start)?)),
            Event::Start(start) => parts.extend(reader.read_element(start)?.into_iter().map(ParagraphPart::Opaque)),
            Event::End(_) => break,
            event => parts.push(ParagraphPart::Opaque(event)),
        }
    }
    Ok(Paragraph { id, start, parts })
}

fn read_run<R: BufRead>(reader: &mut XmlReader<R>, start: BytesStart<'static>) -> Result<Run, RustyCoverError> {
    let mut parts = Vec::new();
    loop {
        let event = reader
            .next_owned()?
            .ok_or_else(|| XmlError::UnexpectedEofError("w:r".to_owned()))?;
        match event {
            Event::Start(start) if start.name().as_ref() == TEXT => {
                let text = read_text(reader)?;
                parts.push(RunPart::Text { start, text });
            }
            Event::Start(start) => parts.extend(reader.read_element(start)?.into_iter().map(RunPart::Opaque)),
            Event::End(_) => break,
            event => parts.push(RunPart::Opaque(event)),
        }
    }
    Ok(Run { start, parts })
}

fn read_text<R: BufRead>(reader: &mut XmlReader<R>) -> Result<String, RustyCoverError> {
    let mut text = String::new();
    loop {
        match reader.next()? {
            Some(Event::Text(event)) => text.push_bytes_text(&event)?,
            Some(Event::GeneralRef(event)) => text.push_bytes_ref(&event)?,
            Some(Event::CData(event)) => text.push_str(&event.xml_content()?),
            Some(Event::End(_)) => break,
            Some(_) => (),
            None => Err(XmlError::UnexpectedEofError("w:t".to_owned()))?,
        }
    }
    Ok(text)
}

/// Copy of a `w:t` start tag carrying `xml:space="preserve"`.
fn preserve_space(start: &BytesStart) -> BytesStart<'static> {
    let mut element = BytesStart::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    element.extend_attributes(
        start
            .attributes()
            .flatten()
            .filter(|attribute| attribute.key.as_ref() != b"xml:space"),
    );
    element.push_attribute(("xml:space", "preserve"));
    element
}
