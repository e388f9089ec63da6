//! Placeholder substitution inside a template copy.
//!
//! Tokens are literal substrings of run text. All tokens of a mapping are
//! matched in one left-to-right scan where longer tokens win, so a token that
//! is part of another one never clobbers it and inserted values are never
//! scanned again.
use crate::document::ParagraphId;
use crate::document::TemplateDocument;
use crate::error::RustyCoverError;
use crate::stage::Stage;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SubstitutionError {
    #[error("Placeholder token must not be empty")]
    EmptyToken,

    /// Control characters other than tab and line breaks cannot appear in a docx part
    #[error("Value for '{token}' contains character U+{code:04X} not allowed in a document")]
    InvalidCharacter { token: String, code: u32 },
}

/// Names the tokens that drive layout and the layout constants.
#[derive(Clone, Debug, PartialEq)]
pub struct SubstitutionRules {
    /// Run substring marking the paragraphs that receive blank lines in project documents
    pub anchor: String,
    pub part_token: String,
    pub section_token: String,
    pub word_limit: usize,
    pub anchor_blank_lines: usize,
    pub section_blank_lines: usize,
}

impl Default for SubstitutionRules {
    fn default() -> Self {
        SubstitutionRules {
            anchor: "Том".to_owned(),
            part_token: "Название части".to_owned(),
            section_token: "Название раздела".to_owned(),
            word_limit: 12,
            anchor_blank_lines: 4,
            section_blank_lines: 2,
        }
    }
}

/// Ordered token → value mapping of one document; `None` marks an absent value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Replacements {
    entries: Vec<(String, Option<String>)>,
}

impl Replacements {
    pub fn new() -> Self {
        Replacements::default()
    }

    /// Sets the value of `token`, replacing an earlier one.
    pub fn insert<T: Into<String>>(&mut self, token: T, value: Option<String>) -> &mut Self {
        let token = token.into();
        match self.entries.iter_mut().find(|(key, _)| *key == token) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((token, value)),
        }
        self
    }

    pub fn with<T: Into<String>>(mut self, token: T, value: Option<String>) -> Self {
        self.insert(token, value);
        self
    }

    /// `None` when the token is unknown, `Some(None)` when it is absent.
    pub fn get(&self, token: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(key, _)| key == token)
            .map(|(_, value)| value.as_deref())
    }

    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(token, value)| value.as_deref().map(|value| (token.as_str(), value)))
    }

    pub fn absent(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(token, _)| token.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> Result<(), SubstitutionError> {
        if self.entries.iter().any(|(token, _)| token.is_empty()) {
            return Err(SubstitutionError::EmptyToken);
        }
        for (token, value) in self.present() {
            if let Some(character) = value.chars().find(|character| !is_xml_char(*character)) {
                return Err(SubstitutionError::InvalidCharacter {
                    token: token.to_owned(),
                    code: character as u32,
                });
            }
        }
        Ok(())
    }

    fn words(&self, token: &str) -> usize {
        self.get(token).flatten().map(word_count).unwrap_or(0)
    }
}

/// XML 1.0 `Char` production.
fn is_xml_char(character: char) -> bool {
    matches!(character, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Whitespace separated word count.
pub fn word_count(value: &str) -> usize {
    value.split_whitespace().count()
}

/// Changes made to one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubstitutionOutcome {
    pub removed_paragraphs: usize,
    pub rewritten_paragraphs: usize,
    pub blank_paragraphs: usize,
}

struct Rewrite<'t> {
    text: String,
    tokens: Vec<&'t str>,
}

/// Combined scanner over a fixed set of tokens.
struct TokenMatcher {
    regex: Regex,
    values: HashMap<String, String>,
}

impl TokenMatcher {
    /// `None` when there is nothing to look for.
    fn new<'a, I>(pairs: I) -> Result<Option<TokenMatcher>, RustyCoverError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values: HashMap<String, String> = pairs
            .into_iter()
            .map(|(token, value)| (token.to_owned(), value.to_owned()))
            .collect();
        if values.is_empty() {
            return Ok(None);
        }
        let mut tokens: Vec<&str> = values.keys().map(String::as_str).collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = tokens.iter().map(|token| regex::escape(token)).collect::<Vec<_>>().join("|");
        Ok(Some(TokenMatcher {
            regex: Regex::new(&pattern)?,
            values,
        }))
    }

    fn rewrite<'t>(&self, text: &'t str) -> Option<Rewrite<'t>> {
        let mut output = String::with_capacity(text.len());
        let mut tokens = Vec::new();
        let mut last = 0;
        for found in self.regex.find_iter(text) {
            output.push_str(&text[last..found.start()]);
            output.push_str(self.values.get(found.as_str()).map(String::as_str).unwrap_or(found.as_str()));
            tokens.push(found.as_str());
            last = found.end();
        }
        if tokens.is_empty() {
            return None;
        }
        output.push_str(&text[last..]);
        Some(Rewrite { text: output, tokens })
    }
}

/// Rewrites every run of `id`; returns the tokens found in the paragraph.
fn rewrite_paragraph(document: &mut TemplateDocument, id: ParagraphId, matcher: &TokenMatcher) -> Vec<String> {
    let mut found = Vec::new();
    if let Some(paragraph) = document.paragraph_mut(id) {
        for run in paragraph.runs_mut() {
            let text = run.text();
            if let Some(rewrite) = matcher.rewrite(&text) {
                found.extend(rewrite.tokens.iter().map(|token| token.to_string()));
                run.set_text(&rewrite.text);
            }
        }
    }
    found
}

/// Applies `replacements` to `document` with the procedure of `stage`.
pub fn substitute(
    document: &mut TemplateDocument,
    stage: Stage,
    replacements: &Replacements,
    rules: &SubstitutionRules,
) -> Result<SubstitutionOutcome, RustyCoverError> {
    match stage {
        Stage::Project => substitute_project(document, replacements, rules),
        Stage::Working => substitute_working(document, replacements, rules),
    }
}

/// Project procedure: paragraphs mentioning an absent token are removed,
/// present tokens are substituted, and anchor paragraphs may get blank lines
/// when something was removed.
pub fn substitute_project(
    document: &mut TemplateDocument,
    replacements: &Replacements,
    rules: &SubstitutionRules,
) -> Result<SubstitutionOutcome, RustyCoverError> {
    replacements.validate()?;
    let allow_blank_lines = replacements.words(&rules.part_token) <= rules.word_limit;
    let matcher = TokenMatcher::new(replacements.present())?;
    let absent: Vec<&str> = replacements.absent().collect();

    let anchors: Vec<ParagraphId> = document
        .paragraphs()
        .filter(|paragraph| paragraph.runs().any(|run| run.text().contains(rules.anchor.as_str())))
        .map(|paragraph| paragraph.id())
        .collect();

    let mut outcome = SubstitutionOutcome::default();
    let mut removed = Vec::new();
    for id in document.paragraph_ids().into_iter().rev() {
        let text = document
            .paragraphs()
            .find(|paragraph| paragraph.id() == id)
            .map(|paragraph| paragraph.text())
            .unwrap_or_default();
        if absent.iter().any(|token| text.contains(token)) {
            document.remove_paragraph(id)?;
            removed.push(id);
            continue;
        }
        if let Some(matcher) = &matcher {
            let found = rewrite_paragraph(document, id, matcher);
            if !found.is_empty() {
                outcome.rewritten_paragraphs += 1;
            }
        }
    }
    outcome.removed_paragraphs = removed.len();

    let survivors: Vec<ParagraphId> = anchors.into_iter().filter(|id| !removed.contains(id)).collect();
    if allow_blank_lines && !removed.is_empty() && !survivors.is_empty() {
        for id in survivors {
            document.insert_blank_paragraphs_after(id, rules.anchor_blank_lines)?;
            outcome.blank_paragraphs += rules.anchor_blank_lines;
        }
    }
    debug!(
        removed = outcome.removed_paragraphs,
        blank = outcome.blank_paragraphs,
        "project substitution"
    );
    Ok(outcome)
}

/// Working procedure: every token is substituted, absent values as empty
/// text; paragraphs that carried the section token may get blank lines.
pub fn substitute_working(
    document: &mut TemplateDocument,
    replacements: &Replacements,
    rules: &SubstitutionRules,
) -> Result<SubstitutionOutcome, RustyCoverError> {
    replacements.validate()?;
    let allow_blank_lines = replacements.words(&rules.section_token) <= rules.word_limit;
    let pairs = replacements
        .entries
        .iter()
        .map(|(token, value)| (token.as_str(), value.as_deref().unwrap_or_default()));
    let Some(matcher) = TokenMatcher::new(pairs)? else {
        return Ok(SubstitutionOutcome::default());
    };

    let mut outcome = SubstitutionOutcome::default();
    let mut marked = Vec::new();
    for id in document.paragraph_ids().into_iter().rev() {
        let found = rewrite_paragraph(document, id, &matcher);
        if !found.is_empty() {
            outcome.rewritten_paragraphs += 1;
        }
        if found.iter().any(|token| *token == rules.section_token) {
            marked.push(id);
        }
    }

    if allow_blank_lines {
        for id in marked {
            document.insert_blank_paragraphs_after(id, rules.section_blank_lines)?;
            outcome.blank_paragraphs += rules.section_blank_lines;
        }
    }
    debug!(
        rewritten = outcome.rewritten_paragraphs,
        blank = outcome.blank_paragraphs,
        "working substitution"
    );
    Ok(outcome)
}
