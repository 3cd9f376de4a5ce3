//! Turns the raw markup found by an [`XmlSource`](super::xml_source::XmlSource)
//! into [`Event`]s and keeps track of the tokenizer state between calls.

use std::str::from_utf8;

#[cfg(feature = "encoding")]
use encoding_rs::UTF_8;

use crate::errors::{Error, IllFormedError, Result};
use crate::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use crate::reader::{is_whitespace, BangType, Position, TagState};

#[cfg(feature = "encoding")]
use super::EncodingRef;

/// Tokenizer state shared by the synchronous and asynchronous read paths.
#[derive(Clone, Debug)]
pub(crate) struct Parser {
    /// current position, useful for reporting errors
    pub(super) position: Position,
    /// position where the last returned event starts
    pub(super) event_start: Position,
    /// current state Open/Close
    pub(super) tag_state: TagState,
    /// check if comments contains `--`
    check_comments: bool,
    /// All currently Started elements which didn't have a matching
    /// End element yet.
    ///
    /// For an XML
    ///
    /// ```xml
    /// <root><one/><inner attr="value">|<tag></inner></root>
    /// ```
    /// when cursor at the `|` position buffer contains:
    ///
    /// ```text
    /// rootinner
    /// ^   ^
    /// ```
    ///
    /// The `^` symbols shows which positions stored in the [`Self::opened_starts`]
    /// (0 and 4 in that case).
    opened_buffer: Vec<u8>,
    /// Opened name start indexes into [`Self::opened_buffer`]. See documentation
    /// for that field for details
    opened_starts: Vec<usize>,

    #[cfg(feature = "encoding")]
    /// Reference to the encoding used to read an XML
    pub(super) encoding: EncodingRef,
}

impl Parser {
    pub(crate) fn new(check_comments: bool) -> Self {
        Self {
            position: Position::default(),
            event_start: Position::default(),
            tag_state: TagState::Init,
            check_comments,
            opened_buffer: Vec::new(),
            opened_starts: Vec::new(),

            #[cfg(feature = "encoding")]
            encoding: EncodingRef::Implicit(UTF_8),
        }
    }

    /// Number of start tags without a matching end tag so far.
    #[inline]
    pub(crate) fn open_elements(&self) -> usize {
        self.opened_starts.len()
    }

    /// Names of the elements still open, outermost first.
    pub(crate) fn open_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.opened_starts.len());
        for (i, &start) in self.opened_starts.iter().enumerate() {
            let end = self
                .opened_starts
                .get(i + 1)
                .copied()
                .unwrap_or_else(|| self.opened_buffer.len());
            names.push(String::from_utf8_lossy(&self.opened_buffer[start..end]).into_owned());
        }
        names
    }

    /// reads `BytesElement` starting with a `!`,
    /// return `Comment`, `CData` or `DocType` event
    pub(super) fn read_bang<'b>(&mut self, bang_type: BangType, buf: &'b [u8]) -> Result<Event<'b>> {
        let uncased_starts_with = |string: &[u8], prefix: &[u8]| {
            string.len() >= prefix.len() && string[..prefix.len()].eq_ignore_ascii_case(prefix)
        };

        let len = buf.len();
        match bang_type {
            BangType::Comment if buf.starts_with(b"!--") => {
                if self.check_comments {
                    // search if '--' not in comments
                    if memchr::memchr_iter(b'-', &buf[3..len - 2])
                        .any(|p| buf[3 + p + 1] == b'-')
                    {
                        return Err(Error::ill_formed(IllFormedError::UnexpectedToken(
                            "--".to_string(),
                        )));
                    }
                }
                Ok(Event::Comment(BytesText::from_escaped(&buf[3..len - 2])))
            }
            // CDATA keyword is case-sensitive
            BangType::CData if buf.starts_with(b"![CDATA[") => {
                Ok(Event::CData(BytesCData::new(&buf[8..])))
            }
            BangType::DocType if uncased_starts_with(buf, b"!DOCTYPE") => {
                let start = buf[8..]
                    .iter()
                    .position(|b| !is_whitespace(*b))
                    .unwrap_or_else(|| len - 8);
                if start == 0 || start >= len - 8 {
                    // no whitespace after the keyword, or no name at all
                    return Err(Error::ill_formed(IllFormedError::UnexpectedToken(
                        "DOCTYPE".to_string(),
                    )));
                }
                Ok(Event::DocType(BytesText::from_escaped(&buf[8 + start..])))
            }
            _ => Err(bang_type.to_err()),
        }
    }

    /// reads `BytesElement` starting with a `/`,
    /// checks that element matches last opened element
    /// return `End` event
    pub(super) fn read_end<'b>(&mut self, buf: &'b [u8]) -> Result<Event<'b>> {
        // XML standard permits whitespaces after the markup name in closing tags.
        // Let's strip them from the buffer before comparing tag names.
        let name = match buf[1..].iter().rposition(|&b| !is_whitespace(b)) {
            Some(pos_end_name) => &buf[1..pos_end_name + 2],
            None => &buf[1..],
        };
        let mismatch_err = |expected: &[u8], found: &[u8]| {
            Err(Error::ill_formed(IllFormedError::EndEventMismatch {
                expected: from_utf8(expected).unwrap_or("").to_owned(),
                found: from_utf8(found).unwrap_or("").to_owned(),
            }))
        };
        match self.opened_starts.pop() {
            Some(start) => {
                let expected = &self.opened_buffer[start..];
                if name != expected {
                    mismatch_err(expected, name)
                } else {
                    self.opened_buffer.truncate(start);
                    Ok(Event::End(BytesEnd::borrowed(name)))
                }
            }
            None => mismatch_err(b"", name),
        }
    }

    /// reads `BytesElement` starting with a `?`,
    /// return `Decl` or `PI` event
    pub(super) fn read_question_mark<'b>(&mut self, buf: &'b [u8]) -> Result<Event<'b>> {
        let len = buf.len();
        if len > 2 && buf[len - 1] == b'?' {
            if len > 5 && &buf[1..4] == b"xml" && is_whitespace(buf[4]) {
                let event = BytesDecl::from_start(BytesStart::borrowed(&buf[1..len - 1], 3));

                // Try getting encoding from the declaration event
                #[cfg(feature = "encoding")]
                if self.encoding.can_be_refined() {
                    if let Some(encoding) = event.encoder() {
                        self.encoding = EncodingRef::XmlDetected(encoding);
                    }
                }

                Ok(Event::Decl(event))
            } else {
                Ok(Event::PI(BytesText::from_escaped(&buf[1..len - 1])))
            }
        } else {
            Err(Error::ill_formed(IllFormedError::UnexpectedEof(
                "XmlDecl".to_string(),
            )))
        }
    }

    /// reads `BytesElement` starting with any character except `/`, `!` or ``?`
    /// return `Start` or `Empty` event
    pub(super) fn read_start<'b>(&mut self, buf: &'b [u8]) -> Result<Event<'b>> {
        let len = buf.len();
        let name_end = buf.iter().position(|&b| is_whitespace(b)).unwrap_or(len);
        if let Some(&b'/') = buf.last() {
            let end = if name_end < len { name_end } else { len - 1 };
            Ok(Event::Empty(BytesStart::borrowed(&buf[..len - 1], end)))
        } else {
            let buf_len = self.opened_buffer.len();
            self.opened_starts.push(buf_len);
            self.opened_buffer.extend(&buf[..name_end]);
            Ok(Event::Start(BytesStart::borrowed(buf, name_end)))
        }
    }
}
