//! Readers: the low-level [`Reader`] tokenizer, the node-level
//! [`XmlTextReader`], the [`SubtreeReader`] view and the [`XmlReader`] factory.

#[cfg(feature = "async")]
mod azync;
mod dtd;
mod factory;
pub(crate) mod parser;
mod settings;
mod subtree;
mod text;
mod xml_source;

use std::borrow::Cow;
use std::io::BufRead;
#[cfg(not(feature = "encoding"))]
use std::str::from_utf8;

#[cfg(feature = "encoding")]
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
#[cfg(feature = "async")]
use tokio::io::AsyncBufRead;

use crate::errors::{Error, IllFormedError, Result, TextPosition};
use crate::events::{BytesText, Event};

use self::parser::Parser;
use self::xml_source::XmlSource;

pub use self::factory::XmlReader;
pub use self::settings::{
    ConformanceLevel, DtdProcessing, EntityHandling, ParserContext, ReaderSettings,
};
pub use self::subtree::SubtreeReader;
pub use self::text::XmlTextReader;

/// Possible reader states. The state transition diagram:
///
/// ```mermaid
/// flowchart LR
///   Init   -- "(no event)"\nStartText                              --> Opened
///   Opened -- Decl, DocType, PI\nComment, CData\nStart, Empty, End --> Closed
///   Closed -- "(no event)"\nText                                   --> Opened
///   Closed -- "Text up to the end of input"                          --> Exit
///   _ -. Eof .-> Exit
/// ```
#[derive(Clone, Copy, Debug)]
pub(crate) enum TagState {
    /// Initial state in which reader stay after creation. Transition from that
    /// state could produce a `StartText`, `Decl`, `Comment` or `Start` event.
    /// The next state is `Opened`. The reader will never return to this
    /// state. The event emitted during transition to `Opened` is a `StartEvent`
    /// if the first symbol not `<`, otherwise no event are emitted. Input
    /// without any markup moves straight to `Exit`.
    Init,
    /// State after seeing the `<` symbol. Depending on the next symbol all other
    /// events (except `StartText`) could be generated.
    ///
    /// After generating ane event the reader moves to the `Closed` state.
    Opened,
    /// State in which reader searches the `<` symbol of a markup. All bytes before
    /// that symbol will be returned in the [`Event::Text`] event. After that
    /// the reader moves to the `Opened` state.
    Closed,
    /// Reader enters this state when `Eof` event generated or an error occurred.
    /// This is the last state, the reader stay in it forever.
    Exit,
}

impl TagState {
    /// State after a text event: `Opened` if the text ended at a `<`,
    /// `Exit` if it ran to the end of input.
    #[inline]
    fn after_text(found_open: bool) -> Self {
        if found_open {
            Self::Opened
        } else {
            Self::Exit
        }
    }
}

/// Encoding of the input and where it was learned from.
///
/// An implicit UTF-8 may be replaced by the encoding a byte order mark
/// implies, and either of those by the one the XML declaration names. The
/// declaration is final.
#[cfg(feature = "encoding")]
#[derive(Clone, Copy, Debug)]
pub enum EncodingRef {
    /// Assumed, nothing in the input named an encoding yet
    Implicit(&'static Encoding),
    /// Implied by a byte order mark or by the first bytes of the document
    BomDetected(&'static Encoding),
    /// Named by `<?xml encoding=...?>`
    XmlDetected(&'static Encoding),
}

#[cfg(feature = "encoding")]
impl EncodingRef {
    #[inline]
    fn encoding(&self) -> &'static Encoding {
        match *self {
            Self::Implicit(e) | Self::BomDetected(e) | Self::XmlDetected(e) => e,
        }
    }

    #[inline]
    fn can_be_refined(&self) -> bool {
        !matches!(self, Self::XmlDetected(_))
    }
}

/// Byte offset in the input together with the line it falls on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Position {
    offset: usize,
    /// Number of `\n` seen so far
    line: usize,
    /// Offset of the first byte of the current line
    line_start: usize,
}

impl Position {
    /// Moves past `bytes`, counting line feeds.
    #[inline]
    pub(crate) fn advance(&mut self, bytes: &[u8]) {
        for i in memchr::memchr_iter(b'\n', bytes) {
            self.line += 1;
            self.line_start = self.offset + i + 1;
        }
        self.offset += bytes.len();
    }

    /// Position `n` bytes back, stopping at the start of the current line.
    #[inline]
    fn back(self, n: usize) -> Self {
        Self {
            offset: self.offset.saturating_sub(n).max(self.line_start),
            ..self
        }
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// 1-based line and column.
    pub(crate) fn text_position(&self) -> TextPosition {
        TextPosition {
            line: self.line + 1,
            column: self.offset - self.line_start + 1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A low level encoding-agnostic XML event reader.
///
/// Consumes bytes and streams raw XML [`Event`]s. It checks that start and
/// end tags pair up, but knows nothing about namespaces, entities or the
/// document structure; [`XmlTextReader`] builds on it for that.
///
/// # Examples
///
/// ```
/// use xml_cursor::reader::Reader;
/// use xml_cursor::events::Event;
///
/// let xml = r#"<tag1 att1 = "test">
///                 <tag2><!--Test comment-->Test</tag2>
///                 <tag2>Test 2</tag2>
///             </tag1>"#;
/// let mut reader = Reader::from_reader(xml.as_bytes());
/// let mut count = 0;
/// let mut buf = Vec::new();
/// loop {
///     match reader.read_event_into(&mut buf) {
///         Ok(Event::Start(ref e)) if e.name() == b"tag2" => count += 1,
///         Err(e) => panic!("Error at position {}: {:?}", reader.buffer_position(), e),
///         Ok(Event::Eof) => break,
///         _ => (),
///     }
///     buf.clear();
/// }
/// assert_eq!(count, 2);
/// ```
#[derive(Clone)]
pub struct Reader<R> {
    /// reader
    reader: R,
    /// tokenizer state
    parser: Parser,
}

impl<R> Reader<R> {
    /// Creates a `Reader` that reads from a given reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            parser: Parser::new(false),
        }
    }

    /// Creates a `Reader` that fails on `--` inside comments when
    /// `check_comments` is set.
    pub(crate) fn with_check_comments(reader: R, check_comments: bool) -> Self {
        Self {
            reader,
            parser: Parser::new(check_comments),
        }
    }
}

/// Getters
impl<R> Reader<R> {
    /// Get the encoding used to decode XML.
    #[cfg(feature = "encoding")]
    pub fn encoding(&self) -> EncodingRef {
        self.parser.encoding
    }

    /// Get the decoder, used to decode bytes, read by this reader, to the strings.
    ///
    /// If `encoding` feature is enabled, the used encoding may change after
    /// parsing the XML declaration, otherwise encoding is fixed to UTF-8.
    ///
    /// If `encoding` feature is enabled and no encoding is specified in declaration,
    /// defaults to UTF-8.
    #[inline]
    pub fn decoder(&self) -> Decoder {
        Decoder {
            #[cfg(feature = "encoding")]
            encoding: self.parser.encoding.encoding(),
        }
    }

    /// Consumes `Reader` returning the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Gets a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Gets the current byte position in the input data.
    ///
    /// Useful when debugging errors.
    pub fn buffer_position(&self) -> usize {
        // when internal state is Opened, we have actually read until '<',
        // which we don't want to show
        if let TagState::Opened = self.parser.tag_state {
            self.parser.position.offset() - 1
        } else {
            self.parser.position.offset()
        }
    }

    /// Line and column where the last returned event starts.
    pub fn event_position(&self) -> TextPosition {
        self.parser.event_start.text_position()
    }

    /// Number of start tags read so far without a matching end tag.
    #[inline]
    pub fn open_elements(&self) -> usize {
        self.parser.open_elements()
    }

    /// Error for an input that ended inside an element, if it did.
    pub(crate) fn unclosed_error(&self) -> Option<Error> {
        if self.parser.open_elements() == 0 {
            return None;
        }
        Some(
            Error::ill_formed(IllFormedError::UnclosedElements(self.parser.open_names()))
                .with_position(Some(self.parser.position.text_position())),
        )
    }
}

/// Read methods
impl<R: BufRead> Reader<R> {
    /// Reads the next `Event`.
    ///
    /// This is the main entry point for reading XML `Event`s.
    ///
    /// `Event`s borrow `buf`. Clear the buffer between calls to reuse its
    /// allocation.
    #[inline]
    pub fn read_event_into<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>> {
        self.read_event_impl(buf)
    }
}

#[cfg(feature = "async")]
/// Async read methods
impl<R: AsyncBufRead + Unpin + Send> Reader<R> {
    /// Reads the next `Event` asynchronously.
    ///
    /// Async equivalent of [`Reader::read_event_into`].
    #[inline]
    pub async fn read_event_into_async<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>>
    where
        R: 'b,
    {
        self.read_event_impl_async(buf).await
    }
}

/// Private methods for reading synchronously
impl<R> Reader<R> {
    /// Remembers where the event about to be read starts.
    #[inline]
    fn mark_event_start(&mut self) {
        self.parser.event_start = match self.parser.tag_state {
            // `<` is already consumed
            TagState::Opened => self.parser.position.back(1),
            _ => self.parser.position,
        };
    }

    /// Attaches the event start position to tokenizer errors.
    #[inline]
    fn locate<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| e.with_position(Some(self.parser.event_start.text_position())))
    }

    /// Builds the text event for bytes found before a `<`, detecting the
    /// encoding from the first bytes of the document.
    fn text_event<'i>(&mut self, bytes: &'i [u8], first: bool) -> Event<'i> {
        #[cfg(feature = "encoding")]
        if first && self.parser.encoding.can_be_refined() {
            if let Some(encoding) = detect_encoding(bytes) {
                self.parser.encoding = EncodingRef::BomDetected(encoding);
            }
        }

        if first {
            Event::StartText(BytesText::from_escaped(bytes))
        } else {
            Event::Text(BytesText::from_escaped(bytes))
        }
    }

    /// Read text into the given buffer, and return an event that borrows from
    /// that buffer.
    fn read_event_impl<'i>(&mut self, buf: &'i mut Vec<u8>) -> Result<Event<'i>>
    where
        R: XmlSource,
    {
        self.mark_event_start();
        let event = match self.parser.tag_state {
            TagState::Init => self.read_until_open(buf, true),
            TagState::Closed => self.read_until_open(buf, false),
            TagState::Opened => self.read_until_close(buf),
            TagState::Exit => return Ok(Event::Eof),
        };
        match event {
            Err(_) | Ok(Event::Eof) => self.parser.tag_state = TagState::Exit,
            _ => {}
        }
        self.locate(event)
    }

    /// Reads the text before the next `<`, moving to the `Opened` state once
    /// the `<` is consumed. Text that runs to the end of input is the last
    /// event before `Eof`.
    ///
    /// The first text of the document is reported as `StartText`. No event
    /// is made for empty text; the markup that follows is read instead.
    fn read_until_open<'i>(&mut self, buf: &'i mut Vec<u8>, first: bool) -> Result<Event<'i>>
    where
        R: XmlSource,
    {
        if self.reader.skip_one(b'<', &mut self.parser.position)? {
            self.parser.tag_state = TagState::Opened;
            return self.read_event_impl(buf);
        }
        match self
            .reader
            .read_bytes_until(b'<', buf, &mut self.parser.position)?
        {
            Some((bytes, found)) => {
                self.parser.tag_state = TagState::after_text(found);
                Ok(self.text_event(bytes, first))
            }
            None => Ok(Event::Eof),
        }
    }

    /// Reads the markup after a `<`, moving to the `Closed` state.
    fn read_until_close<'i>(&mut self, buf: &'i mut Vec<u8>) -> Result<Event<'i>>
    where
        R: XmlSource,
    {
        self.parser.tag_state = TagState::Closed;

        let position = &mut self.parser.position;
        match self.reader.peek_one()? {
            // comment, CDATA or DOCTYPE
            Some(b'!') => match self.reader.read_bang_element(buf, position)? {
                Some((bang_type, bytes)) => self.parser.read_bang(bang_type, bytes),
                None => Ok(Event::Eof),
            },
            Some(b'/') => match self.reader.read_bytes_until(b'>', buf, position)? {
                Some((bytes, true)) => self.parser.read_end(bytes),
                _ => Err(unclosed("Element")),
            },
            // declaration or processing instruction
            Some(b'?') => match self.reader.read_bytes_until(b'>', buf, position)? {
                Some((bytes, true)) => self.parser.read_question_mark(bytes),
                _ => Err(unclosed("XmlDecl")),
            },
            Some(_) => match self.reader.read_element(buf, position)? {
                Some(bytes) => self.parser.read_start(bytes),
                None => Ok(Event::Eof),
            },
            // `<` at the very end of input
            None => Err(unclosed("Element")),
        }
    }
}

#[cfg(feature = "async")]
/// Private methods for reading asynchronously
impl<R: AsyncBufRead + Unpin + Send> Reader<R> {
    #[async_recursion::async_recursion]
    async fn read_event_impl_async<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>>
    where
        R: 'b,
    {
        self.mark_event_start();
        let event = match self.parser.tag_state {
            TagState::Init => self.read_until_open_async(buf, true).await,
            TagState::Closed => self.read_until_open_async(buf, false).await,
            TagState::Opened => self.read_until_close_async(buf).await,
            TagState::Exit => return Ok(Event::Eof),
        };
        match event {
            Err(_) | Ok(Event::Eof) => self.parser.tag_state = TagState::Exit,
            _ => {}
        }
        self.locate(event)
    }

    /// See [`Self::read_until_open`].
    async fn read_until_open_async<'b>(
        &mut self,
        buf: &'b mut Vec<u8>,
        first: bool,
    ) -> Result<Event<'b>>
    where
        R: 'b,
    {
        if azync::skip_one(&mut self.reader, b'<', &mut self.parser.position).await? {
            self.parser.tag_state = TagState::Opened;
            return self.read_event_impl_async(buf).await;
        }
        match azync::read_bytes_until(&mut self.reader, b'<', buf, &mut self.parser.position)
            .await?
        {
            Some((bytes, found)) => {
                self.parser.tag_state = TagState::after_text(found);
                Ok(self.text_event(bytes, first))
            }
            None => Ok(Event::Eof),
        }
    }

    /// See [`Self::read_until_close`].
    async fn read_until_close_async<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>>
    where
        R: 'b,
    {
        self.parser.tag_state = TagState::Closed;

        let position = &mut self.parser.position;
        match azync::peek_one(&mut self.reader).await? {
            Some(b'!') => match azync::read_bang_element(&mut self.reader, buf, position).await? {
                Some((bang_type, bytes)) => self.parser.read_bang(bang_type, bytes),
                None => Ok(Event::Eof),
            },
            Some(b'/') => match azync::read_bytes_until(&mut self.reader, b'>', buf, position)
                .await?
            {
                Some((bytes, true)) => self.parser.read_end(bytes),
                _ => Err(unclosed("Element")),
            },
            Some(b'?') => match azync::read_bytes_until(&mut self.reader, b'>', buf, position)
                .await?
            {
                Some((bytes, true)) => self.parser.read_question_mark(bytes),
                _ => Err(unclosed("XmlDecl")),
            },
            Some(_) => match azync::read_element(&mut self.reader, buf, position).await? {
                Some(bytes) => self.parser.read_start(bytes),
                None => Ok(Event::Eof),
            },
            None => Err(unclosed("Element")),
        }
    }
}

/// Possible elements started with `<!`
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BangType {
    /// <![CDATA[...]]>
    CData,
    /// <!--...-->
    Comment,
    /// <!DOCTYPE...>
    DocType,
}
impl BangType {
    #[inline(always)]
    fn new(byte: Option<u8>) -> Result<Self> {
        Ok(match byte {
            Some(b'[') => Self::CData,
            Some(b'-') => Self::Comment,
            Some(b'D') | Some(b'd') => Self::DocType,
            Some(b) => return Err(Error::ill_formed(IllFormedError::UnexpectedBang(b))),
            None => {
                return Err(Error::ill_formed(IllFormedError::UnexpectedEof(
                    "Bang".to_string(),
                )))
            }
        })
    }

    #[inline]
    fn to_err(self) -> Error {
        let bang_str = match self {
            Self::CData => "CData",
            Self::Comment => "Comment",
            Self::DocType => "DOCTYPE",
        };
        Error::ill_formed(IllFormedError::UnexpectedEof(bang_str.to_string()))
    }
}

/// Input ended inside the markup `what`.
#[inline]
fn unclosed(what: &str) -> Error {
    Error::ill_formed(IllFormedError::UnexpectedEof(what.to_string()))
}

/// A function to check whether the byte is a whitespace (blank, new line, carriage return or tab)
#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Decoder of byte slices to the strings. This is lightweight object that can be copied.
///
/// If feature `encoding` is enabled, this encoding taken from the `"encoding"`
/// XML declaration or assumes UTF-8, if XML has no <?xml ?> declaration, encoding
/// key is not defined or contains unknown encoding.
///
/// If feature `encoding` is disabled, the decoder is always UTF-8 decoder:
/// any XML declarations are ignored.
#[derive(Clone, Copy, Debug)]
pub struct Decoder {
    #[cfg(feature = "encoding")]
    encoding: &'static Encoding,
}

#[cfg(not(feature = "encoding"))]
impl Decoder {
    /// Decodes a UTF8 slice regardless of XML declaration.
    ///
    /// Returns an error in case of malformed sequences in the `bytes`.
    #[inline]
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        Ok(Cow::Borrowed(from_utf8(bytes)?))
    }

    /// Decodes a slice regardless of XML declaration with BOM removal if
    /// it is present in the `bytes`.
    pub fn decode_with_bom_removal<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        let bytes = if bytes.starts_with(b"\xEF\xBB\xBF") {
            &bytes[3..]
        } else {
            bytes
        };
        self.decode(bytes)
    }
}

#[cfg(feature = "encoding")]
impl Decoder {
    /// Returns the `Reader`s encoding.
    ///
    /// This encoding will be used by [`decode`].
    ///
    /// [`decode`]: Self::decode
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decodes specified bytes using encoding, declared in the XML, if it was
    /// declared there, or UTF-8 otherwise.
    ///
    /// Returns an error in case of malformed sequences in the `bytes`.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
        {
            None => Err(Error::NonDecodable(None)),
            Some(s) => Ok(s),
        }
    }

    /// Decodes a slice with BOM removal if it is present in the `bytes` using
    /// the reader encoding.
    pub fn decode_with_bom_removal<'b>(&self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        self.decode(self.remove_bom(bytes))
    }
    /// Strips the byte order mark of the reader encoding.
    #[inline]
    fn remove_bom<'b>(&self, bytes: &'b [u8]) -> &'b [u8] {
        if self.encoding == UTF_8 && bytes.starts_with(b"\xEF\xBB\xBF") {
            return &bytes[3..];
        }
        if self.encoding == UTF_16LE && bytes.starts_with(b"\xFF\xFE") {
            return &bytes[2..];
        }
        if self.encoding == UTF_16BE && bytes.starts_with(b"\xFE\xFF") {
            return &bytes[2..];
        }

        bytes
    }
}

/// Automatic encoding detection of XML files based using the [recommended algorithm]
/// (https://www.w3.org/TR/xml11/#sec-guessing)
///
/// Only the encodings [`encoding_rs`] supports are detected, which is UTF-8,
/// UTF-16 BE and UTF-16 LE.
#[cfg(feature = "encoding")]
fn detect_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    match bytes {
        // with BOM
        _ if bytes.starts_with(&[0xFE, 0xFF]) => Some(UTF_16BE),
        _ if bytes.starts_with(&[0xFF, 0xFE]) => Some(UTF_16LE),
        _ if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) => Some(UTF_8),

        // without BOM
        _ if bytes.starts_with(&[0x00, b'<', 0x00, b'?']) => Some(UTF_16BE), // Some BE encoding, for example, UTF-16 or ISO-10646-UCS-2
        _ if bytes.starts_with(&[b'<', 0x00, b'?', 0x00]) => Some(UTF_16LE), // Some LE encoding, for example, UTF-16 or ISO-10646-UCS-2
        _ if bytes.starts_with(&[b'<', b'?', b'x', b'm']) => Some(UTF_8), // Some ASCII compatible

        _ => None,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    mod read_bytes_until {
        use crate::reader::{Position, XmlSource};
        use pretty_assertions::assert_eq;

        /// Checks that search in the empty buffer returns `None`
        #[test]
        fn empty() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"".as_ref();

            assert_eq!(
                input
                    .read_bytes_until(b'*', &mut buf, &mut position)
                    .unwrap(),
                None
            );
            assert_eq!(position.offset(), 0);
        }

        /// Checks that search in the buffer an element that is located in the middle of
        /// buffer returns slice before that symbol as a result and set `position` to one
        /// symbol after match
        #[test]
        fn inside() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"abc*def".as_ref();
            //                    ^= 4

            assert_eq!(
                input
                    .read_bytes_until(b'*', &mut buf, &mut position)
                    .unwrap(),
                Some((b"abc".as_ref(), true))
            );
            assert_eq!(position.offset(), 4); // position after the symbol matched
        }

        /// Bytes up to the end of input are returned without the delimiter
        #[test]
        fn until_end_of_input() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"abc\n".as_ref();

            assert_eq!(
                input
                    .read_bytes_until(b'*', &mut buf, &mut position)
                    .unwrap(),
                Some((b"abc\n".as_ref(), false))
            );
            assert_eq!(position.offset(), 4);
        }

        /// Line feeds inside the consumed bytes move the line counter
        #[test]
        fn counts_lines() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"a\nbc\nd*ef".as_ref();

            input
                .read_bytes_until(b'*', &mut buf, &mut position)
                .unwrap();
            let at = position.text_position();
            assert_eq!((at.line, at.column), (3, 3));
        }
    }

    mod read_bang_element {
        use crate::errors::{Error, IllFormedError};
        use crate::reader::{BangType, Position, XmlSource};
        use pretty_assertions::assert_eq;

        /// Checks that if CDATA startup sequence was matched, but an end sequence
        /// is not found, parsing ends with an error
        #[test]
        fn cdata_not_closed() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"![CDATA[other content".as_ref();

            match input.read_bang_element(&mut buf, &mut position) {
                Err(Error::IllFormed {
                    error: IllFormedError::UnexpectedEof(s),
                    ..
                }) if s == "CData" => {}
                x => panic!(
                    r#"Expected `UnexpectedEof("CData")`, but result is: {:?}"#,
                    x
                ),
            }
            assert_eq!(position.offset(), 0);
        }

        /// Checks that CDATA element with content parsed successfully.
        /// Additionally checks that sequences inside CDATA that may look like
        /// a CDATA end sequence do not interrupt CDATA parsing
        #[test]
        fn cdata_with_content() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"![CDATA[cdata]] ]>content]]>other content]]>".as_ref();
            //                                            ^= 28

            assert_eq!(
                input.read_bang_element(&mut buf, &mut position).unwrap(),
                Some((BangType::CData, b"![CDATA[cdata]] ]>content".as_ref()))
            );
            assert_eq!(position.offset(), 28);
        }

        /// Comment that is not closed with `-->` is an error
        #[test]
        fn comment_not_closed() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"!- -->other".as_ref();

            // `!-` is accepted here, the `--` prefix is checked by the parser
            assert_eq!(
                input.read_bang_element(&mut buf, &mut position).unwrap(),
                Some((BangType::Comment, b"!- --".as_ref()))
            );

            let mut input = b"!----".as_ref();
            assert!(input.read_bang_element(&mut buf, &mut position).is_err());
        }

        #[test]
        fn doctype_with_internal_subset() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"!DOCTYPE r [<!ENTITY e 'v'>]>rest".as_ref();

            assert_eq!(
                input.read_bang_element(&mut buf, &mut position).unwrap(),
                Some((BangType::DocType, b"!DOCTYPE r [<!ENTITY e 'v'>]".as_ref()))
            );
            assert_eq!(input, b"rest");
        }
    }

    mod read_element {
        use crate::errors::Error;
        use crate::reader::{Position, XmlSource};
        use pretty_assertions::assert_eq;

        /// Checks that nothing was read from empty buffer
        #[test]
        fn empty() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = b"".as_ref();

            assert_eq!(input.read_element(&mut buf, &mut position).unwrap(), None);
            assert_eq!(position.offset(), 0);
        }

        #[test]
        fn with_attributes() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = br#"tag  attr-1=">"  attr2  =  '>'  3attr>"#.as_ref();

            assert_eq!(
                input.read_element(&mut buf, &mut position).unwrap(),
                Some(br#"tag  attr-1=">"  attr2  =  '>'  3attr"#.as_ref())
            );
            assert_eq!(position.offset(), 38);
        }

        #[test]
        fn not_closed() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = br#"tag attr=">"#.as_ref();

            assert!(matches!(
                input.read_element(&mut buf, &mut position),
                Err(Error::IllFormed { .. })
            ));
            assert_eq!(position.offset(), 0);
        }
    }

    /// Terminators split between two chunks of input
    mod small_chunks {
        use crate::events::{BytesCData, BytesText, Event};
        use crate::reader::{BangType, Position, Reader, XmlSource};
        use pretty_assertions::assert_eq;
        use std::io::BufReader;

        #[test]
        fn comment() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = BufReader::with_capacity(1, b"!-- a - b -->".as_ref());

            assert_eq!(
                input.read_bang_element(&mut buf, &mut position).unwrap(),
                Some((BangType::Comment, b"!-- a - b --".as_ref()))
            );
            assert_eq!(position.offset(), 13);
        }

        #[test]
        fn tag_with_quoted_gt() {
            let mut buf = Vec::new();
            let mut position = Position::default();
            let mut input = BufReader::with_capacity(2, br#"a x='>' y=">">tail"#.as_ref());

            assert_eq!(
                input.read_element(&mut buf, &mut position).unwrap(),
                Some(br#"a x='>' y=">""#.as_ref())
            );
        }

        #[test]
        fn events() {
            let input = BufReader::with_capacity(
                1,
                b"<r><!--c--><![CDATA[]]]]>t</r>".as_ref(),
            );
            let mut reader = Reader::from_reader(input);
            let mut buf = Vec::new();
            let mut count = 0;
            loop {
                match reader.read_event_into(&mut buf).unwrap() {
                    Event::Eof => break,
                    Event::Comment(e) => assert_eq!(e, BytesText::from_escaped(b"c".as_ref())),
                    Event::CData(e) => assert_eq!(e, BytesCData::from_str("]]")),
                    _ => {}
                }
                count += 1;
                buf.clear();
            }
            assert_eq!(count, 5);
        }
    }

    /// Ensures, that no empty `Text` events are generated
    mod read_event_impl {
        use crate::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
        use crate::reader::Reader;
        use pretty_assertions::assert_eq;

        #[test]
        fn start_text() {
            let mut reader = Reader::from_reader(b"bom".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::StartText(BytesText::from_escaped(b"bom".as_ref()))
            );
        }

        #[test]
        fn declaration() {
            let mut reader = Reader::from_reader(b"<?xml ?>".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Decl(BytesDecl::from_start(BytesStart::borrowed(b"xml ", 3)))
            );
        }

        #[test]
        fn doctype() {
            let mut reader = Reader::from_reader(b"<!DOCTYPE x>".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::DocType(BytesText::from_escaped(b"x".as_ref()))
            );
        }

        #[test]
        fn processing_instruction() {
            let mut reader = Reader::from_reader(b"<?xml-stylesheet?>".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::PI(BytesText::from_escaped(b"xml-stylesheet".as_ref()))
            );
        }

        #[test]
        fn start_and_end() {
            let mut reader = Reader::from_reader(b"<tag></tag>".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Start(BytesStart::borrowed_name(b"tag"))
            );
            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::End(BytesEnd::borrowed(b"tag"))
            );
        }

        #[test]
        fn unpaired_end_is_an_error() {
            let mut reader = Reader::from_reader(b"</tag>".as_ref());

            assert!(reader.read_event_impl(&mut Vec::new()).is_err());
            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Eof
            );
        }

        /// Text event cannot be generated without preceding event of another type
        #[test]
        fn text() {
            let mut reader = Reader::from_reader(b"<tag/>text".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Empty(BytesStart::borrowed_name(b"tag"))
            );

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Text(BytesText::from_escaped(b"text".as_ref()))
            );
        }

        #[test]
        fn cdata() {
            let mut reader = Reader::from_reader(b"<![CDATA[]]>".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::CData(BytesCData::from_str(""))
            );
        }

        #[test]
        fn comment() {
            let mut reader = Reader::from_reader(b"<!---->".as_ref());

            assert_eq!(
                reader.read_event_impl(&mut Vec::new()).unwrap(),
                Event::Comment(BytesText::from_escaped(b"".as_ref()))
            );
        }

        #[test]
        fn eof() {
            let mut reader = Reader::from_reader(b"".as_ref());

            assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
        }

        /// Text running to the end of input is followed by `Eof`
        #[test]
        fn trailing_text() {
            let inputs: [&[u8]; 4] = [b"<a/>\n", b"<a/>\r\n", b"<a/> ", b"<a/>x"];
            for xml in &inputs {
                let mut reader = Reader::from_reader(*xml);

                assert_eq!(
                    reader.read_event_impl(&mut Vec::new()).unwrap(),
                    Event::Empty(BytesStart::borrowed_name(b"a"))
                );
                assert_eq!(
                    reader.read_event_impl(&mut Vec::new()).unwrap(),
                    Event::Text(BytesText::from_escaped(&xml[4..]))
                );
                assert_eq!(reader.event_position().column, 5);
                assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
                assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
            }
        }

        /// The position of the end of input after a line feed is the start
        /// of the next line
        #[test]
        fn eof_after_line_feed() {
            let mut reader = Reader::from_reader(b"<a/>\r\n".as_ref());
            let mut buf = Vec::new();

            while reader.read_event_impl(&mut buf).unwrap() != Event::Eof {
                buf.clear();
            }
            let at = reader.event_position();
            assert_eq!((at.line, at.column), (2, 1));
        }

        #[test]
        fn lone_open_bracket_is_an_error() {
            let mut reader = Reader::from_reader(b"<a/>x<".as_ref());

            reader.read_event_impl(&mut Vec::new()).unwrap();
            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert!(reader.read_event_impl(&mut Vec::new()).is_err());
        }

        #[test]
        fn unclosed_end_tag_is_an_error() {
            let mut reader = Reader::from_reader(b"<a></a".as_ref());

            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert!(reader.read_event_impl(&mut Vec::new()).is_err());
            assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
        }

        #[test]
        fn event_position() {
            let mut reader = Reader::from_reader(b"<a>\n  <b/>\n</a>".as_ref());
            let mut buf = Vec::new();

            reader.read_event_impl(&mut buf).unwrap();
            let at = reader.event_position();
            assert_eq!((at.line, at.column), (1, 1));
            buf.clear();
            // whitespace text
            reader.read_event_impl(&mut buf).unwrap();
            let at = reader.event_position();
            assert_eq!((at.line, at.column), (1, 4));
            buf.clear();
            reader.read_event_impl(&mut buf).unwrap();
            let at = reader.event_position();
            assert_eq!((at.line, at.column), (2, 3));
        }
    }

    #[cfg(feature = "encoding")]
    mod encoding {
        use crate::events::Event;
        use crate::reader::Reader;
        use encoding_rs::{UTF_16LE, UTF_8, WINDOWS_1251};
        use pretty_assertions::assert_eq;

        /// Checks that encoding is detected by BOM and changed after XML declaration
        #[test]
        fn bom_detected() {
            let mut reader =
                Reader::from_reader(b"\xFF\xFE<?xml encoding='windows-1251'?>".as_ref());

            assert_eq!(reader.decoder().encoding(), UTF_8);
            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert_eq!(reader.decoder().encoding(), UTF_16LE);

            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert_eq!(reader.decoder().encoding(), WINDOWS_1251);

            assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
        }

        /// Checks that encoding is changed by XML declaration, but only once
        #[test]
        fn xml_declaration() {
            let mut reader = Reader::from_reader(
                b"<?xml encoding='UTF-16'?><?xml encoding='windows-1251'?>".as_ref(),
            );

            assert_eq!(reader.decoder().encoding(), UTF_8);
            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert_eq!(reader.decoder().encoding(), UTF_16LE);

            reader.read_event_impl(&mut Vec::new()).unwrap();
            assert_eq!(reader.decoder().encoding(), UTF_16LE);

            assert_eq!(reader.read_event_impl(&mut Vec::new()).unwrap(), Event::Eof);
        }
    }
}
