//! Construction of readers over files, URIs, streams and strings.

use std::fs::{self, File};
use std::io::{BufReader, Chain, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
#[cfg(feature = "async")]
use tokio::io::AsyncRead;

use crate::errors::{Error, Result};
use crate::reader::settings::DEFAULT_BUFFER_SIZE;
use crate::reader::{ParserContext, ReaderSettings, XmlTextReader};

/// Streams longer than this get a larger buffer
const LARGE_STREAM: u64 = 64 * 1024;
const LARGE_BUFFER_SIZE: usize = 8192;

/// First bytes of a document in the legacy binary XML format.
const BINARY_XML_SIGNATURE: [u8; 2] = [0xDF, 0xFF];

/// Buffer size for a stream with `len` bytes left.
pub(crate) fn buffer_size_for(len: u64) -> usize {
    if len < DEFAULT_BUFFER_SIZE as u64 {
        (len as usize).max(1)
    } else if len > LARGE_STREAM {
        LARGE_BUFFER_SIZE
    } else {
        DEFAULT_BUFFER_SIZE
    }
}

fn text_reader<R>(
    input: R,
    settings: ReaderSettings,
    context: ParserContext,
    base_uri: Option<&str>,
) -> XmlTextReader<R> {
    let has_base_uri = context.base_uri.is_some();
    let mut reader = XmlTextReader::with_context(input, settings, context);
    if let (false, Some(uri)) = (has_base_uri, base_uri) {
        reader.set_base_uri(uri);
    }
    reader
}

/// Entry point for creating readers.
///
/// Every constructor takes the [`ReaderSettings`] to read with and has a
/// `_with_context` variant that also takes a [`ParserContext`], for reading
/// fragments that were cut out of a larger document.
///
/// # Examples
///
/// ```
/// use xml_cursor::read::XmlRead;
/// use xml_cursor::reader::{ReaderSettings, XmlReader};
///
/// let xml = r#"<order><line sku="a-1" qty="2"/><line sku="b-7" qty="1"/></order>"#;
/// let mut reader = XmlReader::create_from_str(xml, ReaderSettings::new());
/// let mut skus = Vec::new();
/// while reader.read_to_following("line").unwrap() {
///     skus.push(reader.get_attribute("sku").unwrap().to_string());
/// }
/// assert_eq!(skus, ["a-1", "b-7"]);
/// ```
#[derive(Debug)]
pub struct XmlReader;

impl XmlReader {
    /// Opens the file at `path`. The base URI is the `file://` URI of the
    /// file.
    pub fn create_from_path<P: AsRef<Path>>(
        path: P,
        settings: ReaderSettings,
    ) -> Result<XmlTextReader<BufReader<File>>> {
        Self::create_from_path_with_context(path, settings, ParserContext::default())
    }

    /// Like [`create_from_path`](Self::create_from_path), inside `context`.
    pub fn create_from_path_with_context<P: AsRef<Path>>(
        path: P,
        settings: ReaderSettings,
        context: ParserContext,
    ) -> Result<XmlTextReader<BufReader<File>>> {
        let path = fs::canonicalize(path)?;
        let file = File::open(&path)?;
        let size = match settings.get_buffer_size() {
            Some(size) => size,
            None => buffer_size_for(file.metadata()?.len()),
        };
        debug!("reading `{}` with a {} byte buffer", path.display(), size);
        let uri = format!("file://{}", path.display());
        Ok(text_reader(
            BufReader::with_capacity(size, file),
            settings,
            context,
            Some(&uri),
        ))
    }

    /// Opens the document at `uri`. Only `file:` URIs and plain paths are
    /// supported.
    pub fn create_from_uri(
        uri: &str,
        settings: ReaderSettings,
    ) -> Result<XmlTextReader<BufReader<File>>> {
        Self::create_from_uri_with_context(uri, settings, ParserContext::default())
    }

    /// Like [`create_from_uri`](Self::create_from_uri), inside `context`.
    pub fn create_from_uri_with_context(
        uri: &str,
        settings: ReaderSettings,
        context: ParserContext,
    ) -> Result<XmlTextReader<BufReader<File>>> {
        let path = if let Some(path) = uri.strip_prefix("file://") {
            path
        } else if let Some(path) = uri.strip_prefix("file:") {
            path
        } else if uri.contains("://") {
            return Err(Error::NotSupported("only file URIs can be opened"));
        } else {
            uri
        };
        let mut reader = Self::create_from_path_with_context(path, settings, context)?;
        if uri.starts_with("file:") {
            reader.set_base_uri(uri);
        }
        Ok(reader)
    }

    /// Reads from `input` with the default buffer size, unless the settings
    /// force one.
    pub fn create_from_reader<R: Read>(
        input: R,
        settings: ReaderSettings,
    ) -> XmlTextReader<BufReader<R>> {
        Self::create_from_reader_with_context(input, settings, ParserContext::default())
    }

    /// Like [`create_from_reader`](Self::create_from_reader), inside `context`.
    pub fn create_from_reader_with_context<R: Read>(
        input: R,
        settings: ReaderSettings,
        context: ParserContext,
    ) -> XmlTextReader<BufReader<R>> {
        let size = settings.get_buffer_size().unwrap_or(DEFAULT_BUFFER_SIZE);
        text_reader(BufReader::with_capacity(size, input), settings, context, None)
    }

    /// Reads from a seekable `input`, sizing the buffer from the number of
    /// bytes left in the stream.
    pub fn create_from_seekable<R: Read + Seek>(
        input: R,
        settings: ReaderSettings,
    ) -> Result<XmlTextReader<BufReader<R>>> {
        Self::create_from_seekable_with_context(input, settings, ParserContext::default())
    }

    /// Like [`create_from_seekable`](Self::create_from_seekable), inside
    /// `context`.
    pub fn create_from_seekable_with_context<R: Read + Seek>(
        mut input: R,
        settings: ReaderSettings,
        context: ParserContext,
    ) -> Result<XmlTextReader<BufReader<R>>> {
        let size = match settings.get_buffer_size() {
            Some(size) => size,
            None => {
                let start = input.stream_position()?;
                let end = input.seek(SeekFrom::End(0))?;
                input.seek(SeekFrom::Start(start))?;
                let left = end.saturating_sub(start);
                let size = buffer_size_for(left);
                debug!("{} bytes left in the stream, using a {} byte buffer", left, size);
                size
            }
        };
        Ok(text_reader(
            BufReader::with_capacity(size, input),
            settings,
            context,
            None,
        ))
    }

    /// Reads directly from a string.
    pub fn create_from_str(text: &str, settings: ReaderSettings) -> XmlTextReader<&[u8]> {
        Self::create_from_str_with_context(text, settings, ParserContext::default())
    }

    /// Like [`create_from_str`](Self::create_from_str), inside `context`.
    pub fn create_from_str_with_context(
        text: &str,
        settings: ReaderSettings,
        context: ParserContext,
    ) -> XmlTextReader<&[u8]> {
        text_reader(text.as_bytes(), settings, context, None)
    }

    /// Reads from `input` after checking whether it holds binary XML.
    ///
    /// Binary XML is not supported and fails with [`Error::NotSupported`].
    /// Any other input is read as text, starting from its first byte.
    pub fn create_binary_aware<R: Read>(
        mut input: R,
        settings: ReaderSettings,
    ) -> Result<XmlTextReader<BufReader<Chain<Cursor<Vec<u8>>, R>>>> {
        let mut head = Vec::with_capacity(BINARY_XML_SIGNATURE.len());
        input
            .by_ref()
            .take(BINARY_XML_SIGNATURE.len() as u64)
            .read_to_end(&mut head)?;
        if head == BINARY_XML_SIGNATURE {
            debug!("binary XML signature found");
            return Err(Error::NotSupported("binary XML"));
        }
        let size = settings.get_buffer_size().unwrap_or(DEFAULT_BUFFER_SIZE);
        let input = BufReader::with_capacity(size, Cursor::new(head).chain(input));
        Ok(text_reader(input, settings, ParserContext::default(), None))
    }

    /// Reads from a tokio `input`. Drive the reader with
    /// [`XmlTextReader::read_async`].
    #[cfg(feature = "async")]
    pub fn create_async<R: AsyncRead + Unpin + Send>(
        input: R,
        settings: ReaderSettings,
    ) -> XmlTextReader<tokio::io::BufReader<R>> {
        let size = settings.get_buffer_size().unwrap_or(DEFAULT_BUFFER_SIZE);
        text_reader(
            tokio::io::BufReader::with_capacity(size, input),
            settings,
            ParserContext::default(),
            None,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeType;
    use crate::read::XmlRead;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn buffer_sizes() {
        assert_eq!(buffer_size_for(0), 1);
        assert_eq!(buffer_size_for(100), 100);
        assert_eq!(buffer_size_for(4096), 4096);
        assert_eq!(buffer_size_for(64 * 1024), 4096);
        assert_eq!(buffer_size_for(64 * 1024 + 1), 8192);
    }

    #[test]
    fn from_str() {
        let mut reader = XmlReader::create_from_str("<a>x</a>", ReaderSettings::new());
        assert!(reader.read_element_content_as_string().is_err());
        let mut reader = XmlReader::create_from_str("<a>x</a>", ReaderSettings::new());
        reader.read().unwrap();
        assert_eq!(reader.read_element_content_as_string().unwrap(), "x");
    }

    #[test]
    fn from_seekable_keeps_the_position() {
        let mut input = Cursor::new(b"junk<a/>".to_vec());
        input.set_position(4);
        let mut reader = XmlReader::create_from_seekable(input, ReaderSettings::new()).unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.name().as_str(), "a");
    }

    #[test]
    fn binary_xml_is_not_supported() {
        let input: &[u8] = &[0xDF, 0xFF, 0x01, 0x00];
        assert!(matches!(
            XmlReader::create_binary_aware(input, ReaderSettings::new()),
            Err(Error::NotSupported(_))
        ));

        let mut reader =
            XmlReader::create_binary_aware("<a/>".as_bytes(), ReaderSettings::new()).unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.node_type(), NodeType::Element);
    }

    /// Hands out one byte per read
    struct OneByte<'a>(&'a [u8]);

    impl Read for OneByte<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn binary_xml_signature_in_short_reads() {
        let input = OneByte(&[0xDF, 0xFF, 0x01, 0x00]);
        assert!(matches!(
            XmlReader::create_binary_aware(input, ReaderSettings::new()),
            Err(Error::NotSupported(_))
        ));

        let mut reader =
            XmlReader::create_binary_aware(OneByte(b"<a/>\n"), ReaderSettings::new()).unwrap();
        assert!(reader.read().unwrap());
        assert_eq!(reader.name().as_str(), "a");
        assert!(reader.read().unwrap());
        assert_eq!(reader.node_type(), NodeType::Whitespace);
        assert!(!reader.read().unwrap());
    }

    #[test]
    fn only_file_uris() {
        assert!(matches!(
            XmlReader::create_from_uri("http://example.com/a.xml", ReaderSettings::new()),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn context_base_uri_wins() {
        let context = ParserContext::new().base_uri("urn:doc");
        let reader = XmlReader::create_from_reader_with_context(
            "<a/>".as_bytes(),
            ReaderSettings::new(),
            context,
        );
        assert_eq!(reader.base_uri(), "urn:doc");
    }
}
