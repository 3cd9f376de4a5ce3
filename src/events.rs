//! Raw markup tokens produced by the low-level [`Reader`](crate::reader::Reader).
//!
//! Tokens borrow their content from the buffer the reader filled and hold it
//! undecoded and unescaped; [`XmlTextReader`](crate::reader::XmlTextReader)
//! turns them into nodes.

pub mod attributes;

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

#[cfg(feature = "encoding")]
use encoding_rs::Encoding;

use self::attributes::Attributes;
use crate::errors::Result;
use crate::reader::is_whitespace;

/// Opening tag data (`Event::Start`), with optional attributes.
///
/// `<name attr="value">`.
#[derive(Clone, Eq, PartialEq)]
pub struct BytesStart<'a> {
    /// content of the element, before any utf8 conversion
    buf: Cow<'a, [u8]>,
    /// end of the element name, the name starts at that the start of `buf`
    name_len: usize,
}

impl<'a> BytesStart<'a> {
    /// Creates a new `BytesStart` from the given content (name + attributes).
    #[inline]
    pub fn borrowed(content: &'a [u8], name_len: usize) -> Self {
        BytesStart {
            buf: Cow::Borrowed(content),
            name_len,
        }
    }

    /// Creates a new `BytesStart` from the given name, without attributes.
    #[inline]
    pub fn borrowed_name(name: &'a [u8]) -> Self {
        Self::borrowed(name, name.len())
    }

    /// Converts the event into an owned event.
    pub fn into_owned(self) -> BytesStart<'static> {
        BytesStart {
            buf: Cow::Owned(self.buf.into_owned()),
            name_len: self.name_len,
        }
    }

    /// Gets the undecoded raw tag name, as present in the input stream.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.buf[..self.name_len]
    }

    /// Returns an iterator over the attributes of this tag.
    pub fn attributes(&self) -> Attributes {
        Attributes::new(&self.buf, self.name_len)
    }

    /// Gets the undecoded raw string with the attributes of this tag.
    #[inline]
    pub fn attributes_raw(&self) -> &[u8] {
        &self.buf[self.name_len..]
    }
}

impl<'a> fmt::Debug for BytesStart<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BytesStart {{ buf: ")?;
        write_cow_string(f, &self.buf)?;
        write!(f, ", name_len: {} }}", self.name_len)
    }
}

impl<'a> Deref for BytesStart<'a> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

/// An XML declaration (`Event::Decl`).
///
/// [W3C XML 1.1 Prolog and Document Type Declaration](http://w3.org/TR/xml11/#sec-prolog-dtd)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BytesDecl<'a> {
    element: BytesStart<'a>,
}

impl<'a> BytesDecl<'a> {
    /// Creates a `BytesDecl` from a `BytesStart` whose name is `xml`.
    pub fn from_start(start: BytesStart<'a>) -> Self {
        Self { element: start }
    }

    /// Returns the pseudo-attributes of the declaration as a `BytesStart`.
    #[inline]
    pub fn as_start(&self) -> &BytesStart<'a> {
        &self.element
    }

    /// Content after `xml`, with leading whitespace removed.
    pub fn content(&self) -> &[u8] {
        let raw = self.element.attributes_raw();
        let start = raw
            .iter()
            .position(|&b| !is_whitespace(b))
            .unwrap_or_else(|| raw.len());
        &raw[start..]
    }

    /// Gets the value of a pseudo-attribute, undecoded and unescaped.
    fn pseudo(&self, key: &[u8]) -> Result<Option<Cow<[u8]>>> {
        for a in self.element.attributes() {
            let a = a?;
            if a.key == key {
                return Ok(Some(Cow::Borrowed(a.value)));
            }
        }
        Ok(None)
    }

    /// Gets the `version` pseudo-attribute.
    pub fn version(&self) -> Result<Option<Cow<[u8]>>> {
        self.pseudo(b"version")
    }

    /// Gets the `encoding` pseudo-attribute.
    pub fn encoding(&self) -> Result<Option<Cow<[u8]>>> {
        self.pseudo(b"encoding")
    }

    /// Gets the `standalone` pseudo-attribute.
    pub fn standalone(&self) -> Result<Option<Cow<[u8]>>> {
        self.pseudo(b"standalone")
    }

    /// Gets the decoder struct
    #[cfg(feature = "encoding")]
    pub fn encoder(&self) -> Option<&'static Encoding> {
        self.encoding()
            .ok()
            .flatten()
            .and_then(|e| Encoding::for_label(&e))
    }
}

/// A struct to manage `Event::End` events
#[derive(Clone, Eq, PartialEq)]
pub struct BytesEnd<'a> {
    name: Cow<'a, [u8]>,
}

impl<'a> BytesEnd<'a> {
    /// Creates a new `BytesEnd` borrowing a slice
    #[inline]
    pub fn borrowed(name: &'a [u8]) -> BytesEnd<'a> {
        BytesEnd {
            name: Cow::Borrowed(name),
        }
    }

    /// Gets the undecoded raw qualified name, as present in the input stream.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.name
    }
}

impl<'a> fmt::Debug for BytesEnd<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BytesEnd {{ name: ")?;
        write_cow_string(f, &self.name)?;
        write!(f, " }}")
    }
}

/// Data from various events (most notably, `Event::Text`) that stored in XML
/// in escaped form. Internally data is stored in escaped form
#[derive(Clone, Eq, PartialEq)]
pub struct BytesText<'a> {
    // Invariant: The content is always escaped.
    content: Cow<'a, [u8]>,
}

impl<'a> BytesText<'a> {
    /// Creates a new `BytesText` from an escaped byte sequence.
    #[inline]
    pub fn from_escaped(content: &'a [u8]) -> Self {
        Self {
            content: Cow::Borrowed(content),
        }
    }

    /// Gets the escaped content.
    #[inline]
    pub fn escaped(&self) -> &[u8] {
        &self.content
    }
}

impl<'a> fmt::Debug for BytesText<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BytesText {{ content: ")?;
        write_cow_string(f, &self.content)?;
        write!(f, " }}")
    }
}

/// CDATA content contains unescaped data from the reader.
#[derive(Clone, Eq, PartialEq)]
pub struct BytesCData<'a> {
    content: Cow<'a, [u8]>,
}

impl<'a> BytesCData<'a> {
    /// Creates a new `BytesCData` from a byte sequence.
    #[inline]
    pub fn new(content: &'a [u8]) -> Self {
        Self {
            content: Cow::Borrowed(content),
        }
    }

    /// Creates a new `BytesCData` from a string
    #[inline]
    pub fn from_str(content: &'a str) -> Self {
        Self::new(content.as_bytes())
    }

    /// Gets the raw content.
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl<'a> fmt::Debug for BytesCData<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BytesCData {{ content: ")?;
        write_cow_string(f, &self.content)?;
        write!(f, " }}")
    }
}

/// Event emitted by [`Reader::read_event_into`].
///
/// [`Reader::read_event_into`]: crate::reader::Reader::read_event_into
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event<'a> {
    /// Text that appeared before the first opening tag or an [XML declaration].
    /// It may contain a byte order mark.
    ///
    /// [XML declaration]: Event::Decl
    StartText(BytesText<'a>),
    /// Start tag (with attributes) `<tag attr="value">`.
    Start(BytesStart<'a>),
    /// End tag `</tag>`.
    End(BytesEnd<'a>),
    /// Empty element tag (with attributes) `<tag attr="value" />`.
    Empty(BytesStart<'a>),
    /// Character data between `Start` and `End` element.
    Text(BytesText<'a>),
    /// Comment `<!-- ... -->`.
    Comment(BytesText<'a>),
    /// CData `<![CDATA[...]]>`.
    CData(BytesCData<'a>),
    /// XML declaration `<?xml ...?>`.
    Decl(BytesDecl<'a>),
    /// Processing instruction `<?...?>`.
    PI(BytesText<'a>),
    /// Doctype `<!DOCTYPE ...>`.
    DocType(BytesText<'a>),
    /// End of XML document.
    Eof,
}

fn write_cow_string(f: &mut fmt::Formatter, bytes: &[u8]) -> fmt::Result {
    match std::str::from_utf8(bytes) {
        Ok(s) => write!(f, "{:?}", s),
        Err(_) => write!(f, "{:?}", bytes),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn start_name_and_attributes() {
        let start = BytesStart::borrowed(br#"tag a="1" b='2'"#, 3);
        assert_eq!(start.name(), b"tag");
        assert_eq!(start.attributes_raw(), br#" a="1" b='2'"#);
        let keys: Vec<_> = start.attributes().map(|a| a.unwrap().key).collect();
        assert_eq!(keys, vec![b"a".as_ref(), b"b".as_ref()]);
    }

    #[test]
    fn declaration() {
        let decl = BytesDecl::from_start(BytesStart::borrowed(
            br#"xml version="1.0" standalone='yes'"#,
            3,
        ));
        assert_eq!(decl.version().unwrap().as_deref(), Some(b"1.0".as_ref()));
        assert_eq!(decl.encoding().unwrap(), None);
        assert_eq!(decl.standalone().unwrap().as_deref(), Some(b"yes".as_ref()));
        assert_eq!(decl.content(), br#"version="1.0" standalone='yes'"#);
    }
}
