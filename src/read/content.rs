//! Content accumulation and the element content protocol.

use std::sync::Arc;

use base64::Engine;
use log::trace;

use crate::errors::{ConversionError, Error, Result};
use crate::node::{can_read_content_as, is_textual_node, NodeType, ReadState};
use crate::read::convert::LexicalError;
use crate::read::XmlRead;

/// Concatenates the values of consecutive content nodes, starting at the
/// current node.
///
/// Text, CDATA and whitespace are appended; comments, processing
/// instructions and entity ends are skipped; entity references are resolved
/// when the reader can resolve them. Stops on the first node of any other
/// kind, which is left as the current node. On an attribute the attribute
/// value is returned as is.
pub(crate) fn read_content_string<R: XmlRead + ?Sized>(reader: &mut R) -> Result<String> {
    let mut value = String::new();
    loop {
        match reader.node_type() {
            NodeType::Attribute => return Ok(reader.value().to_string()),
            NodeType::Text
            | NodeType::Whitespace
            | NodeType::SignificantWhitespace
            | NodeType::CData => {
                if value.is_empty() {
                    value = reader.value().to_string();
                } else {
                    value.push_str(reader.value());
                }
            }
            NodeType::ProcessingInstruction | NodeType::Comment | NodeType::EndEntity => {}
            NodeType::EntityReference if reader.can_resolve_entity() => reader.resolve_entity()?,
            _ => break,
        }
        // inside an attribute value the sub-nodes are walked instead
        let more = if reader.attribute_count() != 0 {
            reader.read_attribute_value()
        } else {
            reader.read()?
        };
        if !more {
            break;
        }
    }
    Ok(value)
}

/// Fails unless the current node is one content reads may start on.
pub(crate) fn check_content_as<R: XmlRead + ?Sized>(reader: &R, method: &str) -> Result<()> {
    if can_read_content_as(reader.node_type()) {
        Ok(())
    } else {
        Err(Error::invalid_node(method, reader.node_type()))
    }
}

/// Reads content and converts it, attaching the position of the first
/// content node to conversion errors.
pub(crate) fn read_content_typed<R, T>(
    reader: &mut R,
    method: &str,
    convert: impl FnOnce(String) -> Result<T>,
) -> Result<T>
where
    R: XmlRead + ?Sized,
{
    check_content_as(reader, method)?;
    let at = reader.position();
    let text = read_content_string(reader)?;
    convert(text).map_err(|e| e.with_position(at))
}

/// Fails unless the current node is an element named `local_name` in
/// `namespace_uri`.
pub(crate) fn check_element_ns<R: XmlRead + ?Sized>(
    reader: &R,
    method: &str,
    local_name: &str,
    namespace_uri: &str,
) -> Result<()> {
    if reader.node_type() != NodeType::Element {
        return Err(Error::invalid_node(method, reader.node_type()));
    }
    if &**reader.local_name() != local_name || &**reader.namespace_uri() != namespace_uri {
        return Err(element_not_found_ns(local_name, namespace_uri));
    }
    Ok(())
}

pub(crate) fn element_not_found(name: &str) -> Error {
    Error::InvalidOperation(format!("element `{}` was not found", name))
}

pub(crate) fn element_not_found_ns(local_name: &str, namespace_uri: &str) -> Error {
    Error::InvalidOperation(format!(
        "element `{}` in namespace `{}` was not found",
        local_name, namespace_uri
    ))
}

/// Moves from an element start tag onto its content.
///
/// Returns `false` when the element has no content, in which case the
/// reader is already past the element.
pub(crate) fn setup_element_content<R: XmlRead + ?Sized>(
    reader: &mut R,
    method: &str,
) -> Result<bool> {
    if reader.node_type() != NodeType::Element {
        return Err(Error::invalid_node(method, reader.node_type()));
    }
    let empty = reader.is_empty_element();
    reader.read()?;
    if empty {
        return Ok(false);
    }
    match reader.node_type() {
        NodeType::EndElement => {
            reader.read()?;
            Ok(false)
        }
        NodeType::Element => Err(Error::InvalidOperation(format!(
            "the {} method cannot be called on an element with child elements",
            method
        ))),
        _ => Ok(true),
    }
}

/// Moves past the end tag that must follow the content.
pub(crate) fn finish_element_content<R: XmlRead + ?Sized>(reader: &mut R) -> Result<()> {
    if reader.node_type() != NodeType::EndElement {
        return Err(Error::InvalidOperation(format!(
            "unexpected node {:?} in element content, an end tag was expected",
            reader.node_type()
        )));
    }
    reader.read()?;
    Ok(())
}

/// Element content protocol: start tag, typed content, end tag.
pub(crate) fn read_element_content_typed<R, T>(
    reader: &mut R,
    method: &str,
    empty: impl FnOnce() -> T,
    convert: impl FnOnce(String) -> Result<T>,
) -> Result<T>
where
    R: XmlRead + ?Sized,
{
    if !setup_element_content(reader, method)? {
        return Ok(empty());
    }
    let value = read_content_typed(reader, method, convert)?;
    finish_element_content(reader)?;
    Ok(value)
}

/// Legacy text read: the current text node, or the text content of the
/// current element, up to the first non-text node.
pub(crate) fn read_string<R: XmlRead + ?Sized>(reader: &mut R) -> Result<String> {
    if reader.read_state() != ReadState::Interactive {
        return Ok(String::new());
    }
    reader.move_to_element();
    if reader.node_type() == NodeType::Element {
        if reader.is_empty_element() {
            return Ok(String::new());
        }
        if !reader.read()? {
            return Err(Error::InvalidOperation(
                "the input ended inside an element".to_string(),
            ));
        }
        if reader.node_type() == NodeType::EndElement {
            return Ok(String::new());
        }
    }
    let mut result = String::new();
    while is_textual_node(reader.node_type()) {
        result.push_str(reader.value());
        if !reader.read()? {
            break;
        }
    }
    Ok(result)
}

/// Text-only element read. The current node must already be checked to be
/// an element.
pub(crate) fn read_element_string<R: XmlRead + ?Sized>(reader: &mut R) -> Result<String> {
    if reader.is_empty_element() {
        reader.read()?;
        return Ok(String::new());
    }
    reader.read()?;
    let result = read_string(reader)?;
    if reader.node_type() != NodeType::EndElement {
        return Err(Error::InvalidOperation(format!(
            "unexpected node {:?} in simple content",
            reader.node_type()
        )));
    }
    reader.read()?;
    Ok(result)
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Text encoding of binary content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryEncoding {
    Base64,
    BinHex,
}

impl BinaryEncoding {
    fn decode(self, text: &str) -> Result<Vec<u8>> {
        let compact: Vec<u8> = text
            .bytes()
            .filter(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
            .collect();
        match self {
            BinaryEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(&compact)
                .map_err(|e| binary_error("base64", text, e)),
            BinaryEncoding::BinHex => decode_bin_hex(&compact)
                .map_err(|e| binary_error("binHex", text, e)),
        }
    }
}

fn binary_error<E>(type_name: &'static str, text: &str, source: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Conversion(ConversionError {
        type_name,
        value: text.to_string(),
        source: Arc::new(source),
        position: None,
    })
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_bin_hex(hex: &[u8]) -> std::result::Result<Vec<u8>, LexicalError> {
    if hex.len() % 2 != 0 {
        return Err(LexicalError::new("odd number of hexadecimal digits"));
    }
    hex.chunks(2)
        .map(|pair| match (hex_digit(pair[0]), hex_digit(pair[1])) {
            (Some(hi), Some(lo)) => Ok(hi << 4 | lo),
            _ => Err(LexicalError::new("invalid hexadecimal digit")),
        })
        .collect()
}

/// Decoded binary content not yet handed out to the caller.
#[derive(Clone, Debug, Default)]
pub(crate) struct BinaryBuffer {
    data: Vec<u8>,
    pos: usize,
    active: bool,
    /// started by an element read, which must also consume the end tag
    element: bool,
}

impl BinaryBuffer {
    fn start(&mut self, data: Vec<u8>, element: bool) {
        trace!("decoded {} bytes of binary content", data.len());
        self.data = data;
        self.pos = 0;
        self.active = true;
        self.element = element;
    }

    fn copy_to(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Decodes the content starting at the current node and hands it out in
/// chunks. Returns `0` once everything was delivered.
pub(crate) fn read_content_binary<R: XmlRead + ?Sized>(
    reader: &mut R,
    state: &mut BinaryBuffer,
    buf: &mut [u8],
    encoding: BinaryEncoding,
    method: &str,
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    if !state.active {
        check_content_as(reader, method)?;
        let at = reader.position();
        let text = read_content_string(reader)?;
        let data = encoding.decode(&text).map_err(|e| e.with_position(at))?;
        state.start(data, false);
    }
    let n = state.copy_to(buf);
    if n == 0 {
        state.reset();
    }
    Ok(n)
}

/// Like [`read_content_binary`], starting on an element; the end tag is
/// consumed together with the last chunk.
pub(crate) fn read_element_content_binary<R: XmlRead + ?Sized>(
    reader: &mut R,
    state: &mut BinaryBuffer,
    buf: &mut [u8],
    encoding: BinaryEncoding,
    method: &str,
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    if !state.active {
        if !setup_element_content(reader, method)? {
            return Ok(0);
        }
        let at = reader.position();
        let text = read_content_string(reader)?;
        let data = encoding.decode(&text).map_err(|e| e.with_position(at))?;
        if reader.node_type() != NodeType::EndElement {
            return Err(Error::InvalidOperation(format!(
                "unexpected node {:?} in binary content",
                reader.node_type()
            )));
        }
        state.start(data, true);
    }
    let n = state.copy_to(buf);
    if n == 0 {
        let element = state.element;
        state.reset();
        if element {
            finish_element_content(reader)?;
        }
    }
    Ok(n)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bin_hex() {
        assert_eq!(decode_bin_hex(b"00fFA1").unwrap(), vec![0x00, 0xFF, 0xA1]);
        assert!(decode_bin_hex(b"abc").is_err());
        assert!(decode_bin_hex(b"zz").is_err());
    }

    #[test]
    fn base64_ignores_whitespace() {
        assert_eq!(
            BinaryEncoding::Base64.decode(" aGVs\n bG8= ").unwrap(),
            b"hello".to_vec()
        );
        assert!(matches!(
            BinaryEncoding::Base64.decode("a"),
            Err(Error::Conversion(_))
        ));
    }

    #[test]
    fn buffer_hands_out_chunks() {
        let mut state = BinaryBuffer::default();
        state.start(b"abcde".to_vec(), false);
        let mut buf = [0u8; 2];
        assert_eq!(state.copy_to(&mut buf), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(state.copy_to(&mut buf), 2);
        assert_eq!(state.copy_to(&mut buf), 1);
        assert_eq!(buf[0], b'e');
        assert_eq!(state.copy_to(&mut buf), 0);
    }
}
