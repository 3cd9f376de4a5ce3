//! Asynchronous counterparts of the [`XmlSource`](super::xml_source::XmlSource)
//! methods, for tokio inputs.
//!
//! Constructs are found with the same [`Scan`]s the synchronous input uses,
//! so both produce identical byte sequences.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::errors::{Error, Result};

use super::xml_source::{BangEnd, Scan, TagEnd, Until};
use super::{BangType, Position};

/// See [`XmlSource::read_construct`](super::xml_source::XmlSource::read_construct).
async fn read_construct<R, S>(
    input: &mut R,
    scan: &mut S,
    buf: &mut Vec<u8>,
    start: usize,
    position: &mut Position,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
    S: Scan,
{
    let mut local = *position;
    let mut any = buf.len() > start;
    loop {
        let chunk = match input.fill_buf().await {
            Ok(chunk) => chunk,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from(e)),
        };
        if chunk.is_empty() {
            if !any {
                return Ok(false);
            }
            scan.unterminated()?;
            break;
        }
        any = true;
        let (keep, used) = match scan.find_end(&buf[start..], chunk) {
            Some(end) => (end, end + 1),
            None => (chunk.len(), chunk.len()),
        };
        buf.extend_from_slice(&chunk[..keep]);
        local.advance(&chunk[..used]);
        input.consume(used);
        if keep < used {
            break;
        }
    }
    *position = local;
    Ok(true)
}

pub(super) async fn peek_one<R: AsyncBufRead + Unpin>(input: &mut R) -> Result<Option<u8>> {
    loop {
        return match input.fill_buf().await {
            Ok(chunk) => Ok(chunk.first().copied()),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(Error::from(e)),
        };
    }
}

pub(super) async fn skip_one<R: AsyncBufRead + Unpin>(
    input: &mut R,
    byte: u8,
    position: &mut Position,
) -> Result<bool> {
    if peek_one(input).await? != Some(byte) {
        return Ok(false);
    }
    position.advance(&[byte]);
    input.consume(1);
    Ok(true)
}

pub(super) async fn read_bytes_until<'b, R: AsyncBufRead + Unpin>(
    input: &mut R,
    byte: u8,
    buf: &'b mut Vec<u8>,
    position: &mut Position,
) -> Result<Option<(&'b [u8], bool)>> {
    let start = buf.len();
    let mut scan = Until::new(byte);
    if read_construct(input, &mut scan, buf, start, position).await? {
        Ok(Some((&buf[start..], scan.found())))
    } else {
        Ok(None)
    }
}

pub(super) async fn read_bang_element<'b, R: AsyncBufRead + Unpin>(
    input: &mut R,
    buf: &'b mut Vec<u8>,
    position: &mut Position,
) -> Result<Option<(BangType, &'b [u8])>> {
    let start = buf.len();
    let mut local = *position;
    skip_one(input, b'!', &mut local).await?;
    buf.push(b'!');
    let kind = BangType::new(peek_one(input).await?)?;
    read_construct(input, &mut BangEnd::new(kind), buf, start, &mut local).await?;
    if kind == BangType::CData {
        buf.truncate(buf.len() - 2);
    }
    *position = local;
    Ok(Some((kind, &buf[start..])))
}

pub(super) async fn read_element<'b, R: AsyncBufRead + Unpin>(
    input: &mut R,
    buf: &'b mut Vec<u8>,
    position: &mut Position,
) -> Result<Option<&'b [u8]>> {
    let start = buf.len();
    if read_construct(input, &mut TagEnd::default(), buf, start, position).await? {
        Ok(Some(&buf[start..]))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn bytes_until() {
        let mut position = Position::default();
        let mut data = b"abc*123".as_ref();
        let mut buf = Vec::new();

        let result = read_bytes_until(&mut data, b'*', &mut buf, &mut position)
            .await
            .unwrap();
        assert_eq!(result, Some((b"abc".as_ref(), true)));
        assert_eq!(position.offset(), 4);
        assert_eq!(peek_one(&mut data).await.unwrap(), Some(b'1'));
    }

    #[tokio::test]
    async fn bytes_until_end_of_input() {
        let mut position = Position::default();
        let mut data = b"x\r\n".as_ref();
        let mut buf = Vec::new();

        let result = read_bytes_until(&mut data, b'<', &mut buf, &mut position)
            .await
            .unwrap();
        assert_eq!(result, Some((b"x\r\n".as_ref(), false)));
        assert_eq!(position.text_position().line, 2);
        assert_eq!(peek_one(&mut data).await.unwrap(), None);
    }

    #[tokio::test]
    async fn doctype_in_small_chunks() {
        let mut position = Position::default();
        let source = b"!DOCTYPE r [<!ENTITY e 'v'>]>";
        let mut data = tokio::io::BufReader::with_capacity(3, source.as_ref());
        let mut buf = Vec::new();

        let result = read_bang_element(&mut data, &mut buf, &mut position)
            .await
            .unwrap();
        assert_eq!(
            result,
            Some((BangType::DocType, b"!DOCTYPE r [<!ENTITY e 'v'>]".as_ref()))
        );
        assert_eq!(position.offset(), source.len());
    }

    #[tokio::test]
    async fn cdata_terminator_split_across_chunks() {
        let mut position = Position::default();
        let mut data = tokio::io::BufReader::with_capacity(2, b"![CDATA[x]]>".as_ref());
        let mut buf = Vec::new();

        let result = read_bang_element(&mut data, &mut buf, &mut position)
            .await
            .unwrap();
        assert_eq!(result, Some((BangType::CData, b"![CDATA[x".as_ref())));
    }

    #[tokio::test]
    async fn element_lines() {
        let mut position = Position::default();
        position.advance(b"<");
        let source = b"<element\n attribute=\">\">";
        let mut data = &source[1..];
        let mut buf = Vec::new();

        let result = read_element(&mut data, &mut buf, &mut position).await.unwrap();
        assert_eq!(result, Some(b"element\n attribute=\">\"".as_ref()));
        assert_eq!(position.offset(), source.len());
        assert_eq!(position.text_position().line, 2);
    }
}
