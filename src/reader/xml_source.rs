//! Byte-level input for the tokenizer.
//!
//! The tokenizer asks its input for whole markup constructs: everything up to
//! a `<`, a tag up to its closing `>`, a `<!...>` construct. Input arrives in
//! chunks of whatever size the underlying buffer has, so the end of a
//! construct is searched for by a [`Scan`] that keeps its state between
//! chunks.

use std::io::{self, BufRead};

use crate::errors::{Error, IllFormedError, Result};

use super::{BangType, Position};

/// Finds the end of a markup construct.
pub(super) trait Scan {
    /// Returns the index of the byte ending the construct in `chunk`, if it
    /// is there. `seen` holds the bytes of the construct taken from earlier
    /// chunks.
    fn find_end(&mut self, seen: &[u8], chunk: &[u8]) -> Option<usize>;

    /// Called when the input ends before the construct does. `Ok` keeps what
    /// was read so far.
    fn unterminated(&self) -> Result<()>;
}

/// Everything up to a delimiter byte, or up to the end of input.
#[derive(Clone, Copy, Debug)]
pub(super) struct Until {
    byte: u8,
    /// Whether the delimiter was reached
    found: bool,
}

impl Until {
    pub(super) fn new(byte: u8) -> Self {
        Self { byte, found: false }
    }

    pub(super) fn found(&self) -> bool {
        self.found
    }
}

impl Scan for Until {
    #[inline]
    fn find_end(&mut self, _seen: &[u8], chunk: &[u8]) -> Option<usize> {
        let end = memchr::memchr(self.byte, chunk);
        self.found = end.is_some();
        end
    }

    fn unterminated(&self) -> Result<()> {
        Ok(())
    }
}

/// A start or empty tag: the first `>` outside of a quoted attribute value.
///
/// Attribute values are [defined] as follows:
/// ```plain
/// AttValue := '"' (([^<&"]) | Reference)* '"'
///           | "'" (([^<&']) | Reference)* "'"
/// ```
///
/// [defined]: https://www.w3.org/TR/xml11/#NT-AttValue
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct TagEnd {
    /// The quote of the attribute value being read
    quote: Option<u8>,
}

impl Scan for TagEnd {
    fn find_end(&mut self, _seen: &[u8], chunk: &[u8]) -> Option<usize> {
        for i in memchr::memchr3_iter(b'>', b'\'', b'"', chunk) {
            match (self.quote, chunk[i]) {
                (None, b'>') => return Some(i),
                (None, quote) => self.quote = Some(quote),
                (Some(open), b) if open == b => self.quote = None,
                _ => {}
            }
        }
        None
    }

    fn unterminated(&self) -> Result<()> {
        Err(Error::ill_formed(IllFormedError::UnexpectedEof(
            "Element".to_string(),
        )))
    }
}

/// A comment, CDATA section or DOCTYPE declaration, starting after `<`.
#[derive(Debug)]
pub(super) struct BangEnd {
    kind: BangType,
    /// Markup declarations open in a DOCTYPE internal subset
    nesting: usize,
}

impl BangEnd {
    pub(super) fn new(kind: BangType) -> Self {
        Self { kind, nesting: 0 }
    }
}

/// Checks whether `seen` followed by `head` ends with `tail`.
fn ends_with_split(seen: &[u8], head: &[u8], tail: &[u8]) -> bool {
    if head.len() >= tail.len() {
        return head.ends_with(tail);
    }
    let (from_seen, from_head) = tail.split_at(tail.len() - head.len());
    head == from_head && seen.ends_with(from_seen)
}

impl Scan for BangEnd {
    fn find_end(&mut self, seen: &[u8], chunk: &[u8]) -> Option<usize> {
        match self.kind {
            // `!---->` is the shortest comment
            BangType::Comment => memchr::memchr_iter(b'>', chunk).find(|&i| {
                seen.len() + i > 4 && ends_with_split(seen, &chunk[..i], b"--")
            }),
            BangType::CData => memchr::memchr_iter(b'>', chunk)
                .find(|&i| ends_with_split(seen, &chunk[..i], b"]]")),
            BangType::DocType => {
                for i in memchr::memchr2_iter(b'<', b'>', chunk) {
                    if chunk[i] == b'<' {
                        self.nesting += 1;
                    } else if self.nesting == 0 {
                        return Some(i);
                    } else {
                        self.nesting -= 1;
                    }
                }
                None
            }
        }
    }

    fn unterminated(&self) -> Result<()> {
        Err(self.kind.to_err())
    }
}

/// Input the tokenizer can pull markup from.
///
/// Every method advances the given [`Position`] by the bytes it consumed.
/// Constructs are copied into a caller-provided buffer and returned as
/// slices of it.
pub(super) trait XmlSource {
    /// Appends the bytes of one construct to `buf`, consuming its end byte
    /// without appending it. Returns `false` if the input was already
    /// exhausted.
    ///
    /// `position` is left untouched when the construct is unterminated.
    fn read_construct<S: Scan>(
        &mut self,
        scan: &mut S,
        buf: &mut Vec<u8>,
        start: usize,
        position: &mut Position,
    ) -> Result<bool>;

    /// Returns the next byte without consuming it.
    fn peek_one(&mut self) -> Result<Option<u8>>;

    /// Consumes `byte` if it is next.
    fn skip_one(&mut self, byte: u8, position: &mut Position) -> Result<bool>;

    /// Reads up to `byte` or to the end of input. `None` if nothing was
    /// left, otherwise the bytes read and whether `byte` ended them.
    ///
    /// ```ignore
    /// let mut position = Position::default();
    /// let mut buf = Vec::new();
    /// let mut input = b"abc*def".as_ref();
    ///
    /// assert_eq!(
    ///     input.read_bytes_until(b'*', &mut buf, &mut position).unwrap(),
    ///     Some((b"abc".as_ref(), true))
    /// );
    /// assert_eq!(position.offset(), 4);
    /// ```
    fn read_bytes_until<'b>(
        &mut self,
        byte: u8,
        buf: &'b mut Vec<u8>,
        position: &mut Position,
    ) -> Result<Option<(&'b [u8], bool)>> {
        let start = buf.len();
        let mut scan = Until::new(byte);
        if self.read_construct(&mut scan, buf, start, position)? {
            Ok(Some((&buf[start..], scan.found())))
        } else {
            Ok(None)
        }
    }

    /// Reads a `<!` construct. The `!` must be the next byte.
    fn read_bang_element<'b>(
        &mut self,
        buf: &'b mut Vec<u8>,
        position: &mut Position,
    ) -> Result<Option<(BangType, &'b [u8])>> {
        let start = buf.len();
        let mut local = *position;
        self.skip_one(b'!', &mut local)?;
        buf.push(b'!');
        let kind = BangType::new(self.peek_one()?)?;
        let mut scan = BangEnd::new(kind);
        self.read_construct(&mut scan, buf, start, &mut local)?;
        if scan.kind == BangType::CData {
            // drop the `]]` of the terminator
            buf.truncate(buf.len() - 2);
        }
        *position = local;
        Ok(Some((scan.kind, &buf[start..])))
    }

    /// Reads a start or empty tag up to its closing `>`. `None` if nothing
    /// was left.
    fn read_element<'b>(
        &mut self,
        buf: &'b mut Vec<u8>,
        position: &mut Position,
    ) -> Result<Option<&'b [u8]>> {
        let start = buf.len();
        if self.read_construct(&mut TagEnd::default(), buf, start, position)? {
            Ok(Some(&buf[start..]))
        } else {
            Ok(None)
        }
    }
}

impl<R: BufRead> XmlSource for R {
    fn read_construct<S: Scan>(
        &mut self,
        scan: &mut S,
        buf: &mut Vec<u8>,
        start: usize,
        position: &mut Position,
    ) -> Result<bool> {
        let mut local = *position;
        let mut any = buf.len() > start;
        loop {
            let chunk = match self.fill_buf() {
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
            match scan.find_end(&buf[start..], chunk) {
                Some(end) => {
                    buf.extend_from_slice(&chunk[..end]);
                    local.advance(&chunk[..=end]);
                    self.consume(end + 1);
                    break;
                }
                None => {
                    let used = chunk.len();
                    buf.extend_from_slice(chunk);
                    local.advance(chunk);
                    self.consume(used);
                }
            }
        }
        *position = local;
        Ok(true)
    }

    fn peek_one(&mut self) -> Result<Option<u8>> {
        loop {
            return match self.fill_buf() {
                Ok(chunk) => Ok(chunk.first().copied()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(Error::from(e)),
            };
        }
    }

    fn skip_one(&mut self, byte: u8, position: &mut Position) -> Result<bool> {
        if self.peek_one()? != Some(byte) {
            return Ok(false);
        }
        position.advance(&[byte]);
        self.consume(1);
        Ok(true)
    }
}
