//! Xml Attributes module
//!
//! Provides an iterator over attributes key/value pairs

use crate::errors::{Error, IllFormedError, Result};
use crate::reader::is_whitespace;

/// A struct representing a key/value XML attribute.
///
/// Both the key and the value are undecoded; the value is still escaped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attribute<'a> {
    /// The key to uniquely define the attribute, `prefix:local` or `local`
    pub key: &'a [u8],
    /// The raw value of the attribute, without the quotes
    pub value: &'a [u8],
    /// The quote character around the value, `"` or `'`
    pub quote: u8,
}

/// Iterator over XML attributes.
///
/// Yields `Result<Attribute>`. An `Err` is returned once when the attribute
/// syntax is broken, after which the iterator is exhausted.
#[derive(Clone, Debug)]
pub struct Attributes<'a> {
    /// slice of `Element` corresponding to attributes
    bytes: &'a [u8],
    /// current position of the iterator
    position: usize,
}

impl<'a> Attributes<'a> {
    /// Creates a new attribute iterator from a buffer, skipping the element name.
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        Self {
            bytes: buf,
            position: pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.bytes.len() && is_whitespace(self.bytes[self.position]) {
            self.position += 1;
        }
    }

    #[inline]
    fn fail(&mut self, at: usize) -> Option<Result<Attribute<'a>>> {
        self.position = self.bytes.len();
        Some(Err(Error::ill_formed(IllFormedError::MalformedAttribute(at))))
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Result<Attribute<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.bytes.len();
        if self.position >= len {
            return None;
        }
        // attributes must be separated from the name and each other
        let before = self.position;
        self.skip_whitespace();
        if self.position >= len {
            return None;
        }
        if self.position == before {
            return self.fail(before);
        }

        let key_start = self.position;
        while self.position < len {
            match self.bytes[self.position] {
                b'=' => break,
                b if is_whitespace(b) => break,
                b'"' | b'\'' | b'<' | b'>' => return self.fail(self.position),
                _ => self.position += 1,
            }
        }
        let key_end = self.position;
        if key_start == key_end {
            return self.fail(key_start);
        }

        self.skip_whitespace();
        if self.position >= len || self.bytes[self.position] != b'=' {
            return self.fail(self.position);
        }
        self.position += 1;
        self.skip_whitespace();

        let quote = match self.bytes.get(self.position) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return self.fail(self.position),
        };
        let value_start = self.position + 1;
        match memchr::memchr(quote, &self.bytes[value_start..]) {
            Some(i) => {
                let value = &self.bytes[value_start..value_start + i];
                if memchr::memchr(b'<', value).is_some() {
                    return self.fail(value_start);
                }
                self.position = value_start + i + 1;
                Some(Ok(Attribute {
                    key: &self.bytes[key_start..key_end],
                    value,
                    quote,
                }))
            }
            None => self.fail(self.position),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(input: &[u8]) -> Vec<Result<Attribute>> {
        Attributes::new(input, 3).collect()
    }

    #[test]
    fn single_and_double_quotes() {
        let attrs = collect(br#"tag a = "x y" b='&amp;'"#);
        assert_eq!(attrs.len(), 2);
        assert_eq!(
            attrs[0].as_ref().unwrap(),
            &Attribute {
                key: b"a",
                value: b"x y",
                quote: b'"',
            }
        );
        assert_eq!(attrs[1].as_ref().unwrap().value, b"&amp;");
        assert_eq!(attrs[1].as_ref().unwrap().quote, b'\'');
    }

    #[test]
    fn trailing_whitespace() {
        assert_eq!(collect(b"tag  ").len(), 0);
        assert_eq!(collect(b"tag").len(), 0);
    }

    #[test]
    fn missing_value() {
        let attrs = collect(b"tag a");
        assert_eq!(attrs.len(), 1);
        match &attrs[0] {
            Err(Error::IllFormed {
                error: IllFormedError::MalformedAttribute(5),
                ..
            }) => {}
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn unquoted_value() {
        let attrs = collect(b"tag a=b");
        assert!(matches!(attrs.as_slice(), [Err(_)]));
    }

    #[test]
    fn no_separator_between_attributes() {
        let attrs = collect(br#"tag a="1"b="2""#);
        assert_eq!(attrs.len(), 2);
        assert!(attrs[0].is_ok());
        assert!(attrs[1].is_err());
    }
}
