//! Scanning of `<!DOCTYPE>` declarations: the document type name, external
//! identifiers and the internal general entities of the internal subset.
//!
//! No validation is performed; element, attribute list and notation
//! declarations are skipped.

use std::collections::HashMap;

use log::debug;

use crate::errors::{Error, IllFormedError, Result};
use crate::escape::{split_references, Fragment};
use crate::reader::is_whitespace;

/// The parts of a `<!DOCTYPE>` declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DocType {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// Text between `[` and `]`, without the brackets
    pub internal_subset: String,
}

/// Cursor over the text of a declaration.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    /// Returns `true` if any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Reads a name: everything up to whitespace or one of the delimiters.
    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || matches!(b, b'[' | b'>' | b'"' | b'\'' | b'%') {
                break;
            }
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    /// Reads a quoted literal, returning its content.
    fn literal(&mut self) -> Result<&'a str> {
        let quote = match self.peek() {
            Some(q) if q == b'"' || q == b'\'' => q,
            _ => return Err(unexpected("literal")),
        };
        let start = self.pos + 1;
        match memchr::memchr(quote, &self.text.as_bytes()[start..]) {
            Some(i) => {
                self.pos = start + i + 1;
                Ok(&self.text[start..start + i])
            }
            None => Err(Error::ill_formed(IllFormedError::UnexpectedEof(
                "literal".to_string(),
            ))),
        }
    }

    /// Moves past the next `>` that is not inside a literal.
    fn skip_declaration(&mut self) -> Result<()> {
        while let Some(b) = self.peek() {
            match b {
                b'"' | b'\'' => {
                    self.literal()?;
                }
                b'>' => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(Error::ill_formed(IllFormedError::UnexpectedEof(
            "markup declaration".to_string(),
        )))
    }

    /// Moves past `end`.
    fn skip_past(&mut self, end: &str, what: &str) -> Result<()> {
        match self.rest().find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(())
            }
            None => Err(Error::ill_formed(IllFormedError::UnexpectedEof(
                what.to_string(),
            ))),
        }
    }
}

fn unexpected(what: &str) -> Error {
    Error::ill_formed(IllFormedError::UnexpectedToken(what.to_string()))
}

/// Splits the content of a `<!DOCTYPE ...>` (after the keyword) into its parts.
pub(crate) fn parse_doctype(content: &str) -> Result<DocType> {
    let mut s = Scanner::new(content);
    s.skip_whitespace();
    let name = s.name();
    if name.is_empty() {
        return Err(unexpected("DOCTYPE"));
    }
    let mut doctype = DocType {
        name: name.to_string(),
        ..DocType::default()
    };
    s.skip_whitespace();
    if s.eat("PUBLIC") {
        s.skip_whitespace();
        doctype.public_id = Some(s.literal()?.to_string());
        s.skip_whitespace();
        doctype.system_id = Some(s.literal()?.to_string());
    } else if s.eat("SYSTEM") {
        s.skip_whitespace();
        doctype.system_id = Some(s.literal()?.to_string());
    }
    s.skip_whitespace();
    if s.eat("[") {
        let start = s.pos;
        // `]` may appear inside literals of the subset
        loop {
            match s.peek() {
                Some(b']') => break,
                Some(b'"') | Some(b'\'') => {
                    s.literal()?;
                }
                Some(_) => s.pos += 1,
                None => {
                    return Err(Error::ill_formed(IllFormedError::UnexpectedEof(
                        "DOCTYPE".to_string(),
                    )))
                }
            }
        }
        doctype.internal_subset = content[start..s.pos].to_string();
        s.pos += 1;
        s.skip_whitespace();
    }
    if !s.at_end() {
        return Err(unexpected(s.rest()));
    }
    Ok(doctype)
}

/// Internal general entities declared in the document type declaration.
#[derive(Clone, Debug, Default)]
pub(crate) struct Entities {
    /// name -> literal replacement text, still escaped
    map: HashMap<String, String>,
}

impl Entities {
    /// Registers the internal general entities of an internal subset.
    ///
    /// Parameter entities and external entities are skipped. As in XML, the
    /// first declaration of a name is binding.
    pub fn declare_from_subset(&mut self, subset: &str) -> Result<()> {
        let mut s = Scanner::new(subset);
        loop {
            s.skip_whitespace();
            if s.at_end() {
                return Ok(());
            }
            if s.eat("<!--") {
                s.skip_past("-->", "Comment")?;
            } else if s.eat("<?") {
                s.skip_past("?>", "PI")?;
            } else if s.eat("<!ENTITY") {
                if !s.skip_whitespace() {
                    return Err(unexpected("<!ENTITY"));
                }
                if s.eat("%") {
                    // parameter entity
                    s.skip_declaration()?;
                    continue;
                }
                let name = s.name();
                if name.is_empty() {
                    return Err(unexpected("<!ENTITY"));
                }
                s.skip_whitespace();
                match s.peek() {
                    Some(b'"') | Some(b'\'') => {
                        let value = s.literal()?;
                        s.skip_whitespace();
                        if !s.eat(">") {
                            return Err(unexpected(s.rest()));
                        }
                        if !self.map.contains_key(name) {
                            debug!("declared internal entity `{}`", name);
                            self.map.insert(name.to_string(), value.to_string());
                        }
                    }
                    // SYSTEM / PUBLIC external entity
                    _ => s.skip_declaration()?,
                }
            } else if s.eat("<!") {
                s.skip_declaration()?;
            } else if s.eat("%") {
                // parameter entity reference
                s.skip_past(";", "parameter entity reference")?;
            } else {
                return Err(unexpected(s.rest()));
            }
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Fully expanded replacement text of an entity.
    ///
    /// Fails for undeclared names and for entities that reference
    /// themselves. Replacement text with markup is not supported.
    pub fn replacement(&self, name: &str) -> Result<String> {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.expand_into(name, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand_into<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        out: &mut String,
    ) -> Result<()> {
        if stack.contains(&name) {
            return Err(Error::ill_formed(IllFormedError::RecursiveEntity(
                name.to_string(),
            )));
        }
        let raw = match self.map.get(name) {
            Some(raw) => raw,
            None => {
                return Err(Error::ill_formed(IllFormedError::UndeclaredEntity(
                    name.to_string(),
                )))
            }
        };
        if memchr::memchr(b'<', raw.as_bytes()).is_some() {
            return Err(Error::NotSupported("markup in entity replacement text"));
        }
        stack.push(name);
        for fragment in split_references(raw)? {
            match fragment {
                Fragment::Text(text) => out.push_str(&text),
                Fragment::Entity(inner) => self.expand_into(inner, stack, out)?,
            }
        }
        stack.pop();
        Ok(())
    }
}
