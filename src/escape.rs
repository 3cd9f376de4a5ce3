//! Manage xml character escapes

use std::borrow::Cow;

use memchr::{memchr, memchr3};

use crate::errors::IllFormedError;

/// A piece of escaped character data after expanding the predefined entities
/// and character references.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Fragment<'a> {
    /// Plain text
    Text(Cow<'a, str>),
    /// Reference to a general entity the caller must resolve
    Entity(&'a str),
}

/// Returns the replacement of one of the five predefined entities.
#[inline]
pub(crate) fn resolve_predefined_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => return None,
    })
}

/// Legal characters, https://www.w3.org/TR/xml11/#NT-Char restricted to XML 1.0
#[inline]
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Parses the body of a character reference, without the leading `&` and
/// the trailing `;`: `#65` or `#x41`.
fn parse_char_ref(body: &str) -> Result<char, IllFormedError> {
    let err = || IllFormedError::InvalidCharRef(format!("&{};", body));
    let (digits, radix) = if let Some(hex) = body.strip_prefix("#x") {
        (hex, 16)
    } else if let Some(dec) = body.strip_prefix('#') {
        (dec, 10)
    } else {
        return Err(err());
    };
    // `from_str_radix` accepts a sign, XML does not
    if digits.starts_with(|c| c == '+' || c == '-') {
        return Err(err());
    }
    let code = u32::from_str_radix(digits, radix).map_err(|_| err())?;
    match std::char::from_u32(code) {
        Some(c) if is_xml_char(c) => Ok(c),
        _ => Err(err()),
    }
}

/// Splits escaped character data into text and general entity references.
///
/// Predefined entities and character references are expanded into the text
/// pieces. Adjacent text is merged, so the result alternates between text and
/// entity pieces. Text without any `&` is returned borrowed, in one piece.
pub(crate) fn split_references(raw: &str) -> Result<Vec<Fragment>, IllFormedError> {
    let bytes = raw.as_bytes();
    let first = match memchr(b'&', bytes) {
        Some(i) => i,
        None => {
            return Ok(if raw.is_empty() {
                Vec::new()
            } else {
                vec![Fragment::Text(Cow::Borrowed(raw))]
            })
        }
    };

    let mut fragments = Vec::new();
    let mut text = String::with_capacity(raw.len());
    text.push_str(&raw[..first]);
    let mut pos = first;
    while pos < raw.len() {
        match memchr(b'&', &bytes[pos..]) {
            Some(i) => {
                text.push_str(&raw[pos..pos + i]);
                let start = pos + i + 1;
                let end = match memchr(b';', &bytes[start..]) {
                    Some(e) => start + e,
                    None => return Err(IllFormedError::UnexpectedToken("&".to_string())),
                };
                let name = &raw[start..end];
                if name.starts_with('#') {
                    text.push(parse_char_ref(name)?);
                } else if let Some(s) = resolve_predefined_entity(name) {
                    text.push_str(s);
                } else if name.is_empty() {
                    return Err(IllFormedError::UnexpectedToken("&;".to_string()));
                } else {
                    if !text.is_empty() {
                        fragments.push(Fragment::Text(Cow::Owned(std::mem::take(&mut text))));
                    }
                    fragments.push(Fragment::Entity(name));
                }
                pos = end + 1;
            }
            None => {
                text.push_str(&raw[pos..]);
                break;
            }
        }
    }
    if !text.is_empty() {
        fragments.push(Fragment::Text(Cow::Owned(text)));
    }
    Ok(fragments)
}

/// Expands predefined entities and character references, treating any other
/// entity reference as an error.
pub fn unescape(raw: &str) -> Result<Cow<str>, IllFormedError> {
    let mut fragments = split_references(raw)?;
    match fragments.len() {
        0 => Ok(Cow::Borrowed("")),
        1 => match fragments.pop() {
            Some(Fragment::Text(text)) => Ok(text),
            Some(Fragment::Entity(name)) => Err(IllFormedError::UndeclaredEntity(name.to_string())),
            None => Ok(Cow::Borrowed("")),
        },
        _ => {
            let name = fragments.iter().find_map(|f| match f {
                Fragment::Entity(name) => Some(*name),
                Fragment::Text(_) => None,
            });
            Err(IllFormedError::UndeclaredEntity(
                name.unwrap_or_default().to_string(),
            ))
        }
    }
}

/// Escapes `&`, `<` and `>` in character data.
pub fn escape_text(raw: &str) -> Cow<str> {
    let bytes = raw.as_bytes();
    if memchr3(b'&', b'<', b'>', bytes).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escapes character data for use inside a double-quoted attribute value.
///
/// Tabs and line breaks are written as character references, so that
/// attribute value normalization does not replace them on re-reading.
pub fn escape_attribute(raw: &str) -> Cow<str> {
    let bytes = raw.as_bytes();
    if memchr3(b'&', b'<', b'"', bytes).is_none()
        && memchr3(b'\t', b'\n', b'\r', bytes).is_none()
        && memchr(b'>', bytes).is_none()
    {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#x9;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
