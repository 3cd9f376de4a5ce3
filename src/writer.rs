//! A minimal XML text writer, used to re-emit the nodes of a reader.

use std::io::Write;

use crate::errors::{Error, Result};
use crate::escape::{escape_attribute, escape_text};
use crate::name::XMLNS_NAMESPACE;

/// Receiver of serialized nodes.
///
/// The method set mirrors the node kinds a reader reports, so any reader can
/// be copied into a sink node by node, see
/// [`XmlRead::write_node`](crate::read::XmlRead::write_node).
pub trait XmlSink {
    /// Opens a start tag. Attributes may follow until content is written.
    fn write_start_element(&mut self, prefix: &str, local_name: &str, namespace_uri: &str)
        -> Result<()>;
    /// Closes the innermost element, as `<name/>` if it has no content.
    fn write_end_element(&mut self) -> Result<()>;
    /// Closes the innermost element, always with an end tag.
    fn write_full_end_element(&mut self) -> Result<()>;
    /// Starts an attribute; its value is written with [`Self::write_string`]
    /// and [`Self::write_entity_ref`].
    fn write_start_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<()>;
    /// Ends the attribute started last.
    fn write_end_attribute(&mut self) -> Result<()>;
    /// Writes character data, escaping it as needed.
    fn write_string(&mut self, text: &str) -> Result<()>;
    /// Writes whitespace as is.
    fn write_whitespace(&mut self, ws: &str) -> Result<()>;
    /// Writes a CDATA section.
    fn write_cdata(&mut self, text: &str) -> Result<()>;
    /// Writes `&name;`.
    fn write_entity_ref(&mut self, name: &str) -> Result<()>;
    /// Writes `<?name text?>`.
    fn write_processing_instruction(&mut self, name: &str, text: &str) -> Result<()>;
    /// Writes a document type declaration.
    fn write_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        subset: &str,
    ) -> Result<()>;
    /// Writes `<!--text-->`.
    fn write_comment(&mut self, text: &str) -> Result<()>;
}

fn qualified(prefix: &str, local_name: &str) -> String {
    if prefix.is_empty() {
        local_name.to_string()
    } else {
        format!("{}:{}", prefix, local_name)
    }
}

/// Start tag not written yet.
struct StartTag {
    name: String,
    prefix: String,
    namespace: String,
    /// qualified name and escaped value
    attributes: Vec<(String, String)>,
    /// prefix and namespace of every prefixed attribute
    attribute_namespaces: Vec<(String, String)>,
    /// bindings made by explicit `xmlns` attributes
    declared: Vec<(String, String)>,
}

struct PendingAttribute {
    name: String,
    prefix: String,
    local_name: String,
    namespace: String,
    /// escaped, as it will be written
    escaped: String,
    /// unescaped text, for namespace declarations
    raw: String,
}

struct OpenElement {
    name: String,
    /// length of the binding stack before this element
    bindings: usize,
}

/// Writes XML text to a [`Write`].
///
/// The start tag is held back until content follows, so that namespace
/// declarations missing for the element or its attributes can be added to
/// it. There is no single-root requirement: any sequence of nodes is
/// accepted.
///
/// ```
/// use xml_cursor::writer::{XmlSink, XmlWriter};
///
/// let mut writer = XmlWriter::new(Vec::new());
/// writer.write_start_element("p", "item", "urn:p").unwrap();
/// writer.write_string("a < b").unwrap();
/// writer.write_full_end_element().unwrap();
/// assert_eq!(
///     writer.into_string().unwrap(),
///     r#"<p:item xmlns:p="urn:p">a &lt; b</p:item>"#
/// );
/// ```
pub struct XmlWriter<W: Write> {
    writer: W,
    open_tag: Option<StartTag>,
    attribute: Option<PendingAttribute>,
    elements: Vec<OpenElement>,
    /// prefix to namespace, innermost last
    bindings: Vec<(String, String)>,
}

impl<W: Write> XmlWriter<W> {
    /// Creates a writer over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            open_tag: None,
            attribute: None,
            elements: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Closes a pending start tag and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.close_start_tag(false)?;
        Ok(self.writer)
    }

    fn in_scope(&self, prefix: &str) -> &str {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map_or("", |(_, ns)| ns.as_str())
    }

    fn ensure_binding(&mut self, prefix: &str, namespace: &str, extra: &mut Vec<(String, String)>) {
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        if self.in_scope(prefix) != namespace {
            self.bindings.push((prefix.to_string(), namespace.to_string()));
            extra.push((prefix.to_string(), namespace.to_string()));
        }
    }

    /// Writes the held back start tag, if any.
    fn close_start_tag(&mut self, empty: bool) -> Result<()> {
        if self.attribute.is_some() {
            return Err(Error::InvalidOperation(
                "an attribute is still open".to_string(),
            ));
        }
        let tag = match self.open_tag.take() {
            Some(tag) => tag,
            None => return Ok(()),
        };
        self.bindings.extend(tag.declared.iter().cloned());
        let mut extra = Vec::new();
        self.ensure_binding(&tag.prefix, &tag.namespace, &mut extra);
        for (prefix, namespace) in &tag.attribute_namespaces {
            self.ensure_binding(prefix, namespace, &mut extra);
        }

        write!(self.writer, "<{}", tag.name)?;
        for (name, value) in &tag.attributes {
            write!(self.writer, " {}=\"{}\"", name, value)?;
        }
        for (prefix, namespace) in &extra {
            if prefix.is_empty() {
                write!(self.writer, " xmlns=\"{}\"", escape_attribute(namespace))?;
            } else {
                write!(
                    self.writer,
                    " xmlns:{}=\"{}\"",
                    prefix,
                    escape_attribute(namespace)
                )?;
            }
        }
        self.writer.write_all(if empty { b"/>" } else { b">" })?;
        Ok(())
    }

    fn end_element(&mut self, full: bool) -> Result<()> {
        let element = match self.elements.pop() {
            Some(element) => element,
            None => {
                return Err(Error::InvalidOperation(
                    "there is no open element to end".to_string(),
                ))
            }
        };
        if self.open_tag.is_some() && !full {
            self.close_start_tag(true)?;
        } else {
            self.close_start_tag(false)?;
            write!(self.writer, "</{}>", element.name)?;
        }
        self.bindings.truncate(element.bindings);
        Ok(())
    }
}

impl XmlWriter<Vec<u8>> {
    /// Closes a pending start tag and returns the text written so far.
    pub fn into_string(self) -> Result<String> {
        let bytes = self.into_inner()?;
        String::from_utf8(bytes).map_err(|e| Error::from(e.utf8_error()))
    }
}

impl<W: Write> XmlSink for XmlWriter<W> {
    fn write_start_element(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<()> {
        self.close_start_tag(false)?;
        let name = qualified(prefix, local_name);
        self.elements.push(OpenElement {
            name: name.clone(),
            bindings: self.bindings.len(),
        });
        self.open_tag = Some(StartTag {
            name,
            prefix: prefix.to_string(),
            namespace: namespace_uri.to_string(),
            attributes: Vec::new(),
            attribute_namespaces: Vec::new(),
            declared: Vec::new(),
        });
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<()> {
        self.end_element(false)
    }

    fn write_full_end_element(&mut self) -> Result<()> {
        self.end_element(true)
    }

    fn write_start_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<()> {
        if self.attribute.is_some() {
            return Err(Error::InvalidOperation(
                "an attribute is already open".to_string(),
            ));
        }
        self.attribute = Some(PendingAttribute {
            name: qualified(prefix, local_name),
            prefix: prefix.to_string(),
            local_name: local_name.to_string(),
            namespace: namespace_uri.to_string(),
            escaped: String::new(),
            raw: String::new(),
        });
        Ok(())
    }

    fn write_end_attribute(&mut self) -> Result<()> {
        let attribute = match self.attribute.take() {
            Some(attribute) => attribute,
            None => {
                return Err(Error::InvalidOperation(
                    "there is no open attribute to end".to_string(),
                ))
            }
        };
        match self.open_tag.as_mut() {
            Some(tag) => {
                if attribute.namespace == XMLNS_NAMESPACE {
                    let prefix = if attribute.prefix.is_empty() {
                        // `xmlns` itself declares the default namespace
                        String::new()
                    } else {
                        attribute.local_name.clone()
                    };
                    tag.declared.push((prefix, attribute.raw.clone()));
                } else if !attribute.prefix.is_empty() {
                    tag.attribute_namespaces
                        .push((attribute.prefix.clone(), attribute.namespace.clone()));
                }
                tag.attributes.push((attribute.name, attribute.escaped));
            }
            // an attribute on its own, as the outer XML of an attribute node
            None => write!(self.writer, "{}=\"{}\"", attribute.name, attribute.escaped)?,
        }
        Ok(())
    }

    fn write_string(&mut self, text: &str) -> Result<()> {
        if let Some(attribute) = self.attribute.as_mut() {
            attribute.escaped.push_str(&escape_attribute(text));
            attribute.raw.push_str(text);
            return Ok(());
        }
        self.close_start_tag(false)?;
        self.writer.write_all(escape_text(text).as_bytes())?;
        Ok(())
    }

    fn write_whitespace(&mut self, ws: &str) -> Result<()> {
        if self.attribute.is_some() {
            return self.write_string(ws);
        }
        self.close_start_tag(false)?;
        self.writer.write_all(ws.as_bytes())?;
        Ok(())
    }

    fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.close_start_tag(false)?;
        write!(
            self.writer,
            "<![CDATA[{}]]>",
            text.replace("]]>", "]]]]><![CDATA[>")
        )?;
        Ok(())
    }

    fn write_entity_ref(&mut self, name: &str) -> Result<()> {
        if let Some(attribute) = self.attribute.as_mut() {
            attribute.escaped.push('&');
            attribute.escaped.push_str(name);
            attribute.escaped.push(';');
            return Ok(());
        }
        self.close_start_tag(false)?;
        write!(self.writer, "&{};", name)?;
        Ok(())
    }

    fn write_processing_instruction(&mut self, name: &str, text: &str) -> Result<()> {
        self.close_start_tag(false)?;
        if text.is_empty() {
            write!(self.writer, "<?{}?>", name)?;
        } else {
            write!(self.writer, "<?{} {}?>", name, text)?;
        }
        Ok(())
    }

    fn write_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        subset: &str,
    ) -> Result<()> {
        self.close_start_tag(false)?;
        write!(self.writer, "<!DOCTYPE {}", name)?;
        match (public_id, system_id) {
            (Some(public_id), system_id) => write!(
                self.writer,
                " PUBLIC \"{}\" \"{}\"",
                public_id,
                system_id.unwrap_or_default()
            )?,
            (None, Some(system_id)) => write!(self.writer, " SYSTEM \"{}\"", system_id)?,
            (None, None) => {}
        }
        if !subset.is_empty() {
            write!(self.writer, " [{}]", subset)?;
        }
        self.writer.write_all(b">")?;
        Ok(())
    }

    fn write_comment(&mut self, text: &str) -> Result<()> {
        self.close_start_tag(false)?;
        write!(self.writer, "<!--{}-->", text)?;
        Ok(())
    }
}
