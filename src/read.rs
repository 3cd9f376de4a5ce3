//! The [`XmlRead`] cursor trait.
//!
//! A reader supplies a small set of primitives: advancing, describing the
//! current node and walking its attributes. Everything else (content
//! accumulation, typed content, the element content protocol, navigation,
//! subtrees and re-serialization) is provided on top of them, so every
//! reader, including [`SubtreeReader`], gets the same behavior.

mod content;
pub mod convert;
mod navigate;
mod project;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;

use crate::errors::{Error, Result, TextPosition};
use crate::name::{Atom, NameTable};
use crate::node::{has_value, NodeType, ReadState, XmlSpace};
use crate::reader::SubtreeReader;
use crate::writer::XmlSink;

pub(crate) use self::content::{
    read_content_binary, read_element_content_binary, BinaryBuffer, BinaryEncoding,
};
pub use self::convert::{NamespaceLookup, TypedValue, ValueType};

/// Type information a validating layer attaches to the current node.
pub trait SchemaInfo {
    /// Returns `true` if the current attribute was supplied from a default.
    fn is_default(&self) -> bool;
    /// Returns `true` if the current element was declared nil.
    fn is_nil(&self) -> bool;
}

/// Resolves prefixes through the namespaces in scope at a reader's cursor.
struct ScopeLookup<'a, R: ?Sized>(&'a R);

impl<'a, R: XmlRead + ?Sized> NamespaceLookup for ScopeLookup<'a, R> {
    fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.0.lookup_namespace(prefix)
    }
}

/// A forward-only cursor over the nodes of an XML document.
///
/// # Examples
///
/// ```
/// use xml_cursor::read::XmlRead;
/// use xml_cursor::reader::{ReaderSettings, XmlReader};
///
/// let xml = "<order><item qty='2'>apple</item><item qty='5'>pear</item></order>";
/// let mut reader = XmlReader::create_from_str(xml, ReaderSettings::new());
/// let mut total = 0;
/// while reader.read_to_following("item").unwrap() {
///     total += reader.get_attribute("qty").unwrap().parse::<i32>().unwrap();
/// }
/// assert_eq!(total, 7);
/// ```
pub trait XmlRead {
    // ---------------------------------------------------------------------
    // primitives

    /// Moves to the next node. Returns `false` at the end of input or when
    /// the reader cannot advance any more.
    fn read(&mut self) -> Result<bool>;

    /// State of the reader.
    fn read_state(&self) -> ReadState;

    /// Kind of the current node.
    fn node_type(&self) -> NodeType;

    /// Qualified name of the current node.
    fn name(&self) -> &Atom;

    /// Name without the prefix.
    fn local_name(&self) -> &Atom;

    /// Namespace of the current node, empty when it has none.
    fn namespace_uri(&self) -> &Atom;

    /// Prefix of the qualified name, empty when it has none.
    fn prefix(&self) -> &Atom;

    /// Text value of the current node.
    fn value(&self) -> &str;

    /// Nesting depth of the current node.
    fn depth(&self) -> usize;

    /// Returns `true` on an element written as `<name/>`.
    fn is_empty_element(&self) -> bool;

    /// Number of attributes of the current element.
    fn attribute_count(&self) -> usize;

    /// Base URI of the current node, empty when unknown.
    fn base_uri(&self) -> &str;

    /// Table all names reported by this reader are interned in.
    fn name_table(&self) -> &NameTable;

    /// Value of the attribute at `index`.
    fn get_attribute_at(&self, index: usize) -> Option<&str>;

    /// Value of the attribute with the qualified name `name`.
    fn get_attribute(&self, name: &str) -> Option<&str>;

    /// Value of the attribute `local_name` in `namespace_uri`.
    fn get_attribute_ns(&self, local_name: &str, namespace_uri: &str) -> Option<&str>;

    /// Moves to the attribute at `index`. Returns `false` if there is none.
    fn move_to_attribute_at(&mut self, index: usize) -> bool;

    /// Moves to the attribute with the qualified name `name`.
    fn move_to_attribute(&mut self, name: &str) -> bool;

    /// Moves to the attribute `local_name` in `namespace_uri`.
    fn move_to_attribute_ns(&mut self, local_name: &str, namespace_uri: &str) -> bool;

    /// Moves to the first attribute.
    fn move_to_first_attribute(&mut self) -> bool;

    /// Moves to the next attribute, or to the first one from the element.
    fn move_to_next_attribute(&mut self) -> bool;

    /// Moves from an attribute back to its element. Returns `false` if the
    /// reader was not on an attribute.
    fn move_to_element(&mut self) -> bool;

    /// Steps through the value of the current attribute: text pieces and,
    /// depending on the reader, entity references. Returns `false` when
    /// there is nothing more.
    fn read_attribute_value(&mut self) -> bool;

    /// Namespace bound to `prefix` at the current node.
    fn lookup_namespace(&self, prefix: &str) -> Option<&str>;

    /// Stops the reader. Every accessor returns its default afterwards.
    fn close(&mut self);

    // ---------------------------------------------------------------------
    // capabilities

    /// Returns `true` if [`Self::resolve_entity`] is supported.
    fn can_resolve_entity(&self) -> bool {
        false
    }

    /// Expands the entity reference the reader is on: the following reads
    /// report its replacement text and an `EndEntity` node.
    fn resolve_entity(&mut self) -> Result<()> {
        Err(Error::NotSupported("resolve_entity"))
    }

    /// Returns `true` if the binary content methods are supported.
    fn can_read_binary_content(&self) -> bool {
        false
    }

    /// Returns `true` if [`Self::read_value_chunk`] is supported.
    fn can_read_value_chunk(&self) -> bool {
        false
    }

    /// Copies the next part of the current value into `buf`, returning the
    /// number of characters copied; `0` once the value is exhausted.
    fn read_value_chunk(&mut self, _buf: &mut [char]) -> Result<usize> {
        Err(Error::NotSupported("read_value_chunk"))
    }

    /// Line and column where the current node starts.
    fn position(&self) -> Option<TextPosition> {
        None
    }

    /// Type information attached by a validating layer.
    fn schema_info(&self) -> Option<&dyn SchemaInfo> {
        None
    }

    /// `xml:space` in scope.
    fn xml_space(&self) -> XmlSpace {
        XmlSpace::None
    }

    /// `xml:lang` in scope.
    fn xml_lang(&self) -> &str {
        ""
    }

    /// Returns `true` for an attribute supplied from a default.
    fn is_default(&self) -> bool {
        self.schema_info().map_or(false, |info| info.is_default())
    }

    /// Returns `true` if the current node carries a value.
    fn has_value(&self) -> bool {
        has_value(self.node_type())
    }

    /// Returns `true` if the current element has attributes.
    fn has_attributes(&self) -> bool {
        self.attribute_count() > 0
    }

    // ---------------------------------------------------------------------
    // navigation

    /// Returns `true` once the end of input was reached.
    fn eof(&self) -> bool {
        self.read_state() == ReadState::EndOfFile
    }

    /// Skips to content and tests for a start tag.
    fn is_start_element(&mut self) -> Result<bool> {
        Ok(self.move_to_content()? == NodeType::Element)
    }

    /// Skips to content and tests for a start tag named `name`.
    fn is_start_element_named(&mut self, name: &str) -> Result<bool> {
        Ok(self.move_to_content()? == NodeType::Element && &**self.name() == name)
    }

    /// Skips to content and tests for a start tag `local_name` in
    /// `namespace_uri`.
    fn is_start_element_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<bool> {
        Ok(self.move_to_content()? == NodeType::Element
            && &**self.local_name() == local_name
            && &**self.namespace_uri() == namespace_uri)
    }

    /// Skips whitespace, comments, processing instructions, the declaration
    /// and the document type, stopping on content: an element, end tag,
    /// text, CDATA or entity node. Returns the kind of that node.
    fn move_to_content(&mut self) -> Result<NodeType> {
        navigate::move_to_content(self)
    }

    /// Checks that the next content node is a start tag and moves past it.
    fn read_start_element(&mut self) -> Result<()> {
        navigate::read_start_element(self)
    }

    /// Checks that the next content node is a start tag named `name` and
    /// moves past it.
    fn read_start_element_named(&mut self, name: &str) -> Result<()> {
        navigate::read_start_element_named(self, name)
    }

    /// Checks that the next content node is a start tag `local_name` in
    /// `namespace_uri` and moves past it.
    fn read_start_element_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<()> {
        navigate::read_start_element_ns(self, local_name, namespace_uri)
    }

    /// Checks that the next content node is an end tag and moves past it.
    fn read_end_element(&mut self) -> Result<()> {
        navigate::read_end_element(self)
    }

    /// Moves past the current node together with its subtree.
    fn skip(&mut self) -> Result<()> {
        navigate::skip(self)
    }

    /// Advances to the next element named `name`, anywhere after the
    /// current node.
    fn read_to_following(&mut self, name: &str) -> Result<bool> {
        navigate::read_to_following(self, name)
    }

    /// Advances to the next element `local_name` in `namespace_uri`.
    fn read_to_following_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<bool> {
        navigate::read_to_following_ns(self, local_name, namespace_uri)
    }

    /// Advances to a descendant of the current element named `name`.
    /// Stops on the end tag of the current element if there is none.
    fn read_to_descendant(&mut self, name: &str) -> Result<bool> {
        navigate::read_to_descendant(self, name)
    }

    /// Advances to a descendant `local_name` in `namespace_uri`.
    fn read_to_descendant_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<bool> {
        navigate::read_to_descendant_ns(self, local_name, namespace_uri)
    }

    /// Advances to the next sibling element named `name`. Stops on the end
    /// tag of the parent if there is none.
    fn read_to_next_sibling(&mut self, name: &str) -> Result<bool> {
        navigate::read_to_next_sibling(self, name)
    }

    /// Advances to the next sibling element `local_name` in
    /// `namespace_uri`.
    fn read_to_next_sibling_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<bool> {
        navigate::read_to_next_sibling_ns(self, local_name, namespace_uri)
    }

    // ---------------------------------------------------------------------
    // text and typed content

    /// Text of the current text node or of the text content of the current
    /// element, stopping at the first markup.
    fn read_string(&mut self) -> Result<String> {
        content::read_string(self)
    }

    /// Text content of a text-only element, moving past its end tag.
    fn read_element_string(&mut self) -> Result<String> {
        let node_type = self.move_to_content()?;
        if node_type != NodeType::Element {
            return Err(Error::invalid_node("read_element_string", node_type));
        }
        content::read_element_string(self)
    }

    /// Like [`Self::read_element_string`], checking the element name.
    fn read_element_string_named(&mut self, name: &str) -> Result<String> {
        let node_type = self.move_to_content()?;
        if node_type != NodeType::Element {
            return Err(Error::invalid_node("read_element_string", node_type));
        }
        if &**self.name() != name {
            return Err(content::element_not_found(name));
        }
        content::read_element_string(self)
    }

    /// Like [`Self::read_element_string`], checking the element local name
    /// and namespace.
    fn read_element_string_ns(&mut self, local_name: &str, namespace_uri: &str) -> Result<String> {
        let node_type = self.move_to_content()?;
        if node_type != NodeType::Element {
            return Err(Error::invalid_node("read_element_string", node_type));
        }
        if &**self.local_name() != local_name || &**self.namespace_uri() != namespace_uri {
            return Err(content::element_not_found_ns(local_name, namespace_uri));
        }
        content::read_element_string(self)
    }

    /// Concatenated content starting at the current node.
    fn read_content_as_string(&mut self) -> Result<String> {
        content::read_content_typed(self, "read_content_as_string", Ok)
    }

    /// Content as an `xs:boolean`.
    fn read_content_as_boolean(&mut self) -> Result<bool> {
        content::read_content_typed(self, "read_content_as_boolean", |s| convert::to_boolean(&s))
    }

    /// Content as an `xs:int`.
    fn read_content_as_int(&mut self) -> Result<i32> {
        content::read_content_typed(self, "read_content_as_int", |s| convert::to_int(&s))
    }

    /// Content as an `xs:long`.
    fn read_content_as_long(&mut self) -> Result<i64> {
        content::read_content_typed(self, "read_content_as_long", |s| convert::to_long(&s))
    }

    /// Content as an `xs:float`.
    fn read_content_as_float(&mut self) -> Result<f32> {
        content::read_content_typed(self, "read_content_as_float", |s| convert::to_float(&s))
    }

    /// Content as an `xs:double`.
    fn read_content_as_double(&mut self) -> Result<f64> {
        content::read_content_typed(self, "read_content_as_double", |s| convert::to_double(&s))
    }

    /// Content as an `xs:decimal`.
    fn read_content_as_decimal(&mut self) -> Result<Decimal> {
        content::read_content_typed(self, "read_content_as_decimal", |s| {
            convert::to_decimal(&s)
        })
    }

    /// Content as an `xs:dateTime`, normalized to UTC.
    fn read_content_as_date_time(&mut self) -> Result<NaiveDateTime> {
        content::read_content_typed(self, "read_content_as_date_time", |s| {
            convert::to_date_time(&s)
        })
    }

    /// Content as an `xs:dateTime` keeping its offset.
    fn read_content_as_date_time_offset(&mut self) -> Result<DateTime<FixedOffset>> {
        content::read_content_typed(self, "read_content_as_date_time_offset", |s| {
            convert::to_date_time_offset(&s)
        })
    }

    /// Content as an untyped value, which is a string.
    fn read_content_as_object(&mut self) -> Result<TypedValue> {
        content::read_content_typed(self, "read_content_as_object", |s| {
            Ok(TypedValue::String(s))
        })
    }

    /// Content converted to `value_type`. Prefixes of qualified names are
    /// resolved with `resolver`, or with the namespaces in scope when it is
    /// `None`.
    fn read_content_as(
        &mut self,
        value_type: ValueType,
        resolver: Option<&dyn NamespaceLookup>,
    ) -> Result<TypedValue> {
        content::check_content_as(self, "read_content_as")?;
        let at = self.position();
        let text = content::read_content_string(self)?;
        let converted = match resolver {
            Some(resolver) => convert::convert(value_type, text, resolver),
            None => convert::convert(value_type, text, &ScopeLookup(&*self)),
        };
        converted.map_err(|e| e.with_position(at))
    }

    /// Content of the current element as a string, moving past its end tag.
    fn read_element_content_as_string(&mut self) -> Result<String> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_string",
            String::new,
            Ok,
        )
    }

    /// Content of the current element as an `xs:boolean`.
    fn read_element_content_as_boolean(&mut self) -> Result<bool> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_boolean",
            bool::default,
            |s| convert::to_boolean(&s),
        )
    }

    /// Content of the current element as an `xs:int`.
    fn read_element_content_as_int(&mut self) -> Result<i32> {
        content::read_element_content_typed(self, "read_element_content_as_int", i32::default, |s| {
            convert::to_int(&s)
        })
    }

    /// Content of the current element as an `xs:long`.
    fn read_element_content_as_long(&mut self) -> Result<i64> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_long",
            i64::default,
            |s| convert::to_long(&s),
        )
    }

    /// Content of the current element as an `xs:float`.
    fn read_element_content_as_float(&mut self) -> Result<f32> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_float",
            f32::default,
            |s| convert::to_float(&s),
        )
    }

    /// Content of the current element as an `xs:double`.
    fn read_element_content_as_double(&mut self) -> Result<f64> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_double",
            f64::default,
            |s| convert::to_double(&s),
        )
    }

    /// Content of the current element as an `xs:decimal`.
    fn read_element_content_as_decimal(&mut self) -> Result<Decimal> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_decimal",
            Decimal::default,
            |s| convert::to_decimal(&s),
        )
    }

    /// Content of the current element as an `xs:dateTime`, normalized to
    /// UTC.
    fn read_element_content_as_date_time(&mut self) -> Result<NaiveDateTime> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_date_time",
            NaiveDateTime::default,
            |s| convert::to_date_time(&s),
        )
    }

    /// Content of the current element as an `xs:dateTime` keeping its
    /// offset.
    fn read_element_content_as_date_time_offset(&mut self) -> Result<DateTime<FixedOffset>> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_date_time_offset",
            DateTime::<FixedOffset>::default,
            |s| convert::to_date_time_offset(&s),
        )
    }

    /// Content of the current element as an untyped value.
    fn read_element_content_as_object(&mut self) -> Result<TypedValue> {
        content::read_element_content_typed(
            self,
            "read_element_content_as_object",
            || TypedValue::String(String::new()),
            |s| Ok(TypedValue::String(s)),
        )
    }

    /// Content of the current element converted to `value_type`.
    fn read_element_content_as(
        &mut self,
        value_type: ValueType,
        resolver: Option<&dyn NamespaceLookup>,
    ) -> Result<TypedValue> {
        if !content::setup_element_content(self, "read_element_content_as")? {
            return Ok(TypedValue::empty(value_type));
        }
        let value = self.read_content_as(value_type, resolver)?;
        content::finish_element_content(self)?;
        Ok(value)
    }

    /// [`Self::read_element_content_as_string`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_string_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<String> {
        content::check_element_ns(
            self,
            "read_element_content_as_string",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_string()
    }

    /// [`Self::read_element_content_as_boolean`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_boolean_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<bool> {
        content::check_element_ns(
            self,
            "read_element_content_as_boolean",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_boolean()
    }

    /// [`Self::read_element_content_as_int`] on the element `local_name`
    /// in `namespace_uri`.
    fn read_element_content_as_int_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<i32> {
        content::check_element_ns(self, "read_element_content_as_int", local_name, namespace_uri)?;
        self.read_element_content_as_int()
    }

    /// [`Self::read_element_content_as_long`] on the element `local_name`
    /// in `namespace_uri`.
    fn read_element_content_as_long_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<i64> {
        content::check_element_ns(
            self,
            "read_element_content_as_long",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_long()
    }

    /// [`Self::read_element_content_as_float`] on the element `local_name`
    /// in `namespace_uri`.
    fn read_element_content_as_float_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<f32> {
        content::check_element_ns(
            self,
            "read_element_content_as_float",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_float()
    }

    /// [`Self::read_element_content_as_double`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_double_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<f64> {
        content::check_element_ns(
            self,
            "read_element_content_as_double",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_double()
    }

    /// [`Self::read_element_content_as_decimal`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_decimal_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<Decimal> {
        content::check_element_ns(
            self,
            "read_element_content_as_decimal",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_decimal()
    }

    /// [`Self::read_element_content_as_date_time`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_date_time_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<NaiveDateTime> {
        content::check_element_ns(
            self,
            "read_element_content_as_date_time",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_date_time()
    }

    /// [`Self::read_element_content_as_date_time_offset`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_date_time_offset_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<DateTime<FixedOffset>> {
        content::check_element_ns(
            self,
            "read_element_content_as_date_time_offset",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_date_time_offset()
    }

    /// [`Self::read_element_content_as_object`] on the element
    /// `local_name` in `namespace_uri`.
    fn read_element_content_as_object_ns(
        &mut self,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<TypedValue> {
        content::check_element_ns(
            self,
            "read_element_content_as_object",
            local_name,
            namespace_uri,
        )?;
        self.read_element_content_as_object()
    }

    /// [`Self::read_element_content_as`] on the element `local_name` in
    /// `namespace_uri`.
    fn read_element_content_as_ns(
        &mut self,
        value_type: ValueType,
        resolver: Option<&dyn NamespaceLookup>,
        local_name: &str,
        namespace_uri: &str,
    ) -> Result<TypedValue> {
        content::check_element_ns(self, "read_element_content_as", local_name, namespace_uri)?;
        self.read_element_content_as(value_type, resolver)
    }

    // ---------------------------------------------------------------------
    // binary content

    /// Decodes base64 content into `buf`, returning the number of bytes
    /// written; `0` once all content was returned. Repeated calls continue
    /// where the previous one stopped.
    fn read_content_as_base64(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported("read_content_as_base64"))
    }

    /// Decodes hexadecimal content into `buf`, like
    /// [`Self::read_content_as_base64`].
    fn read_content_as_bin_hex(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported("read_content_as_bin_hex"))
    }

    /// Decodes the base64 content of the current element into `buf`. The
    /// end tag is consumed when `0` is returned.
    fn read_element_content_as_base64(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported("read_element_content_as_base64"))
    }

    /// Decodes the hexadecimal content of the current element into `buf`.
    fn read_element_content_as_bin_hex(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported("read_element_content_as_bin_hex"))
    }

    // ---------------------------------------------------------------------
    // projection

    /// Markup of the content of the current element, or the value of the
    /// current attribute. An element is consumed together with its end
    /// tag; on any other node the result is empty and the reader does not
    /// move.
    fn read_inner_xml(&mut self) -> Result<String> {
        project::read_inner_xml(self)
    }

    /// Markup of the current element including its tags, or the current
    /// attribute as `name="value"`.
    fn read_outer_xml(&mut self) -> Result<String> {
        project::read_outer_xml(self)
    }

    /// Copies the current node with its subtree into `sink`.
    fn write_node(&mut self, sink: &mut dyn XmlSink) -> Result<()> {
        project::write_node(self, sink)
    }

    /// A reader over the current element and its descendants.
    fn read_subtree(&mut self) -> Result<SubtreeReader<'_, Self>>
    where
        Self: Sized,
    {
        SubtreeReader::new(self)
    }
}
