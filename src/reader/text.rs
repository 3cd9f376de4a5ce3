//! The node-level reader built on top of the tokenizer.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::BufRead;
use std::mem;
use std::sync::Arc;

use log::{debug, trace};
#[cfg(feature = "async")]
use tokio::io::AsyncBufRead;

use crate::errors::{Error, IllFormedError, Result, TextPosition};
use crate::escape::{split_references, Fragment};
use crate::events::{BytesStart, Event};
use crate::name::{split_qname, Atom, NameTable, NamespaceResolver, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::node::{has_value, NodeType, ReadState, XmlSpace};
use crate::read::{
    read_content_binary, read_element_content_binary, BinaryBuffer, BinaryEncoding, XmlRead,
};
use crate::reader::dtd::{parse_doctype, Entities};
use crate::reader::{
    is_whitespace, ConformanceLevel, DtdProcessing, EntityHandling, ParserContext, Reader,
    ReaderSettings,
};

/// Piece of an attribute value as walked by `read_attribute_value`.
#[derive(Clone, Debug)]
enum ValuePiece {
    Text(String),
    Entity(Atom),
}

#[derive(Clone, Debug)]
struct Attr {
    name: Atom,
    local_name: Atom,
    prefix: Atom,
    namespace: Atom,
    /// Normalized value with every reference expanded
    value: String,
    pieces: Vec<ValuePiece>,
    position: TextPosition,
}

/// Node inside an attribute value, valid while the cursor walks that value.
#[derive(Clone, Debug)]
struct ValueNode {
    node_type: NodeType,
    name: Atom,
    value: String,
    /// Nesting inside resolved entities
    level: usize,
}

#[derive(Clone, Debug)]
struct Node {
    node_type: NodeType,
    name: Atom,
    local_name: Atom,
    prefix: Atom,
    namespace: Atom,
    value: String,
    depth: usize,
    empty: bool,
    position: TextPosition,
    attributes: Vec<Attr>,
}

impl Node {
    fn blank(names: &NameTable) -> Self {
        let empty = names.empty();
        Self {
            node_type: NodeType::None,
            name: empty.clone(),
            local_name: empty.clone(),
            prefix: empty.clone(),
            namespace: empty.clone(),
            value: String::new(),
            depth: 0,
            empty: false,
            position: TextPosition::default(),
            attributes: Vec::new(),
        }
    }
}

/// An open element.
#[derive(Clone, Debug)]
struct ElementScope {
    name: Atom,
    local_name: Atom,
    prefix: Atom,
    namespace: Atom,
    xml_space: XmlSpace,
    xml_lang: Arc<str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    Node,
    Attribute(usize),
    Value { attr: usize, index: usize },
}

enum Current<'a> {
    Node(&'a Node),
    Attr(&'a Attr),
    Value(&'a ValueNode),
}

/// Replaces `\r\n` and lone `\r` with `\n`.
fn normalize_newlines(text: &str) -> Cow<str> {
    if memchr::memchr(b'\r', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute value normalization: every whitespace character becomes a space.
fn normalize_attribute(text: &str) -> Cow<str> {
    let text = normalize_newlines(text);
    if !text.bytes().any(|b| b == b'\n' || b == b'\t') {
        return text;
    }
    Cow::Owned(text.replace(|c: char| c == '\n' || c == '\t', " "))
}

fn is_whitespace_text(text: &str) -> bool {
    text.bytes().all(is_whitespace)
}

/// A forward-only reader that checks well-formedness, resolves namespaces and
/// expands entities, reporting the document one node at a time.
///
/// Usually created through [`XmlReader`](crate::reader::XmlReader).
///
/// # Examples
///
/// ```
/// use xml_cursor::node::NodeType;
/// use xml_cursor::read::XmlRead;
/// use xml_cursor::reader::{ReaderSettings, XmlTextReader};
///
/// let mut reader = XmlTextReader::new(
///     r#"<list xmlns="urn:x"><item id="1"/></list>"#.as_bytes(),
///     ReaderSettings::new(),
/// );
/// reader.read().unwrap();
/// reader.read().unwrap();
/// assert_eq!(reader.node_type(), NodeType::Element);
/// assert_eq!(reader.local_name().as_str(), "item");
/// assert_eq!(reader.namespace_uri().as_str(), "urn:x");
/// assert_eq!(reader.get_attribute("id"), Some("1"));
/// ```
pub struct XmlTextReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    settings: ReaderSettings,
    /// Effective conformance; `Auto` is replaced once decided
    conformance: ConformanceLevel,
    names: NameTable,
    ns: NamespaceResolver,
    entities: Entities,
    base_uri: String,
    context_space: XmlSpace,
    context_lang: Arc<str>,
    state: ReadState,
    node: Node,
    cursor: Cursor,
    value_nodes: Vec<ValueNode>,
    /// Nodes produced by one event and not reported yet
    pending: VecDeque<Node>,
    elements: Vec<ElementScope>,
    /// The current node closes an element, whose scope goes on the next read
    pending_pop: bool,
    root_seen: bool,
    doctype_seen: bool,
    seen_content: bool,
    input_done: bool,
    binary: BinaryBuffer,
    chunk_offset: usize,
}

impl<R> XmlTextReader<R> {
    /// Creates a reader over `reader`.
    pub fn new(reader: R, settings: ReaderSettings) -> Self {
        Self::with_context(reader, settings, ParserContext::default())
    }

    /// Creates a reader over `reader` for a fragment read in `context`.
    pub fn with_context(reader: R, settings: ReaderSettings, context: ParserContext) -> Self {
        let names = NameTable::new();
        let mut ns = NamespaceResolver::new(&names);
        ns.push_scope();
        for (prefix, namespace) in &context.namespaces {
            ns.bind(names.add(prefix), names.add(namespace));
        }
        let node = Node::blank(&names);
        Self {
            reader: Reader::with_check_comments(reader, settings.check_comments),
            buf: Vec::new(),
            conformance: settings.conformance_level,
            settings,
            names,
            ns,
            entities: Entities::default(),
            base_uri: context
                .base_uri
                .as_deref()
                .map(str::to_string)
                .unwrap_or_default(),
            context_space: context.xml_space,
            context_lang: Arc::from(context.xml_lang.as_deref().unwrap_or("")),
            state: ReadState::Initial,
            node,
            cursor: Cursor::Node,
            value_nodes: Vec::new(),
            pending: VecDeque::new(),
            elements: Vec::new(),
            pending_pop: false,
            root_seen: false,
            doctype_seen: false,
            seen_content: false,
            input_done: false,
            binary: BinaryBuffer::default(),
            chunk_offset: 0,
        }
    }

    pub(crate) fn set_base_uri(&mut self, uri: &str) {
        self.base_uri = uri.to_string();
    }

    /// Settings the reader was created with.
    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Consumes the reader, returning the underlying input.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    // accessors

    fn current(&self) -> Current {
        match self.cursor {
            Cursor::Node => Current::Node(&self.node),
            Cursor::Attribute(i) => match self.node.attributes.get(i) {
                Some(attr) => Current::Attr(attr),
                None => Current::Node(&self.node),
            },
            Cursor::Value { index, .. } => match self.value_nodes.get(index) {
                Some(node) => Current::Value(node),
                None => Current::Node(&self.node),
            },
        }
    }

    /// State of the reader.
    pub fn read_state(&self) -> ReadState {
        self.state
    }

    /// Kind of the current node.
    pub fn node_type(&self) -> NodeType {
        match self.current() {
            Current::Node(node) => node.node_type,
            Current::Attr(_) => NodeType::Attribute,
            Current::Value(node) => node.node_type,
        }
    }

    /// Qualified name of the current node.
    pub fn name(&self) -> &Atom {
        match self.current() {
            Current::Node(node) => &node.name,
            Current::Attr(attr) => &attr.name,
            Current::Value(node) => &node.name,
        }
    }

    /// Local name of the current node.
    pub fn local_name(&self) -> &Atom {
        match self.current() {
            Current::Node(node) => &node.local_name,
            Current::Attr(attr) => &attr.local_name,
            Current::Value(node) => &node.name,
        }
    }

    /// Namespace of the current node.
    pub fn namespace_uri(&self) -> &Atom {
        match self.current() {
            Current::Node(node) => &node.namespace,
            Current::Attr(attr) => &attr.namespace,
            Current::Value(_) => self.names.empty(),
        }
    }

    /// Prefix of the current node.
    pub fn prefix(&self) -> &Atom {
        match self.current() {
            Current::Node(node) => &node.prefix,
            Current::Attr(attr) => &attr.prefix,
            Current::Value(_) => self.names.empty(),
        }
    }

    /// Value of the current node.
    pub fn value(&self) -> &str {
        match self.current() {
            Current::Node(node) => &node.value,
            Current::Attr(attr) => &attr.value,
            Current::Value(node) => &node.value,
        }
    }

    /// Depth of the current node.
    pub fn depth(&self) -> usize {
        match self.current() {
            Current::Node(node) => node.depth,
            Current::Attr(_) => self.node.depth + 1,
            Current::Value(node) => self.node.depth + 2 + node.level,
        }
    }

    /// Returns `true` on an element written as `<name/>`.
    pub fn is_empty_element(&self) -> bool {
        self.cursor == Cursor::Node && self.node.empty
    }

    /// Number of attributes of the current element, declaration or
    /// document type.
    pub fn attribute_count(&self) -> usize {
        self.node.attributes.len()
    }

    /// Base URI of the document.
    pub fn base_uri(&self) -> &str {
        if self.state == ReadState::Closed {
            ""
        } else {
            &self.base_uri
        }
    }

    /// Table the reader interns names in.
    pub fn name_table(&self) -> &NameTable {
        &self.names
    }

    /// Where the current node starts, when the reader is on a node.
    pub fn position(&self) -> Option<TextPosition> {
        if self.state != ReadState::Interactive {
            return None;
        }
        Some(match self.current() {
            Current::Node(node) => node.position,
            Current::Attr(attr) => attr.position,
            Current::Value(_) => self.node.position,
        })
    }

    /// `xml:space` in scope.
    pub fn xml_space(&self) -> XmlSpace {
        self.elements
            .last()
            .map_or(self.context_space, |scope| scope.xml_space)
    }

    /// `xml:lang` in scope.
    pub fn xml_lang(&self) -> &str {
        match self.elements.last() {
            Some(scope) => &scope.xml_lang,
            None => &self.context_lang,
        }
    }

    /// Namespace bound to `prefix` at the current node.
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        if self.state == ReadState::Closed {
            return None;
        }
        match self.ns.find(prefix) {
            Some(ns) => Some(ns.as_str()),
            None if prefix.is_empty() => Some(""),
            None => None,
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    // attributes

    /// Value of the attribute at `index`.
    pub fn get_attribute_at(&self, index: usize) -> Option<&str> {
        self.node.attributes.get(index).map(|a| a.value.as_str())
    }

    /// Value of the attribute named `name`.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.node
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of the attribute `local_name` in `namespace_uri`.
    pub fn get_attribute_ns(&self, local_name: &str, namespace_uri: &str) -> Option<&str> {
        self.node
            .attributes
            .iter()
            .find(|a| a.local_name == local_name && a.namespace == namespace_uri)
            .map(|a| a.value.as_str())
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.value_nodes.clear();
        self.chunk_offset = 0;
    }

    /// Moves to the attribute at `index`.
    pub fn move_to_attribute_at(&mut self, index: usize) -> bool {
        if index < self.node.attributes.len() {
            self.set_cursor(Cursor::Attribute(index));
            true
        } else {
            false
        }
    }

    /// Moves to the attribute named `name`.
    pub fn move_to_attribute(&mut self, name: &str) -> bool {
        match self.node.attributes.iter().position(|a| a.name == name) {
            Some(i) => self.move_to_attribute_at(i),
            None => false,
        }
    }

    /// Moves to the attribute `local_name` in `namespace_uri`.
    pub fn move_to_attribute_ns(&mut self, local_name: &str, namespace_uri: &str) -> bool {
        let found = self
            .node
            .attributes
            .iter()
            .position(|a| a.local_name == local_name && a.namespace == namespace_uri);
        match found {
            Some(i) => self.move_to_attribute_at(i),
            None => false,
        }
    }

    /// Moves to the first attribute.
    pub fn move_to_first_attribute(&mut self) -> bool {
        self.move_to_attribute_at(0)
    }

    /// Moves to the next attribute.
    pub fn move_to_next_attribute(&mut self) -> bool {
        match self.cursor {
            Cursor::Node => self.move_to_attribute_at(0),
            Cursor::Attribute(i) | Cursor::Value { attr: i, .. } => self.move_to_attribute_at(i + 1),
        }
    }

    /// Moves back to the element owning the current attribute.
    pub fn move_to_element(&mut self) -> bool {
        if self.cursor == Cursor::Node {
            return false;
        }
        self.set_cursor(Cursor::Node);
        true
    }

    /// Steps through the pieces of the current attribute value.
    pub fn read_attribute_value(&mut self) -> bool {
        match self.cursor {
            Cursor::Attribute(attr) => {
                let nodes: Vec<ValueNode> = match self.node.attributes.get(attr) {
                    Some(a) => a
                        .pieces
                        .iter()
                        .map(|piece| match piece {
                            ValuePiece::Text(text) => ValueNode {
                                node_type: NodeType::Text,
                                name: self.names.empty().clone(),
                                value: text.clone(),
                                level: 0,
                            },
                            ValuePiece::Entity(name) => ValueNode {
                                node_type: NodeType::EntityReference,
                                name: name.clone(),
                                value: String::new(),
                                level: 0,
                            },
                        })
                        .collect(),
                    None => return false,
                };
                if nodes.is_empty() {
                    return false;
                }
                self.set_cursor(Cursor::Value { attr, index: 0 });
                self.value_nodes = nodes;
                true
            }
            Cursor::Value { attr, index } if index + 1 < self.value_nodes.len() => {
                self.cursor = Cursor::Value {
                    attr,
                    index: index + 1,
                };
                self.chunk_offset = 0;
                true
            }
            _ => false,
        }
    }

    /// Copies the next part of the current value into `buf`.
    pub fn read_value_chunk(&mut self, buf: &mut [char]) -> Result<usize> {
        let node_type = self.node_type();
        if !has_value(node_type) {
            return Err(Error::invalid_node("read_value_chunk", node_type));
        }
        let mut count = 0;
        let mut used = 0;
        for (slot, c) in buf.iter_mut().zip(self.value()[self.chunk_offset..].chars()) {
            *slot = c;
            count += 1;
            used += c.len_utf8();
        }
        self.chunk_offset += used;
        Ok(count)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    // entities

    /// Returns `true` if entity references are reported as nodes.
    pub fn can_resolve_entity(&self) -> bool {
        self.settings.entity_handling == EntityHandling::ExpandCharEntities
    }

    /// Expands the entity reference under the cursor. The next reads report
    /// the replacement text and then an `EndEntity` node.
    pub fn resolve_entity(&mut self) -> Result<()> {
        match self.cursor {
            Cursor::Node if self.node.node_type == NodeType::EntityReference => {
                let replacement = match self.entities.replacement(&self.node.name) {
                    Ok(text) => text,
                    Err(e) => return Err(self.fail(e)),
                };
                let mut end = Node {
                    node_type: NodeType::EndEntity,
                    attributes: Vec::new(),
                    ..self.node.clone()
                };
                end.value.clear();
                self.pending.push_front(end);
                if !replacement.is_empty() {
                    let text = Node {
                        node_type: self.text_kind(&replacement),
                        depth: self.node.depth + 1,
                        value: replacement,
                        position: self.node.position,
                        ..Node::blank(&self.names)
                    };
                    self.pending.push_front(text);
                }
                Ok(())
            }
            Cursor::Value { index, .. } => {
                let (name, level) = match self.value_nodes.get(index) {
                    Some(node) if node.node_type == NodeType::EntityReference => {
                        (node.name.clone(), node.level)
                    }
                    _ => return Err(Error::invalid_node("resolve_entity", self.node_type())),
                };
                let replacement = match self.entities.replacement(&name) {
                    Ok(text) => normalize_attribute(&text).into_owned(),
                    Err(e) => return Err(self.fail(e)),
                };
                self.value_nodes.insert(
                    index + 1,
                    ValueNode {
                        node_type: NodeType::EndEntity,
                        name,
                        value: String::new(),
                        level,
                    },
                );
                if !replacement.is_empty() {
                    self.value_nodes.insert(
                        index + 1,
                        ValueNode {
                            node_type: NodeType::Text,
                            name: self.names.empty().clone(),
                            value: replacement,
                            level: level + 1,
                        },
                    );
                }
                Ok(())
            }
            _ => Err(Error::invalid_node("resolve_entity", self.node_type())),
        }
    }

    /// Stops the reader and drops everything it buffered.
    pub fn close(&mut self) {
        if self.state == ReadState::Closed {
            return;
        }
        debug!("closing reader in state {:?}", self.state);
        self.state = ReadState::Closed;
        self.reset_node();
        self.elements.clear();
        self.pending_pop = false;
        self.buf = Vec::new();
        self.binary.reset();
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    // node production

    fn reset_node(&mut self) {
        self.node = Node::blank(&self.names);
        self.set_cursor(Cursor::Node);
        self.pending.clear();
    }

    fn apply_offsets(&self, at: TextPosition) -> TextPosition {
        TextPosition {
            line: at.line + self.settings.line_number_offset,
            column: if at.line == 1 {
                at.column + self.settings.line_position_offset
            } else {
                at.column
            },
        }
    }

    fn event_position(&self) -> TextPosition {
        self.apply_offsets(self.reader.event_position())
    }

    fn new_node(&self, node_type: NodeType) -> Node {
        Node {
            node_type,
            depth: self.elements.len(),
            position: self.event_position(),
            ..Node::blank(&self.names)
        }
    }

    /// Puts the reader into the error state.
    fn fail(&mut self, error: Error) -> Error {
        let error = match error.with_position(Some(self.reader.event_position())) {
            Error::IllFormed {
                error,
                position: Some(at),
            } => Error::IllFormed {
                error,
                position: Some(self.apply_offsets(at)),
            },
            e => e,
        };
        debug!("reader failed: {}", error);
        self.state = ReadState::Error;
        self.reset_node();
        error
    }

    /// Prepares a read. Returns `false` if the reader cannot move any more.
    fn begin_read(&mut self) -> bool {
        match self.state {
            ReadState::Initial | ReadState::Interactive => {}
            _ => return false,
        }
        self.set_cursor(Cursor::Node);
        self.binary.reset();
        if self.pending_pop {
            self.elements.pop();
            self.ns.pop_scope();
            self.pending_pop = false;
        }
        true
    }

    fn enter(&mut self, node: Node) -> bool {
        if self.state == ReadState::Initial {
            debug!("reader is interactive");
        }
        self.state = ReadState::Interactive;
        trace!("{:?} `{}` at depth {}", node.node_type, node.name, node.depth);
        self.node = node;
        true
    }

    fn finish(&mut self) -> bool {
        debug!("end of input");
        self.state = ReadState::EndOfFile;
        self.node = Node::blank(&self.names);
        false
    }

    fn check_root_text(&self) -> Result<()> {
        if self.elements.is_empty() && self.conformance == ConformanceLevel::Document {
            return Err(IllFormedError::TextAtRootLevel.into());
        }
        Ok(())
    }

    fn text_kind(&self, text: &str) -> NodeType {
        if !is_whitespace_text(text) {
            NodeType::Text
        } else if self.xml_space() == XmlSpace::Preserve {
            NodeType::SignificantWhitespace
        } else {
            NodeType::Whitespace
        }
    }

    fn queue_text(&mut self, text: String) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let node_type = self.text_kind(&text);
        match node_type {
            NodeType::Text => self.check_root_text()?,
            NodeType::Whitespace if self.settings.ignore_whitespace => return Ok(()),
            _ => {}
        }
        let mut node = self.new_node(node_type);
        node.value = text;
        self.pending.push_back(node);
        Ok(())
    }

    /// Turns escaped character data into text nodes and, when entities are
    /// not expanded, entity reference nodes.
    fn push_text(&mut self, raw: &str) -> Result<()> {
        let raw = normalize_newlines(raw);
        let mut text = String::new();
        for fragment in split_references(&raw)? {
            match fragment {
                Fragment::Text(t) => text.push_str(&t),
                Fragment::Entity(name) => {
                    if !self.entities.contains(name) {
                        return Err(IllFormedError::UndeclaredEntity(name.to_string()).into());
                    }
                    match self.settings.entity_handling {
                        EntityHandling::ExpandEntities => {
                            text.push_str(&self.entities.replacement(name)?)
                        }
                        EntityHandling::ExpandCharEntities => {
                            self.queue_text(mem::take(&mut text))?;
                            self.check_root_text()?;
                            let name = self.names.add(name);
                            let mut node = self.new_node(NodeType::EntityReference);
                            node.local_name = name.clone();
                            node.name = name;
                            self.pending.push_back(node);
                        }
                    }
                }
            }
        }
        self.queue_text(text)
    }

    /// Normalizes and expands an attribute value.
    fn expand_attribute(&self, raw: &str) -> Result<(String, Vec<ValuePiece>)> {
        let normalized = normalize_attribute(raw);
        let mut value = String::new();
        let mut pieces = Vec::new();
        let mut text = String::new();
        for fragment in split_references(&normalized)? {
            match fragment {
                Fragment::Text(t) => {
                    value.push_str(&t);
                    text.push_str(&t);
                }
                Fragment::Entity(name) => {
                    if !self.entities.contains(name) {
                        return Err(IllFormedError::UndeclaredEntity(name.to_string()).into());
                    }
                    let replacement = self.entities.replacement(name)?;
                    let replacement = normalize_attribute(&replacement);
                    value.push_str(&replacement);
                    match self.settings.entity_handling {
                        EntityHandling::ExpandEntities => text.push_str(&replacement),
                        EntityHandling::ExpandCharEntities => {
                            if !text.is_empty() {
                                pieces.push(ValuePiece::Text(mem::take(&mut text)));
                            }
                            pieces.push(ValuePiece::Entity(self.names.add(name)));
                        }
                    }
                }
            }
        }
        if !text.is_empty() {
            pieces.push(ValuePiece::Text(text));
        }
        Ok((value, pieces))
    }

    /// Attribute without a namespace and without references.
    fn plain_attribute(&self, name: &str, value: String, position: TextPosition) -> Attr {
        let name = self.names.add(name);
        let pieces = if value.is_empty() {
            Vec::new()
        } else {
            vec![ValuePiece::Text(value.clone())]
        };
        Attr {
            local_name: name.clone(),
            name,
            prefix: self.names.empty().clone(),
            namespace: self.names.empty().clone(),
            value,
            pieces,
            position,
        }
    }

    /// Splits a qualified name and finds its namespace.
    fn resolve_name(&self, qname: &str, attribute: bool) -> Result<(Atom, Atom, Atom)> {
        let empty = self.names.empty().clone();
        if !self.settings.namespaces {
            return Ok((empty.clone(), self.names.add(qname), empty));
        }
        let (prefix, local) = split_qname(qname);
        let namespace = if attribute && prefix.is_empty() {
            if local == "xmlns" {
                self.ns.xmlns_namespace().clone()
            } else {
                empty
            }
        } else {
            match self.ns.find(prefix) {
                Some(ns) => ns.clone(),
                None if prefix.is_empty() => empty,
                None => return Err(IllFormedError::UnknownPrefix(prefix.to_string()).into()),
            }
        };
        Ok((self.names.add(prefix), self.names.add(local), namespace))
    }

    fn declare_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let invalid = || Error::from(IllFormedError::InvalidPrefixBinding(prefix.to_string()));
        match prefix {
            "xmlns" => return Err(invalid()),
            "xml" if uri == XML_NAMESPACE => return Ok(()),
            "xml" => return Err(invalid()),
            _ => {}
        }
        if uri == XML_NAMESPACE || uri == XMLNS_NAMESPACE || (!prefix.is_empty() && uri.is_empty())
        {
            return Err(invalid());
        }
        trace!("binding prefix `{}` to `{}`", prefix, uri);
        self.ns.bind(self.names.add(prefix), self.names.add(uri));
        Ok(())
    }

    fn start_element(&mut self, start: &BytesStart, empty: bool) -> Result<()> {
        let decoder = self.reader.decoder();
        let qname = decoder.decode(start.name())?;
        if self.elements.is_empty() {
            if self.root_seen && self.conformance == ConformanceLevel::Document {
                return Err(IllFormedError::MultipleRoots(qname.into_owned()).into());
            }
            self.root_seen = true;
        }
        let position = self.event_position();

        let mut raw: Vec<(Cow<str>, Cow<str>)> = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = decoder.decode(attr.key)?;
            if raw.iter().any(|(k, _)| *k == key) {
                return Err(IllFormedError::DuplicatedAttribute(key.into_owned()).into());
            }
            raw.push((key, decoder.decode(attr.value)?));
        }

        self.ns.push_scope();
        let mut xml_space = self.xml_space();
        let mut xml_lang: Arc<str> = Arc::from(self.xml_lang());
        let mut attributes = Vec::with_capacity(raw.len());
        for (key, value) in &raw {
            let (value, pieces) = self.expand_attribute(value)?;
            if self.settings.namespaces {
                if key == "xmlns" {
                    self.declare_namespace("", &value)?;
                } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                    self.declare_namespace(prefix, &value)?;
                }
            }
            match &**key {
                "xml:space" => {
                    xml_space = match value.as_str() {
                        "preserve" => XmlSpace::Preserve,
                        "default" => XmlSpace::Default,
                        _ => {
                            return Err(IllFormedError::UnexpectedToken(format!(
                                "xml:space=\"{}\"",
                                value
                            ))
                            .into())
                        }
                    }
                }
                "xml:lang" => xml_lang = Arc::from(value.as_str()),
                _ => {}
            }
            let name = self.names.add(key);
            attributes.push(Attr {
                local_name: name.clone(),
                prefix: self.names.empty().clone(),
                namespace: self.names.empty().clone(),
                name,
                value,
                pieces,
                position,
            });
        }
        // names resolve only after every declaration of the element is bound
        for attr in attributes.iter_mut() {
            let (prefix, local_name, namespace) = self.resolve_name(&attr.name, true)?;
            attr.prefix = prefix;
            attr.local_name = local_name;
            attr.namespace = namespace;
        }
        if self.settings.namespaces {
            for (i, attr) in attributes.iter().enumerate() {
                let clash = attributes[..i].iter().any(|other| {
                    other.local_name.ptr_eq(&attr.local_name)
                        && other.namespace.ptr_eq(&attr.namespace)
                });
                if clash {
                    return Err(IllFormedError::DuplicatedAttribute(attr.name.to_string()).into());
                }
            }
        }

        let (prefix, local_name, namespace) = self.resolve_name(&qname, false)?;
        let mut node = self.new_node(NodeType::Element);
        node.name = self.names.add(&qname);
        node.local_name = local_name.clone();
        node.prefix = prefix.clone();
        node.namespace = namespace.clone();
        node.empty = empty;
        node.attributes = attributes;
        node.position = position;
        self.elements.push(ElementScope {
            name: node.name.clone(),
            local_name,
            prefix,
            namespace,
            xml_space,
            xml_lang,
        });
        if empty {
            self.pending_pop = true;
        }
        self.pending.push_back(node);
        Ok(())
    }

    fn end_element(&mut self) {
        let mut node = self.new_node(NodeType::EndElement);
        if let Some(scope) = self.elements.last() {
            node.name = scope.name.clone();
            node.local_name = scope.local_name.clone();
            node.prefix = scope.prefix.clone();
            node.namespace = scope.namespace.clone();
            node.depth = self.elements.len() - 1;
        }
        self.pending_pop = true;
        self.pending.push_back(node);
    }

    /// Turns one tokenizer event into zero or more pending nodes.
    fn process_event(&mut self, event: Event) -> Result<()> {
        let decoder = self.reader.decoder();
        let first = !self.seen_content;
        self.seen_content = true;
        match event {
            Event::StartText(e) => {
                let text = decoder.decode_with_bom_removal(e.escaped())?;
                if text.is_empty() {
                    // only a byte order mark
                    self.seen_content = false;
                    return Ok(());
                }
                self.push_text(&text)
            }
            Event::Text(e) => {
                let text = decoder.decode(e.escaped())?;
                self.push_text(&text)
            }
            Event::Start(e) => self.start_element(&e, false),
            Event::Empty(e) => self.start_element(&e, true),
            Event::End(_) => {
                // the tokenizer already checked that the names match
                self.end_element();
                Ok(())
            }
            Event::CData(e) => {
                self.check_root_text()?;
                let text = decoder.decode(e.content())?;
                let mut node = self.new_node(NodeType::CData);
                node.value = normalize_newlines(&text).into_owned();
                self.pending.push_back(node);
                Ok(())
            }
            Event::Comment(e) => {
                if self.settings.ignore_comments {
                    return Ok(());
                }
                let text = decoder.decode(e.escaped())?;
                let mut node = self.new_node(NodeType::Comment);
                node.value = normalize_newlines(&text).into_owned();
                self.pending.push_back(node);
                Ok(())
            }
            Event::PI(e) => {
                let content = decoder.decode(e.escaped())?;
                let (target, data) = match content.bytes().position(is_whitespace) {
                    Some(i) => {
                        let data = content[i..]
                            .trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'));
                        (&content[..i], data)
                    }
                    None => (&content[..], ""),
                };
                if target.is_empty() || target.eq_ignore_ascii_case("xml") {
                    return Err(IllFormedError::UnexpectedToken(format!("<?{}", target)).into());
                }
                if self.settings.ignore_processing_instructions {
                    return Ok(());
                }
                let mut node = self.new_node(NodeType::ProcessingInstruction);
                node.name = self.names.add(target);
                node.local_name = node.name.clone();
                node.value = normalize_newlines(data).into_owned();
                self.pending.push_back(node);
                Ok(())
            }
            Event::Decl(decl) => {
                if !first {
                    return Err(IllFormedError::MisplacedDeclaration.into());
                }
                if self.conformance == ConformanceLevel::Auto {
                    debug!("XML declaration found, reading a document");
                    self.conformance = ConformanceLevel::Document;
                }
                let mut node = self.new_node(NodeType::XmlDeclaration);
                node.name = self.names.add("xml");
                node.local_name = node.name.clone();
                node.value = decoder.decode(decl.content())?.into_owned();
                for attr in decl.as_start().attributes() {
                    let attr = attr?;
                    let key = decoder.decode(attr.key)?;
                    let value = decoder.decode(attr.value)?.into_owned();
                    let attr = self.plain_attribute(&key, value, node.position);
                    node.attributes.push(attr);
                }
                self.pending.push_back(node);
                Ok(())
            }
            Event::DocType(e) => {
                if self.settings.dtd_processing == DtdProcessing::Prohibit {
                    return Err(IllFormedError::DtdProhibited.into());
                }
                if self.doctype_seen || self.root_seen {
                    return Err(IllFormedError::UnexpectedToken("DOCTYPE".to_string()).into());
                }
                self.doctype_seen = true;
                if self.conformance == ConformanceLevel::Auto {
                    debug!("DOCTYPE found, reading a document");
                    self.conformance = ConformanceLevel::Document;
                }
                let content = decoder.decode(e.escaped())?;
                let doctype = parse_doctype(&content)?;
                if self.settings.dtd_processing == DtdProcessing::Ignore {
                    debug!("skipping DOCTYPE `{}`", doctype.name);
                    return Ok(());
                }
                self.entities.declare_from_subset(&doctype.internal_subset)?;
                let mut node = self.new_node(NodeType::DocumentType);
                node.name = self.names.add(&doctype.name);
                node.local_name = node.name.clone();
                if let Some(public_id) = doctype.public_id {
                    let attr = self.plain_attribute("PUBLIC", public_id, node.position);
                    node.attributes.push(attr);
                }
                if let Some(system_id) = doctype.system_id {
                    let attr = self.plain_attribute("SYSTEM", system_id, node.position);
                    node.attributes.push(attr);
                }
                node.value = doctype.internal_subset;
                self.pending.push_back(node);
                Ok(())
            }
            Event::Eof => {
                if let Some(error) = self.reader.unclosed_error() {
                    return Err(error);
                }
                if !self.root_seen && self.conformance == ConformanceLevel::Document {
                    return Err(IllFormedError::MissingRoot.into());
                }
                self.input_done = true;
                Ok(())
            }
        }
    }
}

impl<R: BufRead> XmlTextReader<R> {
    /// Moves to the next node.
    pub fn read(&mut self) -> Result<bool> {
        if !self.begin_read() {
            return Ok(false);
        }
        loop {
            if let Some(node) = self.pending.pop_front() {
                return Ok(self.enter(node));
            }
            if self.input_done {
                return Ok(self.finish());
            }
            let mut buf = mem::take(&mut self.buf);
            buf.clear();
            let result = match self.reader.read_event_into(&mut buf) {
                Ok(event) => self.process_event(event),
                Err(e) => Err(e),
            };
            self.buf = buf;
            if let Err(e) = result {
                return Err(self.fail(e));
            }
        }
    }
}

#[cfg(feature = "async")]
impl<R: AsyncBufRead + Unpin + Send> XmlTextReader<R> {
    /// Moves to the next node, reading the input asynchronously.
    ///
    /// Reports exactly the nodes [`XmlTextReader::read`] would.
    pub async fn read_async(&mut self) -> Result<bool> {
        if !self.begin_read() {
            return Ok(false);
        }
        loop {
            if let Some(node) = self.pending.pop_front() {
                return Ok(self.enter(node));
            }
            if self.input_done {
                return Ok(self.finish());
            }
            let mut buf = mem::take(&mut self.buf);
            buf.clear();
            let result = match self.reader.read_event_into_async(&mut buf).await {
                Ok(event) => self.process_event(event),
                Err(e) => Err(e),
            };
            self.buf = buf;
            if let Err(e) = result {
                return Err(self.fail(e));
            }
        }
    }
}

impl<R: BufRead> XmlRead for XmlTextReader<R> {
    fn read(&mut self) -> Result<bool> {
        XmlTextReader::read(self)
    }

    fn read_state(&self) -> ReadState {
        self.state
    }

    fn node_type(&self) -> NodeType {
        XmlTextReader::node_type(self)
    }

    fn name(&self) -> &Atom {
        XmlTextReader::name(self)
    }

    fn local_name(&self) -> &Atom {
        XmlTextReader::local_name(self)
    }

    fn namespace_uri(&self) -> &Atom {
        XmlTextReader::namespace_uri(self)
    }

    fn prefix(&self) -> &Atom {
        XmlTextReader::prefix(self)
    }

    fn value(&self) -> &str {
        XmlTextReader::value(self)
    }

    fn depth(&self) -> usize {
        XmlTextReader::depth(self)
    }

    fn is_empty_element(&self) -> bool {
        XmlTextReader::is_empty_element(self)
    }

    fn attribute_count(&self) -> usize {
        XmlTextReader::attribute_count(self)
    }

    fn base_uri(&self) -> &str {
        XmlTextReader::base_uri(self)
    }

    fn name_table(&self) -> &NameTable {
        &self.names
    }

    fn get_attribute_at(&self, index: usize) -> Option<&str> {
        XmlTextReader::get_attribute_at(self, index)
    }

    fn get_attribute(&self, name: &str) -> Option<&str> {
        XmlTextReader::get_attribute(self, name)
    }

    fn get_attribute_ns(&self, local_name: &str, namespace_uri: &str) -> Option<&str> {
        XmlTextReader::get_attribute_ns(self, local_name, namespace_uri)
    }

    fn move_to_attribute_at(&mut self, index: usize) -> bool {
        XmlTextReader::move_to_attribute_at(self, index)
    }

    fn move_to_attribute(&mut self, name: &str) -> bool {
        XmlTextReader::move_to_attribute(self, name)
    }

    fn move_to_attribute_ns(&mut self, local_name: &str, namespace_uri: &str) -> bool {
        XmlTextReader::move_to_attribute_ns(self, local_name, namespace_uri)
    }

    fn move_to_first_attribute(&mut self) -> bool {
        XmlTextReader::move_to_first_attribute(self)
    }

    fn move_to_next_attribute(&mut self) -> bool {
        XmlTextReader::move_to_next_attribute(self)
    }

    fn move_to_element(&mut self) -> bool {
        XmlTextReader::move_to_element(self)
    }

    fn read_attribute_value(&mut self) -> bool {
        XmlTextReader::read_attribute_value(self)
    }

    fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        XmlTextReader::lookup_namespace(self, prefix)
    }

    fn close(&mut self) {
        XmlTextReader::close(self)
    }

    fn can_resolve_entity(&self) -> bool {
        XmlTextReader::can_resolve_entity(self)
    }

    fn resolve_entity(&mut self) -> Result<()> {
        XmlTextReader::resolve_entity(self)
    }

    fn can_read_binary_content(&self) -> bool {
        true
    }

    fn can_read_value_chunk(&self) -> bool {
        true
    }

    fn read_value_chunk(&mut self, buf: &mut [char]) -> Result<usize> {
        XmlTextReader::read_value_chunk(self, buf)
    }

    fn position(&self) -> Option<TextPosition> {
        XmlTextReader::position(self)
    }

    fn xml_space(&self) -> XmlSpace {
        XmlTextReader::xml_space(self)
    }

    fn xml_lang(&self) -> &str {
        XmlTextReader::xml_lang(self)
    }

    fn read_content_as_base64(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = mem::take(&mut self.binary);
        let result = read_content_binary(
            self,
            &mut state,
            buf,
            BinaryEncoding::Base64,
            "read_content_as_base64",
        );
        self.binary = state;
        result
    }

    fn read_content_as_bin_hex(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = mem::take(&mut self.binary);
        let result = read_content_binary(
            self,
            &mut state,
            buf,
            BinaryEncoding::BinHex,
            "read_content_as_bin_hex",
        );
        self.binary = state;
        result
    }

    fn read_element_content_as_base64(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = mem::take(&mut self.binary);
        let result = read_element_content_binary(
            self,
            &mut state,
            buf,
            BinaryEncoding::Base64,
            "read_element_content_as_base64",
        );
        self.binary = state;
        result
    }

    fn read_element_content_as_bin_hex(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = mem::take(&mut self.binary);
        let result = read_element_content_binary(
            self,
            &mut state,
            buf,
            BinaryEncoding::BinHex,
            "read_element_content_as_bin_hex",
        );
        self.binary = state;
        result
    }
}
