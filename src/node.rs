//! Node kinds reported by a reader and the capability tables built on them.

/// Kind of the node the reader is currently positioned on.
///
/// The discriminants are fixed: they index the capability bitmaps below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    /// Not positioned on a node (before the first read, at the end or after close)
    None = 0,
    /// Start tag, `<item>` or `<item/>`
    Element = 1,
    /// Attribute of the current element
    Attribute = 2,
    /// Character data
    Text = 3,
    /// `<![CDATA[...]]>`
    CData = 4,
    /// Reference to a general entity that was not expanded
    EntityReference = 5,
    /// Entity declaration
    Entity = 6,
    /// `<?target data?>`
    ProcessingInstruction = 7,
    /// `<!--...-->`
    Comment = 8,
    /// Document node
    Document = 9,
    /// `<!DOCTYPE ...>`
    DocumentType = 10,
    /// Document fragment node
    DocumentFragment = 11,
    /// Notation declaration
    Notation = 12,
    /// Whitespace between markup
    Whitespace = 13,
    /// Whitespace in a `xml:space="preserve"` scope
    SignificantWhitespace = 14,
    /// End tag, `</item>`
    EndElement = 15,
    /// End of an expanded entity reference
    EndEntity = 16,
    /// `<?xml ...?>`
    XmlDeclaration = 17,
}

impl NodeType {
    /// All node kinds, in discriminant order.
    pub const ALL: [NodeType; 18] = [
        NodeType::None,
        NodeType::Element,
        NodeType::Attribute,
        NodeType::Text,
        NodeType::CData,
        NodeType::EntityReference,
        NodeType::Entity,
        NodeType::ProcessingInstruction,
        NodeType::Comment,
        NodeType::Document,
        NodeType::DocumentType,
        NodeType::DocumentFragment,
        NodeType::Notation,
        NodeType::Whitespace,
        NodeType::SignificantWhitespace,
        NodeType::EndElement,
        NodeType::EndEntity,
        NodeType::XmlDeclaration,
    ];

    #[inline]
    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl Default for NodeType {
    fn default() -> Self {
        NodeType::None
    }
}

/// Lifecycle of a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadState {
    /// `read` was never called
    Initial,
    /// The reader is positioned on a node
    Interactive,
    /// A well-formedness error stopped the reader
    Error,
    /// End of input was reached
    EndOfFile,
    /// `close` was called
    Closed,
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::Initial
    }
}

/// Value of the `xml:space` attribute in scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XmlSpace {
    /// No `xml:space` in scope
    None,
    /// `xml:space="default"`
    Default,
    /// `xml:space="preserve"`
    Preserve,
}

impl Default for XmlSpace {
    fn default() -> Self {
        XmlSpace::None
    }
}

/// Text, CDATA, Whitespace, SignificantWhitespace
const IS_TEXTUAL_NODE: u32 = 0x6018;
/// Attribute, Text, CDATA, EntityReference, ProcessingInstruction, Comment,
/// Whitespace, SignificantWhitespace, EndElement, EndEntity
const CAN_READ_CONTENT_AS: u32 = 0x1E1BC;
/// Attribute, Text, CDATA, ProcessingInstruction, Comment, DocumentType,
/// Whitespace, SignificantWhitespace, XmlDeclaration
const HAS_VALUE: u32 = 0x2659C;

/// Returns `true` for nodes whose value is character data.
#[inline]
pub const fn is_textual_node(node_type: NodeType) -> bool {
    IS_TEXTUAL_NODE & node_type.bit() != 0
}

/// Returns `true` for nodes a `read_content_as_*` call may start on.
#[inline]
pub const fn can_read_content_as(node_type: NodeType) -> bool {
    CAN_READ_CONTENT_AS & node_type.bit() != 0
}

/// Returns `true` for nodes that carry a value.
#[inline]
pub const fn has_value(node_type: NodeType) -> bool {
    HAS_VALUE & node_type.bit() != 0
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Reference table, one row per node kind:
    /// (kind, textual, content-readable, has value)
    const TABLE: [(NodeType, bool, bool, bool); 18] = [
        (NodeType::None, false, false, false),
        (NodeType::Element, false, false, false),
        (NodeType::Attribute, false, true, true),
        (NodeType::Text, true, true, true),
        (NodeType::CData, true, true, true),
        (NodeType::EntityReference, false, true, false),
        (NodeType::Entity, false, false, false),
        (NodeType::ProcessingInstruction, false, true, true),
        (NodeType::Comment, false, true, true),
        (NodeType::Document, false, false, false),
        (NodeType::DocumentType, false, false, true),
        (NodeType::DocumentFragment, false, false, false),
        (NodeType::Notation, false, false, false),
        (NodeType::Whitespace, true, true, true),
        (NodeType::SignificantWhitespace, true, true, true),
        (NodeType::EndElement, false, true, false),
        (NodeType::EndEntity, false, true, false),
        (NodeType::XmlDeclaration, false, false, true),
    ];

    #[test]
    fn discriminants_are_dense() {
        for (i, kind) in NodeType::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
    }

    #[test]
    fn classification_matches_table() {
        for &(kind, textual, content, value) in TABLE.iter() {
            assert_eq!(is_textual_node(kind), textual, "is_textual_node({:?})", kind);
            assert_eq!(can_read_content_as(kind), content, "can_read_content_as({:?})", kind);
            assert_eq!(has_value(kind), value, "has_value({:?})", kind);
        }
    }

    #[test]
    fn no_bits_outside_enumeration() {
        let all = NodeType::ALL.iter().fold(0u32, |acc, k| acc | k.bit());
        assert_eq!(IS_TEXTUAL_NODE & !all, 0);
        assert_eq!(CAN_READ_CONTENT_AS & !all, 0);
        assert_eq!(HAS_VALUE & !all, 0);
    }
}
