//! A reader limited to one element of its parent.

use delegate::delegate;
use log::debug;

use crate::errors::{Error, Result, TextPosition};
use crate::name::{Atom, NameTable};
use crate::node::{NodeType, ReadState, XmlSpace};
use crate::read::{SchemaInfo, XmlRead};

/// Reader over the current element of another reader and everything inside
/// it, created by [`XmlRead::read_subtree`].
///
/// The subtree reader borrows its parent. Depth is reported relative to the
/// subtree root. Once the root element is done, the subtree reader reports
/// the end of input while the parent stays on the root's end boundary: its end
/// tag, or the root itself if it was an empty element. Closing the subtree
/// reader, explicitly or by dropping it, moves the parent to that boundary
/// without closing it.
///
/// # Examples
///
/// ```
/// use xml_cursor::read::XmlRead;
/// use xml_cursor::reader::{ReaderSettings, XmlReader};
///
/// let mut reader = XmlReader::create_from_str("<r><a><b/></a><c/></r>", ReaderSettings::new());
/// reader.read_to_following("a").unwrap();
/// {
///     let mut sub = reader.read_subtree().unwrap();
///     let mut names = Vec::new();
///     while sub.read().unwrap() {
///         names.push(sub.name().to_string());
///     }
///     assert_eq!(names, ["a", "b", "a"]);
/// }
/// reader.read().unwrap();
/// assert_eq!(reader.name().as_str(), "c");
/// ```
pub struct SubtreeReader<'a, R: XmlRead + ?Sized> {
    parent: &'a mut R,
    state: ReadState,
    /// Depth of the root element in the parent
    root_depth: usize,
}

impl<'a, R: XmlRead + ?Sized> SubtreeReader<'a, R> {
    /// Creates a subtree reader over the element `parent` is on.
    pub fn new(parent: &'a mut R) -> Result<Self> {
        parent.move_to_element();
        if parent.node_type() != NodeType::Element {
            return Err(Error::invalid_node("read_subtree", parent.node_type()));
        }
        Ok(Self {
            root_depth: parent.depth(),
            parent,
            state: ReadState::Initial,
        })
    }

    #[inline]
    fn interactive(&self) -> bool {
        self.state == ReadState::Interactive
    }

    /// Returns `true` if the parent is on the last node of the subtree.
    fn at_boundary(&self) -> bool {
        if self.parent.depth() != self.root_depth {
            return false;
        }
        match self.parent.node_type() {
            NodeType::EndElement => true,
            NodeType::Element => self.parent.is_empty_element(),
            _ => false,
        }
    }
}

impl<'a, R: XmlRead + ?Sized> XmlRead for SubtreeReader<'a, R> {
    fn read(&mut self) -> Result<bool> {
        match self.state {
            ReadState::Initial => {
                // the parent is already on the root
                self.state = ReadState::Interactive;
                return Ok(true);
            }
            ReadState::Interactive => {}
            _ => return Ok(false),
        }
        self.parent.move_to_element();
        if self.at_boundary() {
            debug!("end of subtree at depth {}", self.root_depth);
            self.state = ReadState::EndOfFile;
            return Ok(false);
        }
        match self.parent.read() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.state = ReadState::EndOfFile;
                Ok(false)
            }
            Err(e) => {
                self.state = ReadState::Error;
                Err(e)
            }
        }
    }

    fn read_state(&self) -> ReadState {
        self.state
    }

    fn node_type(&self) -> NodeType {
        if self.interactive() {
            self.parent.node_type()
        } else {
            NodeType::None
        }
    }

    fn name(&self) -> &Atom {
        if self.interactive() {
            self.parent.name()
        } else {
            self.parent.name_table().empty()
        }
    }

    fn local_name(&self) -> &Atom {
        if self.interactive() {
            self.parent.local_name()
        } else {
            self.parent.name_table().empty()
        }
    }

    fn namespace_uri(&self) -> &Atom {
        if self.interactive() {
            self.parent.namespace_uri()
        } else {
            self.parent.name_table().empty()
        }
    }

    fn prefix(&self) -> &Atom {
        if self.interactive() {
            self.parent.prefix()
        } else {
            self.parent.name_table().empty()
        }
    }

    fn value(&self) -> &str {
        if self.interactive() {
            self.parent.value()
        } else {
            ""
        }
    }

    fn depth(&self) -> usize {
        if self.interactive() {
            self.parent.depth().saturating_sub(self.root_depth)
        } else {
            0
        }
    }

    fn is_empty_element(&self) -> bool {
        self.interactive() && self.parent.is_empty_element()
    }

    fn attribute_count(&self) -> usize {
        if self.interactive() {
            self.parent.attribute_count()
        } else {
            0
        }
    }

    fn get_attribute_at(&self, index: usize) -> Option<&str> {
        self.parent
            .get_attribute_at(index)
            .filter(|_| self.interactive())
    }

    fn get_attribute(&self, name: &str) -> Option<&str> {
        self.parent.get_attribute(name).filter(|_| self.interactive())
    }

    fn get_attribute_ns(&self, local_name: &str, namespace_uri: &str) -> Option<&str> {
        self.parent
            .get_attribute_ns(local_name, namespace_uri)
            .filter(|_| self.interactive())
    }

    fn move_to_attribute_at(&mut self, index: usize) -> bool {
        self.interactive() && self.parent.move_to_attribute_at(index)
    }

    fn move_to_attribute(&mut self, name: &str) -> bool {
        self.interactive() && self.parent.move_to_attribute(name)
    }

    fn move_to_attribute_ns(&mut self, local_name: &str, namespace_uri: &str) -> bool {
        self.interactive() && self.parent.move_to_attribute_ns(local_name, namespace_uri)
    }

    fn move_to_first_attribute(&mut self) -> bool {
        self.interactive() && self.parent.move_to_first_attribute()
    }

    fn move_to_next_attribute(&mut self) -> bool {
        self.interactive() && self.parent.move_to_next_attribute()
    }

    fn move_to_element(&mut self) -> bool {
        self.interactive() && self.parent.move_to_element()
    }

    fn read_attribute_value(&mut self) -> bool {
        self.interactive() && self.parent.read_attribute_value()
    }

    fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        if self.state == ReadState::Closed {
            return None;
        }
        self.parent.lookup_namespace(prefix)
    }

    /// Moves the parent to the end boundary of the subtree.
    ///
    /// Errors met on the way are dropped: the parent reports them itself on
    /// its next read.
    fn close(&mut self) {
        if matches!(self.state, ReadState::Initial | ReadState::Interactive) {
            self.parent.move_to_element();
            while !self.at_boundary() {
                match self.parent.read() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        debug!("error while skipping the rest of a subtree: {}", e);
                        break;
                    }
                }
            }
        }
        self.state = ReadState::Closed;
    }

    fn position(&self) -> Option<TextPosition> {
        self.parent.position().filter(|_| self.interactive())
    }

    fn schema_info(&self) -> Option<&dyn SchemaInfo> {
        self.parent.schema_info().filter(|_| self.interactive())
    }

    fn xml_space(&self) -> XmlSpace {
        if self.interactive() {
            self.parent.xml_space()
        } else {
            XmlSpace::None
        }
    }

    fn xml_lang(&self) -> &str {
        if self.interactive() {
            self.parent.xml_lang()
        } else {
            ""
        }
    }

    delegate! {
        to self.parent {
            fn name_table(&self) -> &NameTable;
            fn base_uri(&self) -> &str;
            fn can_resolve_entity(&self) -> bool;
            fn resolve_entity(&mut self) -> Result<()>;
            fn can_read_value_chunk(&self) -> bool;
            fn read_value_chunk(&mut self, buf: &mut [char]) -> Result<usize>;
            fn is_default(&self) -> bool;
        }
    }
}

impl<'a, R: XmlRead + ?Sized> Drop for SubtreeReader<'a, R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::{ReaderSettings, XmlTextReader};
    use pretty_assertions::assert_eq;

    fn reader(xml: &str) -> XmlTextReader<&[u8]> {
        XmlTextReader::new(xml.as_bytes(), ReaderSettings::new())
    }

    fn drain<R: XmlRead>(sub: &mut R) -> Vec<(NodeType, String, usize)> {
        let mut nodes = Vec::new();
        while sub.read().unwrap() {
            nodes.push((sub.node_type(), sub.name().to_string(), sub.depth()));
        }
        nodes
    }

    #[test]
    fn bounded_by_the_root() {
        let mut parent = reader(r#"<r><a x="1"><b/>t</a><c/></r>"#);
        parent.read().unwrap();
        parent.read().unwrap();
        {
            let mut sub = parent.read_subtree().unwrap();
            assert_eq!(sub.read_state(), ReadState::Initial);
            assert_eq!(sub.node_type(), NodeType::None);
            assert!(sub.read().unwrap());
            assert_eq!(sub.get_attribute("x"), Some("1"));
            assert!(sub.move_to_first_attribute());
            assert_eq!(sub.depth(), 1);
            assert_eq!(
                drain(&mut sub),
                vec![
                    (NodeType::Element, "b".to_string(), 1),
                    (NodeType::Text, "".to_string(), 1),
                    (NodeType::EndElement, "a".to_string(), 0),
                ]
            );
            assert!(sub.eof());
            assert_eq!(sub.node_type(), NodeType::None);
        }
        assert_eq!(parent.node_type(), NodeType::EndElement);
        parent.read().unwrap();
        assert_eq!(parent.name().as_str(), "c");
    }

    #[test]
    fn empty_root() {
        let mut parent = reader("<r><a/><c/></r>");
        parent.read().unwrap();
        parent.read().unwrap();
        {
            let mut sub = parent.read_subtree().unwrap();
            assert_eq!(drain(&mut sub), vec![(NodeType::Element, "a".to_string(), 0)]);
        }
        assert_eq!(parent.name().as_str(), "a");
        parent.read().unwrap();
        assert_eq!(parent.name().as_str(), "c");
    }

    #[test]
    fn drop_skips_the_rest() {
        let mut parent = reader("<r><a><b><d/></b></a><c/></r>");
        parent.read().unwrap();
        parent.read().unwrap();
        {
            let mut sub = parent.read_subtree().unwrap();
            sub.read().unwrap();
            sub.read().unwrap();
            assert_eq!(sub.name().as_str(), "b");
        }
        assert_eq!(
            (parent.node_type(), parent.name().as_str()),
            (NodeType::EndElement, "a")
        );
        parent.read().unwrap();
        assert_eq!(parent.name().as_str(), "c");
    }

    #[test]
    fn close_is_idempotent() {
        let mut parent = reader("<r><a>t</a></r>");
        parent.read().unwrap();
        parent.read().unwrap();
        let mut sub = parent.read_subtree().unwrap();
        sub.close();
        sub.close();
        assert_eq!(sub.read_state(), ReadState::Closed);
        assert!(!sub.read().unwrap());
        drop(sub);
        assert_eq!(parent.node_type(), NodeType::EndElement);
        assert_eq!(parent.read_state(), ReadState::Interactive);
    }

    #[test]
    fn scopes_only_while_interactive() {
        let mut parent = reader(r#"<r xml:lang="en" xml:space="preserve"><a>t</a></r>"#);
        parent.read_to_following("a").unwrap();
        let mut sub = parent.read_subtree().unwrap();
        assert_eq!(sub.xml_lang(), "");
        assert_eq!(sub.xml_space(), XmlSpace::None);
        sub.read().unwrap();
        assert_eq!(sub.xml_lang(), "en");
        assert_eq!(sub.xml_space(), XmlSpace::Preserve);
        sub.close();
        assert_eq!(sub.xml_lang(), "");
        assert_eq!(sub.xml_space(), XmlSpace::None);
    }

    #[test]
    fn nested() {
        let mut parent = reader("<r><a><b>t</b></a></r>");
        parent.read_to_following("b").unwrap();
        let mut sub = parent.read_subtree().unwrap();
        sub.read().unwrap();
        let mut inner = sub.read_subtree().unwrap();
        assert_eq!(
            drain(&mut inner),
            vec![
                (NodeType::Element, "b".to_string(), 0),
                (NodeType::Text, "".to_string(), 1),
                (NodeType::EndElement, "b".to_string(), 0),
            ]
        );
    }

    #[test]
    fn requires_an_element() {
        let mut parent = reader("<r>t</r>");
        parent.read().unwrap();
        parent.read().unwrap();
        assert!(matches!(
            parent.read_subtree(),
            Err(Error::InvalidOperation(_))
        ));
    }
}
