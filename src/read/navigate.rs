//! Cursor movement built on `read` and the node accessors.
//!
//! Names passed to the `read_to_*` functions are interned once in the
//! reader's name table; candidates are then compared by identity.

use crate::errors::{Error, Result};
use crate::name::Atom;
use crate::node::{NodeType, ReadState};
use crate::read::content::{element_not_found, element_not_found_ns};
use crate::read::XmlRead;

/// Interned form of the name a `read_to_*` search looks for.
enum Target {
    Name(Atom),
    Ns { local_name: Atom, namespace_uri: Atom },
}

impl Target {
    fn name<R: XmlRead + ?Sized>(reader: &R, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidOperation("the name must not be empty".to_string()));
        }
        Ok(Target::Name(reader.name_table().add(name)))
    }

    fn ns<R: XmlRead + ?Sized>(reader: &R, local_name: &str, namespace_uri: &str) -> Result<Self> {
        if local_name.is_empty() {
            return Err(Error::InvalidOperation(
                "the local name must not be empty".to_string(),
            ));
        }
        let names = reader.name_table();
        Ok(Target::Ns {
            local_name: names.add(local_name),
            namespace_uri: names.add(namespace_uri),
        })
    }

    /// Returns `true` if the reader is on an element with this name.
    fn matches<R: XmlRead + ?Sized>(&self, reader: &R) -> bool {
        if reader.node_type() != NodeType::Element {
            return false;
        }
        match self {
            Target::Name(name) => name.ptr_eq(reader.name()),
            Target::Ns {
                local_name,
                namespace_uri,
            } => {
                local_name.ptr_eq(reader.local_name()) && namespace_uri.ptr_eq(reader.namespace_uri())
            }
        }
    }
}

/// Skips everything that is not content: whitespace, comments, processing
/// instructions, the XML declaration and the document type. An attribute
/// cursor is moved back to its element.
pub(crate) fn move_to_content<R: XmlRead + ?Sized>(reader: &mut R) -> Result<NodeType> {
    loop {
        match reader.node_type() {
            NodeType::Attribute => {
                reader.move_to_element();
                return Ok(NodeType::Element);
            }
            NodeType::Element
            | NodeType::EndElement
            | NodeType::CData
            | NodeType::Text
            | NodeType::EntityReference
            | NodeType::EndEntity => return Ok(reader.node_type()),
            _ => {}
        }
        if !reader.read()? {
            return Ok(reader.node_type());
        }
    }
}

/// Moves past the current node and, for an element, past all of its
/// descendants and its end tag.
pub(crate) fn skip_subtree<R: XmlRead + ?Sized>(reader: &mut R) -> Result<bool> {
    reader.move_to_element();
    if reader.node_type() == NodeType::Element && !reader.is_empty_element() {
        let depth = reader.depth();
        while reader.read()? && depth < reader.depth() {}
        if reader.node_type() == NodeType::EndElement {
            return reader.read();
        }
        Ok(false)
    } else {
        reader.read()
    }
}

pub(crate) fn skip<R: XmlRead + ?Sized>(reader: &mut R) -> Result<()> {
    if reader.read_state() != ReadState::Interactive {
        return Ok(());
    }
    skip_subtree(reader)?;
    Ok(())
}

fn read_to_following_target<R: XmlRead + ?Sized>(reader: &mut R, target: Target) -> Result<bool> {
    while reader.read()? {
        if target.matches(reader) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn read_to_following<R: XmlRead + ?Sized>(reader: &mut R, name: &str) -> Result<bool> {
    let target = Target::name(reader, name)?;
    read_to_following_target(reader, target)
}

pub(crate) fn read_to_following_ns<R: XmlRead + ?Sized>(
    reader: &mut R,
    local_name: &str,
    namespace_uri: &str,
) -> Result<bool> {
    let target = Target::ns(reader, local_name, namespace_uri)?;
    read_to_following_target(reader, target)
}

fn read_to_descendant_target<R: XmlRead + ?Sized>(reader: &mut R, target: Target) -> Result<bool> {
    let mut parent_depth = reader.depth() as isize;
    if reader.node_type() != NodeType::Element {
        // before the first read the whole document is searched
        if reader.read_state() == ReadState::Initial {
            parent_depth -= 1;
        } else {
            return Ok(false);
        }
    } else if reader.is_empty_element() {
        return Ok(false);
    }
    while reader.read()? && reader.depth() as isize > parent_depth {
        if target.matches(reader) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn read_to_descendant<R: XmlRead + ?Sized>(reader: &mut R, name: &str) -> Result<bool> {
    let target = Target::name(reader, name)?;
    read_to_descendant_target(reader, target)
}

pub(crate) fn read_to_descendant_ns<R: XmlRead + ?Sized>(
    reader: &mut R,
    local_name: &str,
    namespace_uri: &str,
) -> Result<bool> {
    let target = Target::ns(reader, local_name, namespace_uri)?;
    read_to_descendant_target(reader, target)
}

fn read_to_next_sibling_target<R: XmlRead + ?Sized>(
    reader: &mut R,
    target: Target,
) -> Result<bool> {
    while skip_subtree(reader)? {
        if target.matches(reader) {
            return Ok(true);
        }
        if reader.node_type() == NodeType::EndElement || reader.eof() {
            break;
        }
    }
    Ok(false)
}

pub(crate) fn read_to_next_sibling<R: XmlRead + ?Sized>(
    reader: &mut R,
    name: &str,
) -> Result<bool> {
    let target = Target::name(reader, name)?;
    read_to_next_sibling_target(reader, target)
}

pub(crate) fn read_to_next_sibling_ns<R: XmlRead + ?Sized>(
    reader: &mut R,
    local_name: &str,
    namespace_uri: &str,
) -> Result<bool> {
    let target = Target::ns(reader, local_name, namespace_uri)?;
    read_to_next_sibling_target(reader, target)
}

pub(crate) fn read_start_element<R: XmlRead + ?Sized>(reader: &mut R) -> Result<()> {
    let node_type = move_to_content(reader)?;
    if node_type != NodeType::Element {
        return Err(Error::invalid_node("read_start_element", node_type));
    }
    reader.read()?;
    Ok(())
}

pub(crate) fn read_start_element_named<R: XmlRead + ?Sized>(
    reader: &mut R,
    name: &str,
) -> Result<()> {
    let node_type = move_to_content(reader)?;
    if node_type != NodeType::Element {
        return Err(Error::invalid_node("read_start_element", node_type));
    }
    if &**reader.name() != name {
        return Err(element_not_found(name));
    }
    reader.read()?;
    Ok(())
}

pub(crate) fn read_start_element_ns<R: XmlRead + ?Sized>(
    reader: &mut R,
    local_name: &str,
    namespace_uri: &str,
) -> Result<()> {
    let node_type = move_to_content(reader)?;
    if node_type != NodeType::Element {
        return Err(Error::invalid_node("read_start_element", node_type));
    }
    if &**reader.local_name() != local_name || &**reader.namespace_uri() != namespace_uri {
        return Err(element_not_found_ns(local_name, namespace_uri));
    }
    reader.read()?;
    Ok(())
}

pub(crate) fn read_end_element<R: XmlRead + ?Sized>(reader: &mut R) -> Result<()> {
    let node_type = move_to_content(reader)?;
    if node_type != NodeType::EndElement {
        return Err(Error::invalid_node("read_end_element", node_type));
    }
    reader.read()?;
    Ok(())
}
