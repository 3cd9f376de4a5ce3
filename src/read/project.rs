//! Re-serialization of the nodes under the cursor.

use crate::errors::Result;
use crate::node::{NodeType, ReadState};
use crate::read::XmlRead;
use crate::writer::{XmlSink, XmlWriter};

/// Writes the current node, without moving.
fn write_current<R: XmlRead + ?Sized>(reader: &mut R, sink: &mut dyn XmlSink) -> Result<()> {
    match reader.node_type() {
        NodeType::Element => {
            sink.write_start_element(reader.prefix(), reader.local_name(), reader.namespace_uri())?;
            write_attributes(reader, sink)?;
            if reader.is_empty_element() {
                sink.write_end_element()?;
            }
        }
        NodeType::Text => sink.write_string(reader.value())?,
        NodeType::Whitespace | NodeType::SignificantWhitespace => {
            sink.write_whitespace(reader.value())?
        }
        NodeType::CData => sink.write_cdata(reader.value())?,
        NodeType::EntityReference => sink.write_entity_ref(reader.name())?,
        NodeType::XmlDeclaration | NodeType::ProcessingInstruction => {
            sink.write_processing_instruction(reader.name(), reader.value())?
        }
        NodeType::DocumentType => sink.write_doctype(
            reader.name(),
            reader.get_attribute("PUBLIC"),
            reader.get_attribute("SYSTEM"),
            reader.value(),
        )?,
        NodeType::Comment => sink.write_comment(reader.value())?,
        NodeType::EndElement => sink.write_full_end_element()?,
        _ => {}
    }
    Ok(())
}

/// Writes every attribute of the current element, keeping entity references
/// in attribute values as references.
fn write_attributes<R: XmlRead + ?Sized>(reader: &mut R, sink: &mut dyn XmlSink) -> Result<()> {
    if !reader.move_to_first_attribute() {
        return Ok(());
    }
    loop {
        if !reader.is_default() {
            sink.write_start_attribute(
                reader.prefix(),
                reader.local_name(),
                reader.namespace_uri(),
            )?;
            while reader.read_attribute_value() {
                if reader.node_type() == NodeType::EntityReference {
                    sink.write_entity_ref(reader.name())?;
                } else {
                    sink.write_string(reader.value())?;
                }
            }
            sink.write_end_attribute()?;
        }
        if !reader.move_to_next_attribute() {
            break;
        }
    }
    reader.move_to_element();
    Ok(())
}

/// Writes the value of the current attribute and returns to it.
fn write_attribute_value<R: XmlRead + ?Sized>(
    reader: &mut R,
    sink: &mut dyn XmlSink,
) -> Result<()> {
    let name = reader.name().clone();
    while reader.read_attribute_value() {
        if reader.node_type() == NodeType::EntityReference {
            sink.write_entity_ref(reader.name())?;
        } else {
            sink.write_string(reader.value())?;
        }
    }
    reader.move_to_attribute(&name);
    Ok(())
}

/// Copies the current node and, for an element, its whole subtree into
/// `sink`, leaving the reader on the node that follows.
///
/// Before the first read the whole document is copied.
pub(crate) fn write_node<R: XmlRead + ?Sized>(
    reader: &mut R,
    sink: &mut dyn XmlSink,
) -> Result<()> {
    let start = match reader.node_type() {
        NodeType::None => None,
        _ => Some(reader.depth()),
    };
    loop {
        write_current(reader, sink)?;
        if !reader.read()? {
            break;
        }
        if let Some(depth) = start {
            let inside = depth < reader.depth()
                || (depth == reader.depth() && reader.node_type() == NodeType::EndElement);
            if !inside {
                break;
            }
        }
    }
    Ok(())
}

/// Copies the children of the current element into `sink` and moves past
/// its end tag.
fn write_children<R: XmlRead + ?Sized>(reader: &mut R, sink: &mut dyn XmlSink) -> Result<()> {
    let depth = reader.depth();
    while reader.read()? && depth < reader.depth() {
        write_current(reader, sink)?;
    }
    if depth == reader.depth() && reader.node_type() == NodeType::EndElement {
        reader.read()?;
    }
    Ok(())
}

pub(crate) fn read_inner_xml<R: XmlRead + ?Sized>(reader: &mut R) -> Result<String> {
    if reader.read_state() != ReadState::Interactive {
        return Ok(String::new());
    }
    let mut writer = XmlWriter::new(Vec::new());
    match reader.node_type() {
        NodeType::Attribute => write_attribute_value(reader, &mut writer)?,
        NodeType::Element => write_children(reader, &mut writer)?,
        _ => return Ok(String::new()),
    }
    writer.into_string()
}

pub(crate) fn read_outer_xml<R: XmlRead + ?Sized>(reader: &mut R) -> Result<String> {
    if reader.read_state() != ReadState::Interactive {
        return Ok(String::new());
    }
    let mut writer = XmlWriter::new(Vec::new());
    match reader.node_type() {
        NodeType::Attribute => {
            writer.write_start_attribute(
                reader.prefix(),
                reader.local_name(),
                reader.namespace_uri(),
            )?;
            write_attribute_value(reader, &mut writer)?;
            writer.write_end_attribute()?;
        }
        NodeType::Element => write_node(reader, &mut writer)?,
        _ => return Ok(String::new()),
    }
    writer.into_string()
}
