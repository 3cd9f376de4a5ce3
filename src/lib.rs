//! Forward-only, pull-based XML reading with a cursor API.
//!
//! ## Description
//!
//! - [`XmlTextReader`]: a cursor over the nodes of a document. Every call to
//!   `read` moves it to the next node, whose kind, names, value and attributes
//!   are then available through accessors. Well-formedness is checked as the
//!   cursor moves and namespaces are resolved.
//! - [`XmlRead`]: the trait every reader implements. Besides the primitives it
//!   provides navigation (`skip`, `read_to_following`, ...), typed content
//!   reads (`read_element_content_as_int`, ...) and re-serialization
//!   (`read_inner_xml`, `read_outer_xml`, `read_subtree`).
//! - [`XmlReader`]: constructors for readers over paths, streams and strings.
//! - [`Reader`]: the low-level tokenizer the node reader is built on.
//!
//! ## Example
//!
//! ```
//! use xml_cursor::{ReaderSettings, XmlRead, XmlReader};
//!
//! let xml = r#"<inventory>
//!     <item sku="a-1"><count>12</count><price>2.50</price></item>
//!     <item sku="b-7"><count>3</count><price>19.90</price></item>
//! </inventory>"#;
//!
//! let mut reader = XmlReader::create_from_str(xml, ReaderSettings::new().ignore_whitespace(true));
//! let mut total = 0;
//! while reader.read_to_following("item").unwrap() {
//!     reader.read().unwrap();
//!     total += reader.read_element_content_as_int().unwrap();
//! }
//! assert_eq!(total, 15);
//! ```
//!
//! # Features
//!
//! `xml-cursor` supports the following features:
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![recursion_limit = "1024"]
// Enable feature requirements in the docs from 1.57
// See https://stackoverflow.com/questions/61417452
#![cfg_attr(docs_rs, feature(doc_auto_cfg))]

pub mod errors;
pub mod escape;
pub mod events;
pub mod name;
pub mod node;
pub mod read;
pub mod reader;
pub mod writer;

// reexports
pub use crate::errors::{Error, Result};
pub use crate::node::{NodeType, ReadState};
pub use crate::read::XmlRead;
pub use crate::reader::{Decoder, Reader, ReaderSettings, XmlReader, XmlTextReader};
pub use crate::writer::{XmlSink, XmlWriter};
