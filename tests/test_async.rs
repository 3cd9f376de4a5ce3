use std::path::PathBuf;

use pretty_assertions::assert_eq;
use xml_cursor::reader::ConformanceLevel;
use xml_cursor::{NodeType, ReadState, ReaderSettings, XmlReader};

#[tokio::test]
async fn test_catalog() {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/documents/catalog.xml");
    let file = tokio::fs::File::open(path).await.unwrap();
    let mut r = XmlReader::create_async(file, ReaderSettings::new().ignore_whitespace(true));
    let mut products = Vec::new();
    let mut elements = 0;
    while r.read_async().await.unwrap() {
        if r.node_type() == NodeType::Element {
            elements += 1;
            if r.local_name().as_str() == "product" {
                products.push(r.get_attribute("id").unwrap().to_string());
            }
        }
    }
    assert_eq!(products, ["p-100", "p-200", "p-300"]);
    assert_eq!(elements, 20);
}

#[tokio::test]
async fn same_nodes_as_sync() {
    let xml = "<?xml version='1.0'?><!--c--><r a='1'>t<![CDATA[x]]><e/>\n</r>";

    let mut sync = XmlReader::create_from_str(xml, ReaderSettings::new());
    let mut expected = Vec::new();
    while sync.read().unwrap() {
        expected.push((sync.node_type(), sync.name().to_string(), sync.value().to_string()));
    }

    let mut r = XmlReader::create_async(xml.as_bytes(), ReaderSettings::new());
    let mut nodes = Vec::new();
    while r.read_async().await.unwrap() {
        nodes.push((r.node_type(), r.name().to_string(), r.value().to_string()));
    }
    assert_eq!(nodes, expected);
    assert_eq!(r.read_state(), ReadState::EndOfFile);
}

#[tokio::test]
async fn errors_are_reported() {
    let mut r = XmlReader::create_async(&b"<a><b></a>"[..], ReaderSettings::new());
    assert!(r.read_async().await.unwrap());
    assert!(r.read_async().await.unwrap());
    assert!(r.read_async().await.is_err());
    assert_eq!(r.read_state(), ReadState::Error);
    assert!(!r.read_async().await.unwrap());
}

#[tokio::test]
async fn trailing_whitespace_and_text() {
    let inputs: [(&[u8], ConformanceLevel, &[NodeType]); 4] = [
        (b"<a/>\n", ConformanceLevel::Document, &[NodeType::Element, NodeType::Whitespace]),
        (b"<a/>\r\n", ConformanceLevel::Document, &[NodeType::Element, NodeType::Whitespace]),
        (b"<a/> ", ConformanceLevel::Document, &[NodeType::Element, NodeType::Whitespace]),
        (b"<a/>x", ConformanceLevel::Fragment, &[NodeType::Element, NodeType::Text]),
    ];
    for (xml, level, expected) in inputs.iter() {
        let settings = ReaderSettings::new().conformance_level(*level);
        let mut r = XmlReader::create_async(*xml, settings);
        let mut kinds = Vec::new();
        while r.read_async().await.unwrap() {
            kinds.push(r.node_type());
        }
        assert_eq!(kinds, *expected);
        assert_eq!(r.read_state(), ReadState::EndOfFile);
    }
}
