use pretty_assertions::assert_eq;
use xml_cursor::reader::{DtdProcessing, EntityHandling};
use xml_cursor::writer::XmlWriter;
use xml_cursor::{NodeType, ReaderSettings, XmlRead, XmlReader, XmlTextReader};

fn reader(xml: &str) -> XmlTextReader<&[u8]> {
    XmlReader::create_from_str(xml, ReaderSettings::new())
}

#[test]
fn inner_xml_moves_past_the_element() {
    let mut r = reader("<r><a>one<b/>two</a><c/></r>");
    r.read().unwrap();
    r.read().unwrap();
    assert_eq!(r.read_inner_xml().unwrap(), "one<b/>two");
    assert_eq!(r.name().as_str(), "c");
}

#[test]
fn outer_xml_includes_the_tags() {
    let mut r = reader("<r><a k=\"v\">one<b/>two</a><c/></r>");
    r.read().unwrap();
    r.read().unwrap();
    assert_eq!(r.read_outer_xml().unwrap(), "<a k=\"v\">one<b/>two</a>");
    assert_eq!(r.name().as_str(), "c");
}

#[test]
fn outer_xml_of_an_empty_element() {
    let mut r = reader("<r><a/>tail</r>");
    r.read().unwrap();
    r.read().unwrap();
    assert_eq!(r.read_outer_xml().unwrap(), "<a/>");
    assert_eq!(r.node_type(), NodeType::Text);
}

#[test]
fn markup_of_an_attribute() {
    let mut r = reader(r#"<a x="1 &amp; 2"/>"#);
    r.read().unwrap();
    assert!(r.move_to_attribute("x"));
    assert_eq!(r.read_inner_xml().unwrap(), "1 &amp; 2");
    assert_eq!(r.node_type(), NodeType::Attribute);
    assert_eq!(r.read_outer_xml().unwrap(), r#"x="1 &amp; 2""#);
    assert_eq!(r.name().as_str(), "x");
}

#[test]
fn other_nodes_give_nothing() {
    let mut r = reader("<a>text</a>");
    assert_eq!(r.read_inner_xml().unwrap(), "");
    r.read().unwrap();
    r.read().unwrap();
    assert_eq!(r.read_inner_xml().unwrap(), "");
    assert_eq!(r.read_outer_xml().unwrap(), "");
    assert_eq!(r.value(), "text");
}

#[test]
fn namespaces_are_declared_where_needed() {
    let mut r = reader(r#"<r xmlns:p="urn:p"><p:a x="1"/></r>"#);
    r.read().unwrap();
    assert_eq!(
        r.read_outer_xml().unwrap(),
        r#"<r xmlns:p="urn:p"><p:a x="1"/></r>"#
    );

    let mut r = reader(r#"<r xmlns:p="urn:p"><p:a x="1"/></r>"#);
    r.read().unwrap();
    assert_eq!(r.read_inner_xml().unwrap(), r#"<p:a x="1" xmlns:p="urn:p"/>"#);
}

#[test]
fn unexpanded_entities_are_kept() {
    let settings = ReaderSettings::new()
        .dtd_processing(DtdProcessing::Parse)
        .entity_handling(EntityHandling::ExpandCharEntities);
    let mut r = XmlReader::create_from_str(
        "<!DOCTYPE r [<!ENTITY e 'x'>]><r>a&e;b</r>",
        settings,
    );
    assert!(r.read_to_following("r").unwrap());
    assert_eq!(r.read_inner_xml().unwrap(), "a&e;b");
}

#[test]
fn write_node_copies_the_document() {
    let mut r = reader("<!--c--><r a=\"1\">t<![CDATA[x]]></r>");
    let mut writer = XmlWriter::new(Vec::new());
    r.write_node(&mut writer).unwrap();
    assert_eq!(
        writer.into_string().unwrap(),
        "<!--c--><r a=\"1\">t<![CDATA[x]]></r>"
    );
    assert!(r.eof());
}

#[test]
fn write_node_copies_one_subtree() {
    let mut r = reader("<r><a><b>t</b></a><c/></r>");
    r.read().unwrap();
    r.read().unwrap();
    let mut writer = XmlWriter::new(Vec::new());
    r.write_node(&mut writer).unwrap();
    assert_eq!(writer.into_string().unwrap(), "<a><b>t</b></a>");
    assert_eq!(r.name().as_str(), "c");
}

#[test]
fn subtree_outer_xml() {
    let mut r = reader("<r><a><b/></a><c/></r>");
    r.read().unwrap();
    r.read().unwrap();
    {
        let mut sub = r.read_subtree().unwrap();
        assert!(sub.read().unwrap());
        let mut writer = XmlWriter::new(Vec::new());
        sub.write_node(&mut writer).unwrap();
        assert_eq!(writer.into_string().unwrap(), "<a><b/></a>");
        assert!(sub.eof());
    }
    assert_eq!(r.node_type(), NodeType::EndElement);
    r.read().unwrap();
    assert_eq!(r.name().as_str(), "c");
}

/// Node kinds, names, values, depths and attributes of every node `r` reports.
fn nodes<R: XmlRead>(r: &mut R) -> Vec<(NodeType, String, String, usize, Vec<(String, String)>)> {
    let mut nodes = Vec::new();
    while r.read().unwrap() {
        let mut attributes = Vec::new();
        if r.move_to_first_attribute() {
            loop {
                attributes.push((r.name().to_string(), r.value().to_string()));
                if !r.move_to_next_attribute() {
                    break;
                }
            }
            r.move_to_element();
        }
        nodes.push((
            r.node_type(),
            r.name().to_string(),
            r.value().to_string(),
            r.depth(),
            attributes,
        ));
    }
    nodes
}

#[test]
fn outer_xml_reads_back_the_same_nodes() {
    let xml = r#"<r><a k="v">one<b x="1 &amp; 2"/><!--c--><?p d?><![CDATA[<x>]]></a><z/></r>"#;

    let mut r = reader(xml);
    assert!(r.read_to_following("a").unwrap());
    let expected = nodes(&mut r.read_subtree().unwrap());

    let mut r = reader(xml);
    assert!(r.read_to_following("a").unwrap());
    let outer = r.read_outer_xml().unwrap();
    let projected = nodes(&mut reader(&outer));

    assert_eq!(projected, expected);
    assert_eq!(expected.len(), 7);
}
