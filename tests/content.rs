use chrono::{NaiveDate, Timelike};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use xml_cursor::errors::{Error, TextPosition};
use xml_cursor::read::{TypedValue, ValueType};
use xml_cursor::reader::{DtdProcessing, EntityHandling};
use xml_cursor::{NodeType, ReaderSettings, XmlRead, XmlReader, XmlTextReader};

fn reader(xml: &str) -> XmlTextReader<&[u8]> {
    let mut reader = XmlReader::create_from_str(xml, ReaderSettings::new());
    assert!(reader.read().unwrap());
    reader
}

#[test]
fn empty_element_reads_as_empty_string() {
    let mut r = reader("<a/>");
    assert_eq!(r.read_element_content_as_string().unwrap(), "");
    assert!(r.eof());
}

#[test]
fn element_without_content() {
    let mut r = reader("<r><a></a><b/></r>");
    r.read().unwrap();
    assert_eq!(r.read_element_content_as_int().unwrap(), 0);
    assert_eq!(r.name().as_str(), "b");
}

#[test]
fn text_element() {
    let mut r = reader("<a>hello</a>");
    assert_eq!(r.read_element_content_as_string().unwrap(), "hello");
    assert!(r.eof());
}

#[test]
fn int_element() {
    let mut r = reader("<a>42</a>");
    assert_eq!(r.read_element_content_as_int().unwrap(), 42);
}

#[test]
fn conversion_errors_carry_position() {
    let mut r = reader("<a>notanumber</a>");
    match r.read_element_content_as_int() {
        Err(Error::Conversion(e)) => {
            assert_eq!(e.type_name, "int");
            assert_eq!(e.value, "notanumber");
            assert_eq!(e.position, Some(TextPosition { line: 1, column: 4 }));
        }
        x => panic!("expected a conversion error, got {:?}", x),
    }
}

#[test]
fn nested_element_is_rejected() {
    let mut r = reader("<a><b/></a>");
    assert!(matches!(
        r.read_element_content_as_string(),
        Err(Error::InvalidOperation(_))
    ));
}

#[test]
fn content_spans_text_cdata_and_comments() {
    let mut r = reader("<a>one <!-- skipped --><![CDATA[<two>]]><?pi?> three</a>");
    assert_eq!(
        r.read_element_content_as_string().unwrap(),
        "one <two> three"
    );
}

#[test]
fn typed_values() {
    let mut r = reader(concat!(
        "<r>",
        "<flag> true </flag>",
        "<n>-7</n>",
        "<big>9000000000</big>",
        "<f>INF</f>",
        "<d>1.5e3</d>",
        "<m>12.50</m>",
        "<t>2002-10-10T12:00:00-05:00</t>",
        "<o>2002-10-10T12:00:00+02:00</o>",
        "<day>2002-10-10</day>",
        "</r>",
    ));
    r.read().unwrap();
    assert_eq!(r.read_element_content_as_boolean().unwrap(), true);
    assert_eq!(r.read_element_content_as_int().unwrap(), -7);
    assert_eq!(r.read_element_content_as_long().unwrap(), 9_000_000_000);
    assert_eq!(r.read_element_content_as_float().unwrap(), f32::INFINITY);
    assert_eq!(r.read_element_content_as_double().unwrap(), 1500.0);
    assert_eq!(
        r.read_element_content_as_decimal().unwrap(),
        Decimal::new(1250, 2)
    );
    let utc = NaiveDate::from_ymd_opt(2002, 10, 10)
        .unwrap()
        .and_hms_opt(17, 0, 0)
        .unwrap();
    assert_eq!(r.read_element_content_as_date_time().unwrap(), utc);
    let local = r.read_element_content_as_date_time_offset().unwrap();
    assert_eq!(local.hour(), 12);
    assert_eq!(local.offset().local_minus_utc(), 7200);
    let midnight = NaiveDate::from_ymd_opt(2002, 10, 10)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(r.read_element_content_as_date_time().unwrap(), midnight);
    assert_eq!(r.node_type(), NodeType::EndElement);
}

#[test]
fn name_checked_variants() {
    let mut r = reader(r#"<r xmlns="urn:r"><n>5</n><n>6</n></r>"#);
    r.read().unwrap();
    assert_eq!(r.read_element_content_as_int_ns("n", "urn:r").unwrap(), 5);
    assert!(matches!(
        r.read_element_content_as_int_ns("n", ""),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(r.name().as_str(), "n");
    assert_eq!(
        r.read_element_content_as_string_ns("n", "urn:r").unwrap(),
        "6"
    );
}

#[test]
fn qualified_names_resolve_in_scope() {
    let mut r = reader(r#"<r xmlns:x="urn:x"><type>x:Order</type></r>"#);
    r.read().unwrap();
    assert_eq!(
        r.read_element_content_as(ValueType::QualifiedName, None)
            .unwrap(),
        TypedValue::QualifiedName {
            local_name: "Order".to_string(),
            namespace: "urn:x".to_string(),
        }
    );
}

#[test]
fn typed_empty_values() {
    let mut r = reader("<r><a/></r>");
    r.read().unwrap();
    assert_eq!(
        r.read_element_content_as(ValueType::Boolean, None).unwrap(),
        TypedValue::Boolean(false)
    );
}

#[test]
fn content_of_an_attribute() {
    let mut r = reader("<a n=' 12 '/>");
    assert!(r.move_to_attribute("n"));
    assert_eq!(r.read_content_as_int().unwrap(), 12);
    assert_eq!(r.read_content_as_object().unwrap(), TypedValue::String(" 12 ".to_string()));
}

#[test]
fn content_as_requires_content_node() {
    let mut r = reader("<a>1</a>");
    assert!(matches!(
        r.read_content_as_int(),
        Err(Error::InvalidOperation(_))
    ));
    r.read().unwrap();
    assert_eq!(r.read_content_as_int().unwrap(), 1);
    assert_eq!(r.node_type(), NodeType::EndElement);
}

#[test]
fn entities_are_resolved_while_accumulating() {
    let settings = ReaderSettings::new()
        .dtd_processing(DtdProcessing::Parse)
        .entity_handling(EntityHandling::ExpandCharEntities);
    let mut r = XmlReader::create_from_str(
        "<!DOCTYPE a [<!ENTITY co 'ACME'>]><a>&co; &amp; sons</a>",
        settings,
    );
    r.read_to_following("a").unwrap();
    assert_eq!(
        r.read_element_content_as_string().unwrap(),
        "ACME & sons"
    );
}

#[test]
fn read_string_stops_at_markup() {
    let mut r = reader("<a>one<b/>two</a>");
    assert_eq!(r.read_string().unwrap(), "one");
    assert_eq!(r.name().as_str(), "b");
}

#[test]
fn base64_content_in_chunks() {
    let mut r = reader("<r><blob>SGVsbG8s\n IHdvcmxkIQ==</blob><next/></r>");
    r.read().unwrap();
    assert!(r.can_read_binary_content());
    let mut out = Vec::new();
    let mut buf = [0u8; 4];
    loop {
        let n = r.read_element_content_as_base64(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, b"Hello, world!");
    assert_eq!(r.name().as_str(), "next");
}

#[test]
fn bin_hex_content() {
    let mut r = reader("<r>0aFF</r>");
    r.read().unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(r.read_content_as_bin_hex(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], &[0x0a, 0xff]);
    assert_eq!(r.read_content_as_bin_hex(&mut buf).unwrap(), 0);
    assert_eq!(r.node_type(), NodeType::EndElement);
}
