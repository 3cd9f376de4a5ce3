use std::fs::File;
use std::path::PathBuf;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use xml_cursor::reader::{ConformanceLevel, ParserContext};
use xml_cursor::{NodeType, ReadState, ReaderSettings, XmlRead, XmlReader};

fn catalog() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/documents/catalog.xml");
    path
}

#[derive(Debug, PartialEq)]
struct Product {
    id: String,
    lang: String,
    name: String,
    currency: String,
    price: Decimal,
    stock: i32,
    available: bool,
}

fn read_products<R: XmlRead>(r: &mut R) -> Vec<Product> {
    let mut products = Vec::new();
    while r.read_to_following_ns("product", "urn:example:catalog").unwrap() {
        let id = r.get_attribute("id").unwrap().to_string();
        let lang = r.xml_lang().to_string();
        assert!(r.read_to_descendant("name").unwrap());
        let name = r.read_element_content_as_string().unwrap();
        let currency = r
            .get_attribute_ns("currency", "urn:example:money")
            .unwrap()
            .to_string();
        let price = r.read_element_content_as_decimal().unwrap();
        let stock = r.read_element_content_as_int().unwrap();
        let available = r.read_element_content_as_boolean().unwrap();
        products.push(Product {
            id,
            lang,
            name,
            currency,
            price,
            stock,
            available,
        });
    }
    products
}

#[test]
fn from_path() {
    let mut r =
        XmlReader::create_from_path(catalog(), ReaderSettings::new().ignore_whitespace(true))
            .unwrap();
    assert!(r.base_uri().starts_with("file://"));
    assert!(r.base_uri().ends_with("catalog.xml"));

    assert_eq!(r.move_to_content().unwrap(), NodeType::Element);
    assert!(r.move_to_attribute("updated"));
    let updated = NaiveDate::from_ymd_opt(2022, 6, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();
    assert_eq!(r.read_content_as_date_time().unwrap(), updated);

    let products = read_products(&mut r);
    assert_eq!(
        products,
        vec![
            Product {
                id: "p-100".to_string(),
                lang: "en".to_string(),
                name: "Espresso cup".to_string(),
                currency: "EUR".to_string(),
                price: Decimal::new(450, 2),
                stock: 120,
                available: true,
            },
            Product {
                id: "p-200".to_string(),
                lang: "de".to_string(),
                name: "Milchkanne".to_string(),
                currency: "EUR".to_string(),
                price: Decimal::new(1290, 2),
                stock: 0,
                available: false,
            },
            Product {
                id: "p-300".to_string(),
                lang: "".to_string(),
                name: "Tamper".to_string(),
                currency: "USD".to_string(),
                price: Decimal::new(2900, 2),
                stock: 7,
                available: true,
            },
        ]
    );
    assert!(r.eof());
}

#[test]
fn from_uri() {
    let uri = format!("file://{}", catalog().display());
    let mut r = XmlReader::create_from_uri(&uri, ReaderSettings::new()).unwrap();
    assert_eq!(r.base_uri(), uri);
    assert!(r.read_to_following("description").unwrap());
    assert_eq!(
        r.read_element_content_as_string().unwrap(),
        "Holds 60 ml & keeps it <hot>."
    );
}

#[test]
fn missing_file() {
    let path = catalog().with_file_name("missing.xml");
    assert!(XmlReader::create_from_path(path, ReaderSettings::new()).is_err());
}

#[test]
fn from_seekable_file() {
    let file = File::open(catalog()).unwrap();
    let settings = ReaderSettings::new().ignore_whitespace(true);
    let mut r = XmlReader::create_from_seekable(file, settings).unwrap();
    assert_eq!(read_products(&mut r).len(), 3);
}

#[test]
fn fragment_with_context() {
    let context = ParserContext::new()
        .namespace("m", "urn:example:money")
        .xml_lang("fr");
    let mut r = XmlReader::create_from_str_with_context(
        r#"<price m:currency="CHF">3.10</price><price m:currency="EUR">2.90</price>"#,
        ReaderSettings::new().conformance_level(ConformanceLevel::Fragment),
        context,
    );
    let mut prices = Vec::new();
    while r.is_start_element_named("price").unwrap() {
        assert_eq!(r.xml_lang(), "fr");
        let currency = r
            .get_attribute_ns("currency", "urn:example:money")
            .unwrap()
            .to_string();
        prices.push((currency, r.read_element_content_as_decimal().unwrap()));
    }
    assert_eq!(
        prices,
        vec![
            ("CHF".to_string(), Decimal::new(310, 2)),
            ("EUR".to_string(), Decimal::new(290, 2)),
        ]
    );
}

/// Kind, name and value of every node up to the end of input.
fn nodes<R: XmlRead>(r: &mut R) -> Vec<(NodeType, String, String)> {
    let mut nodes = Vec::new();
    while r.read().unwrap() {
        nodes.push((r.node_type(), r.name().to_string(), r.value().to_string()));
    }
    assert_eq!(r.read_state(), ReadState::EndOfFile);
    nodes
}

#[test]
fn trailing_line_feed() {
    let expected = vec![
        (NodeType::Element, "a".to_string(), "".to_string()),
        (NodeType::Whitespace, "".to_string(), "\n".to_string()),
    ];
    for xml in &["<a/>\n", "<a/>\r\n"] {
        let mut r = XmlReader::create_from_str(xml, ReaderSettings::new());
        assert_eq!(nodes(&mut r), expected);
        let mut r = XmlReader::create_from_reader(xml.as_bytes(), ReaderSettings::new());
        assert_eq!(nodes(&mut r), expected);
    }
}

#[test]
fn trailing_comment_and_line_feed() {
    let xml = "<?xml version='1.0'?>\n<a>t</a><!--c-->\n";
    let expected = vec![
        (NodeType::XmlDeclaration, "xml".to_string(), "version='1.0'".to_string()),
        (NodeType::Whitespace, "".to_string(), "\n".to_string()),
        (NodeType::Element, "a".to_string(), "".to_string()),
        (NodeType::Text, "".to_string(), "t".to_string()),
        (NodeType::EndElement, "a".to_string(), "".to_string()),
        (NodeType::Comment, "".to_string(), "c".to_string()),
        (NodeType::Whitespace, "".to_string(), "\n".to_string()),
    ];
    let mut r = XmlReader::create_from_str(xml, ReaderSettings::new());
    assert_eq!(nodes(&mut r), expected);

    let settings = ReaderSettings::new().buffer_size(1);
    let mut r = XmlReader::create_from_reader(xml.as_bytes(), settings);
    assert_eq!(nodes(&mut r), expected);
}

#[test]
fn trailing_text_in_a_fragment() {
    let settings = ReaderSettings::new().conformance_level(ConformanceLevel::Fragment);
    let mut r = XmlReader::create_from_str("<a/>x", settings);
    assert_eq!(
        nodes(&mut r),
        vec![
            (NodeType::Element, "a".to_string(), "".to_string()),
            (NodeType::Text, "".to_string(), "x".to_string()),
        ]
    );

    let mut r = XmlReader::create_from_str("<a/>x", ReaderSettings::new());
    assert!(r.read().unwrap());
    assert!(r.read().is_err());
    assert_eq!(r.read_state(), ReadState::Error);
}
