//! Configuration consumed by the readers.

use std::sync::Arc;

use crate::node::XmlSpace;

/// Default size of the buffer between the input and the tokenizer.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 4096;

/// How strictly the document structure is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConformanceLevel {
    /// Decide from the input: an XML declaration or a DOCTYPE switches to
    /// [`ConformanceLevel::Document`], otherwise the input is read as a fragment
    Auto,
    /// Any number of top-level elements and top-level character data
    Fragment,
    /// Exactly one root element, no character data outside of it
    Document,
}

/// What to do with a `<!DOCTYPE>` declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DtdProcessing {
    /// A DOCTYPE is a well-formedness error
    Prohibit,
    /// The DOCTYPE is skipped without reporting a node
    Ignore,
    /// The DOCTYPE is reported and internal entity declarations are honored
    Parse,
}

/// How references to declared general entities are surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityHandling {
    /// Replacement text is merged into the surrounding character data
    ExpandEntities,
    /// Only character references are expanded; general entities surface as
    /// `EntityReference` nodes the caller may resolve
    ExpandCharEntities,
}

/// Builder for the reader configuration.
///
/// Every setter consumes and returns the settings, so a configuration is
/// written as one chain:
///
/// ```
/// use xml_cursor::reader::{ConformanceLevel, ReaderSettings};
///
/// let settings = ReaderSettings::new()
///     .ignore_whitespace(true)
///     .conformance_level(ConformanceLevel::Fragment);
/// assert!(settings.get_ignore_whitespace());
/// ```
#[derive(Clone, Debug)]
pub struct ReaderSettings {
    pub(crate) ignore_whitespace: bool,
    pub(crate) ignore_comments: bool,
    pub(crate) ignore_processing_instructions: bool,
    pub(crate) conformance_level: ConformanceLevel,
    pub(crate) dtd_processing: DtdProcessing,
    pub(crate) entity_handling: EntityHandling,
    pub(crate) namespaces: bool,
    pub(crate) check_comments: bool,
    pub(crate) buffer_size: Option<usize>,
    pub(crate) line_number_offset: usize,
    pub(crate) line_position_offset: usize,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderSettings {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            ignore_whitespace: false,
            ignore_comments: false,
            ignore_processing_instructions: false,
            conformance_level: ConformanceLevel::Document,
            dtd_processing: DtdProcessing::Prohibit,
            entity_handling: EntityHandling::ExpandEntities,
            namespaces: true,
            check_comments: false,
            buffer_size: None,
            line_number_offset: 0,
            line_position_offset: 0,
        }
    }

    /// Changes whether insignificant whitespace is reported.
    ///
    /// When set to `true`, `Whitespace` nodes are skipped. Whitespace inside
    /// an `xml:space="preserve"` scope is significant and is always reported.
    ///
    /// (`false` by default)
    pub fn ignore_whitespace(mut self, val: bool) -> Self {
        self.ignore_whitespace = val;
        self
    }

    /// Changes whether comments are reported.
    ///
    /// (`false` by default)
    pub fn ignore_comments(mut self, val: bool) -> Self {
        self.ignore_comments = val;
        self
    }

    /// Changes whether processing instructions are reported. The XML
    /// declaration is not a processing instruction and is not affected.
    ///
    /// (`false` by default)
    pub fn ignore_processing_instructions(mut self, val: bool) -> Self {
        self.ignore_processing_instructions = val;
        self
    }

    /// Sets the structural checks applied to the input.
    ///
    /// ([`ConformanceLevel::Document`] by default)
    pub fn conformance_level(mut self, val: ConformanceLevel) -> Self {
        self.conformance_level = val;
        self
    }

    /// Sets the treatment of `<!DOCTYPE>`.
    ///
    /// ([`DtdProcessing::Prohibit`] by default)
    pub fn dtd_processing(mut self, val: DtdProcessing) -> Self {
        self.dtd_processing = val;
        self
    }

    /// Sets how declared general entities are reported.
    ///
    /// ([`EntityHandling::ExpandEntities`] by default)
    pub fn entity_handling(mut self, val: EntityHandling) -> Self {
        self.entity_handling = val;
        self
    }

    /// Changes whether namespace declarations are processed.
    ///
    /// When `false`, names are reported as written: colons are part of the
    /// local name and every namespace URI is empty.
    ///
    /// (`true` by default)
    pub fn namespaces(mut self, val: bool) -> Self {
        self.namespaces = val;
        self
    }

    /// Changes whether comments should be validated.
    ///
    /// When set to `true`, every [`Comment`] node is checked for not containing
    /// `--`, which [is not allowed] in XML comments. Most of the time we don't
    /// want comments at all so we don't really care about comment correctness,
    /// thus the default value is `false` to improve performance.
    ///
    /// (`false` by default)
    ///
    /// [`Comment`]: crate::node::NodeType::Comment
    /// [is not allowed]: https://www.w3.org/TR/xml11/#sec-comments
    pub fn check_comments(mut self, val: bool) -> Self {
        self.check_comments = val;
        self
    }

    /// Forces the size of the input buffer, overriding the size the factory
    /// would pick.
    pub fn buffer_size(mut self, val: usize) -> Self {
        self.buffer_size = Some(val.max(1));
        self
    }

    /// Added to every reported line number.
    ///
    /// (`0` by default)
    pub fn line_number_offset(mut self, val: usize) -> Self {
        self.line_number_offset = val;
        self
    }

    /// Added to every column reported on the first line.
    ///
    /// (`0` by default)
    pub fn line_position_offset(mut self, val: usize) -> Self {
        self.line_position_offset = val;
        self
    }

    /// Returns `true` if insignificant whitespace is skipped.
    pub fn get_ignore_whitespace(&self) -> bool {
        self.ignore_whitespace
    }

    /// Returns the configured conformance level.
    pub fn get_conformance_level(&self) -> ConformanceLevel {
        self.conformance_level
    }

    /// Returns the configured DOCTYPE treatment.
    pub fn get_dtd_processing(&self) -> DtdProcessing {
        self.dtd_processing
    }

    /// Returns the forced buffer size, if any.
    pub fn get_buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }
}

/// Context a document fragment is read in: where it came from and what is
/// in scope around it.
#[derive(Clone, Debug, Default)]
pub struct ParserContext {
    pub(crate) base_uri: Option<Arc<str>>,
    pub(crate) xml_lang: Option<String>,
    pub(crate) xml_space: XmlSpace,
    pub(crate) namespaces: Vec<(String, String)>,
}

impl ParserContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URI reported for every node.
    pub fn base_uri(mut self, uri: &str) -> Self {
        self.base_uri = Some(Arc::from(uri));
        self
    }

    /// Sets the `xml:lang` in scope around the fragment.
    pub fn xml_lang(mut self, lang: &str) -> Self {
        self.xml_lang = Some(lang.to_string());
        self
    }

    /// Sets the `xml:space` in scope around the fragment.
    pub fn xml_space(mut self, space: XmlSpace) -> Self {
        self.xml_space = space;
        self
    }

    /// Binds `prefix` to `namespace` around the fragment. An empty prefix
    /// sets the default namespace.
    pub fn namespace(mut self, prefix: &str, namespace: &str) -> Self {
        self.namespaces.push((prefix.to_string(), namespace.to_string()));
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let settings = ReaderSettings::default();
        assert_eq!(settings.get_conformance_level(), ConformanceLevel::Document);
        assert_eq!(settings.get_dtd_processing(), DtdProcessing::Prohibit);
        assert_eq!(settings.entity_handling, EntityHandling::ExpandEntities);
        assert!(settings.namespaces);
        assert_eq!(settings.get_buffer_size(), None);
    }

    #[test]
    fn buffer_size_is_at_least_one() {
        assert_eq!(ReaderSettings::new().buffer_size(0).get_buffer_size(), Some(1));
    }

    #[test]
    fn context_collects_bindings() {
        let context = ParserContext::new()
            .namespace("", "urn:d")
            .namespace("p", "urn:p")
            .xml_lang("en");
        assert_eq!(context.namespaces.len(), 2);
        assert_eq!(context.xml_lang.as_deref(), Some("en"));
        assert_eq!(context.xml_space, XmlSpace::None);
    }
}
