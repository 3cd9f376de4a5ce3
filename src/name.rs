//! Names and namespaces as defined by [Namespaces in XML 1.1 (Second Edition)][names],
//! and their interning.
//!
//! [names]: https://www.w3.org/TR/xml-names11

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of all `xmlns` and `xmlns:*` attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// An interned string.
///
/// Two atoms produced by the same [`NameTable`] for equal text share one
/// allocation, so [`Atom::ptr_eq`] answers equality without looking at the
/// characters.
#[derive(Clone)]
pub struct Atom(Arc<str>);

impl Atom {
    /// Returns `true` if both atoms are the same interned instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the text of the atom.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Atom {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Atom {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Atom {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Atom {
    #[inline]
    fn eq(&self, other: &Atom) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Atom {}

impl PartialEq<str> for Atom {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl<'a> PartialEq<&'a str> for Atom {
    #[inline]
    fn eq(&self, other: &&'a str) -> bool {
        &*self.0 == *other
    }
}

impl Hash for Atom {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must agree with `str`, otherwise lookups through `Borrow<str>` break
        self.0.hash(state)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of interned names.
///
/// Readers put every element, attribute and namespace name they report through
/// their table, so a name obtained from [`NameTable::add`] can be compared with
/// the reader's names by identity.
pub struct NameTable {
    atoms: RefCell<HashSet<Atom>>,
    empty: Atom,
}

impl NameTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            atoms: RefCell::new(HashSet::new()),
            empty: Atom(Arc::from("")),
        }
    }

    /// Interns `name`, returning the shared atom for it.
    pub fn add(&self, name: &str) -> Atom {
        if name.is_empty() {
            return self.empty.clone();
        }
        if let Some(atom) = self.atoms.borrow().get(name) {
            return atom.clone();
        }
        let atom = Atom(Arc::from(name));
        self.atoms.borrow_mut().insert(atom.clone());
        atom
    }

    /// Returns the atom for `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<Atom> {
        if name.is_empty() {
            return Some(self.empty.clone());
        }
        self.atoms.borrow().get(name).cloned()
    }

    /// The atom of the empty string.
    #[inline]
    pub fn empty(&self) -> &Atom {
        &self.empty
    }

    /// Number of distinct non-empty names in the table.
    pub fn len(&self) -> usize {
        self.atoms.borrow().len()
    }

    /// Returns `true` if nothing but the empty string was interned.
    pub fn is_empty(&self) -> bool {
        self.atoms.borrow().is_empty()
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NameTable").field("len", &self.len()).finish()
    }
}

/// Splits a qualified name into `(prefix, local name)`.
///
/// Names without a colon have an empty prefix.
#[inline]
pub fn split_qname(qname: &str) -> (&str, &str) {
    match memchr::memchr(b':', qname.as_bytes()) {
        Some(i) => (&qname[..i], &qname[i + 1..]),
        None => ("", qname),
    }
}

/// A namespace binding introduced by an element.
#[derive(Clone, Debug)]
struct Binding {
    prefix: Atom,
    namespace: Atom,
}

/// Stack of namespace scopes, one per open element.
///
/// The `xml` and `xmlns` prefixes are always bound.
#[derive(Clone, Debug)]
pub struct NamespaceResolver {
    bindings: Vec<Binding>,
    /// Start index in `bindings` for each open scope
    scopes: Vec<usize>,
    xml: Atom,
    xmlns: Atom,
    xml_namespace: Atom,
    xmlns_namespace: Atom,
}

impl NamespaceResolver {
    /// Creates a resolver whose names come from `names`.
    pub fn new(names: &NameTable) -> Self {
        Self {
            bindings: Vec::new(),
            scopes: Vec::new(),
            xml: names.add("xml"),
            xmlns: names.add("xmlns"),
            xml_namespace: names.add(XML_NAMESPACE),
            xmlns_namespace: names.add(XMLNS_NAMESPACE),
        }
    }

    /// Opens a new scope.
    #[inline]
    pub fn push_scope(&mut self) {
        self.scopes.push(self.bindings.len());
    }

    /// Closes the innermost scope, forgetting its bindings.
    pub fn pop_scope(&mut self) {
        if let Some(start) = self.scopes.pop() {
            self.bindings.truncate(start);
        }
    }

    /// Binds `prefix` in the innermost scope. An empty prefix sets the default
    /// namespace; an empty namespace undeclares it.
    pub fn bind(&mut self, prefix: Atom, namespace: Atom) {
        self.bindings.push(Binding { prefix, namespace });
    }

    /// Number of open scopes.
    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Looks up the namespace bound to `prefix`.
    ///
    /// Returns `None` for an unbound prefix, including a default namespace
    /// that was never declared.
    pub fn find(&self, prefix: &str) -> Option<&Atom> {
        if prefix == "xml" {
            return Some(&self.xml_namespace);
        }
        if prefix == "xmlns" {
            return Some(&self.xmlns_namespace);
        }
        let found = self
            .bindings
            .iter()
            .rev()
            .find(|b| &*b.prefix == prefix)
            .map(|b| &b.namespace);
        match found {
            // `xmlns:p=""` is not an undeclaration in XML 1.0
            Some(ns) if ns.is_empty() && !prefix.is_empty() => None,
            Some(ns) => Some(ns),
            None => None,
        }
    }

    /// Finds the innermost prefix bound to `namespace`.
    pub fn lookup_prefix(&self, namespace: &str) -> Option<&Atom> {
        if namespace == XML_NAMESPACE {
            return Some(&self.xml);
        }
        if namespace == XMLNS_NAMESPACE {
            return Some(&self.xmlns);
        }
        self.bindings
            .iter()
            .rev()
            .find(|b| &*b.namespace == namespace)
            .map(|b| &b.prefix)
            // the binding must not be shadowed by an inner one
            .filter(|p| self.find(p).map_or(false, |ns| &**ns == namespace))
    }

    /// The atom for [`XMLNS_NAMESPACE`].
    #[inline]
    pub fn xmlns_namespace(&self) -> &Atom {
        &self.xmlns_namespace
    }

    /// The atom for [`XML_NAMESPACE`].
    #[inline]
    pub fn xml_namespace(&self) -> &Atom {
        &self.xml_namespace
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_returns_same_instance() {
        let table = NameTable::new();
        let a = table.add("item");
        let b = table.add(&String::from("item"));
        assert!(a.ptr_eq(&b));
        assert!(table.get("item").unwrap().ptr_eq(&a));
        assert_eq!(table.get("other"), None);
        assert!(table.add("").ptr_eq(table.empty()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn atoms_from_different_tables_compare_by_text() {
        let one = NameTable::new().add("x");
        let two = NameTable::new().add("x");
        assert!(!one.ptr_eq(&two));
        assert_eq!(one, two);
    }

    #[test]
    fn split() {
        assert_eq!(split_qname("a:b"), ("a", "b"));
        assert_eq!(split_qname("b"), ("", "b"));
        assert_eq!(split_qname(":b"), ("", "b"));
    }

    #[test]
    fn scopes() {
        let table = NameTable::new();
        let mut resolver = NamespaceResolver::new(&table);
        assert_eq!(resolver.find(""), None);
        assert_eq!(resolver.find("xml").map(|a| a.as_str()), Some(XML_NAMESPACE));

        resolver.push_scope();
        resolver.bind(table.add(""), table.add("urn:default"));
        resolver.bind(table.add("p"), table.add("urn:p"));
        resolver.push_scope();
        resolver.bind(table.add(""), table.add(""));
        assert_eq!(resolver.find("").map(|a| a.as_str()), Some(""));
        assert_eq!(resolver.find("p").map(|a| a.as_str()), Some("urn:p"));
        assert_eq!(resolver.lookup_prefix("urn:default"), None);
        assert_eq!(resolver.lookup_prefix("urn:p").map(|a| a.as_str()), Some("p"));

        resolver.pop_scope();
        assert_eq!(
            resolver.find("").map(|a| a.as_str()),
            Some("urn:default")
        );
        resolver.pop_scope();
        assert_eq!(resolver.find("p"), None);
        assert_eq!(resolver.depth(), 0);
    }
}
