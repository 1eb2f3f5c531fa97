//! Namespace resolution
//!
//! Stack of prefix bindings, popped per element scope. The default
//! namespace is bound to prefix id 0 (the empty string); binding it to
//! URI id 0 undeclares it.

use super::strings::StringPool;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &[u8] = b"http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &[u8] = b"http://www.w3.org/2000/xmlns/";
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    prefix: u32,
    uri: u32,
    depth: u32,
}

/// Scoped prefix -> URI resolver over string ids
#[derive(Debug)]
pub struct NamespaceResolver {
    bindings: Vec<Binding>,
    depth: u32,
    xml_prefix: u32,
    xmlns_prefix: u32,
    xmlns_uri: u32,
}

impl NamespaceResolver {
    /// Resolver with `xml` and `xmlns` prebound
    pub fn new(strings: &mut StringPool) -> Self {
        let xml_prefix = strings.intern(b"xml");
        let xmlns_prefix = strings.intern(b"xmlns");
        let xml_uri = strings.intern(ns::XML);
        let xmlns_uri = strings.intern(ns::XMLNS);

        NamespaceResolver {
            bindings: vec![
                Binding { prefix: xml_prefix, uri: xml_uri, depth: 0 },
                Binding { prefix: xmlns_prefix, uri: xmlns_uri, depth: 0 },
            ],
            depth: 0,
            xml_prefix,
            xmlns_prefix,
            xmlns_uri,
        }
    }

    /// URI id of namespace declarations themselves
    pub fn xmlns_uri(&self) -> u32 {
        self.xmlns_uri
    }

    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave a scope, dropping the bindings it declared
    pub fn pop_scope(&mut self) {
        while self.bindings.last().is_some_and(|b| b.depth >= self.depth && b.depth > 0) {
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Bind `prefix` in the current scope; `xml` and `xmlns` cannot be rebound
    pub fn declare(&mut self, prefix: u32, uri: u32) {
        if prefix == self.xml_prefix || prefix == self.xmlns_prefix {
            return;
        }
        self.bindings.push(Binding {
            prefix,
            uri,
            depth: self.depth,
        });
    }

    /// URI id bound to `prefix`, or `None` when unbound or undeclared
    pub fn resolve(&self, prefix: u32) -> Option<u32> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri)
            .filter(|&uri| uri != 0)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prebound_prefixes() {
        let mut strings = StringPool::new();
        let resolver = NamespaceResolver::new(&mut strings);
        let xml = strings.intern(b"xml");
        assert_eq!(resolver.resolve(xml).map(|u| strings.get(u)), Some(ns::XML));
        assert_eq!(strings.get(resolver.xmlns_uri()), ns::XMLNS);
    }

    #[test]
    fn test_scopes_and_shadowing() {
        let mut strings = StringPool::new();
        let mut resolver = NamespaceResolver::new(&mut strings);
        let p = strings.intern(b"p");
        let one = strings.intern(b"urn:1");
        let two = strings.intern(b"urn:2");

        resolver.push_scope();
        resolver.declare(p, one);
        resolver.push_scope();
        resolver.declare(p, two);
        assert_eq!(resolver.resolve(p), Some(two));
        resolver.pop_scope();
        assert_eq!(resolver.resolve(p), Some(one));
        resolver.pop_scope();
        assert_eq!(resolver.resolve(p), None);
        assert_eq!(resolver.depth(), 0);
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let mut strings = StringPool::new();
        let mut resolver = NamespaceResolver::new(&mut strings);
        let uri = strings.intern(b"urn:d");
        resolver.push_scope();
        resolver.declare(0, uri);
        assert_eq!(resolver.resolve(0), Some(uri));
        resolver.push_scope();
        resolver.declare(0, 0);
        assert_eq!(resolver.resolve(0), None);
    }

    #[test]
    fn test_xml_prefix_cannot_be_rebound() {
        let mut strings = StringPool::new();
        let mut resolver = NamespaceResolver::new(&mut strings);
        let xml = strings.intern(b"xml");
        let other = strings.intern(b"urn:other");
        resolver.push_scope();
        resolver.declare(xml, other);
        assert_ne!(resolver.resolve(xml), Some(other));
    }
}
