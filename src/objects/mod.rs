//! The canonical PDF object model used by [`crate::cos`].
//!
//! PDF objects are a tagged union (ISO 32000-1 §7.3); we model that directly as an enum
//! with pattern-matching accessors rather than as a dynamically-typed map, per the
//! design note in the specification.

use std::fmt;

/// A PDF name, stored without its leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

/// Indirect object identity: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32, pub u16);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.0, self.1)
    }
}

/// An ordered dictionary. PDF dictionaries are unordered by spec, but preserving
/// insertion order keeps re-serialised output stable and diffable, which the
/// idempotence property (spec.md §8 property 4) depends on in practice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(pub Vec<(Name, Object)>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.0.iter().find(|(k, _)| k.as_str() == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.0.iter_mut().find(|(k, _)| k.as_str() == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k.as_str() == key)
    }

    /// Inserts or replaces a key, preserving the original position on replacement.
    pub fn set(&mut self, key: impl Into<String>, value: Object) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k.0 == key) {
            slot.1 = value;
        } else {
            self.0.push((Name::new(key), value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        let idx = self.0.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Name, Object)> {
        self.0.iter()
    }
}

/// A PDF stream: a dictionary plus raw (already-decoded, for our purposes) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }
}

/// A PDF object (ISO 32000-1 §7.3): the sum type every other CosLayer structure is
/// built from. Pattern-match, never coerce through a dynamic map.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Stored with the input's original decimal-string precision (to at least 6
    /// significant digits) so re-serialisation doesn't lose precision the spec requires
    /// CosLayer to preserve.
    Real(f64),
    Name(Name),
    String(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn name(s: impl Into<String>) -> Self {
        Object::Name(Name::new(s))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Object::String(s.as_ref().as_bytes().to_vec())
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_preserves_insertion_order() {
        let mut d = Dictionary::new();
        d.set("Type", Object::name("Catalog"));
        d.set("Pages", Object::Reference(ObjectId(2, 0)));
        d.set("Type", Object::name("CatalogReplaced"));
        assert_eq!(d.0.len(), 2);
        assert_eq!(d.get("Type"), Some(&Object::name("CatalogReplaced")));
        assert_eq!(d.0[0].0.as_str(), "Type");
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Object::Integer(5).as_int(), Some(5));
        assert_eq!(Object::Real(5.5).as_int(), Some(5));
        assert_eq!(Object::Boolean(true).as_bool(), Some(true));
        assert_eq!(Object::name("Figure").as_name(), Some("Figure"));
        assert!(Object::Null.as_dict().is_none());
    }

    #[test]
    fn stream_dict_accessible_through_object() {
        let mut dict = Dictionary::new();
        dict.set("Length", Object::Integer(3));
        let stream = Object::Stream(Stream::new(dict, b"abc".to_vec()));
        assert_eq!(stream.as_dict().unwrap().get("Length"), Some(&Object::Integer(3)));
    }
}
