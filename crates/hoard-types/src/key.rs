use std::fmt;

/// A hierarchical storage prefix, e.g. `["2020", "02", "03", "04"]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(Vec<String>);

impl Prefix {
    /// The empty prefix, which is a parent of every key.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` components of this prefix.
    pub fn truncated(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    /// Returns `true` if `self` is a (non-strict) parent of `other`.
    pub fn is_parent_of(&self, other: &Prefix) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    /// A new prefix with `part` appended.
    pub fn child(&self, part: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }

    /// Slash-joined form, `""` for the empty prefix.
    pub fn id(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// A storage key: a prefix plus a leaf name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub prefix: Prefix,
    pub name: String,
}

impl Key {
    pub fn new(prefix: Prefix, name: impl Into<String>) -> Self {
        Self {
            prefix,
            name: name.into(),
        }
    }

    /// Slash-joined path of the key.
    pub fn id(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.prefix.id(), self.name)
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
