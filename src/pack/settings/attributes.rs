//! Ordered manifest attributes.

/// Ordered mapping of manifest attribute names to values.
///
/// Iteration follows insertion order so that rendered manifests are
/// byte-for-byte reproducible. Inserting an existing key replaces its value
/// in place without moving it.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_pack::pack::ManifestAttributes;
///
/// let mut attrs = ManifestAttributes::new();
/// attrs.insert("Pack-Version", "1.2.0");
/// attrs.insert("Min-Host-Version", "10.0");
/// attrs.insert("Pack-Version", "1.3.0");
///
/// let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, ["Pack-Version", "Min-Host-Version"]);
/// assert_eq!(attrs.get("Pack-Version"), Some("1.3.0"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAttributes {
    entries: Vec<(String, String)>,
}

impl ManifestAttributes {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManifestAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}
