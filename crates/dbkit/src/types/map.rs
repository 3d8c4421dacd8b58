use std::collections::HashMap;

/// Field name to type identifier mapping.
///
/// Two layers are kept: `defaults` (usually derived from a table schema) and
/// `types` (per-query overrides). Lookups consult `types` first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    defaults: HashMap<String, String>,
    types: HashMap<String, String>,
}

impl TypeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map whose defaults are the given pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        map.add_defaults(pairs);
        map
    }

    /// Replace the default layer.
    pub fn set_defaults<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults.clear();
        self.add_defaults(pairs)
    }

    /// Merge pairs into the default layer; the last write wins.
    pub fn add_defaults<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the override layer.
    pub fn set_types<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.types = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Merge pairs into the override layer.
    pub fn add_types<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.types
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Merge both layers of another map over this one.
    pub fn merge(&mut self, other: &TypeMap) -> &mut Self {
        self.defaults
            .extend(other.defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.types
            .extend(other.types.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn defaults(&self) -> &HashMap<String, String> {
        &self.defaults
    }

    pub fn types(&self) -> &HashMap<String, String> {
        &self.types
    }

    /// The type identifier for a field, if known.
    pub fn type_of(&self, field: &str) -> Option<&str> {
        self.types
            .get(field)
            .or_else(|| self.defaults.get(field))
            .map(String::as_str)
    }

    /// Both layers flattened, overrides winning.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut all = self.defaults.clone();
        all.extend(self.types.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.types.is_empty()
    }
}
