//! Run-scoped variable store.

use crate::graph::Value;
use std::collections::{BTreeMap, HashMap};

/// Case-insensitive name -> value map. The first spelling of a name is kept
/// for display.
#[derive(Clone, Debug, Default)]
pub struct VariableScope {
    entries: HashMap<String, (String, Value)>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Self::key(name)).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let key = Self::key(name);
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries
                    .insert(key, (name.trim().to_string(), value));
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&Self::key(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(&Self::key(name)).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by display name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        let mut items: Vec<(&str, &Value)> = self
            .entries
            .values()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items.into_iter()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for VariableScope {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut scope = VariableScope::new();
        for (name, value) in iter {
            scope.set(&name, value);
        }
        scope
    }
}
