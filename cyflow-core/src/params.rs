//! Named parameter bindings for one query.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::UsageError;
use crate::value::Value;

/// One bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    /// Whether the store picked the name (`p0`, `p1`, …).
    pub generated: bool,
}

/// An immutable, cheaply cloned set of parameter bindings.
///
/// Every `bind*` call returns a new store; the receiver keeps its bindings.
/// Generated names follow binding order (`p0`, `p1`, …) and skip names the
/// caller has already taken. Binding a value equal to an earlier generated
/// binding hands back the earlier name.
///
/// ```rust
/// # use cyflow_core::params::ParameterStore;
/// let store = ParameterStore::new();
/// let (store, a) = store.bind("Alice".into());
/// let (store, b) = store.bind(42.into());
/// let (store, c) = store.bind("Alice".into());
/// assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("p0", "p1", "p0"));
/// assert_eq!(store.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: Arc<Vec<Parameter>>,
    next_index: usize,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|p| p.name == name)
    }

    fn push(&self, parameter: Parameter, next_index: usize) -> Self {
        let mut entries = Vec::clone(&self.entries);
        entries.push(parameter);
        Self {
            entries: Arc::new(entries),
            next_index,
        }
    }

    /// Bind `value` under a generated name, reusing an equal earlier binding.
    pub fn bind(&self, value: Value) -> (Self, String) {
        if let Some(existing) = self.entries.iter().find(|p| p.generated && p.value == value) {
            return (self.clone(), existing.name.clone());
        }
        let mut index = self.next_index;
        let mut name = format!("p{index}");
        while self.contains_name(&name) {
            index += 1;
            name = format!("p{index}");
        }
        let store = self.push(
            Parameter {
                name: name.clone(),
                value,
                generated: true,
            },
            index + 1,
        );
        (store, name)
    }

    /// Bind `value` under a caller-chosen name.
    ///
    /// Re-binding a name is recorded as-is; [`flatten`](Self::flatten)
    /// reports the collision if the values differ.
    pub fn bind_named(&self, name: impl Into<String>, value: Value) -> Self {
        self.push(
            Parameter {
                name: name.into(),
                value,
                generated: false,
            },
            self.next_index,
        )
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    /// One value per name. Fails on a name bound to two different values.
    pub fn flatten(&self) -> Result<BTreeMap<String, Value>, UsageError> {
        let mut out = BTreeMap::new();
        for p in self.entries.iter() {
            match out.get(&p.name) {
                Some(existing) if existing != &p.value => {
                    return Err(UsageError::ParameterCollision(p.name.clone()));
                }
                Some(_) => {}
                None => {
                    out.insert(p.name.clone(), p.value.clone());
                }
            }
        }
        Ok(out)
    }
}
