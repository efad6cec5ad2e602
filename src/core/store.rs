//! Scoped key-value store.
//!
//! Three namespaces (options, targets, toolchains), each a mapping from
//! `(entity, attribute)` to a scalar or an ordered token list. Lists keep
//! insertion order; serialization to space-joined strings happens only at
//! emission time, never inside the store.

use std::collections::BTreeMap;

use serde::Serialize;

/// The empty target name denotes root scope: root-level values are
/// prepended to every target's list reads.
pub const ROOT_SCOPE: &str = "";

/// The three entity namespaces of the configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Options,
    Targets,
    Toolchains,
}

/// A stored attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    /// View the value as a scalar string, if it is one.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// View the value as an ordered token sequence.
    ///
    /// Scalars are split on whitespace so that clients reading joined lists
    /// tolerate legacy space-packed values and empty tokens.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => s.split_whitespace().map(str::to_string).collect(),
            Value::List(items) => items
                .iter()
                .filter(|t| !t.is_empty())
                .cloned()
                .collect(),
        }
    }
}

type Entity = BTreeMap<String, Value>;

/// One namespace worth of entities, in declaration order.
#[derive(Debug, Default, Serialize)]
pub struct Shelf {
    names: Vec<String>,
    entries: BTreeMap<String, Entity>,
}

impl Shelf {
    fn declare(&mut self, name: &str) {
        if !self.entries.contains_key(name) {
            self.names.push(name.to_string());
            self.entries.insert(name.to_string(), Entity::new());
        }
    }

    fn entry_mut(&mut self, name: &str) -> &mut Entity {
        self.declare(name);
        self.entries.get_mut(name).expect("entity just declared")
    }
}

/// The process-wide configuration store.
#[derive(Debug, Default, Serialize)]
pub struct ConfStore {
    options: Shelf,
    targets: Shelf,
    toolchains: Shelf,
}

impl ConfStore {
    pub fn new() -> Self {
        ConfStore::default()
    }

    fn shelf(&self, ns: Namespace) -> &Shelf {
        match ns {
            Namespace::Options => &self.options,
            Namespace::Targets => &self.targets,
            Namespace::Toolchains => &self.toolchains,
        }
    }

    fn shelf_mut(&mut self, ns: Namespace) -> &mut Shelf {
        match ns {
            Namespace::Options => &mut self.options,
            Namespace::Targets => &mut self.targets,
            Namespace::Toolchains => &mut self.toolchains,
        }
    }

    /// Register an entity, keeping its declaration order.
    pub fn declare(&mut self, ns: Namespace, name: &str) {
        self.shelf_mut(ns).declare(name);
    }

    /// Check whether an entity exists.
    pub fn exists(&self, ns: Namespace, name: &str) -> bool {
        self.shelf(ns).entries.contains_key(name)
    }

    /// Entity names in declaration order.
    pub fn names(&self, ns: Namespace) -> &[String] {
        &self.shelf(ns).names
    }

    /// Set an attribute to an arbitrary value, replacing any previous one.
    pub fn set(&mut self, ns: Namespace, name: &str, key: &str, value: Value) {
        self.shelf_mut(ns).entry_mut(name).insert(key.to_string(), value);
    }

    /// Set a scalar attribute.
    pub fn set_scalar(&mut self, ns: Namespace, name: &str, key: &str, value: impl Into<String>) {
        self.set(ns, name, key, Value::Scalar(value.into()));
    }

    /// Append a single token to a list attribute.
    pub fn append(&mut self, ns: Namespace, name: &str, key: &str, token: &str) {
        self.extend(ns, name, key, std::slice::from_ref(&token.to_string()));
    }

    /// Append tokens to a list attribute, coercing a scalar into a list.
    pub fn extend(&mut self, ns: Namespace, name: &str, key: &str, tokens: &[String]) {
        let entity = self.shelf_mut(ns).entry_mut(name);
        let list = match entity.remove(key) {
            Some(value) => {
                let mut list = value.tokens();
                list.extend(tokens.iter().cloned());
                list
            }
            None => tokens.to_vec(),
        };
        entity.insert(key.to_string(), Value::List(list));
    }

    /// Read an attribute.
    pub fn get(&self, ns: Namespace, name: &str, key: &str) -> Option<&Value> {
        self.shelf(ns).entries.get(name)?.get(key)
    }

    /// Read a scalar attribute.
    pub fn scalar(&self, ns: Namespace, name: &str, key: &str) -> Option<&str> {
        self.get(ns, name, key)?.as_scalar()
    }

    /// Read a list attribute as tokens.
    ///
    /// For non-root targets the root-scope list for the same key is
    /// prepended, so root-level `add_*` calls apply to every target.
    pub fn list(&self, ns: Namespace, name: &str, key: &str) -> Vec<String> {
        let own = self
            .get(ns, name, key)
            .map(Value::tokens)
            .unwrap_or_default();

        if ns == Namespace::Targets && name != ROOT_SCOPE {
            let mut merged = self
                .get(ns, ROOT_SCOPE, key)
                .map(Value::tokens)
                .unwrap_or_default();
            merged.extend(own);
            merged
        } else {
            own
        }
    }
}

/// Deduplicate tokens keeping the first occurrence of each.
pub fn dedup_first(tokens: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_scalar() {
        let mut store = ConfStore::new();
        store.set_scalar(Namespace::Options, "pthread", "description", "enable pthread");

        assert_eq!(
            store.scalar(Namespace::Options, "pthread", "description"),
            Some("enable pthread")
        );
        assert_eq!(store.scalar(Namespace::Options, "pthread", "default"), None);
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut store = ConfStore::new();
        store.extend(
            Namespace::Targets,
            "app",
            "defines",
            &["B".to_string(), "A".to_string()],
        );
        store.append(Namespace::Targets, "app", "defines", "C");

        assert_eq!(
            store.list(Namespace::Targets, "app", "defines"),
            vec!["B", "A", "C"]
        );
    }

    #[test]
    fn test_root_scope_prepends_for_targets() {
        let mut store = ConfStore::new();
        store.append(Namespace::Targets, ROOT_SCOPE, "defines", "GLOBAL");
        store.append(Namespace::Targets, "app", "defines", "LOCAL");

        assert_eq!(
            store.list(Namespace::Targets, "app", "defines"),
            vec!["GLOBAL", "LOCAL"]
        );
        // Options never inherit from a root scope.
        store.append(Namespace::Options, "opt", "defines", "X");
        assert_eq!(store.list(Namespace::Options, "opt", "defines"), vec!["X"]);
    }

    #[test]
    fn test_scalar_coerced_to_list_on_extend() {
        let mut store = ConfStore::new();
        store.set_scalar(Namespace::Targets, "app", "links", "m pthread");
        store.append(Namespace::Targets, "app", "links", "dl");

        assert_eq!(
            store.list(Namespace::Targets, "app", "links"),
            vec!["m", "pthread", "dl"]
        );
    }

    #[test]
    fn test_declaration_order() {
        let mut store = ConfStore::new();
        store.declare(Namespace::Targets, "zeta");
        store.declare(Namespace::Targets, "alpha");
        store.declare(Namespace::Targets, "zeta");

        assert_eq!(store.names(Namespace::Targets), &["zeta", "alpha"]);
    }

    #[test]
    fn test_dedup_first() {
        let tokens = vec!["a", "b", "a", "c", "b"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(dedup_first(tokens), vec!["a", "b", "c"]);
    }
}
