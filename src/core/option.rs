//! Option entity views.
//!
//! Options are resolved to a boolean `value` during the probing phase and
//! are read-only afterwards. The probe-needed rule: probe iff `default` is
//! empty and at least one probing input is non-empty.

use crate::core::store::{ConfStore, Namespace};

/// Attribute keys that count as probing inputs.
pub const PROBE_INPUT_KEYS: &[&str] = &[
    "cfuncs",
    "cxxfuncs",
    "cincludes",
    "cxxincludes",
    "ctypes",
    "cxxtypes",
    "csnippets",
    "cxxsnippets",
    "links",
    "syslinks",
];

/// Read-only view over one option in the store.
#[derive(Clone, Copy)]
pub struct OptionRef<'a> {
    store: &'a ConfStore,
    name: &'a str,
}

impl<'a> OptionRef<'a> {
    pub fn new(store: &'a ConfStore, name: &'a str) -> Self {
        OptionRef { store, name }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.store.scalar(Namespace::Options, self.name, key)
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.store.list(Namespace::Options, self.name, key)
    }

    /// The declared default, if non-empty.
    pub fn default_value(&self) -> Option<&str> {
        self.scalar("default").filter(|v| !v.is_empty())
    }

    /// The resolved value, once probing (or a CLI override) has set one.
    pub fn value(&self) -> Option<&str> {
        self.scalar("value")
    }

    /// Whether the option counts as enabled for `has_config` and configvar
    /// purposes.
    pub fn enabled(&self) -> bool {
        match self.value() {
            Some(v) => !matches!(v, "" | "false" | "no" | "n" | "0"),
            None => false,
        }
    }

    /// Whether this option must be probed.
    pub fn needs_probe(&self) -> bool {
        if self.default_value().is_some() || self.value().is_some() {
            return false;
        }
        PROBE_INPUT_KEYS.iter().any(|key| !self.list(key).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Namespace;

    fn store_with(name: &str, entries: &[(&str, &str)]) -> ConfStore {
        let mut store = ConfStore::new();
        store.declare(Namespace::Options, name);
        for (key, value) in entries {
            if key.ends_with('s') {
                store.append(Namespace::Options, name, key, value);
            } else {
                store.set_scalar(Namespace::Options, name, key, *value);
            }
        }
        store
    }

    #[test]
    fn test_default_skips_probe() {
        let store = store_with("opt", &[("default", "true"), ("cfuncs", "foo")]);
        let opt = OptionRef::new(&store, "opt");

        assert!(!opt.needs_probe());
        assert_eq!(opt.default_value(), Some("true"));
    }

    #[test]
    fn test_probe_needs_an_input() {
        let store = store_with("opt", &[("description", "does nothing")]);
        assert!(!OptionRef::new(&store, "opt").needs_probe());

        let store = store_with("opt", &[("cincludes", "pthread.h")]);
        assert!(OptionRef::new(&store, "opt").needs_probe());

        let store = store_with("opt", &[("links", "pthread")]);
        assert!(OptionRef::new(&store, "opt").needs_probe());
    }

    #[test]
    fn test_forced_value_skips_probe() {
        let store = store_with("opt", &[("value", "true"), ("cfuncs", "foo")]);
        assert!(!OptionRef::new(&store, "opt").needs_probe());
    }

    #[test]
    fn test_enabled() {
        let store = store_with("opt", &[("value", "true")]);
        assert!(OptionRef::new(&store, "opt").enabled());

        let store = store_with("opt", &[("value", "false")]);
        assert!(!OptionRef::new(&store, "opt").enabled());

        let store = store_with("opt", &[]);
        assert!(!OptionRef::new(&store, "opt").enabled());
    }
}
