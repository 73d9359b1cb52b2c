//! Ordered key/value property store with subtree selection and placeholder expansion.
//!
//! Platform, board, tool and programmer definitions all reduce to a
//! [`PropertyStore`]: a mapping from dotted keys (`build.mcu`,
//! `debug.server.openocd.path`) to string values. Values may reference other
//! keys of the same store as `{key}` placeholders.
//!
//! ## Expansion rules
//!
//! - `{name}` is replaced by the (recursively expanded) value of `name`.
//! - A placeholder naming a key that is not in the store expands to the
//!   empty string. Platform files rely on this for optional flags; it is
//!   also the usual source of silently empty compiler flags.
//! - A placeholder chain that comes back to a key already being expanded is
//!   an [`Error::Configuration`]; so is nesting deeper than
//!   [`MAX_EXPANSION_DEPTH`].

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Maximum placeholder nesting before expansion gives up.
pub const MAX_EXPANSION_DEPTH: usize = 64;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}\s]+)\}").expect("placeholder pattern is valid"));

const OS_SUFFIXES: [&str; 3] = ["linux", "macosx", "windows"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyStore {
    map: BTreeMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines.
    ///
    /// Blank lines and `#` comments are skipped. Keys suffixed with the host
    /// OS (`.linux`, `.macosx`, `.windows`) replace the plain key, and all
    /// OS-suffixed keys are dropped afterwards.
    pub fn parse(text: &str) -> Result<Self> {
        let mut store = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::Configuration(format!(
                    "line {}: invalid property definition '{}'",
                    idx + 1,
                    line
                )));
            };
            store.set(key.trim(), value.trim());
        }
        store.apply_os_overrides(host_os_suffix());
        Ok(store)
    }

    /// Load a properties file (`platform.txt`, `boards.txt`, ...).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io("reading", path, e))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    fn apply_os_overrides(&mut self, host: &str) {
        let host_suffix = format!(".{host}");
        let overrides: Vec<(String, String)> = self
            .map
            .iter()
            .filter_map(|(k, v)| {
                k.strip_suffix(&host_suffix)
                    .map(|base| (base.to_string(), v.clone()))
            })
            .collect();
        for (key, value) in overrides {
            self.map.insert(key, value);
        }
        self.map
            .retain(|k, _| !OS_SUFFIXES.iter().any(|os| k.ends_with(&format!(".{os}"))));
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Store a filesystem path under `key`.
    pub fn set_path(&mut self, key: impl Into<String>, path: impl AsRef<Path>) {
        self.set(key, path.as_ref().to_string_lossy().into_owned());
    }

    /// Value of `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.map.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Copy every key of `other` into `self`, replacing existing values.
    pub fn merge(&mut self, other: &PropertyStore) {
        for (k, v) in &other.map {
            self.map.insert(k.clone(), v.clone());
        }
    }

    /// Keys under `prefix.`, with `prefix.` stripped.
    pub fn sub_tree(&self, prefix: &str) -> PropertyStore {
        let dotted = format!("{prefix}.");
        self.map
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&dotted)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect()
    }

    /// Distinct first dotted segments of all keys, sorted.
    pub fn first_level_keys(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .map
            .keys()
            .map(|k| k.split_once('.').map_or(k.as_str(), |(head, _)| head))
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Substitute every `{key}` in `value` using this store.
    pub fn expand_props_in_string(&self, value: &str) -> Result<String> {
        let mut stack = Vec::new();
        let mut cache = HashMap::new();
        self.expand_value(value, &mut stack, &mut cache)
    }

    /// Expanded value of `key` (empty when absent).
    pub fn get_expanded(&self, key: &str) -> Result<String> {
        let mut stack = Vec::new();
        let mut cache = HashMap::new();
        self.expand_key(key, &mut stack, &mut cache)
    }

    /// A copy of this store with every value expanded against the store itself.
    pub fn expand_all(&self) -> Result<PropertyStore> {
        let mut cache = HashMap::new();
        let mut out = PropertyStore::new();
        for key in self.map.keys() {
            let mut stack = Vec::new();
            let value = self.expand_key(key, &mut stack, &mut cache)?;
            out.set(key.clone(), value);
        }
        Ok(out)
    }

    fn expand_value(
        &self,
        value: &str,
        stack: &mut Vec<String>,
        cache: &mut HashMap<String, String>,
    ) -> Result<String> {
        if !value.contains('{') {
            return Ok(value.to_string());
        }
        let mut out = String::with_capacity(value.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(value) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&value[last..whole.start()]);
            out.push_str(&self.expand_key(name.as_str(), stack, cache)?);
            last = whole.end();
        }
        out.push_str(&value[last..]);
        Ok(out)
    }

    fn expand_key(
        &self,
        key: &str,
        stack: &mut Vec<String>,
        cache: &mut HashMap<String, String>,
    ) -> Result<String> {
        if let Some(done) = cache.get(key) {
            return Ok(done.clone());
        }
        if stack.iter().any(|k| k == key) {
            return Err(Error::Configuration(format!(
                "cyclic placeholder expansion: {} -> {}",
                stack.join(" -> "),
                key
            )));
        }
        if stack.len() >= MAX_EXPANSION_DEPTH {
            return Err(Error::Configuration(format!(
                "placeholder expansion of '{}' nested deeper than {} levels",
                key, MAX_EXPANSION_DEPTH
            )));
        }
        let Some(raw) = self.map.get(key) else {
            return Ok(String::new());
        };

        stack.push(key.to_string());
        let expanded = self.expand_value(raw, stack, cache);
        stack.pop();

        let expanded = expanded?;
        cache.insert(key.to_string(), expanded.clone());
        Ok(expanded)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<PropertyStore> for BTreeMap<String, String> {
    fn from(store: PropertyStore) -> Self {
        store.map
    }
}

fn host_os_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macosx"
    } else {
        "linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> PropertyStore {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let a = store(&[("k", "from-a"), ("only.a", "1")]);
        let b = store(&[("k", "from-b"), ("only.b", "2")]);

        let mut ab = PropertyStore::new();
        ab.merge(&a);
        ab.merge(&b);
        assert_eq!(ab.get("k"), "from-b");

        let mut ba = PropertyStore::new();
        ba.merge(&b);
        ba.merge(&a);
        assert_eq!(ba.get("k"), "from-a");

        assert_eq!(ab.get("only.a"), "1");
        assert_eq!(ab.get("only.b"), "2");
    }

    #[test]
    fn test_sub_tree_strips_prefix() {
        let s = store(&[("a.b", "1"), ("a.c", "2"), ("d", "3"), ("ab.x", "4")]);
        let sub = s.sub_tree("a");
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get("b"), "1");
        assert_eq!(sub.get("c"), "2");
        assert!(!sub.contains_key("d"));
        assert!(!sub.contains_key("x"));
        // source untouched
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_get_missing_is_empty() {
        let s = PropertyStore::new();
        assert_eq!(s.get("nope"), "");
        assert_eq!(s.get_opt("nope"), None);
    }

    #[test]
    fn test_expand_nested() {
        let s = store(&[
            ("build.path", "/tmp/b"),
            ("build.project_name", "Blink.ino"),
            ("exe", "{build.path}/{build.project_name}.elf"),
            ("cmd", "gdb {exe}"),
        ]);
        assert_eq!(
            s.expand_props_in_string("{cmd} -q").unwrap(),
            "gdb /tmp/b/Blink.ino.elf -q"
        );
    }

    #[test]
    fn test_expand_missing_key_is_empty() {
        let s = store(&[("x", "pre-{missing}-post")]);
        assert_eq!(s.get_expanded("x").unwrap(), "pre--post");
        assert_eq!(s.expand_props_in_string(s.get("x")).unwrap(), "pre--post");
    }

    #[test]
    fn test_expand_cycle_fails() {
        let s = store(&[("x", "{y}"), ("y", "{x}")]);
        let err = s.get_expanded("x").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("x -> y -> x"));

        assert!(s.expand_props_in_string("{x}").is_err());
    }

    #[test]
    fn test_expand_self_reference_fails() {
        let s = store(&[("flags", "{flags} -Os")]);
        assert!(s.get_expanded("flags").is_err());
    }

    #[test]
    fn test_expand_depth_bound() {
        let mut s = PropertyStore::new();
        for i in 0..(MAX_EXPANSION_DEPTH + 5) {
            s.set(format!("k{i}"), format!("{{k{}}}", i + 1));
        }
        let err = s.get_expanded("k0").unwrap_err();
        assert!(err.to_string().contains("deeper than"));
    }

    #[test]
    fn test_repeated_reference_is_not_a_cycle() {
        let s = store(&[("p", "/opt"), ("v", "{p}/a:{p}/b")]);
        assert_eq!(s.get_expanded("v").unwrap(), "/opt/a:/opt/b");
    }

    #[test]
    fn test_braces_with_spaces_are_left_alone() {
        let s = store(&[("x", "int f() { return 0; }")]);
        assert_eq!(s.get_expanded("x").unwrap(), "int f() { return 0; }");
    }

    #[test]
    fn test_expand_all() {
        let s = store(&[("a", "1"), ("b", "{a}{a}"), ("c", "{b}-{zz}")]);
        let e = s.expand_all().unwrap();
        assert_eq!(e.get("b"), "11");
        assert_eq!(e.get("c"), "11-");
    }

    #[test]
    fn test_parse_properties_text() {
        let text = "# comment\n\nname=Acme Boards\ncompiler.path = /usr/bin/ \nrecipe.x=a=b\n";
        let s = PropertyStore::parse(text).unwrap();
        assert_eq!(s.get("name"), "Acme Boards");
        assert_eq!(s.get("compiler.path"), "/usr/bin/");
        assert_eq!(s.get("recipe.x"), "a=b");
    }

    #[test]
    fn test_parse_rejects_line_without_equals() {
        let err = PropertyStore::parse("good=1\nbroken line\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_os_specific_override() {
        let mut s = store(&[
            ("tools.cmd", "plain"),
            ("tools.cmd.linux", "tux"),
            ("tools.cmd.windows", "win"),
        ]);
        s.apply_os_overrides("linux");
        assert_eq!(s.get("tools.cmd"), "tux");
        assert!(!s.contains_key("tools.cmd.windows"));
        assert!(!s.contains_key("tools.cmd.linux"));
    }

    #[test]
    fn test_set_path_and_first_level_keys() {
        let mut s = PropertyStore::new();
        s.set_path("build.path", Path::new("/tmp/build"));
        s.set("uno.name", "Uno");
        s.set("uno.build.mcu", "atmega328p");
        s.set("nano.name", "Nano");
        assert_eq!(s.get("build.path"), "/tmp/build");
        assert_eq!(s.first_level_keys(), vec!["build", "nano", "uno"]);
    }
}
