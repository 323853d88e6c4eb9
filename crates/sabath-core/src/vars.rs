//! Variable substitution for command strings.
//!
//! Commands may reference variables as `$[NAME]`. A [`Vars`] table maps names to
//! values; per-call overlays are merged over the base table with the overlay
//! winning. Tokens whose name is not in the merged table are left verbatim.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Install root of the harness.
pub const SABATH_DIR: &str = "SABATH_DIR";

/// Cache root under which models and datasets live.
pub const SABATH_CACHE: &str = "SABATH_CACHE";

/// Report directory of the current execution.
pub const SABATH_REPORT: &str = "SABATH_REPORT";

/// Cache directory of the model's first dataset, injected at run time.
pub const DATASET: &str = "DATASET";

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("valid regex"))
}

/// A variable substitution table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `overlay` over `self`; overlay values win.
    pub fn merged(&self, overlay: &Vars) -> Vars {
        let mut out = self.0.clone();
        out.extend(overlay.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Vars(out)
    }

    /// Replace every `$[NAME]` token with its value in a single pass.
    ///
    /// Substituted values are not rescanned, so a value containing `$[X]`
    /// is inserted literally.
    pub fn substitute(&self, template: &str) -> String {
        token_pattern()
            .replace_all(template, |caps: &Captures<'_>| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Vars(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
