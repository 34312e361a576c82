//! Options for one run of the pass, loadable from JSON.
//!
//! ```json
//! {
//!   "runtime": { "module": "facets.rt", "conditional_exec": "jif_stmt" },
//!   "marker": null,
//!   "emit_import": true,
//!   "symbol_prefix": "_fv"
//! }
//! ```
//!
//! Every field is optional; missing fields keep their defaults.

use std::{fmt, fs, io, path::Path};

use crate::{fresh::DEFAULT_PREFIX, runtime::RuntimeNames};

/// Decorator name selecting the functions to rewrite when no other marker is configured.
pub const DEFAULT_MARKER: &str = "jeeves";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesugarOptions {
    /// How runtime references are spelled in the output.
    pub runtime: RuntimeNames,
    /// Bare decorator name marking the functions to rewrite; the decorator is
    /// removed from the output. `None` rewrites the whole module as one unit.
    pub marker: Option<String>,
    /// Prepend `import <runtime module>` to the output.
    pub emit_import: bool,
    /// Preferred prefix for generated names; underscores are prepended on collision.
    pub symbol_prefix: String,
}

impl Default for DesugarOptions {
    fn default() -> Self {
        Self {
            runtime: RuntimeNames::default(),
            marker: Some(DEFAULT_MARKER.to_owned()),
            emit_import: false,
            symbol_prefix: DEFAULT_PREFIX.to_owned(),
        }
    }
}

impl DesugarOptions {
    /// Options that rewrite the whole module instead of marked functions.
    #[must_use]
    pub fn whole_module() -> Self {
        Self {
            marker: None,
            ..Self::default()
        }
    }

    /// Parses and validates options from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json).map_err(ConfigError::Json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads, parses and validates options from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Json)
    }

    /// Checks that every configured name can appear in Python source where it is used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.module.is_empty() || !self.runtime.module.split('.').all(is_identifier) {
            return Err(ConfigError::invalid("runtime.module", &self.runtime.module));
        }
        for (function, name) in self.runtime.entries() {
            if !is_identifier(name) {
                return Err(ConfigError::invalid(function.field_name(), name));
            }
        }
        if let Some(marker) = &self.marker
            && !is_identifier(marker)
        {
            return Err(ConfigError::invalid("marker", marker));
        }
        if !is_identifier(&self.symbol_prefix) {
            return Err(ConfigError::invalid("symbol_prefix", &self.symbol_prefix));
        }
        Ok(())
    }
}

/// Python keywords, which are never valid identifiers.
const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// True when `name` is a valid Python identifier that is not a keyword.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
        && !KEYWORDS.contains(&name)
}

/// Errors loading or validating [`DesugarOptions`].
#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, source: io::Error },
    Json(serde_json::Error),
    /// A configured name is not usable in Python source.
    InvalidName { field: &'static str, value: String },
}

impl ConfigError {
    fn invalid(field: &'static str, value: &str) -> Self {
        Self::InvalidName {
            field,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read config {path}: {source}"),
            Self::Json(e) => write!(f, "invalid config: {e}"),
            Self::InvalidName { field, value } => {
                write!(f, "invalid config: {field} must be a Python identifier, got {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::InvalidName { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("jeeves"));
        assert!(is_identifier("_jv"));
        assert!(is_identifier("café"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("lambda"));
    }

    #[test]
    fn defaults_validate() {
        DesugarOptions::default().validate().unwrap();
        DesugarOptions::whole_module().validate().unwrap();
    }
}
