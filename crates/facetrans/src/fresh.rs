//! Hygienic names for the variables and functions the rewrite introduces.
//!
//! A [`FreshSymbol`] is an opaque handle; it only becomes text when the rewritten tree is
//! printed, as `<prefix>_<kind><n>`. The prefix is chosen once per invocation so that no
//! interned user string (identifier, attribute, literal) and no runtime name starts with
//! it, which makes a rendered symbol impossible to confuse with anything the user wrote.

use std::fmt;

use strum::IntoStaticStr;

use crate::{intern::InternerBuilder, runtime::RuntimeNames};

/// Prefix used when the configuration does not override it.
pub const DEFAULT_PREFIX: &str = "_jv";

/// What a fresh symbol is used for; only affects its rendered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum SymbolKind {
    /// Namespace variable holding a function activation's locals.
    #[strum(serialize = "ns")]
    Namespace,
    /// Temporary introduced while splitting an assignment target.
    #[strum(serialize = "tmp")]
    Temporary,
    /// Synthesized function holding the `if` branch.
    #[strum(serialize = "then")]
    Then,
    /// Synthesized function holding the `else` branch.
    #[strum(serialize = "else")]
    Else,
}

/// An identifier that exists only in the rewritten tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreshSymbol {
    index: u32,
    kind: SymbolKind,
}

impl FreshSymbol {
    #[must_use]
    pub fn kind(self) -> SymbolKind {
        self.kind
    }

    /// Position in generation order, unique within one invocation.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Per-invocation generator of fresh symbols.
///
/// Owns the counter; two generators never share state, so independent units can be
/// rewritten concurrently without coordination.
#[derive(Debug, Clone)]
pub struct FreshNames {
    next: u32,
    prefix: String,
}

impl FreshNames {
    /// Creates a generator whose prefix does not start any interned string or runtime name.
    ///
    /// Starts from `preferred` and prepends underscores until no collision remains.
    #[must_use]
    pub fn new(preferred: &str, interner: &InternerBuilder, runtime: &RuntimeNames) -> Self {
        let mut prefix = preferred.to_owned();
        let collides = |prefix: &str| {
            interner.strings().any(|s| s.starts_with(prefix))
                || runtime.module.starts_with(prefix)
                || runtime.entries().any(|(_, name)| name.starts_with(prefix))
        };
        while collides(&prefix) {
            prefix.insert(0, '_');
        }
        Self { next: 0, prefix }
    }

    /// Returns a symbol distinct from every symbol this generator returned before.
    pub fn next(&mut self, kind: SymbolKind) -> FreshSymbol {
        let index = self.next;
        self.next = self.next.checked_add(1).expect("FreshSymbol overflow");
        FreshSymbol { index, kind }
    }

    /// The prefix every rendered symbol starts with.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of symbols generated so far.
    #[must_use]
    pub fn generated(&self) -> u32 {
        self.next
    }

    /// Renders `symbol` as a host identifier.
    #[must_use]
    pub fn render(&self, symbol: FreshSymbol) -> Rendered<'_> {
        Rendered { names: self, symbol }
    }
}

/// Display adapter returned by [`FreshNames::render`].
pub struct Rendered<'a> {
    names: &'a FreshNames,
    symbol: FreshSymbol,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind: &'static str = self.symbol.kind.into();
        write!(f, "{}_{}{}", self.names.prefix, kind, self.symbol.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_distinct_and_rendered_with_kind() {
        let interner = InternerBuilder::default();
        let mut names = FreshNames::new(DEFAULT_PREFIX, &interner, &RuntimeNames::default());
        let ns = names.next(SymbolKind::Namespace);
        let tmp = names.next(SymbolKind::Temporary);
        assert_ne!(ns, tmp);
        assert_eq!(names.render(ns).to_string(), "_jv_ns0");
        assert_eq!(names.render(tmp).to_string(), "_jv_tmp1");
        assert_eq!(names.generated(), 2);
    }

    #[test]
    fn prefix_avoids_user_strings() {
        let mut interner = InternerBuilder::default();
        interner.intern("_jv_tmp0");
        interner.intern("__jv");
        let names = FreshNames::new(DEFAULT_PREFIX, &interner, &RuntimeNames::default());
        // `_jv` collides with the first string, `__jv` with the second
        assert_eq!(names.prefix(), "___jv");
    }

    #[test]
    fn prefix_avoids_runtime_names() {
        let interner = InternerBuilder::default();
        let runtime = RuntimeNames {
            module: "_jvlib".to_owned(),
            ..RuntimeNames::default()
        };
        let names = FreshNames::new(DEFAULT_PREFIX, &interner, &runtime);
        assert_eq!(names.prefix(), "__jv");
    }
}
