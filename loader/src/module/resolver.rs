//! Cascading entry point resolution.
//!
//! Resolution walks an ordered list of strategies and stops at the first
//! callable symbol:
//!
//! 1. [`StrategyTag::ExactMatch`] - the requested name itself.
//! 2. [`StrategyTag::PrefixedMatch`] - `{module}_{name}`.
//! 3. [`StrategyTag::PatternMatch`] - the first export ending in `_{name}`.
//! 4. [`StrategyTag::ForeignSymbolLookup`] - the name, then the prefixed
//!    name, as raw native symbols on an independent handle.
//!
//! Steps 1-4 run for the configured entry name and then, if different, for
//! `main`. Finally [`StrategyTag::FallbackFirstCallable`] tries the fixed
//! recognised names not yet attempted and, when enabled, the first public
//! callable.

use super::EntryFn;
use super::loader::LoadedUnit;
use log::debug;
use std::fmt;

/// Entry name used when none is configured.
pub const DEFAULT_ENTRY: &str = "main";

/// Names every artefact may export as its entry point.
const RECOGNISED_ENTRY_NAMES: &[&str] = &["main", "run", "start"];

/// Which strategy located the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    /// Exported under the requested name.
    ExactMatch,
    /// Exported as `{module}_{name}`.
    PrefixedMatch,
    /// First export ending in `_{name}`.
    PatternMatch,
    /// Found as a raw native symbol.
    ForeignSymbolLookup,
    /// Recognised entry name or first public callable.
    FallbackFirstCallable,
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactMatch => "exact match",
            Self::PrefixedMatch => "prefixed match",
            Self::PatternMatch => "pattern match",
            Self::ForeignSymbolLookup => "foreign symbol lookup",
            Self::FallbackFirstCallable => "fallback",
        };
        f.write_str(name)
    }
}

/// A located entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCandidate {
    /// Symbol that was found.
    pub symbol_name: String,
    /// Name that was being resolved when it was found.
    pub requested_name: String,
    /// Strategy that found it.
    pub strategy: StrategyTag,
}

/// A located entry point together with its address.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEntry<'a> {
    /// How the entry was found.
    pub candidate: &'a EntryCandidate,
    /// The callable.
    pub entry: EntryFn,
}

/// Details of a failed resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionReport {
    /// Module the artefact provides.
    pub module_name: String,
    /// Configured entry name.
    pub requested_name: String,
    /// Symbol names tried, in order, without duplicates.
    pub tried: Vec<String>,
    /// Exported names not starting with `_`, in table order.
    pub public_callables: Vec<String>,
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no entry point \"{}\" in module {} (tried: {}; public callables: {})",
            self.requested_name,
            self.module_name,
            join_or_none(&self.tried),
            join_or_none(&self.public_callables),
        )
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_owned()
    } else {
        names.join(", ")
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone)]
pub enum Resolution {
    /// An entry point was located.
    Found {
        /// How it was found.
        candidate: EntryCandidate,
        /// The callable.
        entry: EntryFn,
    },
    /// No strategy located an entry point.
    NotFound(ResolutionReport),
}

impl Resolution {
    /// Return the located entry, if any.
    #[must_use]
    pub fn found(&self) -> Option<ResolvedEntry<'_>> {
        match self {
            Self::Found { candidate, entry } => Some(ResolvedEntry {
                candidate,
                entry: *entry,
            }),
            Self::NotFound(_) => None,
        }
    }
}

/// Resolution settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Configured entry name.
    pub entry_name: String,
    /// Whether the first public callable is the last resort.
    pub first_callable_fallback: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            entry_name: DEFAULT_ENTRY.to_owned(),
            first_callable_fallback: false,
        }
    }
}

/// Locate the entry point of `unit`.
///
/// Never fails: an unresolvable unit yields [`Resolution::NotFound`] with the
/// names tried and the public callables available.
#[must_use]
pub fn resolve(unit: &dyn LoadedUnit, options: &ResolverOptions) -> Resolution {
    let mut search = Search {
        unit,
        requested: &options.entry_name,
        tried: Vec::new(),
    };

    if let Some(found) = search.cascade(&options.entry_name) {
        return found;
    }
    if options.entry_name != DEFAULT_ENTRY {
        if let Some(found) = search.cascade(DEFAULT_ENTRY) {
            return found;
        }
    }
    debug!(
        "falling back in {}; public callables: {:?}",
        unit.module_name(),
        unit.public_callables()
    );
    if let Some(found) = search.recognised_names() {
        return found;
    }
    if options.first_callable_fallback {
        if let Some(found) = search.first_public_callable() {
            return found;
        }
    }

    debug!(
        "no entry point in {} after trying {:?}",
        unit.module_name(),
        search.tried
    );
    Resolution::NotFound(ResolutionReport {
        module_name: unit.module_name().to_owned(),
        requested_name: options.entry_name.clone(),
        tried: search.tried,
        public_callables: unit.public_callables(),
    })
}

struct Search<'a> {
    unit: &'a dyn LoadedUnit,
    requested: &'a str,
    tried: Vec<String>,
}

impl Search<'_> {
    fn cascade(&mut self, name: &str) -> Option<Resolution> {
        let prefixed = format!("{}_{name}", self.unit.module_name());

        if let Some(found) = self.table(name, name, StrategyTag::ExactMatch) {
            return Some(found);
        }
        if let Some(found) = self.table(&prefixed, name, StrategyTag::PrefixedMatch) {
            return Some(found);
        }

        let suffix = format!("_{name}");
        let pattern = self
            .unit
            .exports()
            .iter()
            .find(|export| export.ends_with(&suffix))
            .cloned();
        if let Some(symbol) = pattern {
            if let Some(found) = self.table(&symbol, name, StrategyTag::PatternMatch) {
                return Some(found);
            }
        }

        for symbol in [name, prefixed.as_str()] {
            if let Some(found) = self.foreign(symbol, name, StrategyTag::ForeignSymbolLookup) {
                return Some(found);
            }
        }
        None
    }

    fn recognised_names(&mut self) -> Option<Resolution> {
        let requested = self.requested.to_owned();
        let names = std::iter::once(requested.as_str()).chain(RECOGNISED_ENTRY_NAMES.iter().copied());
        for name in names {
            if self.has_tried(name) {
                continue;
            }
            let found = self
                .table(name, name, StrategyTag::FallbackFirstCallable)
                .or_else(|| self.foreign(name, name, StrategyTag::FallbackFirstCallable));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn first_public_callable(&mut self) -> Option<Resolution> {
        let first = self.unit.public_callables().into_iter().next()?;
        let requested = self.requested;
        self.table(&first, requested, StrategyTag::FallbackFirstCallable)
    }

    fn table(&mut self, symbol: &str, requested: &str, strategy: StrategyTag) -> Option<Resolution> {
        self.record(symbol);
        let entry = self.unit.lookup(symbol)?;
        Some(found(symbol, requested, strategy, entry))
    }

    fn foreign(&mut self, symbol: &str, requested: &str, strategy: StrategyTag) -> Option<Resolution> {
        self.record(symbol);
        let entry = self.unit.foreign_lookup(symbol)?;
        Some(found(symbol, requested, strategy, entry))
    }

    fn has_tried(&self, symbol: &str) -> bool {
        self.tried.iter().any(|t| t == symbol)
    }

    fn record(&mut self, symbol: &str) {
        if !self.has_tried(symbol) {
            self.tried.push(symbol.to_owned());
        }
    }
}

fn found(symbol: &str, requested: &str, strategy: StrategyTag, entry: EntryFn) -> Resolution {
    debug!("resolved {requested} as {symbol} by {strategy}");
    Resolution::Found {
        candidate: EntryCandidate {
            symbol_name: symbol.to_owned(),
            requested_name: requested.to_owned(),
            strategy,
        },
        entry,
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
