//! Rewrite tracing infrastructure.
//!
//! The [`Desugarer`](crate::desugar::Desugarer) is parameterized over a [`RewriteTracer`]
//! and calls its hooks at every decision it makes: a unit starts, a function scope is
//! analyzed, a rewrite rule fires, a fresh symbol is generated, a construct is rejected.
//! All hooks default to no-ops, so with [`NoopTracer`] the calls compile away entirely via
//! monomorphization.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (library default) |
//! | [`StderrTracer`] | Human-readable rewrite log to stderr |
//! | [`StatsTracer`] | Per-rule counters, summarized in a [`StatsReport`] |
//! | [`RecordingTracer`] | Full event recording, used by tests and tooling |
//!
//! ```ignore
//! let mut tracer = StatsTracer::new();
//! let out = desugar_source_traced(code, &DesugarOptions::default(), &mut tracer)?;
//! eprintln!("{}", tracer.report());
//! ```

use std::collections::HashMap;

use strum::IntoStaticStr;

use crate::{error::UnsupportedConstruct, fresh::SymbolKind, parse::CodeRange};

/// A rewrite rule that fired, as reported to [`RewriteTracer::on_rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Rule {
    /// `not a` to a logical-not call.
    LogicalNot,
    /// `and` chain to nested logical-and calls over thunks.
    LogicalAnd,
    /// `or` chain to nested logical-or calls over thunks.
    LogicalOr,
    /// Ternary to a conditional-value call.
    ConditionalValue,
    /// Statement `if` to branch thunks and a conditional-exec call.
    ConditionalExec,
    /// Single-clause list comprehension to a map call.
    MapOver,
    /// `x in c` to a membership call.
    Membership,
    /// `x not in c` to a negated membership call.
    NegatedMembership,
    /// Assignment routed through the runtime's assign.
    Assign,
    /// Augmented assignment expanded to read, operate, assign.
    AugAssign,
    /// Function body given a namespace object.
    Namespace,
    /// Name turned into a namespace field access.
    NameIndirection,
    /// Nested `def`, `class` or import binding copied into the enclosing namespace.
    Publication,
    /// Lambda parameters shadowing outer bindings.
    Lambda,
    /// Class body rewritten with its own host bindings.
    ClassBody,
    /// `except ... as name` rebound through a temporary.
    HandlerRebinding,
    /// `nonlocal` declaration dropped because the name lives in a namespace.
    NonlocalDropped,
    /// `global` declaration added to a branch thunk.
    GlobalPreamble,
}

impl Rule {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Trace event recorded by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A rewrite unit (a marked function, or the whole module) started.
    UnitStart { unit: String },
    /// A function scope was analyzed.
    Scope {
        function: String,
        params: Vec<String>,
        locals: Vec<String>,
    },
    /// A rewrite rule fired.
    Rule { rule: Rule, position: CodeRange },
    /// A fresh symbol was generated.
    FreshSymbol { name: String, kind: SymbolKind },
    /// A construct was rejected; the unit fails.
    Rejected {
        construct: UnsupportedConstruct,
        position: CodeRange,
    },
    /// A unit finished successfully.
    UnitEnd { unit: String, symbols: u32 },
}

/// Names a function scope owns, resolved to text for tracers.
#[derive(Debug, Clone, Copy)]
pub struct ScopeReport<'a> {
    pub function: &'a str,
    pub params: &'a [&'a str],
    pub locals: &'a [&'a str],
}

/// Trait for rewrite tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code. Implementations only override the hooks they care about.
pub trait RewriteTracer: std::fmt::Debug {
    /// Called when a unit starts. `unit` is the function name, or `<module>`.
    #[inline(always)]
    fn on_unit_start(&mut self, _unit: &str) {}

    /// Called after a function's scope has been analyzed, before its body is rewritten.
    #[inline(always)]
    fn on_scope(&mut self, _scope: ScopeReport<'_>) {}

    /// Called each time a rule rewrites a node.
    #[inline(always)]
    fn on_rule(&mut self, _rule: Rule, _position: CodeRange) {}

    /// Called for every generated symbol with its rendered name.
    #[inline(always)]
    fn on_fresh_symbol(&mut self, _name: &str, _kind: SymbolKind) {}

    /// Called when a construct is rejected, right before the unit fails.
    #[inline(always)]
    fn on_rejected(&mut self, _construct: UnsupportedConstruct, _position: CodeRange) {}

    /// Called when a unit finished; `symbols` is the number of fresh symbols generated so far.
    #[inline(always)]
    fn on_unit_end(&mut self, _unit: &str, _symbols: u32) {}
}

/// Zero-cost tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl RewriteTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable rewrite log
// ============================================================================

/// Tracer that prints a human-readable rewrite log to stderr.
///
/// Output format:
/// ```text
/// === unit transfer
///   scope transfer  params=[src, dst, amount]  locals=[ok]
///   + symbol _jv_ns0
///   [  3:5] assign
///   [  4:5] conditional_exec
/// === end transfer  (3 symbols)
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of rule lines to print before going quiet. None = unlimited.
    limit: Option<usize>,
    /// Number of rule lines printed so far.
    count: usize,
    /// Whether we've stopped tracing (hit the limit).
    stopped: bool,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` rule lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl RewriteTracer for StderrTracer {
    fn on_unit_start(&mut self, unit: &str) {
        eprintln!("=== unit {unit}");
    }

    fn on_scope(&mut self, scope: ScopeReport<'_>) {
        if self.stopped {
            return;
        }
        eprintln!(
            "  scope {}  params=[{}]  locals=[{}]",
            scope.function,
            scope.params.join(", "),
            scope.locals.join(", ")
        );
    }

    fn on_rule(&mut self, rule: Rule, position: CodeRange) {
        if self.stopped {
            return;
        }
        let start = position.start();
        eprintln!("  [{:>3}:{:<3}] {}", start.line, start.column, rule.name());
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} rules) ---");
            self.stopped = true;
        }
    }

    fn on_fresh_symbol(&mut self, name: &str, _kind: SymbolKind) {
        if self.stopped {
            return;
        }
        eprintln!("  + symbol {name}");
    }

    fn on_rejected(&mut self, construct: UnsupportedConstruct, position: CodeRange) {
        eprintln!("  !!! rejected {} at {position}", construct.code());
    }

    fn on_unit_end(&mut self, unit: &str, symbols: u32) {
        eprintln!("=== end {unit}  ({symbols} symbols)");
    }
}

// ============================================================================
// StatsTracer: rule frequency
// ============================================================================

/// Tracer that counts rule applications, generated symbols and analyzed scopes.
///
/// Retrieve results via [`StatsTracer::report`] after the rewrite.
#[derive(Debug, Default)]
pub struct StatsTracer {
    rule_counts: HashMap<Rule, u64>,
    units: u64,
    scopes: u64,
    symbols: u64,
    rejected: u64,
}

/// Summary report from a [`StatsTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    /// Per-rule counts, most frequent first, ties in declaration order.
    pub rule_counts: Vec<(Rule, u64)>,
    pub units: u64,
    pub scopes: u64,
    pub symbols: u64,
    pub rejected: u64,
}

impl StatsTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How often `rule` fired so far.
    #[must_use]
    pub fn count(&self, rule: Rule) -> u64 {
        self.rule_counts.get(&rule).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn report(&self) -> StatsReport {
        let mut rule_counts: Vec<_> = self.rule_counts.iter().map(|(&k, &v)| (k, v)).collect();
        rule_counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        StatsReport {
            rule_counts,
            units: self.units,
            scopes: self.scopes,
            symbols: self.symbols,
            rejected: self.rejected,
        }
    }
}

impl RewriteTracer for StatsTracer {
    fn on_unit_start(&mut self, _unit: &str) {
        self.units += 1;
    }

    fn on_scope(&mut self, _scope: ScopeReport<'_>) {
        self.scopes += 1;
    }

    #[inline]
    fn on_rule(&mut self, rule: Rule, _position: CodeRange) {
        *self.rule_counts.entry(rule).or_insert(0) += 1;
    }

    fn on_fresh_symbol(&mut self, _name: &str, _kind: SymbolKind) {
        self.symbols += 1;
    }

    fn on_rejected(&mut self, _construct: UnsupportedConstruct, _position: CodeRange) {
        self.rejected += 1;
    }
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Desugaring Report ===")?;
        writeln!(f, "Units:          {}", self.units)?;
        writeln!(f, "Scopes:         {}", self.scopes)?;
        writeln!(f, "Fresh symbols:  {}", self.symbols)?;
        writeln!(f, "Rejected:       {}", self.rejected)?;
        writeln!(f)?;
        writeln!(f, "--- Rule Frequency ---")?;
        for (rule, count) in &self.rule_counts {
            writeln!(f, "  {:<20} {count:>8}", rule.name())?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer: full event log
// ============================================================================

/// Tracer that records every event in order.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    /// All recorded events in chronological order.
    events: Vec<TraceEvent>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    /// Creates a new recording tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    /// The rules that fired, in order.
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.events.iter().filter_map(|event| match event {
            TraceEvent::Rule { rule, .. } => Some(*rule),
            _ => None,
        })
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|l| self.events.len() >= l) {
            return;
        }
        self.events.push(event);
    }
}

impl RewriteTracer for RecordingTracer {
    fn on_unit_start(&mut self, unit: &str) {
        self.record(TraceEvent::UnitStart { unit: unit.to_owned() });
    }

    fn on_scope(&mut self, scope: ScopeReport<'_>) {
        self.record(TraceEvent::Scope {
            function: scope.function.to_owned(),
            params: scope.params.iter().map(|s| (*s).to_owned()).collect(),
            locals: scope.locals.iter().map(|s| (*s).to_owned()).collect(),
        });
    }

    fn on_rule(&mut self, rule: Rule, position: CodeRange) {
        self.record(TraceEvent::Rule { rule, position });
    }

    fn on_fresh_symbol(&mut self, name: &str, kind: SymbolKind) {
        self.record(TraceEvent::FreshSymbol {
            name: name.to_owned(),
            kind,
        });
    }

    fn on_rejected(&mut self, construct: UnsupportedConstruct, position: CodeRange) {
        self.record(TraceEvent::Rejected { construct, position });
    }

    fn on_unit_end(&mut self, unit: &str, symbols: u32) {
        self.record(TraceEvent::UnitEnd {
            unit: unit.to_owned(),
            symbols,
        });
    }
}
