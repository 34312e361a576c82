#![doc = include_str!("../../../README.md")]

mod config;
mod desugar;
mod error;
pub mod expressions;
mod fresh;
mod intern;
mod lhs;
mod parse;
mod runtime;
pub mod scope;
pub mod tracer;
mod unparse;

use std::{fmt, mem};

pub use crate::{
    config::{ConfigError, DEFAULT_MARKER, DesugarOptions},
    desugar::{Desugarer, MODULE_UNIT},
    error::{DesugarError, UnsupportedConstruct},
    fresh::{DEFAULT_PREFIX, FreshNames, FreshSymbol, SymbolKind},
    intern::{BytesId, InternerBuilder, StringId},
    parse::{CodeLoc, CodeRange, MAX_NESTING_DEPTH, ParseError, ParseResult, parse},
    runtime::{RuntimeFn, RuntimeNames},
    tracer::{
        NoopTracer, RecordingTracer, RewriteTracer, Rule, ScopeReport, StatsReport, StatsTracer, StderrTracer,
        TraceEvent,
    },
    unparse::{SourcePrinter, unparse},
};
use crate::expressions::{Expr, ExprLoc, Node, Symbol};

/// Rewrites Python source, returning the rewritten tree ready to print.
///
/// With the default options only functions decorated with `@jeeves` are
/// rewritten; see [`DesugarOptions::marker`].
pub fn desugar_source(code: &str, options: &DesugarOptions) -> Result<Desugared, DesugarError> {
    desugar_source_traced(code, options, &mut NoopTracer)
}

/// Like [`desugar_source`], reporting every rewrite decision to `tracer`.
pub fn desugar_source_traced<Tr: RewriteTracer>(
    code: &str,
    options: &DesugarOptions,
    tracer: &mut Tr,
) -> Result<Desugared, DesugarError> {
    let ParseResult { nodes, interner } = parse(code)?;
    let mut desugarer = Desugarer::new(&interner, options, tracer);
    let nodes = match &options.marker {
        None => desugarer.desugar_module(nodes)?,
        Some(marker) => desugar_marked(&mut desugarer, nodes, &interner, marker)?,
    };
    let symbols = desugarer.into_symbols();
    Ok(Desugared {
        nodes,
        interner,
        symbols,
        runtime: options.runtime.clone(),
        emit_import: options.emit_import,
    })
}

/// Rewrites each function carrying the bare `@marker` decorator as its own unit, removing
/// the decorator. Marked functions are found at any depth: in class bodies, in blocks and
/// inside unmarked functions. Everything else is left as parsed.
fn desugar_marked<Tr: RewriteTracer>(
    desugarer: &mut Desugarer<'_, Tr>,
    nodes: Vec<Node>,
    interner: &InternerBuilder,
    marker: &str,
) -> Result<Vec<Node>, DesugarError> {
    let Some(marker) = interner.try_get_str_id(marker) else {
        return Ok(nodes);
    };
    desugar_marked_body(desugarer, nodes, marker)
}

fn desugar_marked_body<Tr: RewriteTracer>(
    desugarer: &mut Desugarer<'_, Tr>,
    nodes: Vec<Node>,
    marker: StringId,
) -> Result<Vec<Node>, DesugarError> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::FunctionDef(mut def) if def.decorators.iter().any(|d| is_marker(d, marker)) => {
                def.decorators.retain(|d| !is_marker(d, marker));
                // marked functions nested in this one are rewritten with it
                strip_markers(&mut def.body, marker);
                Ok(Node::FunctionDef(Box::new(desugarer.desugar_function(*def)?)))
            }
            mut node => {
                for block in node.blocks_mut() {
                    *block = desugar_marked_body(desugarer, mem::take(block), marker)?;
                }
                Ok(node)
            }
        })
        .collect()
}

fn strip_markers(nodes: &mut [Node], marker: StringId) {
    for node in nodes {
        if let Node::FunctionDef(def) = node {
            def.decorators.retain(|d| !is_marker(d, marker));
        }
        for block in node.blocks_mut() {
            strip_markers(block, marker);
        }
    }
}

fn is_marker(decorator: &ExprLoc, marker: StringId) -> bool {
    matches!(
        decorator.expr,
        Expr::Name {
            symbol: Symbol::User(id),
            ..
        } if id == marker
    )
}

/// Output of a successful rewrite: the tree plus everything needed to print it.
#[derive(Debug)]
pub struct Desugared {
    nodes: Vec<Node>,
    interner: InternerBuilder,
    symbols: FreshNames,
    runtime: RuntimeNames,
    emit_import: bool,
}

impl Desugared {
    /// The rewritten module body.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn interner(&self) -> &InternerBuilder {
        &self.interner
    }

    /// The generator that produced every fresh symbol in [`nodes`](Self::nodes).
    #[must_use]
    pub fn symbols(&self) -> &FreshNames {
        &self.symbols
    }

    /// Prints the rewritten module as Python source.
    #[must_use]
    pub fn to_source(&self) -> String {
        self.to_string()
    }

    /// Number of leading statements that must stay ahead of an inserted import: the module
    /// docstring and `from __future__` imports.
    fn prelude_len(&self) -> usize {
        let docstring = usize::from(self.nodes.first().is_some_and(Node::is_docstring));
        let future = self.nodes[docstring..]
            .iter()
            .take_while(|node| {
                matches!(node, Node::ImportFrom { module: Some(module), level: 0, .. }
                    if self.interner.get_str(*module) == "__future__")
            })
            .count();
        docstring + future
    }
}

impl fmt::Display for Desugared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let split = if self.emit_import { self.prelude_len() } else { 0 };
        let (prelude, rest) = self.nodes.split_at(split);
        {
            let mut printer = SourcePrinter::new(&mut *f, &self.interner, &self.symbols, &self.runtime);
            for node in prelude {
                printer.statement(node)?;
            }
        }
        if self.emit_import {
            writeln!(f, "import {}", self.runtime.module)?;
        }
        let mut printer = SourcePrinter::new(f, &self.interner, &self.symbols, &self.runtime);
        for node in rest {
            printer.statement(node)?;
        }
        Ok(())
    }
}
