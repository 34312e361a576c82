use std::{borrow::Cow, fmt};

use strum::IntoStaticStr;

use crate::parse::{CodeRange, ParseError};

/// A construct the rewrite deliberately has no rule for.
///
/// Reaching one fails the whole unit: emitting it unrewritten next to namespace-indirected
/// code would produce a program with the wrong semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum UnsupportedConstruct {
    /// `[e for x in xs for y in ys]`
    MultiGeneratorComprehension,
    /// `[e for x in xs if c]`
    FilteredComprehension,
    /// `[e for (a, b) in xs]`
    ComprehensionTargetPattern,
    /// `a = b = value`
    MultiTargetAssignment,
    /// `a, b = value`
    DestructuringAssignment,
    /// `xs[1:2] = value`
    SliceAssignmentTarget,
    /// `a in b in c`, `a < b in c`
    ChainedMembershipComparison,
    /// `return`, `break` or `continue` that would leave a branch thunk.
    ControlTransferInBranch,
    /// A branch thunk in a class body that binds or reads class-body names; a thunk cannot
    /// reach the class namespace.
    ConditionalClassBinding,
    /// User code binds the name of the runtime module.
    RuntimeAliasShadowed,
}

impl UnsupportedConstruct {
    /// Stable kebab-case identifier, used in trace output.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.into()
    }

    fn description(self) -> &'static str {
        match self {
            Self::MultiGeneratorComprehension => "list comprehension with more than one `for` clause",
            Self::FilteredComprehension => "list comprehension with an `if` filter",
            Self::ComprehensionTargetPattern => "list comprehension whose target is not a plain name",
            Self::MultiTargetAssignment => "assignment with more than one target",
            Self::DestructuringAssignment => "destructuring assignment",
            Self::SliceAssignmentTarget => "assignment to a slice",
            Self::ChainedMembershipComparison => "chained comparison containing `in` or `not in`",
            Self::ControlTransferInBranch => "`return`, `break` or `continue` leaving an `if` branch",
            Self::ConditionalClassBinding => "class-body name used inside a deferred branch",
            Self::RuntimeAliasShadowed => "rebinding the runtime module name",
        }
    }
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Failure of one unit's rewrite. No partial output is ever produced alongside one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesugarError {
    /// The source could not be parsed, or uses syntax outside the supported grammar.
    Parse(ParseError),
    /// A construct the rewrite rejects by design.
    Unsupported {
        construct: UnsupportedConstruct,
        position: CodeRange,
    },
    /// A defect in the pass: a precondition checked earlier did not hold.
    Invariant {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
}

impl DesugarError {
    pub(crate) fn unsupported(construct: UnsupportedConstruct, position: CodeRange) -> Self {
        Self::Unsupported { construct, position }
    }

    pub(crate) fn invariant(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Invariant {
            msg: msg.into(),
            position,
        }
    }

    /// Where in the source the failure was detected.
    #[must_use]
    pub fn position(&self) -> CodeRange {
        match self {
            Self::Parse(e) => e.position(),
            Self::Unsupported { position, .. } | Self::Invariant { position, .. } => *position,
        }
    }

    /// The rejected construct, if this is an unsupported-construct failure.
    #[must_use]
    pub fn construct(&self) -> Option<UnsupportedConstruct> {
        match self {
            Self::Unsupported { construct, .. } => Some(*construct),
            _ => None,
        }
    }
}

impl fmt::Display for DesugarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Unsupported { construct, position } => write!(f, "{position}: unsupported construct: {construct}"),
            Self::Invariant { msg, position } => write!(f, "{position}: internal error in desugaring pass: {msg}"),
        }
    }
}

impl std::error::Error for DesugarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for DesugarError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}
