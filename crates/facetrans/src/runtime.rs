//! The boundary with the faceted-value runtime library.
//!
//! The pass never implements facet semantics; it only emits calls. Each entry point the
//! rewritten code can call is a [`RuntimeFn`], referenced from the tree as
//! [`Expr::Runtime`](crate::expressions::Expr::Runtime) so that it is never subject to
//! scope lookup. [`RuntimeNames`] decides how those references are spelled in the output.

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// An entry point of the runtime library.
///
/// The strum serialization is the default attribute name on the runtime module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum RuntimeFn {
    /// `logicalNot(value) -> value`
    #[strum(serialize = "jnot")]
    LogicalNot,
    /// `logicalAnd(leftThunk, rightThunk) -> value`
    #[strum(serialize = "jand")]
    LogicalAnd,
    /// `logicalOr(leftThunk, rightThunk) -> value`
    #[strum(serialize = "jor")]
    LogicalOr,
    /// `conditionalValue(test, thenThunk, elseThunk) -> value`
    #[strum(serialize = "jif")]
    ConditionalValue,
    /// `conditionalExec(test, thenFn, elseFn)`, executes the effects of one or both branches.
    #[strum(serialize = "jif")]
    ConditionalExec,
    /// `mapOver(iterable, elementFn) -> iterable`
    #[strum(serialize = "jmap")]
    MapOver,
    /// `membershipTest(collection, item) -> value`
    #[strum(serialize = "jhas")]
    MembershipTest,
    /// `getAttr(object, fieldName) -> value`
    #[strum(serialize = "jgetattr")]
    GetAttr,
    /// `getItem(object, index) -> value`
    #[strum(serialize = "jgetitem")]
    GetItem,
    /// `assign(oldValue, newValue) -> value`
    #[strum(serialize = "jassign")]
    Assign,
    /// `Namespace(initialFields) -> namespaceObject`
    #[strum(serialize = "Namespace")]
    Namespace,
}

impl RuntimeFn {
    /// The attribute name used when no override is configured.
    #[must_use]
    pub fn default_name(self) -> &'static str {
        self.into()
    }

    /// Key of this entry point's override in [`RuntimeNames`] and its JSON form.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::LogicalNot => "logical_not",
            Self::LogicalAnd => "logical_and",
            Self::LogicalOr => "logical_or",
            Self::ConditionalValue => "conditional_value",
            Self::ConditionalExec => "conditional_exec",
            Self::MapOver => "map_over",
            Self::MembershipTest => "membership_test",
            Self::GetAttr => "get_attr",
            Self::GetItem => "get_item",
            Self::Assign => "assign",
            Self::Namespace => "namespace",
        }
    }
}

/// Spelling of the runtime library in the rewritten source.
///
/// Every field defaults to the Jeeves runtime naming. Overrides are usually loaded from the
/// JSON configuration (see [`DesugarOptions`](crate::config::DesugarOptions)).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeNames {
    /// Name the runtime module is reachable under, e.g. `JeevesLib` or `facets.rt`.
    pub module: String,
    pub logical_not: String,
    pub logical_and: String,
    pub logical_or: String,
    pub conditional_value: String,
    pub conditional_exec: String,
    pub map_over: String,
    pub membership_test: String,
    pub get_attr: String,
    pub get_item: String,
    pub assign: String,
    pub namespace: String,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            module: "JeevesLib".to_owned(),
            logical_not: RuntimeFn::LogicalNot.default_name().to_owned(),
            logical_and: RuntimeFn::LogicalAnd.default_name().to_owned(),
            logical_or: RuntimeFn::LogicalOr.default_name().to_owned(),
            conditional_value: RuntimeFn::ConditionalValue.default_name().to_owned(),
            conditional_exec: RuntimeFn::ConditionalExec.default_name().to_owned(),
            map_over: RuntimeFn::MapOver.default_name().to_owned(),
            membership_test: RuntimeFn::MembershipTest.default_name().to_owned(),
            get_attr: RuntimeFn::GetAttr.default_name().to_owned(),
            get_item: RuntimeFn::GetItem.default_name().to_owned(),
            assign: RuntimeFn::Assign.default_name().to_owned(),
            namespace: RuntimeFn::Namespace.default_name().to_owned(),
        }
    }
}

impl RuntimeNames {
    /// Returns the attribute name configured for `function`.
    #[must_use]
    pub fn name_of(&self, function: RuntimeFn) -> &str {
        match function {
            RuntimeFn::LogicalNot => &self.logical_not,
            RuntimeFn::LogicalAnd => &self.logical_and,
            RuntimeFn::LogicalOr => &self.logical_or,
            RuntimeFn::ConditionalValue => &self.conditional_value,
            RuntimeFn::ConditionalExec => &self.conditional_exec,
            RuntimeFn::MapOver => &self.map_over,
            RuntimeFn::MembershipTest => &self.membership_test,
            RuntimeFn::GetAttr => &self.get_attr,
            RuntimeFn::GetItem => &self.get_item,
            RuntimeFn::Assign => &self.assign,
            RuntimeFn::Namespace => &self.namespace,
        }
    }

    /// Full dotted reference to `function`, e.g. `JeevesLib.jand`.
    #[must_use]
    pub fn qualified(&self, function: RuntimeFn) -> String {
        format!("{}.{}", self.module, self.name_of(function))
    }

    /// The first segment of the module path, i.e. the host name the output depends on.
    #[must_use]
    pub fn module_root(&self) -> &str {
        self.module.split('.').next().unwrap_or(&self.module)
    }

    /// Iterates over every configured attribute name together with its entry point.
    pub fn entries(&self) -> impl Iterator<Item = (RuntimeFn, &str)> + '_ {
        RuntimeFn::iter().map(move |function| (function, self.name_of(function)))
    }
}
