//! Port descriptors for the node system.
//!
//! Each behavior derives its ordered port list from its instance data. The
//! graph model uses these to validate connections and the compiler uses the
//! kinds to decide which links the runtime needs.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// The four connection point kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Control flows in.
    Enter,
    /// Control flows out.
    Exit,
    /// Data is read in.
    Input,
    /// Data is produced.
    Output,
}

impl PortKind {
    /// Build a kind from the `(is_data, is_exit)` flag pair.
    ///
    /// For data ports `is_exit` selects Output; for control ports it selects Exit.
    pub const fn from_flags(is_data: bool, is_exit: bool) -> Self {
        match (is_data, is_exit) {
            (false, false) => PortKind::Enter,
            (false, true) => PortKind::Exit,
            (true, false) => PortKind::Input,
            (true, true) => PortKind::Output,
        }
    }

    #[inline]
    pub const fn is_data(self) -> bool {
        matches!(self, PortKind::Input | PortKind::Output)
    }

    /// Exit and Output are the "source-like" ends of a connection.
    #[inline]
    pub const fn is_source(self) -> bool {
        matches!(self, PortKind::Exit | PortKind::Output)
    }

    /// The kind this port must pair with.
    pub const fn counterpart(self) -> PortKind {
        match self {
            PortKind::Enter => PortKind::Exit,
            PortKind::Exit => PortKind::Enter,
            PortKind::Input => PortKind::Output,
            PortKind::Output => PortKind::Input,
        }
    }
}

/// Declared data type of a data port.
///
/// Compared by name so it survives serialization; built with `TypeTag::of`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeTag(Cow::Borrowed(std::any::type_name::<T>()))
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        TypeTag(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

/// Descriptor for one connection point on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: Cow<'static, str>,
    pub kind: PortKind,
    /// Only meaningful for data ports. `None` means dynamically typed.
    pub declared_type: Option<TypeTag>,
    /// Exposed on the graph boundary.
    pub is_external: bool,
}

impl Port {
    fn new(name: impl Into<Cow<'static, str>>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
            declared_type: None,
            is_external: false,
        }
    }

    pub fn enter(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, PortKind::Enter)
    }

    pub fn exit(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, PortKind::Exit)
    }

    /// Typed data input.
    pub fn input<T: 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            declared_type: Some(TypeTag::of::<T>()),
            ..Self::new(name, PortKind::Input)
        }
    }

    /// Typed data output.
    pub fn output<T: 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            declared_type: Some(TypeTag::of::<T>()),
            ..Self::new(name, PortKind::Output)
        }
    }

    /// Data input typed at read time.
    pub fn dynamic_input(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, PortKind::Input)
    }

    /// Data output typed at read time.
    pub fn dynamic_output(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, PortKind::Output)
    }

    pub fn external(mut self) -> Self {
        self.is_external = true;
        self
    }

    /// Whether two declared types are compatible. Undeclared matches anything.
    pub fn type_compatible(&self, other: &Port) -> bool {
        match (&self.declared_type, &other.declared_type) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
