//! Compiler-facing view of one applied marker.
//!
//! The host compiler (or the JSON wire layer in [`wire`]) hands us an
//! [`Occurrence`]: positional and named typed constants, the constructor
//! signature it bound to, and any generic type arguments. Types are shared
//! through cheap-clone [`TypeHandle`]s.
pub mod wire;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::values::Scalar;

/// Canonical host name of the "type" type; type-reference slots match it.
pub const TYPE_TYPE_NAME: &str = "System.Type";

// ------------------------------ Host types -------------------------------- //

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: Scalar,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostKind {
    Named,
    Array(TypeHandle),
    /// Declared constant members, in declaration order.
    Enum(Vec<EnumMember>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostType {
    pub name: String,
    pub kind: HostKind,
}

/// Shared, immutable handle to a host type.
#[derive(Clone)]
pub struct TypeHandle(Arc<HostType>);

impl TypeHandle {
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(HostType { name: name.into(), kind: HostKind::Named })
    }

    pub fn system_type() -> Self {
        Self::named(TYPE_TYPE_NAME)
    }

    pub fn array_of(element: TypeHandle) -> Self {
        let name = format!("{}[]", element.name());
        Self::from(HostType { name, kind: HostKind::Array(element) })
    }

    pub fn enumeration(name: impl Into<String>, members: Vec<EnumMember>) -> Self {
        Self::from(HostType { name: name.into(), kind: HostKind::Enum(members) })
    }

    /// Display name as the host prints it (fully qualified).
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &HostKind {
        &self.0.kind
    }

    pub fn element(&self) -> Option<&TypeHandle> {
        match &self.0.kind {
            HostKind::Array(el) => Some(el),
            _ => None,
        }
    }

    pub fn enum_members(&self) -> &[EnumMember] {
        match &self.0.kind {
            HostKind::Enum(members) => members,
            _ => &[],
        }
    }
}

impl From<HostType> for TypeHandle {
    fn from(ty: HostType) -> Self {
        TypeHandle(Arc::new(ty))
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TypeHandle {}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.0.name)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Serialize for TypeHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ------------------------------ Constants --------------------------------- //

/// One argument value as the compiler reports it.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedConstant {
    /// The compiler could not evaluate the argument.
    Error,
    Null,
    Primitive(Scalar),
    Enum { ty: TypeHandle, value: Scalar },
    Type(TypeHandle),
    Array(Vec<TypedConstant>),
}

impl TypedConstant {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedConstant::Null)
    }
}

macro_rules! primitive_constant {
    ($($t:ty),*) => {$(
        impl From<$t> for TypedConstant {
            fn from(value: $t) -> Self {
                TypedConstant::Primitive(Scalar::from(value))
            }
        }
    )*};
}

primitive_constant!(i32, i64, bool, f64, f32, char, u8, String, &str, Scalar);

impl From<TypeHandle> for TypedConstant {
    fn from(ty: TypeHandle) -> Self {
        TypedConstant::Type(ty)
    }
}

// ------------------------------ Occurrence -------------------------------- //

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Occurrence {
    /// Generic arguments of the applied marker type, positionally.
    pub type_arguments: Vec<TypeHandle>,
    /// Parameter types of the constructor the compiler bound to, if known.
    pub constructor: Option<Vec<TypeHandle>>,
    pub arguments: Vec<TypedConstant>,
    pub named_arguments: Vec<(String, TypedConstant)>,
}

impl Occurrence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_argument(mut self, value: impl Into<TypedConstant>) -> Self {
        self.arguments.push(value.into());
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<TypedConstant>) -> Self {
        self.named_arguments.push((name.into(), value.into()));
        self
    }

    pub fn with_type_argument(mut self, ty: TypeHandle) -> Self {
        self.type_arguments.push(ty);
        self
    }

    pub fn with_constructor(mut self, signature: Vec<TypeHandle>) -> Self {
        self.constructor = Some(signature);
        self
    }
}
