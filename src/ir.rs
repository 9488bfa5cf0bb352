// Parameter type descriptors. One descriptor describes the shape of one value
// slot of a marker: what it is declared as, and how occurrence values for it
// are recognised.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::occurrence::{TYPE_TYPE_NAME, TypeHandle};
use crate::values::{Scalar, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Int,
    Long,
    Bool,
    Double,
    Float,
    Char,
    Byte,
    Object,
}

impl PrimitiveKind {
    /// Declaration keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Object => "object",
        }
    }

    /// Canonical runtime name the host reports for this keyword.
    pub fn runtime_name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "System.String",
            PrimitiveKind::Int => "System.Int32",
            PrimitiveKind::Long => "System.Int64",
            PrimitiveKind::Bool => "System.Boolean",
            PrimitiveKind::Double => "System.Double",
            PrimitiveKind::Float => "System.Single",
            PrimitiveKind::Char => "System.Char",
            PrimitiveKind::Byte => "System.Byte",
            PrimitiveKind::Object => "System.Object",
        }
    }

    /// Value-type kinds have a zero value instead of null.
    pub fn is_value_kind(self) -> bool {
        !matches!(self, PrimitiveKind::String | PrimitiveKind::Object)
    }

    pub fn zero(self) -> Option<Scalar> {
        match self {
            PrimitiveKind::Int => Some(Scalar::Int(0)),
            PrimitiveKind::Long => Some(Scalar::Long(0)),
            PrimitiveKind::Bool => Some(Scalar::Bool(false)),
            PrimitiveKind::Double => Some(Scalar::Double(OrderedFloat(0.0))),
            PrimitiveKind::Float => Some(Scalar::Float(OrderedFloat(0.0))),
            PrimitiveKind::Char => Some(Scalar::Char('\0')),
            PrimitiveKind::Byte => Some(Scalar::Byte(0)),
            PrimitiveKind::String | PrimitiveKind::Object => None,
        }
    }

    fn matches_name(self, name: &str) -> bool {
        name == self.keyword() || name == self.runtime_name()
    }
}

/// Shape of one marker value slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamTy {
    Primitive { primitive: PrimitiveKind, nullable: bool },
    /// A type in the host type system; read back as a [`TypeHandle`].
    TypeRef { nullable: bool },
    /// An enum that may only exist in the code being compiled.
    EnumRef { name: String, nullable: bool },
    /// Arrays have reference semantics and are always nullable.
    Array { element: Box<ParamTy> },
}

impl ParamTy {
    pub const STRING: ParamTy = ParamTy::primitive(PrimitiveKind::String);
    pub const INT: ParamTy = ParamTy::primitive(PrimitiveKind::Int);
    pub const LONG: ParamTy = ParamTy::primitive(PrimitiveKind::Long);
    pub const BOOL: ParamTy = ParamTy::primitive(PrimitiveKind::Bool);
    pub const DOUBLE: ParamTy = ParamTy::primitive(PrimitiveKind::Double);
    pub const FLOAT: ParamTy = ParamTy::primitive(PrimitiveKind::Float);
    pub const CHAR: ParamTy = ParamTy::primitive(PrimitiveKind::Char);
    pub const BYTE: ParamTy = ParamTy::primitive(PrimitiveKind::Byte);
    pub const OBJECT: ParamTy = ParamTy::primitive(PrimitiveKind::Object);

    pub const fn primitive(primitive: PrimitiveKind) -> Self {
        ParamTy::Primitive { primitive, nullable: false }
    }

    pub const fn type_ref(nullable: bool) -> Self {
        ParamTy::TypeRef { nullable }
    }

    pub fn enum_ref(name: impl Into<String>, nullable: bool) -> Self {
        ParamTy::EnumRef { name: name.into(), nullable }
    }

    pub fn array(element: ParamTy) -> Self {
        ParamTy::Array { element: Box::new(element) }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            ParamTy::Primitive { nullable, .. }
            | ParamTy::TypeRef { nullable }
            | ParamTy::EnumRef { nullable, .. } => *nullable,
            ParamTy::Array { .. } => true,
        }
    }

    /// Same descriptor with nullability set; arrays come back unchanged.
    pub fn nullable(&self) -> ParamTy {
        match self {
            ParamTy::Primitive { primitive, .. } => ParamTy::Primitive {
                primitive: *primitive,
                nullable: true,
            },
            ParamTy::TypeRef { .. } => ParamTy::TypeRef { nullable: true },
            ParamTy::EnumRef { name, .. } => ParamTy::EnumRef {
                name: name.clone(),
                nullable: true,
            },
            ParamTy::Array { .. } => self.clone(),
        }
    }

    /// Native backing kind; only primitives have one.
    pub fn native(&self) -> Option<PrimitiveKind> {
        match self {
            ParamTy::Primitive { primitive, .. } => Some(*primitive),
            _ => None,
        }
    }

    /// Declaration syntax, e.g. `int?`, `System.Type`, `string[]`.
    pub fn declaration(&self) -> String {
        let (base, nullable) = match self {
            ParamTy::Primitive { primitive, nullable } => {
                (primitive.keyword().to_string(), *nullable)
            }
            ParamTy::TypeRef { nullable } => (TYPE_TYPE_NAME.to_string(), *nullable),
            ParamTy::EnumRef { name, nullable } => (name.clone(), *nullable),
            ParamTy::Array { element } => return format!("{}[]", element.declaration()),
        };
        if nullable { format!("{base}?") } else { base }
    }

    /// Value an omitted argument resolves to when no explicit default exists.
    pub fn zero_value(&self) -> Value {
        match self {
            ParamTy::Primitive { primitive, nullable: false } => {
                primitive.zero().map(Value::Scalar).unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }

    /// Does a host parameter type line up with this descriptor?
    pub fn matches_host(&self, ty: &TypeHandle) -> bool {
        let name = ty.name().trim_end_matches('?');
        match self {
            ParamTy::Primitive { primitive, .. } => primitive.matches_name(name),
            ParamTy::TypeRef { .. } => name == TYPE_TYPE_NAME,
            ParamTy::EnumRef { name: expected, .. } => name == expected.as_str(),
            ParamTy::Array { element } => ty.element().is_some_and(|el| element.matches_host(el)),
        }
    }
}

impl fmt::Display for ParamTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}
