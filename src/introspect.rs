//! Introspection of spec classes.
//!
//! The schema builder never looks at a host type system directly. It asks an
//! [`Introspect`] implementation for the declared shape of a spec class:
//! constructors, parameters, settable properties, and the tags attached to
//! them. [`SpecShape`] is the plain-data form of that shape and is what JSON
//! spec files deserialize into; `materialize::Reflected` wraps a Rust type
//! registered through `SpecClass`.
use serde::{Deserialize, Serialize};

use crate::ir::PrimitiveKind;
use crate::occurrence::{EnumMember, TypeHandle};
use crate::schema::Targets;
use crate::values::{EnumValue, Scalar, Value};

// ----------------------------- Declared types ------------------------------ //

/// A member type as declared on the spec class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredTy {
    String,
    Int,
    Long,
    Bool,
    Double,
    Float,
    Char,
    Byte,
    Object,
    Type,
    /// An enum declared next to the spec class.
    Enum {
        name: String,
        #[serde(default)]
        members: Vec<EnumMember>,
    },
    Array(Box<DeclaredTy>),
    Nullable(Box<DeclaredTy>),
    /// Anything else; rejected by the schema builder.
    Other(String),
}

impl DeclaredTy {
    pub fn nullable(inner: DeclaredTy) -> Self {
        DeclaredTy::Nullable(Box::new(inner))
    }

    pub fn array(element: DeclaredTy) -> Self {
        DeclaredTy::Array(Box::new(element))
    }

    pub fn enumeration(name: impl Into<String>, members: Vec<EnumMember>) -> Self {
        DeclaredTy::Enum { name: name.into(), members }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, DeclaredTy::Nullable(_))
    }

    /// Strip any nullable wrapping.
    pub fn underlying(&self) -> &DeclaredTy {
        match self {
            DeclaredTy::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        Some(match self.underlying() {
            DeclaredTy::String => PrimitiveKind::String,
            DeclaredTy::Int => PrimitiveKind::Int,
            DeclaredTy::Long => PrimitiveKind::Long,
            DeclaredTy::Bool => PrimitiveKind::Bool,
            DeclaredTy::Double => PrimitiveKind::Double,
            DeclaredTy::Float => PrimitiveKind::Float,
            DeclaredTy::Char => PrimitiveKind::Char,
            DeclaredTy::Byte => PrimitiveKind::Byte,
            DeclaredTy::Object => PrimitiveKind::Object,
            _ => return None,
        })
    }

    /// Handle for a locally declared enum.
    pub fn enum_handle(&self) -> Option<TypeHandle> {
        match self.underlying() {
            DeclaredTy::Enum { name, members } => {
                Some(TypeHandle::enumeration(name.clone(), members.clone()))
            }
            _ => None,
        }
    }

    /// Name used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            DeclaredTy::Enum { name, .. } | DeclaredTy::Other(name) => name.clone(),
            DeclaredTy::Type => "type".to_string(),
            DeclaredTy::Array(el) => format!("{}[]", el.display_name()),
            DeclaredTy::Nullable(inner) => format!("{}?", inner.display_name()),
            prim => prim.primitive().map(PrimitiveKind::keyword).unwrap_or("?").to_string(),
        }
    }
}

/// Tag on a parameter or property that overrides how its declared type is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberMarker {
    /// Holds a type reference, whatever the declared type.
    TypeRef,
    /// Holds a value of an enum that may only exist in the compiled code.
    EnumRef { full_type_name: String },
}

// -------------------------------- Literals --------------------------------- //

/// Default value as written on a spec class: a scalar or an array of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Scalar(Scalar),
    Array(Vec<Literal>),
}

impl Literal {
    /// Interpret against the member's declared type and marker.
    pub fn to_value(&self, ty: &DeclaredTy, marker: Option<&MemberMarker>) -> Value {
        let scalar = match self {
            Literal::Array(items) => {
                let element = match ty.underlying() {
                    DeclaredTy::Array(el) => el.as_ref(),
                    other => other,
                };
                return Value::Array(
                    items.iter().map(|item| item.to_value(element, marker)).collect(),
                );
            }
            Literal::Scalar(s) => s,
        };

        match marker {
            Some(MemberMarker::TypeRef) => return type_value(scalar),
            Some(MemberMarker::EnumRef { full_type_name }) => {
                let handle = TypeHandle::enumeration(full_type_name.clone(), Vec::new());
                return Value::Enum(EnumValue::new(Some(handle), scalar.clone()));
            }
            None => {}
        }

        match ty.underlying() {
            DeclaredTy::Type => type_value(scalar),
            DeclaredTy::Enum { members, .. } => {
                // a member name is accepted in place of its value
                let raw = match scalar {
                    Scalar::String(name) => members
                        .iter()
                        .find(|m| &m.name == name)
                        .map(|m| m.value.clone())
                        .unwrap_or_else(|| scalar.clone()),
                    other => other.clone(),
                };
                Value::Enum(EnumValue::new(ty.enum_handle(), raw))
            }
            _ => match ty.primitive() {
                Some(kind) => Value::Scalar(scalar.coerce(kind).unwrap_or_else(|| scalar.clone())),
                None => Value::Scalar(scalar.clone()),
            },
        }
    }
}

fn type_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::String(name) => Value::Type(TypeHandle::named(name.clone())),
        other => Value::Scalar(other.clone()),
    }
}

// ---------------------------------- Shapes --------------------------------- //

fn default_inherited() -> bool {
    true
}

/// Marks a spec class as a marker schema source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSource {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default = "default_inherited")]
    pub inherited: bool,
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource {
            namespace: None,
            targets: Targets::ALL,
            allow_multiple: false,
            inherited: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameterTag {
    pub name: String,
    #[serde(default)]
    pub class: bool,
    #[serde(default, rename = "struct")]
    pub r#struct: bool,
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unmanaged: bool,
    #[serde(default)]
    pub base_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamShape {
    pub name: String,
    pub ty: DeclaredTy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MemberMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default)]
    pub variadic: bool,
}

impl ParamShape {
    pub fn new(name: impl Into<String>, ty: DeclaredTy) -> Self {
        ParamShape { name: name.into(), ty, marker: None, default: None, variadic: false }
    }

    pub fn marked(mut self, marker: MemberMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CtorShape {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParamShape>,
}

impl CtorShape {
    pub fn new(name: Option<&str>) -> Self {
        CtorShape { name: name.map(str::to_string), parameters: Vec::new() }
    }

    pub fn param(mut self, param: ParamShape) -> Self {
        self.parameters.push(param);
        self
    }
}

fn default_settable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyShape {
    pub name: String,
    pub ty: DeclaredTy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MemberMarker>,
    #[serde(default = "default_settable")]
    pub settable: bool,
    /// Value the property holds right after parameterless construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Literal>,
}

impl PropertyShape {
    pub fn new(name: impl Into<String>, ty: DeclaredTy) -> Self {
        PropertyShape { name: name.into(), ty, marker: None, settable: true, initial: None }
    }

    pub fn marked(mut self, marker: MemberMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.settable = false;
        self
    }

    pub fn initial(mut self, initial: Literal) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// Declared shape of one spec class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecShape {
    pub type_name: String,
    #[serde(default)]
    pub schema_source: Option<SchemaSource>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterTag>,
    #[serde(default)]
    pub constructors: Vec<CtorShape>,
    #[serde(default)]
    pub properties: Vec<PropertyShape>,
}

impl SpecShape {
    pub fn new(type_name: impl Into<String>) -> Self {
        SpecShape {
            type_name: type_name.into(),
            schema_source: None,
            type_parameters: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn source(mut self, source: SchemaSource) -> Self {
        self.schema_source = Some(source);
        self
    }

    pub fn type_parameter(mut self, tag: TypeParameterTag) -> Self {
        self.type_parameters.push(tag);
        self
    }

    pub fn constructor(mut self, ctor: CtorShape) -> Self {
        self.constructors.push(ctor);
        self
    }

    pub fn property(mut self, property: PropertyShape) -> Self {
        self.properties.push(property);
        self
    }

    /// A class with no declared constructor still has the implicit one.
    pub fn parameterless_constructor(&self) -> Option<usize> {
        if self.constructors.is_empty() {
            return Some(0);
        }
        self.constructors.iter().position(|c| c.parameters.is_empty())
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyShape> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

// ------------------------------- Capability -------------------------------- //

/// What the schema builder needs to know about a spec class.
pub trait Introspect {
    fn type_name(&self) -> &str;
    fn schema_source(&self) -> Option<&SchemaSource>;
    fn type_parameters(&self) -> &[TypeParameterTag];
    fn constructors(&self) -> &[CtorShape];
    fn properties(&self) -> &[PropertyShape];

    /// Value `property` holds on a default-constructed instance. `Ok(None)`
    /// when there is no parameterless constructor or the value is null.
    fn probe_default(&self, property: &str) -> Result<Option<Value>, String>;
}

impl Introspect for SpecShape {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn schema_source(&self) -> Option<&SchemaSource> {
        self.schema_source.as_ref()
    }

    fn type_parameters(&self) -> &[TypeParameterTag] {
        &self.type_parameters
    }

    fn constructors(&self) -> &[CtorShape] {
        &self.constructors
    }

    fn properties(&self) -> &[PropertyShape] {
        &self.properties
    }

    fn probe_default(&self, property: &str) -> Result<Option<Value>, String> {
        if self.parameterless_constructor().is_none() {
            return Ok(None);
        }
        let prop = self
            .find_property(property)
            .ok_or_else(|| format!("`{}` has no property `{property}`", self.type_name))?;
        Ok(prop
            .initial
            .as_ref()
            .map(|lit| lit.to_value(&prop.ty, prop.marker.as_ref()))
            .filter(|v| !v.is_null()))
    }
}
