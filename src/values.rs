//! Resolved marker values.
//!
//! [`Value`] is the closed set of things a marker slot can hold once an
//! occurrence is read: a scalar, a host type handle, a wrapped enum, an
//! array of values, or null. [`ValueBag`] is the per-occurrence, name-keyed
//! result of reading.
use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use ordered_float::OrderedFloat;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::ir::PrimitiveKind;
use crate::occurrence::TypeHandle;

// -------------------------------- Scalar ---------------------------------- //

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "ScalarRepr")]
pub enum Scalar {
    String(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    Double(OrderedFloat<f64>),
    Float(OrderedFloat<f32>),
    Char(char),
    Byte(u8),
}

impl Scalar {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Scalar::String(_) => PrimitiveKind::String,
            Scalar::Int(_) => PrimitiveKind::Int,
            Scalar::Long(_) => PrimitiveKind::Long,
            Scalar::Bool(_) => PrimitiveKind::Bool,
            Scalar::Double(_) => PrimitiveKind::Double,
            Scalar::Float(_) => PrimitiveKind::Float,
            Scalar::Char(_) => PrimitiveKind::Char,
            Scalar::Byte(_) => PrimitiveKind::Byte,
        }
    }

    /// Integral view, used for enum storage.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(x) => Some(i64::from(*x)),
            Scalar::Long(x) => Some(*x),
            Scalar::Byte(x) => Some(i64::from(*x)),
            _ => None,
        }
    }

    /// Convert to `kind` when that loses nothing.
    pub fn coerce(&self, kind: PrimitiveKind) -> Option<Scalar> {
        if kind == PrimitiveKind::Object || self.kind() == kind {
            return Some(self.clone());
        }
        match (self, kind) {
            (Scalar::Int(x), PrimitiveKind::Long) => Some(Scalar::Long(i64::from(*x))),
            (Scalar::Int(x), PrimitiveKind::Double) => {
                Some(Scalar::Double(OrderedFloat(f64::from(*x))))
            }
            (Scalar::Byte(x), PrimitiveKind::Int) => Some(Scalar::Int(i32::from(*x))),
            (Scalar::Byte(x), PrimitiveKind::Long) => Some(Scalar::Long(i64::from(*x))),
            (Scalar::Float(x), PrimitiveKind::Double) => {
                Some(Scalar::Double(OrderedFloat(f64::from(x.0))))
            }
            (Scalar::Long(x), PrimitiveKind::Int) => i32::try_from(*x).ok().map(Scalar::Int),
            (Scalar::Int(x), PrimitiveKind::Byte) => u8::try_from(*x).ok().map(Scalar::Byte),
            _ => None,
        }
    }

    /// Equality across integral widths (`Int(2) ~ Long(2)`).
    pub fn same_value(&self, other: &Scalar) -> bool {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Int(x) => write!(f, "{x}"),
            Scalar::Long(x) => write!(f, "{x}"),
            Scalar::Bool(x) => write!(f, "{x}"),
            Scalar::Double(x) => write!(f, "{}", x.0),
            Scalar::Float(x) => write!(f, "{}", x.0),
            Scalar::Char(x) => write!(f, "{x}"),
            Scalar::Byte(x) => write!(f, "{x}"),
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $wrap:expr),* $(,)?) => {$(
        impl From<$t> for Scalar {
            fn from(x: $t) -> Self {
                $wrap(x)
            }
        }
    )*};
}

scalar_from!(
    i32 => Scalar::Int,
    i64 => Scalar::Long,
    bool => Scalar::Bool,
    f64 => |x| Scalar::Double(OrderedFloat(x)),
    f32 => |x| Scalar::Float(OrderedFloat(x)),
    char => Scalar::Char,
    u8 => Scalar::Byte,
    String => Scalar::String,
    &str => |x: &str| Scalar::String(x.to_string()),
);

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::String(x) => serializer.serialize_str(x),
            Scalar::Int(x) => serializer.serialize_i32(*x),
            Scalar::Long(x) => serializer.serialize_i64(*x),
            Scalar::Bool(x) => serializer.serialize_bool(*x),
            Scalar::Double(x) => serializer.serialize_f64(x.0),
            Scalar::Float(x) => serializer.serialize_f32(x.0),
            Scalar::Char(x) => serializer.serialize_char(*x),
            Scalar::Byte(x) => serializer.serialize_u8(*x),
        }
    }
}

/// Scalars are written either tagged (`{"long": 5}`) or as plain JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarRepr {
    Tagged(TaggedScalar),
    Plain(serde_json::Value),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaggedScalar {
    String(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    Double(f64),
    Float(f32),
    Char(char),
    Byte(u8),
}

impl Scalar {
    /// Plain JSON scalar: integers in `i32` range become `Int`, wider ones
    /// `Long`, fractional numbers `Double`.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        use serde_json::Value as J;
        match value {
            J::Bool(b) => Some(Scalar::Bool(*b)),
            J::String(s) => Some(Scalar::String(s.clone())),
            J::Number(n) => match n.as_i64() {
                Some(i) => Some(i32::try_from(i).map(Scalar::Int).unwrap_or(Scalar::Long(i))),
                None => n.as_f64().map(Scalar::from),
            },
            _ => None,
        }
    }
}

impl TryFrom<ScalarRepr> for Scalar {
    type Error = String;

    fn try_from(repr: ScalarRepr) -> std::result::Result<Self, Self::Error> {
        Ok(match repr {
            ScalarRepr::Tagged(t) => match t {
                TaggedScalar::String(x) => Scalar::String(x),
                TaggedScalar::Int(x) => Scalar::Int(x),
                TaggedScalar::Long(x) => Scalar::Long(x),
                TaggedScalar::Bool(x) => Scalar::Bool(x),
                TaggedScalar::Double(x) => Scalar::from(x),
                TaggedScalar::Float(x) => Scalar::from(x),
                TaggedScalar::Char(x) => Scalar::Char(x),
                TaggedScalar::Byte(x) => Scalar::Byte(x),
            },
            ScalarRepr::Plain(json) => {
                Scalar::from_json(&json).ok_or_else(|| format!("expected a scalar, found {json}"))?
            }
        })
    }
}

// ------------------------------- EnumValue -------------------------------- //

/// A locally declared enum a marker value can be converted into.
pub trait LocalEnum: Sized + Copy + 'static {
    fn members() -> &'static [(&'static str, Self)];
    /// Reinterpret raw storage; must accept values with no named member.
    fn from_underlying(raw: i64) -> Self;
}

/// One enum value as found in compiled code. The enum type itself may not
/// exist on the reading side, so only its handle and raw value are kept.
#[derive(Clone)]
pub struct EnumValue {
    enum_type: Option<TypeHandle>,
    underlying: Scalar,
    member: OnceCell<Option<String>>,
}

impl EnumValue {
    pub fn new(enum_type: Option<TypeHandle>, underlying: Scalar) -> Self {
        EnumValue { enum_type, underlying, member: OnceCell::new() }
    }

    pub fn enum_type(&self) -> Option<&TypeHandle> {
        self.enum_type.as_ref()
    }

    pub fn underlying(&self) -> &Scalar {
        &self.underlying
    }

    /// First declared constant whose value equals the underlying value.
    pub fn member_name(&self) -> Option<&str> {
        self.member
            .get_or_init(|| {
                let ty = self.enum_type.as_ref()?;
                ty.enum_members()
                    .iter()
                    .find(|m| m.value.same_value(&self.underlying))
                    .map(|m| m.name.clone())
            })
            .as_deref()
    }

    pub fn full_type_name(&self) -> Option<String> {
        self.enum_type.as_ref().map(|ty| format!("global::{}", ty.name()))
    }

    /// Local member with the same name, if any.
    pub fn to_enum<E: LocalEnum>(&self) -> Option<E> {
        let name = self.member_name()?;
        E::members().iter().find(|(n, _)| *n == name).map(|(_, e)| *e)
    }

    /// Raw reinterpretation; ignores member names entirely.
    pub fn to_enum_by_value<E: LocalEnum>(&self) -> E {
        E::from_underlying(self.underlying.as_i64().unwrap_or_default())
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.enum_type == other.enum_type && self.underlying.same_value(&other.underlying)
    }
}

impl Eq for EnumValue {}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumValue")
            .field("enum_type", &self.enum_type)
            .field("underlying", &self.underlying)
            .finish()
    }
}

impl Serialize for EnumValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("EnumValue", 3)?;
        st.serialize_field("enum", &self.enum_type)?;
        st.serialize_field("member", &self.member_name())?;
        st.serialize_field("value", &self.underlying)?;
        st.end()
    }
}

// --------------------------------- Value ---------------------------------- //

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Type(TypeHandle),
    Enum(EnumValue),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! scalar_value {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Scalar(Scalar::from(value))
            }
        }
    )*};
}

scalar_value!(i32, i64, bool, f64, f32, char, u8, String, &str, Scalar);

impl From<TypeHandle> for Value {
    fn from(ty: TypeHandle) -> Self {
        Value::Type(ty)
    }
}

impl From<EnumValue> for Value {
    fn from(ev: EnumValue) -> Self {
        Value::Enum(ev)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Scalar(s) => s.serialize(serializer),
            Value::Type(ty) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", ty)?;
                map.end()
            }
            Value::Enum(e) => e.serialize(serializer),
            Value::Array(xs) => xs.serialize(serializer),
        }
    }
}

/// Typed extraction out of a [`Value`].
pub trait FromValue: Sized {
    /// Name used in binding errors.
    const EXPECTED: &'static str;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_from_value {
    ($t:ty, $name:literal, $kind:ident, $variant:ident $(, $wrap:tt)?) => {
        impl FromValue for $t {
            const EXPECTED: &'static str = $name;
            fn from_value(value: &Value) -> Option<Self> {
                match value.as_scalar()?.coerce(PrimitiveKind::$kind)? {
                    Scalar::$variant(x) => Some(x $(.$wrap)?),
                    _ => None,
                }
            }
        }
    };
}

scalar_from_value!(i32, "int", Int, Int);
scalar_from_value!(i64, "long", Long, Long);
scalar_from_value!(bool, "bool", Bool, Bool);
scalar_from_value!(f64, "double", Double, Double, 0);
scalar_from_value!(f32, "float", Float, Float, 0);
scalar_from_value!(char, "char", Char, Char);
scalar_from_value!(u8, "byte", Byte, Byte);
scalar_from_value!(String, "string", String, String);

impl FromValue for Scalar {
    const EXPECTED: &'static str = "scalar";
    fn from_value(value: &Value) -> Option<Self> {
        value.as_scalar().cloned()
    }
}

impl FromValue for TypeHandle {
    const EXPECTED: &'static str = "type";
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Type(ty) => Some(ty.clone()),
            _ => None,
        }
    }
}

impl FromValue for EnumValue {
    const EXPECTED: &'static str = "enum";
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Enum(e) => Some(e.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Arrays keep the elements that convert.
impl<T: FromValue> FromValue for Vec<T> {
    const EXPECTED: &'static str = "array";
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(xs) => Some(xs.iter().filter_map(T::from_value).collect()),
            _ => None,
        }
    }
}

/// `Null` converts to `Some(None)`.
impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ------------------------------- ValueBag --------------------------------- //

fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Resolved values of one occurrence, keyed case-insensitively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueBag {
    values: IndexMap<String, (String, Value)>,
    type_arguments: IndexMap<String, (String, TypeHandle)>,
    constructor: Option<String>,
}

impl ValueBag {
    pub fn new(constructor: Option<String>) -> Self {
        ValueBag { constructor, ..Self::default() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.values.insert(fold(&name), (name, value));
    }

    pub fn insert_type_argument(&mut self, name: impl Into<String>, ty: TypeHandle) {
        let name = name.into();
        self.type_arguments.insert(fold(&name), (name, ty));
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&fold(name))
    }

    /// Tag of the constructor the occurrence resolved to.
    pub fn constructor_name(&self) -> Option<&str> {
        self.constructor.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.values().map(|(n, v)| (n.as_str(), v))
    }

    pub fn type_arguments(&self) -> impl Iterator<Item = (&str, &TypeHandle)> {
        self.type_arguments.values().map(|(n, t)| (n.as_str(), t))
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.values.get(&fold(name)).map(|(_, v)| v)
    }

    // ----- optional accessors -----

    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        self.lookup(name).and_then(T::from_value)
    }

    pub fn type_handle(&self, name: &str) -> Option<TypeHandle> {
        self.get(name)
    }

    pub fn type_argument(&self, name: &str) -> Option<&TypeHandle> {
        self.type_arguments.get(&fold(name)).map(|(_, t)| t)
    }

    pub fn enum_value(&self, name: &str) -> Option<&EnumValue> {
        match self.lookup(name)? {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn enum_as<E: LocalEnum>(&self, name: &str) -> Option<E> {
        self.enum_value(name).map(EnumValue::to_enum_by_value)
    }

    pub fn enum_member_name(&self, name: &str) -> Option<&str> {
        self.enum_value(name)?.member_name()
    }

    pub fn array<T: FromValue>(&self, name: &str) -> Option<Vec<T>> {
        match self.lookup(name)? {
            arr @ Value::Array(_) => Vec::<T>::from_value(arr),
            _ => None,
        }
    }

    pub fn type_handle_array(&self, name: &str) -> Option<Vec<TypeHandle>> {
        self.array(name)
    }

    /// Present and non-null.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.lookup(name).filter(|v| !v.is_null())
    }

    pub fn has(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    // ----- required accessors -----

    pub fn get_required<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.lookup(name).ok_or_else(|| Error::missing(name))?;
        T::from_value(value).ok_or_else(|| Error::mismatch(name, T::EXPECTED))
    }

    pub fn type_handle_required(&self, name: &str) -> Result<TypeHandle> {
        self.type_handle(name)
            .ok_or_else(|| Error::missing(name))
    }

    pub fn type_argument_required(&self, name: &str) -> Result<&TypeHandle> {
        self.type_argument(name).ok_or_else(|| Error::missing(name))
    }

    pub fn enum_value_required(&self, name: &str) -> Result<&EnumValue> {
        self.enum_value(name).ok_or_else(|| Error::missing(name))
    }

    pub fn enum_as_required<E: LocalEnum>(&self, name: &str) -> Result<E> {
        let ev = self.enum_value_required(name)?;
        if ev.underlying().as_i64().is_none() {
            return Err(Error::mismatch(name, "integral enum"));
        }
        Ok(ev.to_enum_by_value())
    }

    pub fn enum_member_name_required(&self, name: &str) -> Result<&str> {
        self.enum_member_name(name).ok_or_else(|| Error::missing(name))
    }

    pub fn array_required<T: FromValue>(&self, name: &str) -> Result<Vec<T>> {
        self.array(name).ok_or_else(|| Error::missing(name))
    }

    pub fn type_handle_array_required(&self, name: &str) -> Result<Vec<TypeHandle>> {
        self.type_handle_array(name).ok_or_else(|| Error::missing(name))
    }

    pub fn raw_required(&self, name: &str) -> Result<&Value> {
        self.raw(name).ok_or_else(|| Error::missing(name))
    }
}

impl Serialize for ValueBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Named<'a, T>(&'a IndexMap<String, (String, T)>);

        impl<T: Serialize> Serialize for Named<'_, T> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, value) in self.0.values() {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }

        let mut st = serializer.serialize_struct("ValueBag", 3)?;
        st.serialize_field("constructor", &self.constructor)?;
        st.serialize_field("values", &Named(&self.values))?;
        st.serialize_field("type_arguments", &Named(&self.type_arguments))?;
        st.end()
    }
}
