//! JSON wire format for occurrences.
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "App.Color", "members": [{ "name": "Red", "value": 2 }] },
//!     { "name": "App.Service" }
//!   ],
//!   "occurrences": [
//!     {
//!       "constructor": ["int"],
//!       "arguments": [5],
//!       "named_arguments": { "Color": { "enum": { "type": "App.Color", "value": 2 } } }
//!     }
//!   ]
//! }
//! ```
//!
//! Constants are plain JSON (`5`, `"x"`, `true`, `null`, `[..]`) or tagged
//! (`{"long": 5}`, `{"type": "App.Service"}`, `{"enum": {..}}`, `{"array": [..]}`,
//! `{"error": null}`). Plain strings are always string constants.
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;

use super::{EnumMember, Occurrence, TypeHandle, TypedConstant};
use crate::values::Scalar;

// ----------------------------------- DTOs ---------------------------------- //

#[derive(Debug, Clone, Deserialize)]
pub struct OccurrenceDocument {
    #[serde(default)]
    pub types: Vec<HostTypeDto>,
    #[serde(default)]
    pub occurrences: Vec<OccurrenceDto>,
}

/// A type with `members` is an enum; anything else is opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct HostTypeDto {
    pub name: String,
    #[serde(default)]
    pub members: Option<Vec<EnumMember>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccurrenceDto {
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub constructor: Option<Vec<String>>,
    #[serde(default)]
    pub arguments: Vec<ConstantDto>,
    #[serde(default)]
    pub named_arguments: IndexMap<String, ConstantDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConstantDto {
    Tagged(TaggedConstant),
    Plain(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggedConstant {
    /// Newtype over `()` so only `{"error": null}` matches, never `"error"`.
    Error(()),
    Primitive(Scalar),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Byte(u8),
    Enum {
        #[serde(rename = "type")]
        ty: String,
        value: Scalar,
    },
    Type(String),
    Array(Vec<ConstantDto>),
}

// --------------------------------- Catalog --------------------------------- //

/// Name → handle table. Every lookup of the same name yields the same
/// shared handle.
#[derive(Debug, Default)]
pub struct Catalog {
    types: HashMap<String, TypeHandle>,
}

impl Catalog {
    pub fn new(types: &[HostTypeDto]) -> Self {
        let mut catalog = Catalog::default();
        for ty in types {
            let handle = match &ty.members {
                Some(members) => TypeHandle::enumeration(ty.name.clone(), members.clone()),
                None => TypeHandle::named(ty.name.clone()),
            };
            catalog.types.insert(ty.name.clone(), handle);
        }
        catalog
    }

    /// Unknown names become opaque named types; `T[]` becomes an array of `T`.
    pub fn resolve(&mut self, name: &str) -> TypeHandle {
        if let Some(handle) = self.types.get(name) {
            return handle.clone();
        }
        let handle = match name.strip_suffix("[]") {
            Some(element) => TypeHandle::array_of(self.resolve(element)),
            None => TypeHandle::named(name),
        };
        self.types.insert(name.to_string(), handle.clone());
        handle
    }

    pub fn constant(&mut self, dto: &ConstantDto) -> Result<TypedConstant, String> {
        match dto {
            ConstantDto::Tagged(tagged) => self.tagged(tagged),
            ConstantDto::Plain(json) => self.plain(json),
        }
    }

    fn tagged(&mut self, tagged: &TaggedConstant) -> Result<TypedConstant, String> {
        Ok(match tagged {
            TaggedConstant::Error(()) => TypedConstant::Error,
            TaggedConstant::Primitive(s) => TypedConstant::Primitive(s.clone()),
            TaggedConstant::Long(x) => TypedConstant::from(*x),
            TaggedConstant::Float(x) => TypedConstant::from(*x),
            TaggedConstant::Double(x) => TypedConstant::from(*x),
            TaggedConstant::Char(x) => TypedConstant::from(*x),
            TaggedConstant::Byte(x) => TypedConstant::from(*x),
            TaggedConstant::Enum { ty, value } => {
                TypedConstant::Enum { ty: self.resolve(ty), value: value.clone() }
            }
            TaggedConstant::Type(name) => TypedConstant::Type(self.resolve(name)),
            TaggedConstant::Array(items) => {
                let items = items.iter().map(|c| self.constant(c)).collect::<Result<_, _>>()?;
                TypedConstant::Array(items)
            }
        })
    }

    fn plain(&mut self, json: &serde_json::Value) -> Result<TypedConstant, String> {
        use serde_json::Value as J;
        match json {
            J::Null => Ok(TypedConstant::Null),
            J::Array(items) => Ok(TypedConstant::Array(
                items.iter().map(|c| self.plain(c)).collect::<Result<_, _>>()?,
            )),
            J::Object(_) => Err(format!("unrecognised constant {json}")),
            scalar => Scalar::from_json(scalar)
                .map(TypedConstant::Primitive)
                .ok_or_else(|| format!("unrepresentable constant {scalar}")),
        }
    }

    pub fn occurrence(&mut self, dto: &OccurrenceDto) -> Result<Occurrence, String> {
        let type_arguments = dto.type_arguments.iter().map(|n| self.resolve(n)).collect();
        let constructor = dto
            .constructor
            .as_ref()
            .map(|sig| sig.iter().map(|n| self.resolve(n)).collect());
        let arguments = dto
            .arguments
            .iter()
            .enumerate()
            .map(|(i, c)| self.constant(c).map_err(|e| format!("arguments[{i}]: {e}")))
            .collect::<Result<_, _>>()?;
        let named_arguments = dto
            .named_arguments
            .iter()
            .map(|(name, c)| -> Result<(String, TypedConstant), String> {
                Ok((name.clone(), self.constant(c).map_err(|e| format!("{name}: {e}"))?))
            })
            .collect::<Result<_, _>>()?;
        Ok(Occurrence { type_arguments, constructor, arguments, named_arguments })
    }
}

impl OccurrenceDocument {
    pub fn into_occurrences(self) -> Result<Vec<Occurrence>, String> {
        let mut catalog = Catalog::new(&self.types);
        self.occurrences
            .iter()
            .enumerate()
            .map(|(i, dto)| catalog.occurrence(dto).map_err(|e| format!("occurrences[{i}].{e}")))
            .collect()
    }
}
