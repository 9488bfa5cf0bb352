//! Reading one [`Occurrence`] into a [`ValueBag`].
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codegen::pascal_case;
use crate::error::{Error, Result};
use crate::ir::ParamTy;
use crate::occurrence::{Occurrence, TypedConstant};
use crate::schema::{ConstructorDef, MarkerDefinition};
use crate::values::{EnumValue, Value, ValueBag};

/// What to do when neither the bound signature nor the argument count
/// settles on one constructor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Take the first remaining candidate, else the first constructor.
    #[default]
    FirstCandidate,
    /// Fail with [`Error::AmbiguousConstructor`].
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    #[serde(default)]
    pub policy: ResolutionPolicy,
}

pub struct Reader<'d> {
    def: &'d MarkerDefinition,
    options: ReaderOptions,
}

impl<'d> Reader<'d> {
    pub fn new(def: &'d MarkerDefinition) -> Self {
        Self::with_options(def, ReaderOptions::default())
    }

    pub fn with_options(def: &'d MarkerDefinition, options: ReaderOptions) -> Self {
        Reader { def, options }
    }

    pub fn read(&self, occ: &Occurrence) -> Result<ValueBag> {
        let ctor = self.resolve_constructor(occ)?;
        let mut bag = ValueBag::new(ctor.and_then(|c| c.name.clone()));

        for (tp, ty) in self.def.type_parameters().iter().zip(&occ.type_arguments) {
            bag.insert_type_argument(tp.name.clone(), ty.clone());
        }

        if let Some(ctor) = ctor {
            for (param, arg) in ctor.parameters.iter().zip(&occ.arguments) {
                bag.insert(pascal_case(&param.name), convert(arg, &param.ty));
            }
            for param in ctor.parameters.iter().skip(occ.arguments.len()) {
                let name = pascal_case(&param.name);
                if !bag.contains(&name) {
                    bag.insert(name, fill(param.default.as_ref(), &param.ty));
                }
            }
        }

        for (key, arg) in &occ.named_arguments {
            match self.def.property(key) {
                Some(prop) => bag.insert(prop.name.clone(), convert(arg, &prop.ty)),
                None => debug!(
                    marker = self.def.name(),
                    argument = %key,
                    "ignoring unknown named argument"
                ),
            }
        }
        for prop in self.def.properties() {
            if !bag.contains(&prop.name) {
                bag.insert(prop.name.clone(), fill(prop.default.as_ref(), &prop.ty));
            }
        }

        Ok(bag)
    }

    pub fn resolve_constructor(&self, occ: &Occurrence) -> Result<Option<&'d ConstructorDef>> {
        let ctors = self.def.constructors();
        match ctors {
            [] => return Ok(None),
            [only] => return Ok(Some(only)),
            _ => {}
        }

        if let Some(sig) = &occ.constructor {
            let exact = ctors.iter().find(|c| {
                c.parameters.len() == sig.len()
                    && c.parameters.iter().zip(sig).all(|(p, t)| p.ty.matches_host(t))
            });
            if let Some(ctor) = exact {
                debug!(
                    marker = self.def.name(),
                    constructor = %ctor.label(),
                    "constructor matched by signature"
                );
                return Ok(Some(ctor));
            }
        }

        let given = occ.arguments.len();
        let candidates = ctors
            .iter()
            .filter(|c| c.required_count() <= given && given <= c.parameters.len())
            .collect::<Vec<_>>();
        if let [only] = candidates.as_slice() {
            debug!(
                marker = self.def.name(),
                constructor = %only.label(),
                "constructor matched by arity"
            );
            return Ok(Some(*only));
        }

        if self.options.policy == ResolutionPolicy::Strict {
            let pool = if candidates.is_empty() { ctors.iter().collect() } else { candidates };
            return Err(Error::AmbiguousConstructor {
                marker: self.def.full_name(),
                candidates: pool.iter().map(|c| c.label()).collect(),
            });
        }

        let chosen = candidates.first().copied().unwrap_or(&ctors[0]);
        warn!(
            marker = self.def.name(),
            candidates = candidates.len(),
            constructor = %chosen.label(),
            "ambiguous constructor; taking the first"
        );
        Ok(Some(chosen))
    }
}

/// Free-function form of [`Reader::read`] with default options.
pub fn read_occurrence(def: &MarkerDefinition, occ: &Occurrence) -> Result<ValueBag> {
    Reader::new(def).read(occ)
}

/// Value for a slot the occurrence did not supply.
pub fn fill(default: Option<&Value>, ty: &ParamTy) -> Value {
    match default {
        Some(value) => value.clone(),
        None if ty.is_nullable() => Value::Null,
        None => ty.zero_value(),
    }
}

pub fn convert(arg: &TypedConstant, ty: &ParamTy) -> Value {
    match (arg, ty) {
        (TypedConstant::Error | TypedConstant::Null, _) => Value::Null,
        (TypedConstant::Type(t), ParamTy::TypeRef { .. }) => Value::Type(t.clone()),
        (_, ParamTy::TypeRef { .. }) => Value::Null,
        (TypedConstant::Enum { ty, value }, ParamTy::EnumRef { .. }) => {
            Value::Enum(EnumValue::new(Some(ty.clone()), value.clone()))
        }
        (TypedConstant::Primitive(s), ParamTy::EnumRef { .. }) => {
            Value::Enum(EnumValue::new(None, s.clone()))
        }
        (_, ParamTy::EnumRef { .. }) => Value::Null,
        (TypedConstant::Array(items), ParamTy::Array { element }) => {
            Value::Array(items.iter().map(|item| convert(item, element)).collect())
        }
        (_, ParamTy::Array { .. }) => Value::Null,
        (other, ParamTy::Primitive { .. }) => raw(other),
    }
}

fn raw(arg: &TypedConstant) -> Value {
    match arg {
        TypedConstant::Error | TypedConstant::Null => Value::Null,
        TypedConstant::Primitive(s) => Value::Scalar(s.clone()),
        TypedConstant::Enum { value, .. } => Value::Scalar(value.clone()),
        TypedConstant::Type(t) => Value::Type(t.clone()),
        TypedConstant::Array(items) => Value::Array(items.iter().map(raw).collect()),
    }
}
