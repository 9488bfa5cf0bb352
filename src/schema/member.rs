use serde::Serialize;

use crate::ir::ParamTy;
use crate::values::Value;

/// Positional constructor parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParameterDef {
    pub name: String,
    pub ty: ParamTy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Trailing `params`-style parameter.
    pub variadic: bool,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, ty: ParamTy) -> Self {
        ParameterDef { name: name.into(), ty, default: None, variadic: false }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = explicit(default.into());
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// An explicit default, or nullable (which defaults to null).
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.ty.is_nullable()
    }
}

/// Named (settable) marker property.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropertyDef {
    pub name: String,
    pub ty: ParamTy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, ty: ParamTy, default: Option<Value>) -> Self {
        PropertyDef { name: name.into(), ty, default: default.and_then(explicit) }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.ty.is_nullable()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConstructorDef {
    /// Tag telling constructors apart when reading.
    pub name: Option<String>,
    pub parameters: Vec<ParameterDef>,
}

impl ConstructorDef {
    pub fn new(name: Option<&str>) -> Self {
        ConstructorDef { name: name.map(str::to_string), parameters: Vec::new() }
    }

    pub fn with_parameter(mut self, parameter: ParameterDef) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| !p.has_default()).count()
    }

    /// Display label used in logs and ambiguity errors.
    pub fn label(&self) -> String {
        let params = self.parameters.iter().map(|p| p.ty.declaration()).collect::<Vec<_>>();
        format!("{}({})", self.name.as_deref().unwrap_or(""), params.join(", "))
    }
}

// A null default is the same as no default.
fn explicit(value: Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value) }
}
