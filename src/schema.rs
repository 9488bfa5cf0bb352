//! Marker schema model.
//!
//! A [`MarkerDefinition`] is the full shape of one marker kind: its name,
//! where it may be placed, its generic parameters, constructors and named
//! properties. It is built once (by hand through the fluent methods, or by
//! [`crate::lower::lower_to_schema`]) and then shared read-only by every
//! occurrence read against it.
pub mod member;
pub mod type_param;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::ir::ParamTy;
use crate::values::Value;

pub use member::{ConstructorDef, ParameterDef, PropertyDef};
pub use type_param::TypeParameterDef;

/// Suffix every marker type name carries.
pub const MARKER_SUFFIX: &str = "Attribute";

// ------------------------------- Targets ---------------------------------- //

/// Placement targets, bit-compatible with the host's usage flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Targets(u32);

impl Targets {
    pub const ASSEMBLY: Targets = Targets(1);
    pub const MODULE: Targets = Targets(1 << 1);
    pub const CLASS: Targets = Targets(1 << 2);
    pub const STRUCT: Targets = Targets(1 << 3);
    pub const ENUM: Targets = Targets(1 << 4);
    pub const CONSTRUCTOR: Targets = Targets(1 << 5);
    pub const METHOD: Targets = Targets(1 << 6);
    pub const PROPERTY: Targets = Targets(1 << 7);
    pub const FIELD: Targets = Targets(1 << 8);
    pub const EVENT: Targets = Targets(1 << 9);
    pub const INTERFACE: Targets = Targets(1 << 10);
    pub const PARAMETER: Targets = Targets(1 << 11);
    pub const DELEGATE: Targets = Targets(1 << 12);
    pub const RETURN_VALUE: Targets = Targets(1 << 13);
    pub const GENERIC_PARAMETER: Targets = Targets(1 << 14);
    pub const ALL: Targets = Targets((1 << 15) - 1);

    const NAMED: [(Targets, &'static str); 15] = [
        (Targets::ASSEMBLY, "Assembly"),
        (Targets::MODULE, "Module"),
        (Targets::CLASS, "Class"),
        (Targets::STRUCT, "Struct"),
        (Targets::ENUM, "Enum"),
        (Targets::CONSTRUCTOR, "Constructor"),
        (Targets::METHOD, "Method"),
        (Targets::PROPERTY, "Property"),
        (Targets::FIELD, "Field"),
        (Targets::EVENT, "Event"),
        (Targets::INTERFACE, "Interface"),
        (Targets::PARAMETER, "Parameter"),
        (Targets::DELEGATE, "Delegate"),
        (Targets::RETURN_VALUE, "ReturnValue"),
        (Targets::GENERIC_PARAMETER, "GenericParameter"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Targets) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the set flags, in flag order. `ALL` is reported as `["All"]`.
    pub fn names(self) -> Vec<&'static str> {
        if self == Targets::ALL {
            return vec!["All"];
        }
        Self::NAMED.iter().filter(|(t, _)| self.contains(*t)).map(|(_, n)| *n).collect()
    }

    pub fn from_name(name: &str) -> Option<Targets> {
        if name.eq_ignore_ascii_case("all") {
            return Some(Targets::ALL);
        }
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(t, _)| *t)
    }
}

impl Default for Targets {
    fn default() -> Self {
        Targets::ALL
    }
}

impl BitOr for Targets {
    type Output = Targets;
    fn bitor(self, rhs: Targets) -> Targets {
        Targets(self.0 | rhs.0)
    }
}

impl BitOrAssign for Targets {
    fn bitor_assign(&mut self, rhs: Targets) {
        self.0 |= rhs.0;
    }
}

impl From<Targets> for Vec<String> {
    fn from(targets: Targets) -> Self {
        targets.names().into_iter().map(str::to_string).collect()
    }
}

impl TryFrom<Vec<String>> for Targets {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut out = Targets(0);
        for name in &names {
            out |= Targets::from_name(name).ok_or_else(|| format!("unknown target `{name}`"))?;
        }
        Ok(out)
    }
}

// -------------------------- Marker definition ----------------------------- //

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerDefinition {
    name: String,
    namespace: Option<String>,
    targets: Targets,
    allow_multiple: bool,
    inherited: bool,
    constructors: Vec<ConstructorDef>,
    properties: Vec<PropertyDef>,
    type_parameters: Vec<TypeParameterDef>,
    /// Index of the implicit constructor fed by `with_parameter`.
    #[serde(skip)]
    implicit_ctor: Option<usize>,
}

impl MarkerDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with(MARKER_SUFFIX) {
            name.push_str(MARKER_SUFFIX);
        }
        MarkerDefinition {
            name,
            namespace: None,
            targets: Targets::ALL,
            allow_multiple: false,
            inherited: true,
            constructors: Vec::new(),
            properties: Vec::new(),
            type_parameters: Vec::new(),
            implicit_ctor: None,
        }
    }

    // ----- fluent configuration -----

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn with_inherited(mut self, inherited: bool) -> Self {
        self.inherited = inherited;
        self
    }

    pub fn with_type_parameter(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(TypeParameterDef) -> TypeParameterDef,
    ) -> Self {
        self.type_parameters.push(configure(TypeParameterDef::new(name)));
        self
    }

    pub fn with_constructor(
        mut self,
        name: Option<&str>,
        configure: impl FnOnce(ConstructorDef) -> ConstructorDef,
    ) -> Self {
        self.constructors.push(configure(ConstructorDef::new(name)));
        self
    }

    /// Single-constructor shorthand: appends to one implicit, untagged
    /// constructor.
    pub fn with_parameter(mut self, parameter: ParameterDef) -> Self {
        let idx = match self.implicit_ctor {
            Some(idx) => idx,
            None => {
                self.constructors.push(ConstructorDef::new(None));
                let idx = self.constructors.len() - 1;
                self.implicit_ctor = Some(idx);
                idx
            }
        };
        self.constructors[idx].parameters.push(parameter);
        self
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        ty: ParamTy,
        default: Option<Value>,
    ) -> Self {
        self.properties.push(PropertyDef::new(name, ty, default));
        self
    }

    // ----- accessors -----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Output file the declaration is emitted to.
    pub fn file_name(&self) -> String {
        format!("{}.g.cs", self.full_name())
    }

    pub fn targets(&self) -> Targets {
        self.targets
    }

    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    pub fn inherited(&self) -> bool {
        self.inherited
    }

    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn type_parameters(&self) -> &[TypeParameterDef] {
        &self.type_parameters
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for MarkerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::codegen::render_declaration(self))
    }
}
