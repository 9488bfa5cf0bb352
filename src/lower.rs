//! Lowering of an introspected spec class into a [`MarkerDefinition`].
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::introspect::{CtorShape, DeclaredTy, Introspect, MemberMarker};
use crate::ir::ParamTy;
use crate::schema::{MarkerDefinition, ParameterDef};

/// Conventional suffix of spec class names, dropped from the marker name.
pub const SPEC_SUFFIX: &str = "Definition";

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));
static DOTTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("dotted identifier pattern")
});

pub fn lower_to_schema(spec: &dyn Introspect) -> Result<MarkerDefinition> {
    let type_name = spec.type_name();
    let source = spec
        .schema_source()
        .ok_or_else(|| Error::derivation(type_name, "not tagged as a schema source"))?;

    let name = marker_name(type_name);
    check(type_name, &IDENT, &name, "marker name")?;
    let mut def = MarkerDefinition::new(name)
        .with_targets(source.targets)
        .with_allow_multiple(source.allow_multiple)
        .with_inherited(source.inherited);
    if let Some(ns) = &source.namespace {
        check(type_name, &DOTTED, ns, "namespace")?;
        def = def.with_namespace(ns.clone());
    }

    for tag in spec.type_parameters() {
        check(type_name, &IDENT, &tag.name, "type parameter")?;
        def = def.with_type_parameter(tag.name.clone(), |mut tp| {
            tp.class = tag.class;
            tp.r#struct = tag.r#struct;
            tp.new = tag.new;
            tp.not_null = tag.not_null;
            tp.unmanaged = tag.unmanaged;
            tp.base_types = tag.base_types.clone();
            tp
        });
    }

    // ----- constructors -----

    let ctors = kept_constructors(spec.constructors());
    let mut covered = HashSet::new();
    for ctor in &ctors {
        let mut params = Vec::with_capacity(ctor.parameters.len());
        for p in &ctor.parameters {
            check(type_name, &IDENT, &p.name, "parameter")?;
            covered.insert(p.name.to_lowercase());
            let ty = param_ty(&p.ty, p.marker.as_ref())?;
            let mut param = ParameterDef::new(p.name.clone(), ty);
            if let Some(lit) = &p.default {
                param = param.with_default(lit.to_value(&p.ty, p.marker.as_ref()));
            }
            if p.variadic {
                param = param.variadic();
            }
            params.push(param);
        }
        def = def.with_constructor(ctor.name.as_deref(), |mut c| {
            c.parameters = params;
            c
        });
    }

    // ----- properties -----

    for prop in spec.properties() {
        if !prop.settable || covered.contains(&prop.name.to_lowercase()) {
            continue;
        }
        check(type_name, &IDENT, &prop.name, "property")?;
        let ty = param_ty(&prop.ty, prop.marker.as_ref())?;
        let default = match spec.probe_default(&prop.name) {
            Ok(value) => value,
            Err(reason) => {
                debug!(spec = type_name, property = %prop.name, %reason, "default probe failed");
                None
            }
        };
        def = def.with_property(prop.name.clone(), ty, default);
    }

    debug!(
        spec = type_name,
        marker = %def.full_name(),
        constructors = def.constructors().len(),
        properties = def.properties().len(),
        "derived marker schema"
    );
    Ok(def)
}

/// `RouteDefinition` → `RouteAttribute`.
pub fn marker_name(type_name: &str) -> String {
    let base = type_name.strip_suffix(SPEC_SUFFIX).unwrap_or(type_name);
    MarkerDefinition::new(base).name().to_string()
}

/// Parameterless constructors only survive on their own; the rest is
/// stable-sorted by tag with untagged first.
fn kept_constructors(ctors: &[CtorShape]) -> Vec<&CtorShape> {
    let mut kept = ctors
        .iter()
        .filter(|c| ctors.len() == 1 || !c.parameters.is_empty())
        .collect::<Vec<_>>();
    kept.sort_by(|a, b| a.name.cmp(&b.name));
    kept
}

/// Descriptor for a member's declared type. Markers take precedence; the
/// member's own nullability is kept.
pub fn param_ty(declared: &DeclaredTy, marker: Option<&MemberMarker>) -> Result<ParamTy> {
    match marker {
        Some(MemberMarker::TypeRef) => Ok(ParamTy::type_ref(declared.is_nullable())),
        Some(MemberMarker::EnumRef { full_type_name }) => {
            if !DOTTED.is_match(full_type_name) {
                return Err(Error::UnsupportedType { type_name: full_type_name.clone() });
            }
            Ok(ParamTy::enum_ref(full_type_name.clone(), declared.is_nullable()))
        }
        None => declared_ty(declared),
    }
}

fn declared_ty(declared: &DeclaredTy) -> Result<ParamTy> {
    if let Some(kind) = declared.primitive() {
        let ty = ParamTy::primitive(kind);
        return Ok(if declared.is_nullable() { ty.nullable() } else { ty });
    }
    let ty = match declared {
        DeclaredTy::Nullable(inner) => declared_ty(inner)?.nullable(),
        DeclaredTy::Type => ParamTy::type_ref(false),
        DeclaredTy::Enum { name, .. } => {
            if !DOTTED.is_match(name) {
                return Err(Error::UnsupportedType { type_name: name.clone() });
            }
            ParamTy::enum_ref(name.clone(), false)
        }
        DeclaredTy::Array(element) => ParamTy::array(declared_ty(element)?),
        other => return Err(Error::UnsupportedType { type_name: other.display_name() }),
    };
    Ok(ty)
}

fn check(type_name: &str, pattern: &Regex, ident: &str, what: &str) -> Result<()> {
    if pattern.is_match(ident) {
        Ok(())
    } else {
        Err(Error::derivation(type_name, format!("`{ident}` is not a valid {what}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{
        Literal, ParamShape, PropertyShape, SchemaSource, SpecShape, TypeParameterTag,
    };
    use crate::ir::PrimitiveKind;
    use crate::occurrence::EnumMember;
    use crate::schema::Targets;
    use crate::values::{Scalar, Value};

    fn source() -> SchemaSource {
        SchemaSource { namespace: Some("App.Markers".into()), ..SchemaSource::default() }
    }

    fn color() -> DeclaredTy {
        DeclaredTy::enumeration(
            "App.Color",
            vec![EnumMember { name: "Red".into(), value: Scalar::Int(2) }],
        )
    }

    fn priority() -> PropertyShape {
        PropertyShape::new("Priority", DeclaredTy::Int).initial(Literal::Scalar(Scalar::Int(3)))
    }

    #[test]
    fn missing_schema_source_fails() {
        let err = lower_to_schema(&SpecShape::new("EntityDefinition")).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaDerivation { type_name, .. } if type_name == "EntityDefinition"
        ));
    }

    #[test]
    fn naming_and_usage_are_copied() {
        let shape = SpecShape::new("EntityDefinition").source(SchemaSource {
            targets: Targets::CLASS,
            allow_multiple: true,
            inherited: false,
            ..source()
        });
        let def = lower_to_schema(&shape).unwrap();
        assert_eq!(def.name(), "EntityAttribute");
        assert_eq!(def.full_name(), "App.Markers.EntityAttribute");
        assert_eq!(def.targets(), Targets::CLASS);
        assert!(def.allow_multiple());
        assert!(!def.inherited());

        assert_eq!(marker_name("Entity"), "EntityAttribute");
        assert_eq!(marker_name("EntityAttribute"), "EntityAttribute");
    }

    #[test]
    fn constructors_filtered_and_sorted() {
        let shape = SpecShape::new("LookupDefinition")
            .source(source())
            .constructor(
                CtorShape::new(Some("ByName")).param(ParamShape::new("name", DeclaredTy::String)),
            )
            .constructor(CtorShape::new(None))
            .constructor(CtorShape::new(Some("ById")).param(ParamShape::new("id", DeclaredTy::Int)))
            .constructor(CtorShape::new(None).param(ParamShape::new("key", DeclaredTy::Long)));
        let def = lower_to_schema(&shape).unwrap();
        let names = def.constructors().iter().map(|c| c.name.as_deref()).collect::<Vec<_>>();
        assert_eq!(names, vec![None, Some("ById"), Some("ByName")]);
    }

    #[test]
    fn sole_parameterless_constructor_is_kept() {
        let shape =
            SpecShape::new("FlagDefinition").source(source()).constructor(CtorShape::new(None));
        let def = lower_to_schema(&shape).unwrap();
        assert_eq!(def.constructors().len(), 1);
        assert!(def.constructors()[0].parameters.is_empty());
    }

    #[test]
    fn descriptors_honor_markers_and_nullability() {
        let shape = SpecShape::new("BindDefinition").source(source()).constructor(
            CtorShape::new(None)
                .param(ParamShape::new("service", DeclaredTy::Object).marked(MemberMarker::TypeRef))
                .param(
                    ParamShape::new("mode", DeclaredTy::nullable(DeclaredTy::Int))
                        .marked(MemberMarker::EnumRef { full_type_name: "Ext.Mode".into() }),
                )
                .param(ParamShape::new("color", color()))
                .param(ParamShape::new("count", DeclaredTy::nullable(DeclaredTy::Int)))
                .param(ParamShape::new("tags", DeclaredTy::array(DeclaredTy::String)).variadic()),
        );
        let def = lower_to_schema(&shape).unwrap();
        let params = &def.constructors()[0].parameters;
        assert_eq!(params[0].ty, ParamTy::type_ref(false));
        assert_eq!(params[1].ty, ParamTy::enum_ref("Ext.Mode", true));
        assert_eq!(params[2].ty, ParamTy::enum_ref("App.Color", false));
        assert_eq!(
            params[3].ty,
            ParamTy::Primitive { primitive: PrimitiveKind::Int, nullable: true }
        );
        assert_eq!(params[4].ty, ParamTy::array(ParamTy::STRING));
        assert!(params[4].variadic);
    }

    #[test]
    fn unsupported_type_is_named() {
        let shape = SpecShape::new("MoneyDefinition")
            .source(source())
            .property(PropertyShape::new(
                "Amount",
                DeclaredTy::nullable(DeclaredTy::Other("decimal".into())),
            ));
        assert_eq!(
            lower_to_schema(&shape).unwrap_err(),
            Error::UnsupportedType { type_name: "decimal".into() }
        );
    }

    #[test]
    fn properties_skip_covered_and_read_only() {
        let shape = SpecShape::new("JobDefinition")
            .source(source())
            .constructor(CtorShape::new(None).param(ParamShape::new("id", DeclaredTy::Int)))
            .property(PropertyShape::new("Id", DeclaredTy::Int))
            .property(PropertyShape::new("Computed", DeclaredTy::String).read_only())
            .property(priority());
        let def = lower_to_schema(&shape).unwrap();
        let names = def.properties().iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Priority"]);
        // no parameterless constructor: nothing to probe
        assert_eq!(def.properties()[0].default, None);
    }

    #[test]
    fn property_defaults_come_from_probe() {
        let shape = SpecShape::new("JobDefinition")
            .source(source())
            .constructor(CtorShape::new(None))
            .constructor(CtorShape::new(None).param(ParamShape::new("id", DeclaredTy::Int)))
            .property(priority())
            .property(PropertyShape::new("Color", color()).initial(Literal::Scalar("Red".into())))
            .property(PropertyShape::new("Note", DeclaredTy::nullable(DeclaredTy::String)));
        let def = lower_to_schema(&shape).unwrap();
        let priority = def.property("priority").and_then(|p| p.default.clone());
        assert_eq!(priority, Some(Value::from(3)));
        let color = def.property("Color").and_then(|p| p.default.clone());
        assert!(matches!(color, Some(Value::Enum(ev)) if ev.member_name() == Some("Red")));
        assert_eq!(def.property("Note").and_then(|p| p.default.clone()), None);
    }

    #[test]
    fn type_parameters_translate_flags() {
        let shape =
            SpecShape::new("HandlerDefinition").source(source()).type_parameter(TypeParameterTag {
                name: "TRequest".into(),
                class: true,
                new: true,
                base_types: vec!["App.IRequest".into()],
                ..TypeParameterTag::default()
            });
        let def = lower_to_schema(&shape).unwrap();
        assert_eq!(
            def.type_parameters()[0].constraint_clause().as_deref(),
            Some("where TRequest : class, App.IRequest, new()")
        );
    }

    #[test]
    fn invalid_identifiers_fail_derivation() {
        let bad_ns = SpecShape::new("XDefinition")
            .source(SchemaSource { namespace: Some("App..Bad".into()), ..SchemaSource::default() });
        assert!(matches!(lower_to_schema(&bad_ns), Err(Error::SchemaDerivation { .. })));

        let bad_name = SpecShape::new("Not-A-Name").source(source());
        assert!(matches!(lower_to_schema(&bad_name), Err(Error::SchemaDerivation { .. })));
    }
}
