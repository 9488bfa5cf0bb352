use marker_bind::introspect::{
    CtorShape, DeclaredTy, MemberMarker, ParamShape, PropertyShape, SchemaSource,
};
use marker_bind::materialize::convert;
use marker_bind::occurrence::EnumMember;
use marker_bind::schema::ParameterDef;
use marker_bind::*;
use proptest::prelude::*;

// ----- spec types -----

#[derive(Debug, PartialEq)]
struct Entity {
    id: i32,
    name: Option<String>,
}

impl SpecClass for Entity {
    fn shape() -> SpecShape {
        SpecShape::new("EntityDefinition").source(SchemaSource::default()).constructor(
            CtorShape::new(None)
                .param(ParamShape::new("id", DeclaredTy::Int))
                .param(ParamShape::new("name", DeclaredTy::nullable(DeclaredTy::String))),
        )
    }

    fn bindings() -> Bindings<Self> {
        Bindings::<Self>::new().constructor(|a| Ok(Entity { id: a.next()?, name: a.next()? }))
    }
}

#[derive(Debug, PartialEq)]
enum Lookup {
    Id(i32),
    Name(String),
}

impl SpecClass for Lookup {
    fn shape() -> SpecShape {
        SpecShape::new("LookupDefinition")
            .source(SchemaSource::default())
            .constructor(
                CtorShape::new(Some("ByName")).param(ParamShape::new("name", DeclaredTy::String)),
            )
            .constructor(CtorShape::new(Some("ById")).param(ParamShape::new("id", DeclaredTy::Int)))
    }

    fn bindings() -> Bindings<Self> {
        Bindings::<Self>::new()
            .constructor(|a| Ok(Lookup::Name(a.next()?)))
            .constructor(|a| Ok(Lookup::Id(a.next()?)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum LocalColor {
    Red = 2,
    Blue = 4,
}

impl LocalEnum for LocalColor {
    fn members() -> &'static [(&'static str, Self)] {
        &[("Red", LocalColor::Red), ("Blue", LocalColor::Blue)]
    }
    fn from_underlying(raw: i64) -> Self {
        if raw == 4 { LocalColor::Blue } else { LocalColor::Red }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Paint {
    tags: Vec<String>,
    color: Option<LocalColor>,
    target: Option<TypeHandle>,
}

impl SpecClass for Paint {
    fn shape() -> SpecShape {
        SpecShape::new("PaintDefinition")
            .source(SchemaSource {
                namespace: Some("App.Markers".into()),
                ..SchemaSource::default()
            })
            .property(PropertyShape::new("Tags", DeclaredTy::array(DeclaredTy::String)))
            .property(
                PropertyShape::new("Color", DeclaredTy::nullable(DeclaredTy::Int))
                    .marked(MemberMarker::EnumRef { full_type_name: "Host.Color".into() }),
            )
            .property(PropertyShape::new("Target", DeclaredTy::nullable(DeclaredTy::Type)))
    }

    fn bindings() -> Bindings<Self> {
        Bindings::<Self>::new()
            .constructor(|_| Ok(Paint::default()))
            .field("Tags", |p| Value::from(p.tags.clone()), |p, v| {
                p.tags = convert("Tags", &v)?;
                Ok(())
            })
            .field(
                "Color",
                |p| Value::from(p.color.map(|c| c as i32)),
                |p, v| {
                    p.color = convert::<Option<EnumValue>>("Color", &v)?.and_then(|e| e.to_enum());
                    Ok(())
                },
            )
            .field("Target", |p| Value::from(p.target.clone()), |p, v| {
                p.target = convert("Target", &v)?;
                Ok(())
            })
    }
}

fn host_color() -> TypeHandle {
    TypeHandle::enumeration(
        "Host.Color",
        vec![
            EnumMember { name: "Green".into(), value: Scalar::Int(1) },
            EnumMember { name: "Red".into(), value: Scalar::Int(2) },
        ],
    )
}

// ----- scenarios -----

#[test]
fn omitted_nullable_parameter_reads_as_null() {
    let def = derive_schema::<Entity>().unwrap();
    let occ = Occurrence::new().with_argument(5);
    let bag = read_occurrence(&def, &occ).unwrap();
    let names = bag.iter().map(|(n, _)| n).collect::<Vec<_>>();
    assert_eq!(names, vec!["Id", "Name"]);
    assert_eq!(bag.get_required::<i32>("Id").unwrap(), 5);
    assert_eq!(bag.raw("Name"), None);

    let entity = materialize::<Entity>(&def, &bag).unwrap();
    assert_eq!(entity, Entity { id: 5, name: None });
}

#[test]
fn tags_keep_their_order() {
    let def = derive_schema::<Paint>().unwrap();
    let tags = TypedConstant::Array(vec!["a".into(), "b".into(), "c".into()]);
    let occ = Occurrence::new().with_named("Tags", tags);
    let (paint, bag) = Materializer::<Paint>::new(&def).read_with_values(&occ).unwrap();
    assert_eq!(bag.array_required::<String>("Tags").unwrap(), vec!["a", "b", "c"]);
    assert_eq!(paint.tags, vec!["a", "b", "c"]);
}

#[test]
fn enum_identity_across_local_and_host() {
    let def = derive_schema::<Paint>().unwrap();
    let red = TypedConstant::Enum { ty: host_color(), value: Scalar::Int(2) };
    let occ = Occurrence::new().with_named("color", red);
    let bag = read_occurrence(&def, &occ).unwrap();
    assert_eq!(bag.enum_member_name("Color"), Some("Red"));
    let color = bag.enum_value_required("Color").unwrap();
    assert_eq!(color.to_enum::<LocalColor>(), Some(LocalColor::Red));
    assert_eq!(bag.enum_as::<LocalColor>("Color"), Some(LocalColor::Red));

    let paint = materialize::<Paint>(&def, &bag).unwrap();
    assert_eq!(paint.color, Some(LocalColor::Red));

    // a host member with no local counterpart only converts by value
    let green = TypedConstant::Enum { ty: host_color(), value: Scalar::Int(1) };
    let green = Occurrence::new().with_named("Color", green);
    let bag = read_occurrence(&def, &green).unwrap();
    assert_eq!(bag.enum_member_name("Color"), Some("Green"));
    assert_eq!(bag.enum_value("Color").and_then(|e| e.to_enum::<LocalColor>()), None);
}

#[test]
fn type_handles_pass_through() {
    let def = derive_schema::<Paint>().unwrap();
    let svc = TypeHandle::named("App.Service");
    let occ = Occurrence::new().with_named("Target", svc.clone());
    let paint = Materializer::<Paint>::new(&def).read(&occ).unwrap();
    assert_eq!(paint.target, Some(svc));
}

#[test]
fn constructor_selection_is_deterministic() {
    let def = derive_schema::<Lookup>().unwrap();
    let tags = def.constructors().iter().map(|c| c.name.as_deref()).collect::<Vec<_>>();
    assert_eq!(tags, vec![Some("ById"), Some("ByName")]);

    let occ = Occurrence::new().with_argument(42).with_constructor(vec![TypeHandle::named("int")]);
    let materializer = Materializer::<Lookup>::new(&def);
    for _ in 0..2 {
        let (lookup, bag) = materializer.read_with_values(&occ).unwrap();
        assert_eq!(bag.constructor_name(), Some("ById"));
        assert_eq!(lookup, Lookup::Id(42));
    }

    let by_name =
        Occurrence::new().with_argument("x").with_constructor(vec![TypeHandle::named("string")]);
    assert_eq!(materializer.read(&by_name).unwrap(), Lookup::Name("x".into()));
}

#[test]
fn strict_policy_rejects_ambiguity() {
    let def = derive_schema::<Lookup>().unwrap();
    let occ = Occurrence::new().with_argument(1);
    let options = ReaderOptions { policy: ResolutionPolicy::Strict };
    let err = Materializer::<Lookup>::with_options(&def, options).read(&occ).unwrap_err();
    assert!(matches!(
        err,
        Error::AmbiguousConstructor { ref candidates, .. } if candidates.len() == 2
    ));
}

#[test]
fn missing_required_value_names_the_field() {
    let bag = ValueBag::new(None);
    let err = bag.get_required::<i32>("Priority").unwrap_err();
    assert!(matches!(err, Error::Binding { ref name, .. } if name == "Priority"));
    assert!(err.to_string().contains("Priority"));
}

#[test]
fn declaration_for_hand_built_definition() {
    let def = MarkerDefinition::new("Entity")
        .with_namespace("App")
        .with_targets(Targets::CLASS)
        .with_parameter(ParameterDef::new("id", ParamTy::INT))
        .with_parameter(ParameterDef::new("name", ParamTy::STRING.nullable()));
    let text = render_declaration(&def);
    assert!(text.starts_with("namespace App;\n"));
    assert!(text.contains("internal EntityAttribute(int id, string? name = null)"));
    assert_eq!(text, def.to_string());
}

proptest! {
    /// Reading then materializing gives back the supplied arguments; an
    /// omitted trailing name comes back as `None`.
    #[test]
    fn entity_round_trip(id in any::<i32>(), name in proptest::option::of("[a-zA-Z ]{0,12}")) {
        let def = derive_schema::<Entity>().unwrap();
        let mut occ = Occurrence::new().with_argument(id);
        if let Some(name) = &name {
            occ = occ.with_argument(name.as_str());
        }
        let entity = Materializer::<Entity>::new(&def).read(&occ).unwrap();
        prop_assert_eq!(entity, Entity { id, name });
    }
}
