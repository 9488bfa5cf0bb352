//! Turning a [`ValueBag`] back into a spec-class instance.
//!
//! There is no runtime reflection: each spec type registers its shape and a
//! static binding table ([`Bindings`]) of constructor and setter functions
//! through [`SpecClass`]. The table is built once per [`Materializer`].
use indexmap::IndexMap;
use tracing::debug;

use crate::codegen::pascal_case;
use crate::error::{Error, Result};
use crate::introspect::{
    CtorShape, DeclaredTy, Introspect, MemberMarker, PropertyShape, SchemaSource, SpecShape,
    TypeParameterTag,
};
use crate::ir::PrimitiveKind;
use crate::lower::lower_to_schema;
use crate::occurrence::Occurrence;
use crate::reader::{Reader, ReaderOptions};
use crate::schema::MarkerDefinition;
use crate::values::{EnumValue, FromValue, Scalar, Value, ValueBag};

// -------------------------------- Bindings --------------------------------- //

/// A Rust type usable as a spec class.
pub trait SpecClass: Sized + 'static {
    fn shape() -> SpecShape;
    fn bindings() -> Bindings<Self>;
}

/// Positional constructor arguments, consumed in parameter order.
pub struct Args {
    values: std::vec::IntoIter<(String, Value)>,
}

impl Args {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Args { values: values.into_iter() }
    }

    pub fn next<V: FromValue>(&mut self) -> Result<V> {
        let (name, value) = self.values.next().ok_or_else(|| Error::Binding {
            name: "<constructor>".to_string(),
            reason: "constructor asked for more arguments than it declares".to_string(),
        })?;
        convert(&name, &value)
    }
}

/// Typed view of one value, for use inside setters.
pub fn convert<V: FromValue>(name: &str, value: &Value) -> Result<V> {
    V::from_value(value).ok_or_else(|| Error::mismatch(name, V::EXPECTED))
}

pub type BuildFn<T> = fn(&mut Args) -> Result<T>;
pub type GetFn<T> = fn(&T) -> Value;
pub type SetFn<T> = fn(&mut T, Value) -> Result<()>;

pub struct FieldBinding<T> {
    pub name: String,
    pub get: Option<GetFn<T>>,
    pub set: Option<SetFn<T>>,
}

/// Constructors in the same order as the shape's, plus per-property
/// accessors keyed case-insensitively.
pub struct Bindings<T> {
    constructors: Vec<BuildFn<T>>,
    fields: IndexMap<String, FieldBinding<T>>,
}

impl<T> Default for Bindings<T> {
    fn default() -> Self {
        Bindings { constructors: Vec::new(), fields: IndexMap::new() }
    }
}

impl<T> Bindings<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constructor(mut self, build: BuildFn<T>) -> Self {
        self.constructors.push(build);
        self
    }

    pub fn field(mut self, name: &str, get: GetFn<T>, set: SetFn<T>) -> Self {
        let binding = FieldBinding { name: name.to_string(), get: Some(get), set: Some(set) };
        self.fields.insert(name.to_lowercase(), binding);
        self
    }

    pub fn getter(mut self, name: &str, get: GetFn<T>) -> Self {
        let binding = FieldBinding { name: name.to_string(), get: Some(get), set: None };
        self.fields.insert(name.to_lowercase(), binding);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldBinding<T>> {
        self.fields.get(&name.to_lowercase())
    }

    fn build(&self, index: usize, args: Vec<(String, Value)>) -> Result<T> {
        let build = self.constructors.get(index).ok_or_else(|| Error::Binding {
            name: "<constructor>".to_string(),
            reason: format!("no binding for constructor #{index}"),
        })?;
        build(&mut Args::new(args))
    }
}

/// A registered spec type seen through [`Introspect`]. Defaults are probed
/// by running the parameterless constructor binding and reading getters.
pub struct Reflected<T: SpecClass> {
    shape: SpecShape,
    bindings: Bindings<T>,
}

impl<T: SpecClass> Reflected<T> {
    pub fn new() -> Self {
        Reflected { shape: T::shape(), bindings: T::bindings() }
    }
}

impl<T: SpecClass> Default for Reflected<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SpecClass> Introspect for Reflected<T> {
    fn type_name(&self) -> &str {
        &self.shape.type_name
    }

    fn schema_source(&self) -> Option<&SchemaSource> {
        self.shape.schema_source.as_ref()
    }

    fn type_parameters(&self) -> &[TypeParameterTag] {
        &self.shape.type_parameters
    }

    fn constructors(&self) -> &[CtorShape] {
        &self.shape.constructors
    }

    fn properties(&self) -> &[PropertyShape] {
        &self.shape.properties
    }

    fn probe_default(&self, property: &str) -> Result<Option<Value>, String> {
        let Some(index) = self.shape.parameterless_constructor() else {
            return Ok(None);
        };
        let field = self
            .bindings
            .get_field(property)
            .ok_or_else(|| format!("no binding for `{property}`"))?;
        let get = field.get.ok_or_else(|| format!("`{property}` has no getter"))?;
        let instance = self.bindings.build(index, Vec::new()).map_err(|e| e.to_string())?;
        Ok(Some(get(&instance)).filter(|v| !v.is_null()))
    }
}

/// Derive the marker schema of a registered spec type.
pub fn derive_schema<T: SpecClass>() -> Result<MarkerDefinition> {
    lower_to_schema(&Reflected::<T>::new())
}

// ------------------------------ Materializer ------------------------------- //

pub struct Materializer<'d, T: SpecClass> {
    def: &'d MarkerDefinition,
    shape: SpecShape,
    bindings: Bindings<T>,
    options: ReaderOptions,
}

impl<'d, T: SpecClass> Materializer<'d, T> {
    pub fn new(def: &'d MarkerDefinition) -> Self {
        Self::with_options(def, ReaderOptions::default())
    }

    pub fn with_options(def: &'d MarkerDefinition, options: ReaderOptions) -> Self {
        Materializer { def, shape: T::shape(), bindings: T::bindings(), options }
    }

    pub fn read(&self, occ: &Occurrence) -> Result<T> {
        self.read_with_values(occ).map(|(instance, _)| instance)
    }

    pub fn read_with_values(&self, occ: &Occurrence) -> Result<(T, ValueBag)> {
        let bag = Reader::with_options(self.def, self.options.clone()).read(occ)?;
        let instance = self.materialize(&bag)?;
        Ok((instance, bag))
    }

    pub fn materialize(&self, bag: &ValueBag) -> Result<T> {
        let index = self.select_constructor(bag);
        let ctor = self.shape.constructors.get(index);
        debug!(
            spec = %self.shape.type_name,
            index,
            tag = ?ctor.and_then(|c| c.name.as_deref()),
            "materializing"
        );

        let params = ctor.map(|c| c.parameters.as_slice()).unwrap_or_default();
        let args = params
            .iter()
            .map(|p| {
                let name = pascal_case(&p.name);
                let value = lower(bag, &name, &p.ty, p.marker.as_ref());
                (name, value)
            })
            .collect();
        let mut instance = self.bindings.build(index, args)?;

        for prop in &self.shape.properties {
            if !prop.settable || params.iter().any(|p| p.name.eq_ignore_ascii_case(&prop.name)) {
                continue;
            }
            let value = lower(bag, &prop.name, &prop.ty, prop.marker.as_ref());
            if value.is_null() && !prop.ty.is_nullable() {
                continue;
            }
            let setter = self
                .bindings
                .get_field(&prop.name)
                .and_then(|f| f.set)
                .ok_or_else(|| {
                    let reason = format!("no setter for `{}`", prop.name);
                    Error::derivation(&self.shape.type_name, reason)
                })?;
            setter(&mut instance, value)?;
        }
        Ok(instance)
    }

    /// Sole constructor, else the first schema-eligible one whose tag equals
    /// the bag's, else the first.
    fn select_constructor(&self, bag: &ValueBag) -> usize {
        let ctors = &self.shape.constructors;
        if ctors.len() <= 1 {
            return 0;
        }
        ctors
            .iter()
            .position(|c| !c.parameters.is_empty() && c.name.as_deref() == bag.constructor_name())
            .unwrap_or(0)
    }
}

/// Free-function form of [`Materializer::materialize`].
pub fn materialize<T: SpecClass>(def: &MarkerDefinition, bag: &ValueBag) -> Result<T> {
    Materializer::<T>::new(def).materialize(bag)
}

/// Value for one target member, shaped by its marker or declared type.
fn lower(bag: &ValueBag, name: &str, ty: &DeclaredTy, marker: Option<&MemberMarker>) -> Value {
    match marker {
        Some(MemberMarker::TypeRef) => match bag.raw(name) {
            Some(v @ Value::Type(_)) => v.clone(),
            Some(Value::Array(items)) => Value::Array(
                items.iter().filter(|v| matches!(v, Value::Type(_))).cloned().collect(),
            ),
            _ => Value::Null,
        },
        Some(MemberMarker::EnumRef { .. }) => {
            bag.enum_value(name).cloned().map(Value::Enum).unwrap_or_default()
        }
        None => match bag.raw(name) {
            Some(value) => shape_value(value, ty),
            None => absent(ty),
        },
    }
}

fn shape_value(value: &Value, ty: &DeclaredTy) -> Value {
    match ty.underlying() {
        DeclaredTy::Array(element) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| shape_value(item, element))
                    .filter(|item| !item.is_null())
                    .collect(),
            ),
            _ => Value::Null,
        },
        DeclaredTy::Enum { .. } => match value {
            Value::Enum(ev) => Value::Enum(ev.clone()),
            Value::Scalar(s) => Value::Enum(EnumValue::new(ty.enum_handle(), s.clone())),
            _ => Value::Null,
        },
        DeclaredTy::Type => match value {
            Value::Type(_) => value.clone(),
            _ => Value::Null,
        },
        _ => match ty.primitive() {
            Some(kind) => {
                let scalar = match value {
                    Value::Scalar(s) => Some(s.clone()),
                    Value::Enum(ev) => Some(ev.underlying().clone()),
                    _ => None,
                };
                match scalar {
                    Some(s) => s.coerce(kind).map(Value::Scalar).unwrap_or_default(),
                    None if kind == PrimitiveKind::Object => value.clone(),
                    None => Value::Null,
                }
            }
            None => value.clone(),
        },
    }
}

/// Absent non-nullable slots take their kind's zero.
fn absent(ty: &DeclaredTy) -> Value {
    if ty.is_nullable() {
        return Value::Null;
    }
    match ty {
        DeclaredTy::Enum { .. } => Value::Enum(EnumValue::new(ty.enum_handle(), Scalar::Int(0))),
        _ => ty.primitive().and_then(|k| k.zero()).map(Value::Scalar).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{Literal, ParamShape};
    use crate::occurrence::{TypeHandle, TypedConstant};
    use crate::values::LocalEnum;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Level {
        Low = 1,
        High = 2,
    }

    impl LocalEnum for Level {
        fn members() -> &'static [(&'static str, Self)] {
            &[("Low", Level::Low), ("High", Level::High)]
        }
        fn from_underlying(raw: i64) -> Self {
            if raw == 2 { Level::High } else { Level::Low }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Job {
        id: i32,
        name: Option<String>,
        priority: i32,
        level: Option<Level>,
        tags: Vec<String>,
    }

    fn level_ty() -> DeclaredTy {
        DeclaredTy::enumeration(
            "App.Level",
            vec![
                crate::occurrence::EnumMember { name: "Low".into(), value: Scalar::Int(1) },
                crate::occurrence::EnumMember { name: "High".into(), value: Scalar::Int(2) },
            ],
        )
    }

    impl SpecClass for Job {
        fn shape() -> SpecShape {
            SpecShape::new("JobDefinition")
                .source(SchemaSource::default())
                .constructor(CtorShape::new(None))
                .constructor(
                    CtorShape::new(Some("ById"))
                        .param(ParamShape::new("id", DeclaredTy::Int))
                        .param(
                            ParamShape::new("name", DeclaredTy::nullable(DeclaredTy::String))
                                .with_default(Literal::Scalar("anon".into())),
                        ),
                )
                .property(PropertyShape::new("Priority", DeclaredTy::Int))
                .property(PropertyShape::new("Level", DeclaredTy::nullable(level_ty())))
                .property(PropertyShape::new("Tags", DeclaredTy::array(DeclaredTy::String)))
        }

        fn bindings() -> Bindings<Self> {
            Bindings::<Self>::new()
                .constructor(|_| Ok(Job { priority: 3, ..Job::default() }))
                .constructor(|a| Ok(Job { id: a.next()?, name: a.next()?, ..Job::default() }))
                .field("Priority", |j| Value::from(j.priority), |j, v| {
                    j.priority = convert("Priority", &v)?;
                    Ok(())
                })
                .field(
                    "Level",
                    |j| Value::from(j.level.map(|l| l as i32)),
                    |j, v| {
                        j.level = convert::<Option<EnumValue>>("Level", &v)?
                            .map(|e| e.to_enum_by_value());
                        Ok(())
                    },
                )
                .field("Tags", |j| Value::from(j.tags.clone()), |j, v| {
                    j.tags = convert("Tags", &v)?;
                    Ok(())
                })
        }
    }

    #[test]
    fn derived_schema_probes_defaults() {
        let def = derive_schema::<Job>().unwrap();
        assert_eq!(def.name(), "JobAttribute");
        assert_eq!(def.constructors().len(), 1);
        let default = |name: &str| def.property(name).and_then(|p| p.default.clone());
        assert_eq!(default("Priority"), Some(Value::from(3)));
        // null and empty getters leave no default
        assert_eq!(default("Level"), None);
        assert_eq!(default("Tags"), Some(Value::Array(vec![])));
    }

    #[test]
    fn round_trip_through_bag() {
        let def = derive_schema::<Job>().unwrap();
        let occ = Occurrence::new()
            .with_argument(5)
            .with_named(
                "Level",
                TypedConstant::Enum { ty: TypeHandle::named("App.Level"), value: Scalar::Int(2) },
            )
            .with_named("Tags", TypedConstant::Array(vec!["a".into(), "b".into()]));
        let (job, bag) = Materializer::<Job>::new(&def).read_with_values(&occ).unwrap();
        assert_eq!(bag.get::<String>("Name").as_deref(), Some("anon"));
        assert_eq!(
            job,
            Job {
                id: 5,
                name: Some("anon".into()),
                priority: 3,
                level: Some(Level::High),
                tags: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn binding_errors_propagate() {
        let def = derive_schema::<Job>().unwrap();
        let mut bag = ValueBag::new(Some("ById".into()));
        bag.insert("Id", Value::from("not a number"));
        let err = materialize::<Job>(&def, &bag).unwrap_err();
        assert!(matches!(err, Error::Binding { ref name, .. } if name == "Id"), "{err}");
    }

    #[test]
    fn absent_non_nullable_keeps_field() {
        let def = derive_schema::<Job>().unwrap();
        let mut bag = ValueBag::new(Some("ById".into()));
        bag.insert("Id", Value::from(9));
        bag.insert("Tags", Value::Null);
        let job = materialize::<Job>(&def, &bag).unwrap();
        assert_eq!(job.id, 9);
        assert_eq!(job.name, None);
        // priority absent: zero, assigned
        assert_eq!(job.priority, 0);
        assert!(job.tags.is_empty());
        assert_eq!(job.level, None);
    }

    #[test]
    fn lowering_by_declared_type() {
        let mut bag = ValueBag::new(None);
        bag.insert("Count", Value::from(4));
        bag.insert("Mixed", Value::Array(vec![Value::from("a"), Value::from(1), Value::from("b")]));
        bag.insert("Color", Value::from(2));
        bag.insert("Svc", Value::Type(TypeHandle::named("App.Svc")));

        assert_eq!(lower(&bag, "count", &DeclaredTy::Long, None), Value::Scalar(Scalar::Long(4)));
        assert_eq!(
            lower(&bag, "Mixed", &DeclaredTy::array(DeclaredTy::String), None),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
        let Value::Enum(ev) = lower(&bag, "Color", &level_ty(), None) else {
            panic!("expected enum")
        };
        assert_eq!(ev.member_name(), Some("High"));
        let svc = lower(&bag, "Svc", &DeclaredTy::Object, Some(&MemberMarker::TypeRef));
        assert_eq!(Some(&svc), bag.raw("Svc"));
        assert_eq!(lower(&bag, "Missing", &DeclaredTy::Bool, None), Value::from(false));
        let nullable_bool = DeclaredTy::nullable(DeclaredTy::Bool);
        assert_eq!(lower(&bag, "Missing", &nullable_bool, None), Value::Null);
    }
}
