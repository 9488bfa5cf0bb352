//! Marker declaration emission.
//!
//! Turns a [`MarkerDefinition`] into the declaration text that gets added to
//! the compilation being generated for. Rendering is deterministic: the same
//! definition always yields byte-identical output.
use std::fmt::{self, Write as _};

use crate::ir::ParamTy;
use crate::schema::{MarkerDefinition, ParameterDef, Targets};
use crate::values::{Scalar, Value};

const INDENT: &str = "    ";

/// One emitted output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub file_name: String,
    pub content: String,
}

pub fn render_declaration(def: &MarkerDefinition) -> String {
    let mut cg = Codegen::new();
    cg.emit(def);
    cg.into_string()
}

pub fn source_file(def: &MarkerDefinition) -> SourceFile {
    SourceFile { file_name: def.file_name(), content: render_declaration(def) }
}

#[derive(Default)]
pub struct Codegen {
    out: String,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn emit(&mut self, def: &MarkerDefinition) {
        if let Some(ns) = def.namespace() {
            self.line(0, format!("namespace {ns};"));
            self.blank();
        }

        self.line(0, "[global::Microsoft.CodeAnalysis.EmbeddedAttribute]");
        self.line(
            0,
            format!(
                "[global::System.AttributeUsage({}, AllowMultiple = {}, Inherited = {})]",
                format_targets(def.targets()),
                def.allow_multiple(),
                def.inherited(),
            ),
        );

        // class header + constraints
        let mut header = format!("internal sealed class {}", def.name());
        if !def.type_parameters().is_empty() {
            let names = def.type_parameters().iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
            let _ = write!(header, "<{}>", names.join(", "));
        }
        header.push_str(" : global::System.Attribute");
        self.line(0, header);
        let clauses = def
            .type_parameters()
            .iter()
            .filter_map(|t| t.constraint_clause())
            .collect::<Vec<_>>();
        if !clauses.is_empty() {
            self.line(1, clauses.join(" "));
        }
        self.line(0, "{");

        // constructor-backed slots: first declaration of each name wins
        let slots = constructor_slots(def);
        let setter = if def.constructors().len() > 1 { " private set;" } else { "" };
        for param in &slots {
            self.line(
                1,
                format!(
                    "internal {} {} {{ get;{setter} }}",
                    param.ty.declaration(),
                    pascal_case(&param.name)
                ),
            );
        }

        for prop in def.properties() {
            let default = match &prop.default {
                Some(value) => format!(" = {};", literal(value, &prop.ty)),
                None => String::new(),
            };
            self.line(
                1,
                format!(
                    "internal {} {} {{ get; set; }}{default}",
                    prop.ty.declaration(),
                    prop.name
                ),
            );
        }

        let has_members = !slots.is_empty() || !def.properties().is_empty();
        for ctor in def.constructors() {
            if ctor.parameters.is_empty() && def.constructors().len() != 1 {
                continue;
            }
            if has_members {
                self.blank();
            }
            let params = ctor.parameters.iter().map(format_parameter).collect::<Vec<_>>();
            self.line(1, format!("internal {}({})", def.name(), params.join(", ")));
            self.line(1, "{");
            for param in &ctor.parameters {
                self.line(2, format!("{} = {};", pascal_case(&param.name), param.name));
            }
            self.line(1, "}");
        }

        self.line(0, "}");
    }
}

/// Distinct constructor parameters across all constructors, by
/// case-insensitive name, in first-seen order.
pub fn constructor_slots(def: &MarkerDefinition) -> Vec<&ParameterDef> {
    let mut seen = Vec::<String>::new();
    let mut out = Vec::new();
    for param in def.constructors().iter().flat_map(|c| c.parameters.iter()) {
        let key = param.name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(param);
        }
    }
    out
}

pub fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_parameter(param: &ParameterDef) -> String {
    let prefix = if param.variadic { "params " } else { "" };
    let suffix = if param.has_default() {
        let value = param.default.clone().unwrap_or_default();
        format!(" = {}", literal(&value, &param.ty))
    } else {
        String::new()
    };
    format!("{prefix}{} {}{suffix}", param.ty.declaration(), param.name)
}

fn format_targets(targets: Targets) -> String {
    if targets == Targets::ALL {
        return "global::System.AttributeTargets.All".to_string();
    }
    let names = targets.names();
    if names.is_empty() {
        return "(global::System.AttributeTargets)0".to_string();
    }
    names
        .iter()
        .map(|n| format!("global::System.AttributeTargets.{n}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Literal text for a default value of a slot typed `ty`.
pub fn literal(value: &Value, ty: &ParamTy) -> String {
    match (value, ty) {
        (Value::Null, ParamTy::EnumRef { .. }) => "default".to_string(),
        (Value::Null, _) => "null".to_string(),
        (Value::Enum(ev), _) => {
            let ty_name = match ty {
                ParamTy::EnumRef { name, .. } => name.clone(),
                _ => ev.enum_type().map(|t| t.name().to_string()).unwrap_or_default(),
            };
            match ev.member_name() {
                Some(member) => format!("{ty_name}.{member}"),
                None => enum_cast(&ty_name, ev.underlying()),
            }
        }
        (Value::Scalar(s), ParamTy::EnumRef { name, .. }) => enum_cast(name, s),
        (Value::Scalar(s), _) => scalar_literal(s),
        (Value::Type(t), _) => format!("typeof({})", t.name()),
        (Value::Array(items), _) => {
            let element = match ty {
                ParamTy::Array { element } => element.as_ref().clone(),
                _ => ParamTy::OBJECT,
            };
            let items = items.iter().map(|v| literal(v, &element)).collect::<Vec<_>>();
            if items.is_empty() {
                format!("new {}[0]", element.declaration())
            } else {
                format!("new {}[] {{ {} }}", element.declaration(), items.join(", "))
            }
        }
    }
}

/// `(T)(-1)`: a bare `(T)-1` parses as a subtraction.
fn enum_cast(ty_name: &str, raw: &Scalar) -> String {
    let raw = scalar_literal(raw);
    if raw.starts_with('-') {
        format!("({ty_name})({raw})")
    } else {
        format!("({ty_name}){raw}")
    }
}

fn scalar_literal(s: &Scalar) -> String {
    match s {
        Scalar::String(x) => format!("\"{}\"", escape(x, '"')),
        Scalar::Char(c) => format!("'{}'", escape(&c.to_string(), '\'')),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(x) => x.to_string(),
        Scalar::Byte(x) => x.to_string(),
        Scalar::Long(x) => format!("{x}L"),
        Scalar::Float(x) => float_literal(x.0, "float", 'f'),
        Scalar::Double(x) => float_literal(x.0, "double", 'd'),
    }
}

/// Formats `x` at its own width so the shortest round-trip text is kept.
fn float_literal<F>(x: F, keyword: &str, suffix: char) -> String
where
    F: Into<f64> + fmt::Display + Copy,
{
    let wide: f64 = x.into();
    if wide.is_nan() {
        format!("{keyword}.NaN")
    } else if wide.is_infinite() {
        let sign = if wide > 0.0 { "Positive" } else { "Negative" };
        format!("{keyword}.{sign}Infinity")
    } else {
        format!("{x}{suffix}")
    }
}

fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrence::{EnumMember, TypeHandle};
    use crate::schema::ParameterDef;
    use crate::values::EnumValue;
    use proptest::prelude::*;

    #[test]
    fn single_constructor_declaration() {
        let def = MarkerDefinition::new("Entity")
            .with_namespace("App.Model")
            .with_targets(Targets::CLASS | Targets::STRUCT)
            .with_parameter(ParameterDef::new("id", ParamTy::INT))
            .with_parameter(ParameterDef::new("name", ParamTy::STRING.nullable()))
            .with_property("Tags", ParamTy::array(ParamTy::STRING), None)
            .with_property("Priority", ParamTy::INT, Some(Value::from(3)));

        let expected = "\
namespace App.Model;

[global::Microsoft.CodeAnalysis.EmbeddedAttribute]
[global::System.AttributeUsage(global::System.AttributeTargets.Class | global::System.AttributeTargets.Struct, AllowMultiple = false, Inherited = true)]
internal sealed class EntityAttribute : global::System.Attribute
{
    internal int Id { get; }
    internal string? Name { get; }
    internal string[] Tags { get; set; }
    internal int Priority { get; set; } = 3;

    internal EntityAttribute(int id, string? name = null)
    {
        Id = id;
        Name = name;
    }
}
";
        assert_eq!(render_declaration(&def), expected);
    }

    #[test]
    fn multiple_constructors_get_private_setters() {
        let def = MarkerDefinition::new("Lookup")
            .with_constructor(Some("ById"), |c| {
                c.with_parameter(ParameterDef::new("id", ParamTy::INT))
            })
            .with_constructor(Some("ByName"), |c| {
                c.with_parameter(ParameterDef::new("name", ParamTy::STRING))
                    .with_parameter(ParameterDef::new("Id", ParamTy::INT).with_default(7))
            });
        let text = render_declaration(&def);
        assert!(text.contains("internal int Id { get; private set; }"));
        assert!(text.contains("internal string Name { get; private set; }"));
        assert_eq!(text.matches("{ get; private set; }").count(), 2);
        assert!(text.contains("internal LookupAttribute(int id)"));
        assert!(text.contains("internal LookupAttribute(string name, int Id = 7)"));
    }

    #[test]
    fn parameterless_constructor_hidden_among_others() {
        let def = MarkerDefinition::new("Flag")
            .with_constructor(None, |c| c)
            .with_constructor(Some("On"), |c| {
                c.with_parameter(ParameterDef::new("on", ParamTy::BOOL))
            });
        let text = render_declaration(&def);
        assert!(!text.contains("internal FlagAttribute()"));
        assert!(text.contains("internal FlagAttribute(bool on)"));

        let lone = render_declaration(&MarkerDefinition::new("Flag").with_constructor(None, |c| c));
        assert!(lone.contains("internal FlagAttribute()"));
    }

    #[test]
    fn generic_marker_with_constraints() {
        let def = MarkerDefinition::new("Handler")
            .with_allow_multiple(true)
            .with_inherited(false)
            .with_type_parameter("TService", |t| t.class().new_constraint())
            .with_type_parameter("TResult", |t| t)
            .with_type_parameter("TKey", |t| t.not_null());
        let text = render_declaration(&def);
        assert!(text.contains("AllowMultiple = true, Inherited = false"));
        assert!(text.contains(
            "internal sealed class HandlerAttribute<TService, TResult, TKey> : global::System.Attribute\n    where TService : class, new() where TKey : notnull\n{"
        ));
    }

    #[test]
    fn literals_per_kind() {
        assert_eq!(literal(&Value::from(5i64), &ParamTy::LONG), "5L");
        assert_eq!(literal(&Value::from(1.5f32), &ParamTy::FLOAT), "1.5f");
        assert_eq!(literal(&Value::from(0.1f32), &ParamTy::FLOAT), "0.1f");
        assert_eq!(literal(&Value::from(2.25f64), &ParamTy::DOUBLE), "2.25d");
        assert_eq!(literal(&Value::from(f64::NAN), &ParamTy::DOUBLE), "double.NaN");
        assert_eq!(literal(&Value::from('\''), &ParamTy::CHAR), "'\\''");
        assert_eq!(literal(&Value::from(true), &ParamTy::BOOL), "true");
        assert_eq!(literal(&Value::Null, &ParamTy::STRING.nullable()), "null");
        assert_eq!(literal(&Value::Null, &ParamTy::enum_ref("App.Mode", true)), "default");
        assert_eq!(
            literal(&Value::from("a\"b\\c\n\u{1}"), &ParamTy::STRING),
            "\"a\\\"b\\\\c\\n\\u0001\""
        );
        assert_eq!(
            literal(&Value::Type(TypeHandle::named("App.Service")), &ParamTy::type_ref(false)),
            "typeof(App.Service)"
        );
        assert_eq!(
            literal(
                &Value::Array(vec![Value::from("a"), Value::from("b")]),
                &ParamTy::array(ParamTy::STRING)
            ),
            "new string[] { \"a\", \"b\" }"
        );
    }

    #[test]
    fn enum_literals_use_member_or_cast() {
        let mode = TypeHandle::enumeration(
            "App.Mode",
            vec![EnumMember { name: "Fast".into(), value: Scalar::Int(1) }],
        );
        let ty = ParamTy::enum_ref("App.Mode", false);
        let fast = Value::Enum(EnumValue::new(Some(mode.clone()), Scalar::Int(1)));
        assert_eq!(literal(&fast, &ty), "App.Mode.Fast");
        let odd = Value::Enum(EnumValue::new(Some(mode.clone()), Scalar::Int(9)));
        assert_eq!(literal(&odd, &ty), "(App.Mode)9");
        assert_eq!(literal(&Value::from(3), &ty), "(App.Mode)3");
        assert_eq!(literal(&Value::from(-1), &ty), "(App.Mode)(-1)");
        let negative = Value::Enum(EnumValue::new(Some(mode), Scalar::Int(-3)));
        assert_eq!(literal(&negative, &ty), "(App.Mode)(-3)");
    }

    /// Undo `escape` for the subset of escapes it produces.
    fn unescape(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let code = u32::from_str_radix(&hex, 16).unwrap();
                    out.push(char::from_u32(code).unwrap());
                }
                Some(other) => out.push(other),
                None => {}
            }
        }
        out
    }

    proptest! {
        /// Emitted string literals never contain a raw quote, newline or
        /// control character and decode back to the original text.
        #[test]
        fn string_literals_are_escaped(s in "\\PC*|[\\x00-\\x1f\"\\\\]{0,12}") {
            let lit = literal(&Value::from(s.as_str()), &ParamTy::STRING);
            let inner = &lit[1..lit.len() - 1];
            prop_assert!(!inner.chars().any(|c| c.is_control()));
            prop_assert!(!inner.replace("\\\\", "").replace("\\\"", "").contains('"'));
            prop_assert_eq!(unescape(inner), s);
        }
    }
}
