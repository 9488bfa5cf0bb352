use serde::Serialize;

/// Generic parameter of a marker, with its constraints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TypeParameterDef {
    pub name: String,
    pub class: bool,
    pub r#struct: bool,
    pub new: bool,
    pub not_null: bool,
    pub unmanaged: bool,
    pub base_types: Vec<String>,
}

impl TypeParameterDef {
    pub fn new(name: impl Into<String>) -> Self {
        TypeParameterDef { name: name.into(), ..Self::default() }
    }

    /// `where T : class`
    pub fn class(mut self) -> Self {
        self.class = true;
        self
    }

    /// `where T : struct`
    pub fn value_type(mut self) -> Self {
        self.r#struct = true;
        self
    }

    /// `where T : new()`
    pub fn new_constraint(mut self) -> Self {
        self.new = true;
        self
    }

    /// `where T : notnull`
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// `where T : unmanaged`
    pub fn unmanaged(mut self) -> Self {
        self.unmanaged = true;
        self
    }

    /// `where T : SomeBase`
    pub fn is(mut self, base: impl Into<String>) -> Self {
        self.base_types.push(base.into());
        self
    }

    /// `where T : class, IDisposable, new()`; `None` without constraints.
    pub fn constraint_clause(&self) -> Option<String> {
        let flags = [
            (self.class, "class"),
            (self.r#struct, "struct"),
            (self.unmanaged, "unmanaged"),
            (self.not_null, "notnull"),
        ];
        let mut parts: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, kw)| *kw).collect();
        parts.extend(self.base_types.iter().map(String::as_str));
        if self.new {
            parts.push("new()");
        }
        if parts.is_empty() {
            return None;
        }
        Some(format!("where {} : {}", self.name, parts.join(", ")))
    }
}
