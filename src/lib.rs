//! Schema-driven marker binding.
//!
//! A marker kind is described once by a spec class. The schema builder
//! ([`lower`]) derives a [`MarkerDefinition`] from it, [`codegen`] renders
//! the declaration that gets injected into the compilation, [`reader`] turns
//! each occurrence found in compiled code into a [`ValueBag`], and
//! [`materialize`] turns a bag back into a typed spec instance.
pub mod cli;
pub mod codegen;
pub mod error;
pub mod introspect;
pub mod ir;
pub mod jq_exec;
pub mod lower;
pub mod materialize;
pub mod occurrence;
pub mod path_de;
pub mod reader;
pub mod schema;
pub mod values;

pub use codegen::render_declaration;
pub use error::{Error, Result};
pub use introspect::{Introspect, SpecShape};
pub use ir::{ParamTy, PrimitiveKind};
pub use lower::lower_to_schema;
pub use materialize::{Bindings, Materializer, SpecClass, derive_schema, materialize};
pub use occurrence::{Occurrence, TypeHandle, TypedConstant};
pub use reader::{Reader, ReaderOptions, ResolutionPolicy, read_occurrence};
pub use schema::{MarkerDefinition, Targets};
pub use values::{EnumValue, LocalEnum, Scalar, Value, ValueBag};
