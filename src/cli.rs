//! Command line: spec shapes → (declarations | schema) and occurrences → value bags.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::info;

use crate::codegen::source_file;
use crate::introspect::SpecShape;
use crate::lower::lower_to_schema;
use crate::occurrence::Occurrence;
use crate::occurrence::wire::OccurrenceDocument;
use crate::path_de::{from_str_with_path, from_value_with_path};
use crate::reader::{Reader, ReaderOptions, ResolutionPolicy};
use crate::schema::MarkerDefinition;
use crate::values::ValueBag;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive marker declarations from spec shapes, and read marker occurrences against them
#[derive(Parser, Debug)]
#[command(name = "marker-bind")]
pub struct CommandLineInterface {
    /// log derivation and constructor resolution steps
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// derive marker schemas and emit their declarations
    Declare(DeclareOut),
    /// derive marker schemas and print the JSON debug view
    Schema(SchemaOut),
    /// read occurrences against one marker schema, one value bag per line
    Read(ReadOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/markers)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DeclareOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// write one `<FullName>.g.cs` per marker here (stdout if omitted)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ReadOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// spec shape (.json) the occurrences are read against
    #[arg(long)]
    spec: PathBuf,

    /// fail on ambiguous constructor resolution instead of taking the first candidate
    #[arg(long)]
    strict: bool,

    /// output .ndjson file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(
        &self,
        mut apply: impl FnMut(serde_json::Value, &str) -> Result<()>,
    ) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let origin = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {origin}"))?;
            for (line, value) in self.documents(&source, &origin)? {
                let origin = match line {
                    Some(n) => format!("{origin}:{n}"),
                    None => origin.clone(),
                };
                let value = match self.json_pointer.as_deref() {
                    None => value,
                    Some(pointer) => value.pointer(pointer).cloned().with_context(|| {
                        format!("{origin}: JSON pointer {pointer} selects nothing")
                    })?,
                };
                match self.jq_expr.as_deref() {
                    None => apply(value, &origin)?,
                    Some(jq_expr) => {
                        let outputs = crate::jq_exec::apply_filter(jq_expr, &value)
                            .with_context(|| format!("failed to apply jq expression to {origin}"))?;
                        for value in outputs {
                            apply(value, &origin)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Whole-file document, or one per non-blank line (1-based) in NDJSON mode.
    fn documents(
        &self,
        source: &str,
        origin: &str,
    ) -> Result<Vec<(Option<usize>, serde_json::Value)>> {
        if !self.ndjson {
            let value = serde_json::from_str(source)
                .with_context(|| format!("failed to parse JSON source file {origin}"))?;
            return Ok(vec![(None, value)]);
        }
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(ix, line)| -> Result<(Option<usize>, serde_json::Value)> {
                let value = serde_json::from_str(line)
                    .with_context(|| format!("failed to parse NDJSON line {origin}:{}", ix + 1))?;
                Ok((Some(ix + 1), value))
            })
            .collect()
    }

    /// Spec shapes; a document may hold one shape or an array of them.
    fn load_shapes(&self) -> Result<Vec<SpecShape>> {
        let mut shapes = Vec::<SpecShape>::new();
        self.load_process(|value, origin| {
            match value {
                serde_json::Value::Array(items) => {
                    for (ix, item) in items.into_iter().enumerate() {
                        shapes.push(from_value_with_path(item, &format!("{origin}[{ix}]"))?);
                    }
                }
                single => shapes.push(from_value_with_path(single, origin)?),
            }
            Ok(())
        })?;
        Ok(shapes)
    }

    fn load_occurrences(&self) -> Result<Vec<Occurrence>> {
        let mut out = Vec::new();
        self.load_process(|value, origin| {
            let doc: OccurrenceDocument = from_value_with_path(value, origin)?;
            let occurrences = doc.into_occurrences().map_err(|e| anyhow::anyhow!("{origin}: {e}"))?;
            out.extend(occurrences);
            Ok(())
        })?;
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Declare(target) => {
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let defs = derive_all(&target.input_settings.load_shapes()?)?;
                match target.out_dir.as_ref() {
                    Some(dir) => {
                        std::fs::create_dir_all(dir)
                            .with_context(|| format!("failed to create {}", dir.display()))?;
                        for def in &defs {
                            let file = source_file(def);
                            let path = dir.join(&file.file_name);
                            std::fs::write(&path, &file.content)
                                .with_context(|| format!("failed to write {}", path.display()))?;
                            info!(
                                marker = %def.full_name(),
                                path = %path.display(),
                                "wrote declaration"
                            );
                        }
                    }
                    None => {
                        let rendered = defs.iter().map(|d| d.to_string()).collect::<Vec<_>>();
                        println!("{}", rendered.join("\n"));
                    }
                }
            }
            Command::Schema(target) => {
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let defs = derive_all(&target.input_settings.load_shapes()?)?;
                let schema_src = serde_json::to_string_pretty(&defs)?;
                write_output(target.out.as_deref(), &schema_src)?;
            }
            Command::Read(target) => {
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let source = std::fs::read_to_string(&target.spec)
                    .with_context(|| format!("failed to read spec {}", target.spec.display()))?;
                let shape: SpecShape = from_str_with_path(&source, &target.spec.to_string_lossy())?;
                let def = lower_to_schema(&shape)?;
                let policy = if target.strict {
                    ResolutionPolicy::Strict
                } else {
                    ResolutionPolicy::FirstCandidate
                };
                let occurrences = target.input_settings.load_occurrences()?;
                let bags = read_all(&def, &occurrences, ReaderOptions { policy })?;
                let lines = bags
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<Result<Vec<_>, _>>()?;
                write_output(target.out.as_deref(), &lines.join("\n"))?;
            }
        }
        Ok(())
    }
}

/// Derive every shape; the first failure names its spec type.
pub fn derive_all(shapes: &[SpecShape]) -> Result<Vec<MarkerDefinition>> {
    shapes
        .iter()
        .map(|shape| lower_to_schema(shape).with_context(|| format!("spec `{}`", shape.type_name)))
        .collect()
}

/// Read occurrences in parallel against one shared definition, keeping input order.
pub fn read_all(
    def: &MarkerDefinition,
    occurrences: &[Occurrence],
    options: ReaderOptions,
) -> Result<Vec<ValueBag>> {
    let reader = Reader::with_options(def, options);
    occurrences
        .par_iter()
        .enumerate()
        .map(|(ix, occ)| reader.read(occ).with_context(|| format!("occurrence #{ix}")))
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let before = out.len();
        for entry in glob::glob(pattern)? {
            out.push(entry?);
        }
        if out.len() == before {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    Ok(out)
}
