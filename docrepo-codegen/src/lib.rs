//! docrepo code generation - turns a schema.yaml into typed accessors,
//! repositories and a facade at compile time.
//!
//! The main entry point is [`generate_from_schema`], which reads a schema file
//! and writes one Rust source file meant to be pulled in with `include!`.

mod accessor_gen;
mod facade_gen;
mod generator;
mod repository_gen;
pub mod type_utils;

pub use generator::{Diagnostic, Severity};

use docrepo::schema::SchemaDefinition;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("Failed to load schema: {0}")]
    Schema(#[from] docrepo::DocRepoError),

    #[error("Schema has {} error(s):\n{}", count_errors(.0), render(.0))]
    Invalid(Vec<Diagnostic>),

    #[error("Generated code does not parse: {0}")]
    Syntax(#[from] syn::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate code from a schema.yaml file and write it to `output_path`.
///
/// Intended to be called from a `build.rs`. Nothing is written when any
/// entity fails to generate. On success the notes of the generation report
/// are returned.
///
/// # Example
///
/// ```no_run
/// // In build.rs:
/// let out = std::path::Path::new(&std::env::var("OUT_DIR").unwrap()).join("docrepo.rs");
/// docrepo_codegen::generate_from_schema("schema.yaml", out).unwrap();
/// ```
pub fn generate_from_schema(
    schema_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<Vec<Diagnostic>, CodegenError> {
    let schema = docrepo::schema::parse_schema(schema_path.as_ref())?;
    let (code, notes) = generate(&schema)?;
    let output_path = output_path.as_ref();
    std::fs::write(output_path, code).map_err(|source| CodegenError::Write {
        path: output_path.to_path_buf(),
        source,
    })?;
    Ok(notes)
}

/// Like [`generate_from_schema`] but takes the schema content directly and
/// returns the code.
pub fn generate_from_schema_str(schema_yaml: &str) -> Result<String, CodegenError> {
    let schema = docrepo::schema::parse_schema_str(schema_yaml)?;
    let (code, _) = generate(&schema)?;
    Ok(code)
}

/// Generate the formatted source for a parsed schema, with the notes of the
/// generation report.
pub fn generate(schema: &SchemaDefinition) -> Result<(String, Vec<Diagnostic>), CodegenError> {
    let generation = generator::generate_all(schema);
    if generation.has_errors() {
        return Err(CodegenError::Invalid(generation.diagnostics));
    }
    let code = generator::format_token_stream(&generation.tokens)?;
    Ok((code, generation.diagnostics))
}
