use docrepo::schema::{EntitySchema, SchemaDefinition};
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::accessor_gen::generate_accessor;
use crate::facade_gen::generate_facade;
use crate::repository_gen::generate_repository;
use crate::type_utils::{field_const_ident, safe_field_ident, TYPE_TAG_CONST};

const HEADER: &str = "// @generated by docrepo-codegen from a docrepo schema. Do not edit.\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The entity could not be generated
    Error,
    /// Generated, but something in the declaration was ignored
    Note,
}

/// One message of the generation report, attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub entity: String,
    pub message: String,
}

impl Diagnostic {
    fn error(entity: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    fn note(entity: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Note,
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Note => "note",
        };
        write!(f, "{level}: {}: {}", self.entity, self.message)
    }
}

/// Everything produced from one schema: the code of every entity that could
/// be generated, and the diagnostics collected along the way.
pub struct Generation {
    pub tokens: TokenStream,
    pub diagnostics: Vec<Diagnostic>,
}

impl Generation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Generate accessors, repositories and the facade for a whole schema.
pub fn generate_all(schema: &SchemaDefinition) -> Generation {
    let mut diagnostics = Vec::new();
    let mut entities: Vec<EntitySchema> = Vec::new();
    let mut names = HashSet::new();

    for definition in &schema.entities {
        match EntitySchema::from_definition(definition) {
            Ok(entity) if !names.insert(entity.name.clone()) => diagnostics.push(
                Diagnostic::error(&entity.name, "declared more than once"),
            ),
            Ok(entity) => {
                let conflicts = conflicts_for(&entity, &schema.engine.discriminator);
                if conflicts.is_empty() {
                    entities.push(entity);
                } else {
                    diagnostics.extend(conflicts);
                }
            }
            Err(e) => diagnostics.push(Diagnostic::error(&definition.name, e.to_string())),
        }
    }

    let mut modules = ModuleTree::default();
    for entity in &entities {
        diagnostics.extend(notes_for(entity));
        let finders = entity.finders();
        let accessor = generate_accessor(entity);
        let repository = generate_repository(entity, &finders);
        modules.insert(
            &entity.module_path(),
            quote! {
                #accessor
                #repository
            },
        );
    }

    let module_tokens = modules.into_tokens();
    let facade = generate_facade(schema.facade_name(), &entities, &schema.engine);

    Generation {
        tokens: quote! {
            #module_tokens
            #facade
        },
        diagnostics,
    }
}

/// Errors for fields whose generated items would clash with each other or
/// with the discriminator.
fn conflicts_for(entity: &EntitySchema, discriminator: &str) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    let mut idents: HashMap<String, &str> = HashMap::new();
    let mut consts: HashMap<String, &str> = HashMap::new();

    for field in entity.persisted_fields() {
        if field.store_property == discriminator {
            errors.push(Diagnostic::error(
                &entity.name,
                format!(
                    "field '{}' is stored in '{discriminator}', which holds the type tag",
                    field.name
                ),
            ));
        }
        let ident = safe_field_ident(&field.name).to_string();
        if let Some(other) = idents.insert(ident.clone(), &field.name) {
            errors.push(Diagnostic::error(
                &entity.name,
                format!("fields '{other}' and '{}' both generate `{ident}`", field.name),
            ));
        }
        let constant = field_const_ident(&field.name).to_string();
        if constant == TYPE_TAG_CONST {
            errors.push(Diagnostic::error(
                &entity.name,
                format!("field '{}' generates `{constant}`, which is reserved", field.name),
            ));
        } else if let Some(other) = consts.insert(constant.clone(), &field.name) {
            errors.push(Diagnostic::error(
                &entity.name,
                format!("fields '{other}' and '{}' both generate `{constant}`", field.name),
            ));
        }
    }
    errors
}

/// Notes for declarations the generator accepts but drops.
fn notes_for(entity: &EntitySchema) -> Vec<Diagnostic> {
    let mut notes = Vec::new();
    for field in entity.fields.iter().filter(|f| !f.is_persisted()) {
        notes.push(Diagnostic::note(
            &entity.name,
            format!(
                "field '{}' has type {} and is not persisted",
                field.name, field.field_type
            ),
        ));
    }
    for index in &entity.indexes {
        let unresolved: Vec<&str> = index
            .fields
            .iter()
            .filter(|name| !entity.field(name).is_some_and(|f| f.is_persisted()))
            .map(String::as_str)
            .collect();
        if !unresolved.is_empty() {
            notes.push(Diagnostic::note(
                &entity.name,
                format!(
                    "index ({}) skipped: unknown or unsupported field(s) {}",
                    index.fields.join(", "),
                    unresolved.join(", ")
                ),
            ));
        }
    }
    notes
}

/// Generated items grouped by their nested module path.
#[derive(Default)]
struct ModuleTree {
    items: TokenStream,
    children: Vec<(String, ModuleTree)>,
}

impl ModuleTree {
    fn insert(&mut self, path: &[String], tokens: TokenStream) {
        let Some((head, rest)) = path.split_first() else {
            self.items.extend(tokens);
            return;
        };
        let position = match self.children.iter().position(|(name, _)| name == head) {
            Some(position) => position,
            None => {
                self.children.push((head.clone(), ModuleTree::default()));
                self.children.len() - 1
            }
        };
        self.children[position].1.insert(rest, tokens);
    }

    fn into_tokens(self) -> TokenStream {
        let mut tokens = self.items;
        for (name, child) in self.children {
            let ident = safe_field_ident(&name);
            let inner = child.into_tokens();
            tokens.extend(quote! {
                pub mod #ident {
                    #inner
                }
            });
        }
        tokens
    }
}

/// Pretty-print generated tokens as a Rust source file.
pub fn format_token_stream(tokens: &TokenStream) -> syn::Result<String> {
    let file: syn::File = syn::parse2(tokens.clone())?;
    Ok(format!("{HEADER}{}", prettyplease::unparse(&file)))
}
