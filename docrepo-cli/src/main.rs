use clap::{Parser, Subcommand, ValueEnum};
use docrepo::dynamic::{value_to_json, DynamicEntity, DynamicRepository};
use docrepo::schema::{load_entities, parse_schema, EntitySchema, SchemaDefinition};
use docrepo::{Document, DocumentStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// docrepo CLI: generate code from a schema and work with a document store
#[derive(Parser)]
#[command(name = "docrepo", version, about)]
struct Cli {
    /// Path to the schema file
    #[arg(long, global = true, default_value = "schema.yaml")]
    schema: PathBuf,

    /// Path to the SQLite document store
    #[arg(long, global = true, default_value = "docrepo.db")]
    db: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Generate accessors, repositories and the facade into a Rust file
    Generate {
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Show the entity models and finder plans of the schema
    Inspect,

    /// Get a raw document by ID
    Get {
        /// Document ID
        id: String,
    },

    /// List every document of an entity
    All {
        /// Entity name
        entity: String,
    },

    /// Find documents of an entity by field equality
    Find {
        /// Entity name
        entity: String,
        /// Field filters, ANDed (e.g. --where name=Books)
        #[arg(long = "where", value_parser = parse_key_value, required = true)]
        filters: Vec<(String, String)>,
    },

    /// Run a finder declared in the schema
    Call {
        /// Entity name
        entity: String,
        /// Finder method (e.g. find_by_parent_and_position)
        finder: String,
        /// Finder arguments, in parameter order
        args: Vec<String>,
    },

    /// Delete a document of an entity
    Delete {
        /// Entity name
        entity: String,
        /// Document ID
        id: String,
    },

    /// Show store statistics
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid field=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Generate { out } => {
            let notes = docrepo_codegen::generate_from_schema(&cli.schema, &out)?;
            for note in &notes {
                log::info!("{note}");
            }
            print_output(
                &serde_json::json!({
                    "ok": true,
                    "output": out.display().to_string(),
                    "notes": notes.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }),
                &cli.format,
            )?;
        }

        Command::Inspect => {
            let schema = parse_schema(&cli.schema)?;
            let mut entities = Vec::new();
            for entity in load_entities(&schema)? {
                let mut value = serde_json::to_value(&entity)?;
                value["finders"] = serde_json::to_value(entity.finders())?;
                value["module"] = entity.module_path().join("::").into();
                entities.push(value);
            }
            print_output(
                &serde_json::json!({
                    "facade": schema.facade_name(),
                    "engine": serde_json::to_value(&schema.engine)?,
                    "entities": entities,
                }),
                &cli.format,
            )?;
        }

        Command::Get { id } => {
            let store = open_store(&cli.db)?;
            match store.get_document(&id)? {
                Some(doc) => print_output(&document_to_json(&doc), &cli.format)?,
                None => return Err(docrepo::DocRepoError::NotFound { id }.into()),
            }
        }

        Command::All { entity } => {
            let repo = open_repository(&cli.schema, &cli.db, &entity)?;
            let items = repo.try_find_all()?;
            print_entities(&repo, &items, &cli.format)?;
        }

        Command::Find { entity, filters } => {
            let repo = open_repository(&cli.schema, &cli.db, &entity)?;
            let predicate = repo.predicate(&filters)?;
            let items = repo.try_find_by(&predicate)?;
            print_entities(&repo, &items, &cli.format)?;
        }

        Command::Call {
            entity,
            finder,
            args,
        } => {
            let repo = open_repository(&cli.schema, &cli.db, &entity)?;
            let items = repo.call_finder_str(&finder, &args)?;
            print_entities(&repo, &items, &cli.format)?;
        }

        Command::Delete { entity, id } => {
            let repo = open_repository(&cli.schema, &cli.db, &entity)?;
            let target = DynamicEntity {
                id: Some(id.clone()),
                ..Default::default()
            };
            if !repo.try_delete(&target)? {
                return Err(docrepo::DocRepoError::NotFound { id }.into());
            }
            print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
        }

        Command::Status => {
            let store = open_store(&cli.db)?;
            print_output(
                &serde_json::json!({
                    "documents": store.document_count()?,
                    "last_sequence": store.last_sequence()?,
                    "views": store.view_names()?,
                }),
                &cli.format,
            )?;
        }
    }

    Ok(())
}

fn open_store(db: &Path) -> docrepo::Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(db)?))
}

fn open_repository(
    schema_path: &Path,
    db: &Path,
    entity: &str,
) -> Result<DynamicRepository, Box<dyn std::error::Error>> {
    let schema: SchemaDefinition = parse_schema(schema_path)?;
    let definition = schema
        .entity(entity)
        .ok_or_else(|| format!("Unknown entity '{entity}' in {}", schema_path.display()))?;
    let model = EntitySchema::from_definition(definition)?;
    let store = open_store(db)?;
    Ok(DynamicRepository::new(store, model, schema.engine.clone()))
}

fn document_to_json(doc: &Document) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    out.insert("_id".into(), doc.id.clone().into());
    for (key, value) in &doc.properties {
        out.insert(key.clone(), value_to_json(value));
    }
    serde_json::Value::Object(out)
}

fn print_entities(
    repo: &DynamicRepository,
    items: &[DynamicEntity],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rendered: Vec<_> = items.iter().map(|item| item.to_json(repo.schema())).collect();
    print_output(&serde_json::Value::Array(rendered), format)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
