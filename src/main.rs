//! Hologram component store CLI.
//!
//! Entry point for the `holo-store` command-line tool. Results are printed
//! as JSON on stdout; failures exit non-zero with the message on stderr.

use clap::{Parser, Subcommand};
use holo_store::config::{StoreConfig, CONFIG_FILE};
use holo_store::{Store, StoreError};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "holo-store")]
#[command(about = "Transactional content-addressed JSON component store", version)]
struct Cli {
    /// Store directory (overrides config file and default)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to config file (default: holo-store.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed an empty store with the canonical schema components
    Init,

    /// Validate and store one artifact, printing its CID
    SubmitArtifact {
        /// Artifact type (spec, interface, docs, test, manager, ...)
        r#type: String,

        /// Read the artifact from this file instead of stdin
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Commit previously submitted artifacts as a new component
    SubmitManifest {
        /// Component namespace
        namespace: String,

        /// Manifest entry as type=cid (repeatable)
        #[arg(long, short = 'a', value_name = "TYPE=CID", required = true)]
        artifact: Vec<String>,
    },

    /// Read a component, or one artifact of it
    Read {
        /// Component namespace
        namespace: String,

        /// Read only this artifact type
        #[arg(long, short = 't')]
        r#type: Option<String>,
    },

    /// Replace or add artifacts of an existing component
    Update {
        /// Component namespace
        namespace: String,

        /// Read the changes (JSON object of type -> content) from this file
        /// instead of stdin
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Delete a component, refusing while dependents exist
    Delete {
        /// Component namespace
        namespace: String,
    },

    /// Validate one component, or the whole store
    Validate {
        /// Component namespace
        namespace: Option<String>,

        /// Validate every component
        #[arg(long, conflicts_with = "namespace")]
        all: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = match StoreConfig::resolve(Some(&config_path), cli.root.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };
    let store = match Store::open(&config.root) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening store at {}: {e}", config.root.display());
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Init => run_init(&store),
        Commands::SubmitArtifact { r#type, file } => run_submit_artifact(&store, &r#type, file),
        Commands::SubmitManifest {
            namespace,
            artifact,
        } => run_submit_manifest(&store, &namespace, &artifact),
        Commands::Read { namespace, r#type } => run_read(&store, &namespace, r#type.as_deref()),
        Commands::Update { namespace, file } => run_update(&store, &namespace, file),
        Commands::Delete { namespace } => run_delete(&store, &namespace),
        Commands::Validate { namespace, all } => run_validate(&store, namespace.as_deref(), all),
    }
}

fn run_init(store: &Store) {
    match store.init() {
        Ok(written) => emit(&json!({"initialized": true, "written": written})),
        Err(e) => fail(e),
    }
}

fn run_submit_artifact(store: &Store, type_name: &str, file: Option<PathBuf>) {
    let content = read_json_input(file.as_deref());
    match store.submit_artifact(type_name, &content) {
        Ok(receipt) => emit(&receipt),
        Err(e) => fail(e),
    }
}

fn run_submit_manifest(store: &Store, namespace: &str, artifacts: &[String]) {
    let mut manifest: BTreeMap<String, String> = BTreeMap::new();
    for entry in artifacts {
        match entry.split_once('=') {
            Some((type_name, cid)) if !type_name.is_empty() && !cid.is_empty() => {
                manifest.insert(type_name.to_string(), cid.to_string());
            }
            _ => {
                eprintln!("Error: artifact entry '{entry}' is not TYPE=CID");
                process::exit(1);
            }
        }
    }
    match store.submit_manifest(namespace, &manifest) {
        Ok(receipt) => emit(&receipt),
        Err(e) => fail(e),
    }
}

fn run_read(store: &Store, namespace: &str, type_name: Option<&str>) {
    match type_name {
        Some(type_name) => match store.read_artifact(namespace, type_name) {
            Ok(content) => emit(&content),
            Err(e) => fail(e),
        },
        None => match store.read_component(namespace) {
            Ok(contents) => emit(&contents),
            Err(e) => fail(e),
        },
    }
}

fn run_update(store: &Store, namespace: &str, file: Option<PathBuf>) {
    let input = read_json_input(file.as_deref());
    let changes: BTreeMap<String, Value> = match serde_json::from_value(input) {
        Ok(changes) => changes,
        Err(e) => {
            eprintln!("Error: update input must be a JSON object of type -> content: {e}");
            process::exit(1);
        }
    };
    match store.update(namespace, &changes) {
        Ok(receipt) => emit(&receipt),
        Err(e) => fail(e),
    }
}

fn run_delete(store: &Store, namespace: &str) {
    match store.delete(namespace) {
        Ok(receipt) => emit(&receipt),
        Err(e) => fail(e),
    }
}

fn run_validate(store: &Store, namespace: Option<&str>, all: bool) {
    if all || namespace.is_none() {
        match store.validate_all() {
            Ok(results) => {
                let clean = results.values().all(|r| r.valid);
                emit(&results);
                if !clean {
                    process::exit(1);
                }
            }
            Err(e) => fail(e),
        }
    } else if let Some(namespace) = namespace {
        match store.validate(namespace) {
            Ok(report) => {
                let valid = report.valid;
                emit(&report);
                if !valid {
                    process::exit(1);
                }
            }
            Err(e) => fail(e),
        }
    }
}

/// Read a JSON document from a file, or stdin when no file is given.
fn read_json_input(file: Option<&Path>) -> Value {
    let raw = match file {
        Some(path) => match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => {
            let mut raw = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
                eprintln!("Error reading stdin: {e}");
                process::exit(1);
            }
            raw
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: input is not valid JSON: {e}");
            process::exit(1);
        }
    }
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            process::exit(1);
        }
    }
}

fn fail(err: StoreError) -> ! {
    if let Some(issues) = err.issues() {
        match serde_json::to_string_pretty(&json!({"ok": false, "issues": issues})) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => eprintln!("Error serializing issues: {e}"),
        }
    }
    eprintln!("Error: {err}");
    process::exit(1);
}
