use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use sitestore::{Record, Store};
use std::process;

/// SiteStore CLI - inspect and edit a SiteStore data directory
#[derive(Parser)]
#[command(name = "sitestore", version, about)]
struct Cli {
    /// Path to the data directory
    #[arg(long, env = "SITESTORE_DATA_DIR", default_value = "data")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
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
    /// Get a single record by ID
    Get {
        /// Table name
        table: String,
        /// Record ID
        id: String,
    },

    /// List records in a table, one page at a time
    List {
        /// Table name
        table: String,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Records per page
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Case-insensitive substring search
    Search {
        /// Table name
        table: String,
        /// Text to look for
        term: String,
        /// Fields to search (e.g. --field title --field content)
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
    },

    /// Insert a new record
    Insert {
        /// Table name
        table: String,
        /// Field values (e.g. --field name="Web Design")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Update an existing record
    Update {
        /// Table name
        table: String,
        /// Record ID
        id: String,
        /// Field values to change (e.g. --field is_active=false)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        /// Table name
        table: String,
        /// Record ID
        id: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a statement through the SQL interpreter
    Sql {
        /// Statement text, with `?` placeholders
        statement: String,
        /// Positional parameters, bound left to right (e.g. --param 42 --param hello)
        #[arg(long = "param")]
        params: Vec<String>,
    },

    /// Dump the raw contents of a table
    Backup {
        /// Table name
        table: String,
    },

    /// Replace a table's contents with a JSON array read from a file
    Restore {
        /// Table name
        table: String,
        /// Snapshot file produced by `backup --format json`
        file: String,
    },

    /// Remove every record from a table
    Truncate {
        /// Table name
        table: String,
    },

    /// Show the data directory, table file stats, and stray files
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
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
    let store = Store::open(&cli.data_dir)?;
    log::debug!("Opened data directory {}", store.root().display());

    match cli.command {
        Command::Get { table, id } => {
            let record = store
                .table_named(&table)?
                .get_by_id(&id)
                .ok_or_else(|| format!("No record '{id}' in {table}"))?;
            print_output(&Value::Object(record), &cli.format)?;
        }

        Command::List { table, page, limit } => {
            let page = store.table_named(&table)?.get_paginated(page, limit);
            print_output(&serde_json::to_value(page)?, &cli.format)?;
        }

        Command::Search {
            table,
            term,
            fields,
        } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let found = store.table_named(&table)?.search(&term, &fields);
            print_output(&records_to_value(found), &cli.format)?;
        }

        Command::Insert { table, fields } => {
            let created = store.table_named(&table)?.create(fields_to_record(&fields))?;
            print_output(&Value::Object(created), &cli.format)?;
        }

        Command::Update { table, id, fields } => {
            let updated = store
                .table_named(&table)?
                .update(&id, fields_to_record(&fields))?
                .ok_or_else(|| format!("No record '{id}' in {table}"))?;
            print_output(&Value::Object(updated), &cli.format)?;
        }

        Command::Delete { table, id, dry_run } => {
            let handle = store.table_named(&table)?;
            if dry_run {
                let record = handle.get_by_id(&id);
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "table": handle.table().name(), "id": id },
                        "record": record,
                    }),
                    &cli.format,
                )?;
            } else {
                if !handle.delete(&id)? {
                    return Err(format!("No record '{id}' in {table}").into());
                }
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Sql { statement, params } => {
            let params: Vec<Value> = params.iter().map(String::as_str).map(parse_loose).collect();
            let result = store.execute(&statement, &params)?;
            print_output(&result.into_driver_tuple(), &cli.format)?;
        }

        Command::Backup { table } => {
            let snapshot = store.table_named(&table)?.backup();
            print_output(&Value::Array(snapshot), &cli.format)?;
        }

        Command::Restore { table, file } => {
            let handle = store.table_named(&table)?;
            let text = std::fs::read_to_string(&file)
                .map_err(|e| format!("Failed to read snapshot file '{file}': {e}"))?;
            let snapshot = match serde_json::from_str::<Value>(&text)? {
                Value::Array(items) => items,
                _ => return Err(format!("Snapshot file '{file}' is not a JSON array").into()),
            };
            let restored = snapshot.len();
            handle.restore(snapshot)?;
            print_output(
                &serde_json::json!({ "ok": true, "table": handle.table().name(), "restored": restored }),
                &cli.format,
            )?;
        }

        Command::Truncate { table } => {
            let handle = store.table_named(&table)?;
            handle.truncate()?;
            print_output(
                &serde_json::json!({ "ok": true, "truncated": handle.table().name() }),
                &cli.format,
            )?;
        }

        Command::Status => {
            let status = store.status()?;
            print_output(&status, &cli.format)?;
        }
    }

    Ok(())
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Numbers, booleans, null, arrays and objects are taken as JSON; anything else is a string.
fn parse_loose(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn fields_to_record(fields: &[(String, String)]) -> Record {
    fields
        .iter()
        .map(|(key, val)| (key.clone(), parse_loose(val)))
        .collect()
}

fn records_to_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}
