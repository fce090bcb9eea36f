use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use cli::{Args, Commands, SqlAction};
use error::{CliError, CliResult};
use inspect::inspect_schema;
use logging::setup_logging;
use relmap_config::{
    config::{self, generate_default_config, get_config},
    error::ConfigError,
    Config,
};
use relmap_core::EntityMetadata;
use schema::{read_rows, SchemaFile};
use tracing::{debug, info};

mod cli;
mod error;
mod inspect;
mod load;
mod logging;
mod schema;
mod sql;
mod utils;

fn schema_path(arg: Option<&str>, config: &Config) -> CliResult<PathBuf> {
    arg.map(PathBuf::from)
        .or_else(|| config.schema_path())
        .ok_or(CliError::MissingSchema)
}

fn table_metadata(
    schema: Option<&str>,
    config: &Config,
    table: &str,
) -> CliResult<Arc<EntityMetadata>> {
    let path = schema_path(schema, config)?;
    SchemaFile::load(&path)?
        .manager()?
        .get_metadata_by_table(table)
        .ok_or_else(|| CliError::UnknownTable(table.to_string()))
}

async fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    if let Some(ref c) = args.config {
        config::set_config_path(c);
    }
    config::init()?;
    let config = get_config();

    setup_logging(&args, config.log_level());
    debug!("using configuration from {}", config::config_path().display());

    if args.no_color {
        utils::disable_color();
    }

    match args.command {
        Commands::Config { init } => {
            if init {
                let path = generate_default_config()?;
                info!("Default configuration written to {}", path.display());
            } else if args.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let content = toml::to_string_pretty(&config).map_err(ConfigError::from)?;
                info!("{}", content.trim_end());
            }
        }
        Commands::Inspect { schema, table } => {
            let path = schema_path(schema.as_deref(), &config)?;
            let manager = SchemaFile::load(&path)?.manager()?;
            inspect_schema(&manager, table.as_deref(), args.json)?;
        }
        Commands::Sql { action } => {
            let statement = match action {
                SqlAction::Insert {
                    schema,
                    table,
                    data,
                } => {
                    let metadata = table_metadata(schema.as_deref(), &config, &table)?;
                    let rows = read_rows(Path::new(&data), &metadata)?;
                    sql::insert_statement(&config, &metadata, &rows)?
                }
                SqlAction::Update {
                    schema,
                    table,
                    data,
                } => {
                    let metadata = table_metadata(schema.as_deref(), &config, &table)?;
                    let rows = read_rows(Path::new(&data), &metadata)?;
                    let [row] = rows.as_slice() else {
                        return Err(CliError::InvalidData(format!(
                            "update takes exactly one row, found {}",
                            rows.len()
                        )));
                    };
                    sql::update_statement(&config, &metadata, row)?
                }
                SqlAction::Select {
                    schema,
                    table,
                    filters,
                    order,
                    limit,
                } => {
                    let metadata = table_metadata(schema.as_deref(), &config, &table)?;
                    sql::select_statement(&config, &metadata, &filters, &order, limit)?
                }
                SqlAction::Delete {
                    schema,
                    table,
                    filters,
                } => {
                    let metadata = table_metadata(schema.as_deref(), &config, &table)?;
                    sql::delete_statement(&config, &metadata, &filters)?
                }
            };
            sql::print_statement(&config, &statement, args.json)?;
        }
        Commands::Load {
            schema,
            table,
            data,
        } => {
            let metadata = table_metadata(schema.as_deref(), &config, &table)?;
            let rows = read_rows(Path::new(&data), &metadata)?;
            let stored = load::load_rows(&metadata, rows).await?;
            load::print_rows(&metadata, &stored, args.json)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
