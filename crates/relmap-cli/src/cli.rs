use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective configuration
    Config {
        /// Write the default configuration file instead
        #[arg(required = false, long)]
        init: bool,
    },

    /// Show the metadata declared by a schema file
    #[clap(name = "inspect", visible_alias = "i")]
    Inspect {
        /// Schema file (defaults to `schema_path` from the config)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        /// Only show this table
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Preview the statement built for a table
    #[command(arg_required_else_help = true)]
    Sql {
        #[clap(subcommand)]
        action: SqlAction,
    },

    /// Insert rows into an in-memory store and print what was stored
    #[command(arg_required_else_help = true)]
    Load {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        #[arg(short, long)]
        table: String,

        /// JSON file holding one object or an array of objects
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: String,
    },
}

#[derive(Subcommand)]
pub enum SqlAction {
    /// Multi-row INSERT from a JSON data file
    Insert {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        #[arg(short, long)]
        table: String,

        /// JSON file holding one object or an array of objects
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: String,
    },

    /// UPDATE of one row, keyed by its id
    Update {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        #[arg(short, long)]
        table: String,

        /// JSON file holding one object
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: String,
    },

    /// SELECT with optional filters, ordering and limit
    Select {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        #[arg(short, long)]
        table: String,

        /// Equality filter, written as property=value
        #[arg(short, long = "where")]
        filters: Vec<String>,

        /// Sort by property, prefix with `-` for descending
        #[arg(short, long)]
        order: Vec<String>,

        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// DELETE with optional filters
    Delete {
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        schema: Option<String>,

        #[arg(short, long)]
        table: String,

        /// Equality filter, written as property=value
        #[arg(short, long = "where")]
        filters: Vec<String>,
    },
}
