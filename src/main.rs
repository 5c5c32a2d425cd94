use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod audit;
mod cli;
mod clock;
mod config;
mod decay;
mod error;
mod evidence;
mod insights;
mod query;
mod server;
mod store;
mod types;
mod validate;

#[derive(Parser)]
#[command(name = "proofs")]
#[command(version)]
#[command(about = "Evidence log with decaying confidence")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a .proofs directory
    Init {
        /// Directory to initialize .proofs in
        #[arg(short, long, default_value = ".")]
        path: String,
    },

    /// Log a new piece of evidence
    Add {
        /// What you did (5-120 characters)
        title: String,

        /// Longer notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Comma-separated tags
        #[arg(short, long, default_value = "")]
        tags: String,

        /// low, medium or high
        #[arg(short, long)]
        impact: Option<types::Impact>,

        /// manual, prompt or ai
        #[arg(short, long)]
        source: Option<types::Source>,
    },

    /// Show one entry
    Show {
        /// Entry ID
        id: String,
    },

    /// List entries, newest first
    List {
        /// Only this tier: FRESH, STALE, OLD, ARCHIVE or all
        #[arg(short, long, default_value = "all")]
        status: String,
    },

    /// Filter entries
    Search {
        /// Substring to look for in titles, notes and tags
        #[arg(short = 'q', long)]
        text: Option<String>,

        /// low, medium, high or all
        #[arg(short, long, default_value = "all")]
        impact: String,

        /// last7days, last30days or all
        #[arg(short, long, default_value = "all")]
        range: String,

        /// Comma-separated tags; matches entries with any of them
        #[arg(short, long, default_value = "")]
        tags: String,

        /// FRESH, STALE, OLD, ARCHIVE or all
        #[arg(short, long, default_value = "all")]
        status: String,
    },

    /// Edit an entry without resetting its decay
    Edit {
        /// Entry ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New notes (empty string clears them)
        #[arg(short, long)]
        notes: Option<String>,

        /// New tags (comma-separated, replaces existing)
        #[arg(short, long)]
        tags: Option<String>,

        /// New impact
        #[arg(short, long)]
        impact: Option<types::Impact>,

        /// New source
        #[arg(short, long)]
        source: Option<types::Source>,
    },

    /// Mark an entry as freshly confirmed
    Anchor {
        /// Entry ID
        id: String,
    },

    /// Delete an entry
    Delete {
        /// Entry ID
        id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Collection health
    Audit,

    /// Activity over the last 30 days
    Insights,

    /// List all tags
    Tags,

    /// Export entries to stdout
    Export {
        /// Output format
        #[arg(short, long, default_value = "json", value_parser = ["json", "md"])]
        format: String,
    },

    /// Import entries from a JSON export
    Import {
        /// File written by `proofs export`
        file: String,
    },

    /// View or set configuration
    Config {
        /// Config key
        key: Option<String>,

        /// Config value
        value: Option<String>,
    },

    /// Manage the evidence server
    #[command(subcommand)]
    Server(ServerCommands),
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Start serving this project's evidence store
    Start {
        /// Run in foreground
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the server
    Stop,

    /// Check server status
    Status,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PROOFS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { path } => cli::evidence::run_init(&path),
        Commands::Add {
            title,
            notes,
            tags,
            impact,
            source,
        } => cli::evidence::run_add(title, notes, &tags, impact, source, json),
        Commands::Show { id } => cli::evidence::run_show(&id, json),
        Commands::List { status } => cli::evidence::run_list(&status, json),
        Commands::Search {
            text,
            impact,
            range,
            tags,
            status,
        } => cli::evidence::run_search(text, &impact, &range, &tags, &status, json),
        Commands::Edit {
            id,
            title,
            notes,
            tags,
            impact,
            source,
        } => cli::evidence::run_edit(&id, title, notes, tags.as_deref(), impact, source, json),
        Commands::Anchor { id } => cli::evidence::run_anchor(&id, json),
        Commands::Delete { id, force } => cli::evidence::run_delete(&id, force),
        Commands::Audit => cli::evidence::run_audit(json),
        Commands::Insights => cli::evidence::run_insights(json),
        Commands::Tags => cli::evidence::run_tags(json),
        Commands::Export { format } => cli::evidence::run_export(&format),
        Commands::Import { file } => cli::evidence::run_import(&file),
        Commands::Config { key, value } => cli::config::run_config(key.as_deref(), value.as_deref()),
        Commands::Server(cmd) => match cmd {
            ServerCommands::Start { foreground } => cli::server::run_start(foreground),
            ServerCommands::Stop => cli::server::run_stop(),
            ServerCommands::Status => cli::server::run_status(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
