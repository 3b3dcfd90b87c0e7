//! CLI entry point for `mailbridge`.

use clap::{CommandFactory, Parser, Subcommand};

use mailbridge::config::{self, Config};
use mailbridge::dispatch::Dispatcher;

#[derive(Parser)]
#[command(name = "mailbridge", version, about = "Read, search and send email from mbox archives or IMAP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON on a single line
    #[arg(long, global = true)]
    compact: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List available folders
    Folders,
    /// Read messages from a folder, newest first for IMAP
    Read {
        /// Archive path or IMAP mailbox name, as listed by `folders`
        folder: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long)]
        offset: Option<usize>,
    },
    /// Search subjects and senders (and bodies, for archives)
    Search {
        query: String,
        /// Restrict to one folder
        #[arg(short, long)]
        folder: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Send a plain-text message through the SMTP relay
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        /// Comma-separated carbon-copy recipients
        #[arg(long)]
        cc: Option<String>,
    },
    /// Show the effective configuration (password hidden)
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (file_config, file_error) = match config::load_config_file() {
        Ok(file_config) => (file_config.unwrap_or_default(), None),
        Err(e) => (Config::new(), Some(e)),
    };

    let log_level = match cli.verbose {
        0 => file_config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &file_config);

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "Ignoring config file, using defaults");
    }
    let config = file_config.apply_env(|key| std::env::var(key).ok());

    let dispatcher = Dispatcher::new(config);
    let output = match cli.command {
        Commands::Folders => dispatcher.list_email_folders(),
        Commands::Read {
            folder,
            limit,
            offset,
        } => dispatcher.read_emails(&folder, limit, offset),
        Commands::Search {
            query,
            folder,
            limit,
        } => dispatcher.search_emails(&query, folder.as_deref(), limit),
        Commands::Send {
            to,
            subject,
            body,
            cc,
        } => dispatcher.send_email(&to, &subject, &body, cc.as_deref()),
        Commands::Config => dispatcher.get_email_config(),
        Commands::Completions { shell } => return cmd_completions(shell),
    };

    print_json(&output, cli.compact)?;
    if output.get("error").is_some() {
        std::process::exit(1);
    }
    Ok(())
}

/// Set up tracing with stderr output and file logging in the cache dir.
fn setup_logging(level: &str, settings: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(settings);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailbridge.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailbridge", &mut std::io::stdout());
    Ok(())
}

fn print_json(value: &serde_json::Value, compact: bool) -> anyhow::Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}
