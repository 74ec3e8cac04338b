#![forbid(unsafe_code)]

mod cmd;
mod output;
mod project;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use qtriage_core::config;
use qtriage_core::model::UserId;
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "qt: triage tracker for support questions",
    long_about = None
)]
struct Cli {
    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Act as this registered user (overrides `QTRIAGE_USER`).
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    as_user: Option<UserId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a qtriage project",
        long_about = "Create .qtriage/ with a default config and an empty database.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    qt init\n\n    # Reset the config to defaults, keeping the database\n    qt init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Import questions from a dataset file",
        long_about = "Load a JSON wrapper with an `items` array. New questions start unanswered; \
                      questions already stored keep their state and owner.",
        after_help = "EXAMPLES:\n    # Seed the store\n    qt import questions.json\n\n    # Emit machine-readable output\n    qt import questions.json --json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Register or refresh a responding user",
        long_about = "Store a user's profile and login time. Only registered users can triage.",
        after_help = "EXAMPLES:\n    # Register user 42\n    qt login --id 42 --name ana\n\n    # Then act as that user\n    export QTRIAGE_USER=42"
    )]
    Login(cmd::login::LoginArgs),

    #[command(
        next_help_heading = "Read",
        about = "List questions by bucket",
        long_about = "Show the unanswered, answered, pending, and updating buckets, newest first.",
        after_help = "EXAMPLES:\n    # All buckets\n    qt list\n\n    # One tag, plus user 42's own lists\n    qt list --tag google-maps --user 42\n\n    # Emit machine-readable output\n    qt list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one question",
        long_about = "Show a stored question with its state, owner, and tags.",
        after_help = "EXAMPLES:\n    # Show question 101\n    qt show 101"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tags with question counts"
    )]
    Tags(cmd::tags::TagsArgs),

    #[command(
        next_help_heading = "Read",
        about = "List registered users"
    )]
    Users(cmd::users::UsersArgs),

    #[command(
        next_help_heading = "Triage",
        about = "Move questions between buckets",
        long_about = "Submit one atomic batch of proposals as the acting user. Each field names \
                      the bucket the question was seen in, its id, and the target label.",
        after_help = "EXAMPLES:\n    # Claim question 101 and mark 7 answered\n    qt triage --as 42 unanswered_101=pending pending_7=answered\n\n    # Release a question back to the pool\n    qt triage pending_101=unanswered"
    )]
    Triage(cmd::triage::TriageArgs),

    #[command(
        next_help_heading = "Triage",
        about = "Remove questions deleted upstream",
        long_about = "Compare stored ids against an upstream dataset and purge the missing ones.",
        after_help = "EXAMPLES:\n    # Preview\n    qt reconcile --source latest.json --dry-run\n\n    # Purge\n    qt reconcile --source latest.json"
    )]
    Reconcile(cmd::reconcile::ReconcileArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QTRIAGE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "qtriage_core=debug,qt=debug,info"
        } else {
            "qtriage_core=info,qt=info,warn"
        })
    });

    let format = env::var("QTRIAGE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let user_config = config::load_user_config().unwrap_or_else(|err| {
        tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable user config");
        config::UserConfig::default()
    });
    let output = resolve_output_mode(cli.format, cli.json, user_config.output.as_deref());
    let project_root = env::current_dir()?;

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Import(ref args) => cmd::import::run_import(args, output, &project_root),
        Commands::Login(ref args) => cmd::login::run_login(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::Tags(ref args) => cmd::tags::run_tags(args, output, &project_root),
        Commands::Users(ref args) => cmd::users::run_users(args, output, &project_root),
        Commands::Triage(ref args) => {
            let env_user = env::var("QTRIAGE_USER").ok();
            let actor =
                config::resolve_acting_user(cli.as_user, env_user.as_deref(), &user_config)?;
            cmd::triage::run_triage(args, actor, output, &project_root)
        }
        Commands::Reconcile(ref args) => {
            cmd::reconcile::run_reconcile(args, output, &project_root)
        }
    }
}
