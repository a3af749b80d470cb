//! Disclaude CLI — the main entry point.
//!
//! Commands:
//! - `run`       — Drive a task specification through the dialogue loop
//! - `task`      — Write task specifications, inspect saved plans
//! - `config`    — Show or initialize configuration
//! - `sessions`  — Inspect the chat-to-session map

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "disclaude",
    about = "Disclaude — evaluate, execute, repeat until the task is done",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dialogue loop for a task specification
    Run {
        /// Path to the task specification (Markdown)
        task_file: PathBuf,

        /// Override the request recorded in the task file
        #[arg(short, long)]
        request: Option<String>,

        /// Session id (defaults to the chat's stored session, or a new one)
        #[arg(short, long)]
        session: Option<String>,

        /// Override the iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Keep the extracted plan in memory instead of writing plan.json
        #[arg(long)]
        no_plan: bool,

        /// Decompose executor work into subtasks
        #[arg(long)]
        subtasks: bool,
    },

    /// Manage task specifications
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Print the config file path only
        #[arg(long)]
        path: bool,
    },

    /// Inspect persisted chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Write a new task specification and print its path
    New {
        /// The natural-language request
        request: String,

        /// Task id (defaults to a generated one)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        chat_id: Option<String>,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Print the plan saved for a task
    Plan { task_id: String },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List chat ids and their session ids
    List,

    /// Forget the session of a chat
    Clear { chat_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr; stdout carries the dialogue.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Run {
            task_file,
            request,
            session,
            max_iterations,
            no_plan,
            subtasks,
        } => {
            commands::run::run(commands::run::RunArgs {
                task_file,
                request,
                session,
                max_iterations,
                no_plan,
                subtasks,
            })
            .await?
        }
        Commands::Task { action } => match action {
            TaskAction::New {
                request,
                id,
                chat_id,
                user_id,
            } => commands::task::new(request, id, chat_id, user_id).await?,
            TaskAction::Plan { task_id } => commands::task::plan(&task_id).await?,
        },
        Commands::Config { init, path } => {
            if path {
                commands::config_cmd::path()?
            } else if init {
                commands::config_cmd::init()?
            } else {
                commands::config_cmd::show()?
            }
        }
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list().await?,
            SessionsAction::Clear { chat_id } => commands::sessions::clear(&chat_id).await?,
        },
    }

    Ok(())
}
