use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tasks_core::{
    ApiClient, ClientConfig, CreateTask, Credentials, FileSessionStore, ListTasksQuery, PatchTask,
    UpdateTask,
};

#[derive(Parser)]
#[command(name = "tasks")]
#[command(about = "Command-line client for the task API")]
#[command(version)]
struct Cli {
    /// API base URL (defaults to $TASKS_API_URL, then http://localhost:8000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session file (defaults to $TASKS_SESSION_FILE, then the user config dir)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Login {
    /// Account email
    #[arg(short, long)]
    email: String,

    /// Password; prompted for when omitted
    #[arg(short, long)]
    password: Option<String>,
}

impl Login {
    fn credentials(self) -> Result<Credentials> {
        let password = match self.password {
            Some(password) => password,
            None => rpassword::prompt_password("Password: ").context("reading password")?,
        };
        Ok(Credentials::new(self.email, password))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and start a session
    Signup(Login),
    /// Start a session
    Signin(Login),
    /// Forget the stored session
    Signout,
    /// Show whether a session is stored
    Status,
    /// List tasks
    List {
        /// Only completed tasks
        #[arg(long, conflicts_with = "pending")]
        completed: bool,

        /// Only open tasks
        #[arg(long)]
        pending: bool,

        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(short, long)]
        offset: Option<u32>,
    },
    /// Show one task
    Get { id: i64 },
    /// Create a task
    Create {
        title: String,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Replace a task's title and/or description
    Update {
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change any subset of a task's fields
    Patch {
        id: i64,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Mark as completed
        #[arg(long, conflicts_with = "undone")]
        done: bool,

        /// Mark as not completed
        #[arg(long)]
        undone: bool,
    },
    /// Delete a task
    Delete { id: i64 },
}

/// `Some(true)` / `Some(false)` for one of two mutually exclusive flags.
fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Default to WARN level for quiet CLI output
    // Use RUST_LOG=debug to see each request
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.base_url = api_url;
    }
    if let Some(session_file) = cli.session_file {
        config.session_path = Some(session_file);
    }
    let session_file = config
        .session_file()
        .ok_or_else(|| anyhow!("no config directory; pass --session-file"))?;
    tracing::debug!(base_url = %config.base_url, session = %session_file.display(), "config resolved");

    let client = ApiClient::connect(&config, Arc::new(FileSessionStore::new(session_file)));

    match cli.command {
        Command::Signup(login) => {
            let auth = client.sign_up(&login.credentials()?)?;
            print_json(&auth)
        }
        Command::Signin(login) => {
            let auth = client.sign_in(&login.credentials()?)?;
            print_json(&auth)
        }
        Command::Signout => {
            client.sign_out()?;
            println!("Signed out");
            Ok(())
        }
        Command::Status => print_json(&client.check_session()?),
        Command::List {
            completed,
            pending,
            limit,
            offset,
        } => {
            let query = ListTasksQuery {
                is_completed: tri_state(completed, pending),
                limit,
                offset,
            };
            print_json(&client.list_tasks(&query)?)
        }
        Command::Get { id } => print_json(&client.get_task(id)?),
        Command::Create { title, description } => {
            let task = client.create_task(&CreateTask { title, description })?;
            print_json(&task)
        }
        Command::Update {
            id,
            title,
            description,
        } => {
            let task = client.update_task(id, &UpdateTask { title, description })?;
            print_json(&task)
        }
        Command::Patch {
            id,
            title,
            description,
            done,
            undone,
        } => {
            let patch = PatchTask {
                title,
                description,
                is_completed: tri_state(done, undone),
            };
            print_json(&client.patch_task(id, &patch)?)
        }
        Command::Delete { id } => {
            client.delete_task(id)?;
            print_json(&json!({ "deleted": id }))
        }
    }
}
