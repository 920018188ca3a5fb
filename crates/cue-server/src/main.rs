//! cue-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and serves the ClassCue API over HTTP. The remaining subcommands
//! seed accounts and the subject catalogue; passwords are read from stdin.
//!
//! ```text
//! cue-server serve
//! cue-server add-user --email prof@example.edu --role teacher
//! cue-server add-subject --code CS201 --name "Data Structures" --semester 3
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cue_core::{
  identity::{NewSubject, NewUser, Role, StudentProfile},
  store::AttendanceStore,
};
use cue_server::{ServerConfig, expand_tilde, hash_password, shutdown_signal};
use cue_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ClassCue attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Create an account; the password is read from stdin.
  AddUser {
    #[arg(long)]
    email: String,
    /// student, teacher or admin.
    #[arg(long, default_value = "student")]
    role:  Role,
  },
  /// Attach a student profile to an existing account.
  AddStudentProfile {
    #[arg(long)]
    email:      String,
    #[arg(long)]
    enrollment: String,
    #[arg(long)]
    name:       String,
    #[arg(long)]
    department: String,
    #[arg(long)]
    semester:   u8,
  },
  /// Add a subject to the catalogue.
  AddSubject {
    #[arg(long)]
    code:     String,
    #[arg(long)]
    name:     String,
    #[arg(long)]
    semester: u8,
  },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Some(Command::HashPassword) = cli.command {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, &server_cfg).await,
    Command::AddUser { email, role } => {
      let password      = read_password()?;
      let password_hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
      let user = store
        .add_user(NewUser { email, role, password_hash })
        .await
        .context("failed to add user")?;
      println!("{} {} {}", user.user_id, user.email, user.role);
      Ok(())
    }
    Command::AddStudentProfile { email, enrollment, name, department, semester } => {
      let user = store
        .find_user_by_email(&email)
        .await?
        .with_context(|| format!("no account for {email}"))?;
      let profile = store
        .add_student_profile(StudentProfile {
          user_id:           user.user_id,
          enrollment_number: enrollment,
          full_name:         name,
          department,
          semester,
        })
        .await
        .context("failed to add student profile")?;
      println!("{} {}", profile.enrollment_number, profile.full_name);
      Ok(())
    }
    Command::AddSubject { code, name, semester } => {
      let subject = store
        .add_subject(NewSubject { subject_code: code, name, semester })
        .await
        .context("failed to add subject")?;
      println!("{} {} {}", subject.subject_id, subject.subject_code, subject.name);
      Ok(())
    }
    Command::HashPassword => Ok(()),
  }
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let app     = cue_server::router(std::sync::Arc::new(store));
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}/api");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("server stopped");
  Ok(())
}

/// Read a single password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_string();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
}
