//! `cue`: command-line client for ClassCue.
//!
//! # Usage
//!
//! ```text
//! cue --url http://localhost:8000 --user prof@example.edu --password secret subjects
//! cue --config ~/.config/classcue/config.toml session --name "Lecture 1" --subject CS201
//! cue scan --input decoded.txt
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cue_client::{
  ApiConfig, AttendanceApi, ClientError, HttpApi, LiveView, ScanError, SessionController,
  scanner::{LineCamera, scan_and_mark},
};
use cue_core::{clock::SystemClock, identity::Subject, record::Roster};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cue", about = "ClassCue attendance client")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the ClassCue server (default: http://localhost:8000).
  #[arg(long, env = "CUE_URL")]
  url: Option<String>,

  /// Account email.
  #[arg(long, env = "CUE_USER")]
  user: Option<String>,

  /// Account password (plaintext).
  #[arg(long, env = "CUE_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the subject catalogue.
  Subjects,
  /// Show the signed-in account.
  Profile,
  /// Run a live attendance session until Ctrl-C.
  Session {
    #[arg(long)]
    name:    String,
    /// Subject code (e.g. CS201) or id.
    #[arg(long)]
    subject: String,
  },
  /// Submit a code by hand.
  Mark { code: String },
  /// Read decoded codes line by line and submit the first one.
  Scan {
    /// Read from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

fn or_file(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_owned()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api = HttpApi::new(ApiConfig {
    base_url: or_file(args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8000".to_string()),
    username: or_file(args.user, &file_cfg.username).unwrap_or_default(),
    password: or_file(args.password, &file_cfg.password).unwrap_or_default(),
  })
  .context("building HTTP client")?;

  match args.command {
    Command::Subjects => {
      for s in api.list_subjects().await.context("listing subjects")? {
        println!("{}  {:<8} sem {}  {}", s.subject_id, s.subject_code, s.semester, s.name);
      }
      Ok(())
    }
    Command::Profile => {
      let profile = api.profile().await.context("fetching profile")?;
      println!("{} ({})", profile.user.email, profile.user.role);
      match profile.student_profile {
        Some(p) => println!(
          "{}  {}  {} semester {}",
          p.enrollment_number, p.full_name, p.department, p.semester
        ),
        None => println!("no student profile"),
      }
      Ok(())
    }
    Command::Session { name, subject } => run_session(api, &name, &subject).await,
    Command::Mark { code } => match api.mark_attendance(code.trim()).await {
      Ok(receipt) => {
        println!("Marked present for {} ({})", receipt.session_name, receipt.subject_name);
        Ok(())
      }
      Err(ClientError::Rejected(reason)) => bail!(reason.user_message()),
      Err(e) => Err(e).context("marking attendance"),
    },
    Command::Scan { input } => run_scan(api, input).await,
  }
}

// ─── session ──────────────────────────────────────────────────────────────────

async fn resolve_subject(api: &HttpApi, wanted: &str) -> Result<Subject> {
  let subjects = api.list_subjects().await.context("listing subjects")?;
  let by_id    = Uuid::parse_str(wanted).ok();
  subjects
    .into_iter()
    .find(|s| Some(s.subject_id) == by_id || s.subject_code.eq_ignore_ascii_case(wanted))
    .with_context(|| format!("no subject matches {wanted:?}"))
}

async fn run_session(api: HttpApi, name: &str, subject: &str) -> Result<()> {
  let subject    = resolve_subject(&api, subject).await?;
  let mut ctl    = SessionController::new(Arc::new(api), Arc::new(SystemClock));
  let mut view   = ctl.view();
  let session    = ctl.start(name, subject.subject_id).await.context("starting session")?;
  println!("Started {:?} for {} at {}", session.name, subject.name, session.start_time);
  println!("Press Ctrl-C to end the session.");

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);

  let mut shown = LiveView::default();
  loop {
    tokio::select! {
      signal = &mut ctrl_c => {
        signal.context("waiting for Ctrl-C")?;
        break;
      }
      changed = view.changed() => {
        if changed.is_err() {
          break;
        }
        let current = view.borrow_and_update().clone();
        print_changes(&shown, &current);
        shown = current;
      }
    }
  }

  let summary = ctl.stop().await.context("ending session")?;
  println!(
    "Session ended after {}s with {} present.",
    summary.duration_secs, summary.attended_count
  );
  Ok(())
}

fn print_changes(before: &LiveView, after: &LiveView) {
  let code_changed = before.code.as_ref().map(|c| &c.code) != after.code.as_ref().map(|c| &c.code);
  if let Some(code) = after.code.as_ref().filter(|_| code_changed) {
    println!("code {}  (valid {}s)", code.code, after.remaining_secs);
  }
  if after.expired && !before.expired {
    println!("code expired, refreshing…");
  }
  print_new_arrivals(&before.roster, &after.roster);
}

fn print_new_arrivals(before: &Roster, after: &Roster) {
  if after.total_count == before.total_count {
    return;
  }
  let skip = before.records.len().min(after.records.len());
  for entry in &after.records[skip..] {
    println!(
      "  + {} ({}) at {}",
      entry.student_name,
      entry.enrollment_number,
      entry.marked_at.format("%H:%M:%S")
    );
  }
  println!("{} present", after.total_count);
}

// ─── scan ─────────────────────────────────────────────────────────────────────

async fn run_scan(api: HttpApi, input: Option<PathBuf>) -> Result<()> {
  let cancel  = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      trigger.cancel();
    }
  });

  let outcome = match input {
    Some(path) => {
      let mut camera = LineCamera::open(&path).await?;
      scan_and_mark(&mut camera, &api, &cancel).await
    }
    None => scan_and_mark(&mut LineCamera::stdin(), &api, &cancel).await,
  };

  match outcome {
    Ok(receipt) => {
      println!("Marked present for {} ({})", receipt.session_name, receipt.subject_name);
      Ok(())
    }
    Err(ScanError::Cancelled) => Ok(()),
    Err(e) => bail!(e.to_string()),
  }
}
