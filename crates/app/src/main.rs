use std::fmt;
use std::io::Read;

use reading_core::model::{NewSession, SessionId, StudentKey};
use serde_json::Value;
use services::{Clock, SessionStore, StoreInitError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidKey { raw: String },
    InvalidJson { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unexpected argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidKey { raw } => {
                write!(f, "invalid student key {raw:?} (expected name::school)")
            }
            ArgsError::InvalidJson { raw } => write!(f, "invalid JSON value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    what: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { what })
}

fn parse_key(raw: String) -> Result<StudentKey, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidKey { raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  reading students");
    eprintln!("  reading student  <key>");
    eprintln!("  reading sessions <key>");
    eprintln!("  reading append   <file|->");
    eprintln!("  reading evaluate <key> <session-id> <json>");
    eprintln!("  reading key      <name> [school]");
    eprintln!();
    eprintln!("Keys look like `name::school`, lowercased and trimmed.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  READING_DB_URL, READING_DB_AUTH, READING_DB_ROOT");
    eprintln!("  READING_AUDIO_MODE (inline|blob), READING_AUDIO_FOLDER");
    eprintln!("  READING_STORAGE_BUCKET, READING_STORAGE_URL, READING_HTTP_TIMEOUT_SECS");
    eprintln!("  RUST_LOG");
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Students,
    Student(StudentKey),
    Sessions(StudentKey),
    Append { source: String },
    Evaluate {
        key: StudentKey,
        session: SessionId,
        evaluation: Value,
    },
    Key { name: String, school: Option<String> },
    Help,
}

impl Command {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let Some(cmd) = args.next() else {
            return Ok(Self::Help);
        };

        let command = match cmd.as_str() {
            "--help" | "-h" | "help" => Self::Help,
            "students" => Self::Students,
            "student" => Self::Student(parse_key(require_value(&mut args, "<key>")?)?),
            "sessions" => Self::Sessions(parse_key(require_value(&mut args, "<key>")?)?),
            "append" => Self::Append {
                source: require_value(&mut args, "<file|->")?,
            },
            "evaluate" => {
                let key = parse_key(require_value(&mut args, "<key>")?)?;
                let session = SessionId::new(require_value(&mut args, "<session-id>")?);
                let raw = require_value(&mut args, "<json>")?;
                let evaluation = serde_json::from_str(&raw)
                    .map_err(|_| ArgsError::InvalidJson { raw: raw.clone() })?;
                Self::Evaluate {
                    key,
                    session,
                    evaluation,
                }
            }
            "key" => Self::Key {
                name: require_value(&mut args, "<name>")?,
                school: args.next(),
            },
            _ => return Err(ArgsError::UnknownCommand(cmd)),
        };

        match args.next() {
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
            None => Ok(command),
        }
    }
}

fn read_source(source: &str) -> std::io::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source)
    }
}

fn open_store() -> Result<SessionStore, StoreInitError> {
    match SessionStore::from_env(Clock::default_clock()) {
        Ok(store) => Ok(store),
        Err(StoreInitError::MissingConfig(var)) => {
            warn!(var, "session store not configured; running disabled");
            Ok(SessionStore::disabled())
        }
        Err(err) => Err(err),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let command = Command::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Key derivation is pure; no store needed.
    match &command {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Key { name, school } => {
            println!("{}", StudentKey::derive(name, school.as_deref()));
            return Ok(());
        }
        _ => {}
    }

    let store = open_store()?;
    match command {
        Command::Students => print_json(&store.list_students().await?)?,
        Command::Student(key) => print_json(&store.get_student(&key).await?)?,
        Command::Sessions(key) => print_json(&store.list_sessions(&key).await?)?,
        Command::Append { source } => {
            let session: NewSession = serde_json::from_str(&read_source(&source)?)?;
            print_json(&store.append_session(session).await?)?;
        }
        Command::Evaluate {
            key,
            session,
            evaluation,
        } => print_json(&store.set_evaluation(&key, &session, evaluation).await?)?,
        Command::Help | Command::Key { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
