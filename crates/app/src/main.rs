use std::fmt;
use std::path::PathBuf;

use coach_core::model::{
    LearningStatus, NudgeId, QuestionResult, QuizQuestion, QuizSessionId, ResourceId,
};
use serde::Serialize;
use services::{
    AppConfig, AppServices, AppServicesError, Clock, LlmConfig, NudgeInboxError,
    QuizServiceError, ResourceServiceError,
};
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;
use tracing_subscriber::EnvFilter;

mod daemon;

use daemon::Schedules;

const DEFAULT_DB_URL: &str = "sqlite://coach.sqlite3";

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidLimit { raw: String },
    InvalidNudgeId { raw: String },
    InvalidStatus { raw: String },
    InvalidDbUrl { raw: String },
    InvalidHours { raw: String },
    InvalidSessionId { raw: String },
    InvalidIndex { raw: String },
    InvalidAnswer { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidNudgeId { raw } => write!(f, "invalid nudge id: {raw}"),
            ArgsError::InvalidStatus { raw } => write!(f, "invalid learning status: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidHours { raw } => write!(f, "invalid hours: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid quiz session id: {raw}"),
            ArgsError::InvalidIndex { raw } => write!(f, "invalid question index: {raw}"),
            ArgsError::InvalidAnswer { raw } => {
                write!(f, "invalid answer: {raw} (expected correct, incorrect or 0-100)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error(transparent)]
    Services(#[from] AppServicesError),
    #[error(transparent)]
    Inbox(#[from] NudgeInboxError),
    #[error(transparent)]
    Resource(#[from] ResourceServiceError),
    #[error(transparent)]
    Quiz(#[from] QuizServiceError),
    #[error(transparent)]
    Scheduler(#[from] JobSchedulerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  coach [--db <sqlite_url>] [--vault <dir>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  detect                       run abandonment detection now");
    eprintln!("  briefing                     print today's briefing");
    eprintln!("  nudges [--limit <n>]         list undelivered nudges, newest first");
    eprintln!("  deliver <nudge_id>...        mark nudges as delivered");
    eprintln!("  status <resource> <status>   change a resource's learning status");
    eprintln!("  hours <resource> <hours>     record study time against a resource");
    eprintln!("  quiz <resource> <question>...  start a recall quiz");
    eprintln!("  answer <session> <index> <correct|incorrect|0-100>");
    eprintln!("                               answer the next quiz question");
    eprintln!("  daemon                       run detection and briefing on a schedule");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COACH_DB_URL, COACH_VAULT_DIR, COACH_LOG");
    eprintln!("  COACH_AI_API_KEY, COACH_AI_BASE_URL, COACH_AI_MODEL");
    eprintln!("  COACH_DETECTION_SCHEDULE, COACH_BRIEFING_SCHEDULE");
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Detect,
    Briefing,
    Nudges { limit: Option<usize> },
    Deliver { ids: Vec<NudgeId> },
    Status {
        resource: ResourceId,
        status: LearningStatus,
    },
    Hours {
        resource: ResourceId,
        hours: f64,
    },
    Quiz {
        resource: ResourceId,
        questions: Vec<QuizQuestion>,
    },
    Answer {
        session: QuizSessionId,
        index: usize,
        result: QuestionResult,
    },
    Daemon,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    db_url: String,
    vault_dir: Option<PathBuf>,
    command: Command,
}

impl Args {
    /// Parse `argv` (without the program name). Flags may appear before or
    /// after the command; `defaults` carries values taken from the environment.
    fn parse(
        argv: impl IntoIterator<Item = String>,
        defaults: (String, Option<PathBuf>),
    ) -> Result<Self, ArgsError> {
        let (mut db_url, mut vault_dir) = defaults;
        let mut command: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();
        let mut limit: Option<usize> = None;

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--vault" => {
                    vault_dir = Some(PathBuf::from(require_value(&mut args, "--vault")?));
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    let parsed = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                    limit = Some(parsed);
                }
                "--help" | "-h" => command = Some("help".into()),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if command.is_none() => command = Some(arg),
                _ => positional.push(arg),
            }
        }

        let command = match command.as_deref() {
            None => return Err(ArgsError::MissingCommand),
            Some("help") => Command::Help,
            Some("detect") => Command::Detect,
            Some("briefing") => Command::Briefing,
            Some("nudges") => Command::Nudges { limit },
            Some("daemon") => Command::Daemon,
            Some("deliver") => {
                if positional.is_empty() {
                    return Err(ArgsError::MissingArgument { what: "nudge id" });
                }
                let ids = positional
                    .drain(..)
                    .map(|raw| {
                        raw.parse::<NudgeId>()
                            .map_err(|_| ArgsError::InvalidNudgeId { raw })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Command::Deliver { ids }
            }
            Some("status") => {
                let mut rest = positional.drain(..);
                let resource = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "resource id" })?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "status" })?;
                let status = raw
                    .parse::<LearningStatus>()
                    .map_err(|_| ArgsError::InvalidStatus { raw: raw.clone() })?;
                if let Some(extra) = rest.next() {
                    return Err(ArgsError::UnknownArg(extra));
                }
                Command::Status {
                    resource: ResourceId::new(resource),
                    status,
                }
            }
            Some("hours") => {
                let mut rest = positional.drain(..);
                let resource = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "resource id" })?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "hours" })?;
                let hours = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|h| h.is_finite() && *h >= 0.0)
                    .ok_or_else(|| ArgsError::InvalidHours { raw: raw.clone() })?;
                if let Some(extra) = rest.next() {
                    return Err(ArgsError::UnknownArg(extra));
                }
                Command::Hours {
                    resource: ResourceId::new(resource),
                    hours,
                }
            }
            Some("quiz") => {
                let mut rest = positional.drain(..);
                let resource = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "resource id" })?;
                let questions: Vec<QuizQuestion> = rest.map(QuizQuestion::recall).collect();
                if questions.is_empty() {
                    return Err(ArgsError::MissingArgument { what: "question" });
                }
                Command::Quiz {
                    resource: ResourceId::new(resource),
                    questions,
                }
            }
            Some("answer") => {
                let mut rest = positional.drain(..);
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "quiz session id" })?;
                let session = raw
                    .parse::<QuizSessionId>()
                    .map_err(|_| ArgsError::InvalidSessionId { raw: raw.clone() })?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "question index" })?;
                let index = raw
                    .parse::<usize>()
                    .map_err(|_| ArgsError::InvalidIndex { raw: raw.clone() })?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArgument { what: "answer" })?;
                let result = parse_answer(&raw)?;
                if let Some(extra) = rest.next() {
                    return Err(ArgsError::UnknownArg(extra));
                }
                Command::Answer {
                    session,
                    index,
                    result,
                }
            }
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = positional.into_iter().next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            vault_dir,
            command,
        })
    }
}

/// `correct`, `incorrect`, or a 0-100 partial credit (50 and up counts as correct).
fn parse_answer(raw: &str) -> Result<QuestionResult, ArgsError> {
    let invalid = || ArgsError::InvalidAnswer {
        raw: raw.to_string(),
    };
    match raw {
        "correct" => Ok(QuestionResult::correct()),
        "incorrect" => Ok(QuestionResult::incorrect()),
        credit => {
            let credit = credit.parse::<u8>().map_err(|_| invalid())?;
            QuestionResult::partial(credit >= 50, credit).map_err(|_| invalid())
        }
    }
}

fn env_defaults() -> (String, Option<PathBuf>) {
    let db_url = std::env::var("COACH_DB_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
    let vault_dir = std::env::var("COACH_VAULT_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    (db_url, vault_dir)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), AppError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("COACH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    // stdout carries JSON reports
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Delivered {
    marked: usize,
}

async fn run() -> Result<(), AppError> {
    let args = Args::parse(std::env::args().skip(1), env_defaults()).inspect_err(|e| {
        eprintln!("{e}");
        print_usage();
    })?;

    if args.command == Command::Help {
        print_usage();
        return Ok(());
    }

    prepare_sqlite_file(&args.db_url)?;
    let config = AppConfig {
        database_url: args.db_url,
        vault_dir: args.vault_dir,
        llm: LlmConfig::from_env(),
    };
    let services = AppServices::from_config(config, Clock::default_clock()).await?;

    match args.command {
        Command::Detect => print_json(&services.detection().run_now().await),
        Command::Briefing => print_json(&services.briefing().today().await),
        Command::Nudges { limit } => print_json(&services.inbox().pending(limit).await?),
        Command::Deliver { ids } => {
            let marked = services.inbox().mark_delivered(&ids).await?;
            print_json(&Delivered { marked })
        }
        Command::Status { resource, status } => {
            let record = services.resources().change_status(&resource, status).await?;
            print_json(&record)
        }
        Command::Hours { resource, hours } => {
            print_json(&services.resources().add_hours(&resource, hours).await?)
        }
        Command::Quiz {
            resource,
            questions,
        } => print_json(&services.quizzes().start_quiz(&resource, questions).await?),
        Command::Answer {
            session,
            index,
            result,
        } => print_json(&services.quizzes().answer(session, index, result).await?),
        Command::Daemon => Ok(daemon::run(&services, &Schedules::from_env()).await?),
        Command::Help => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(
            args.iter().map(ToString::to_string),
            (DEFAULT_DB_URL.to_string(), None),
        )
    }

    #[test]
    fn flags_may_surround_the_command() {
        let args = parse(&["--vault", "/notes", "nudges", "--limit", "3"]).unwrap();
        assert_eq!(args.command, Command::Nudges { limit: Some(3) });
        assert_eq!(args.vault_dir, Some(PathBuf::from("/notes")));
        assert_eq!(args.db_url, DEFAULT_DB_URL);
    }

    #[test]
    fn deliver_parses_every_id() {
        let args = parse(&["deliver", "4", "7"]).unwrap();
        assert_eq!(
            args.command,
            Command::Deliver {
                ids: vec![NudgeId::new(4), NudgeId::new(7)]
            }
        );
        assert_eq!(
            parse(&["deliver", "x"]).unwrap_err(),
            ArgsError::InvalidNudgeId { raw: "x".into() }
        );
        assert_eq!(
            parse(&["deliver"]).unwrap_err(),
            ArgsError::MissingArgument { what: "nudge id" }
        );
    }

    #[test]
    fn status_takes_resource_and_status() {
        let args = parse(&["status", "04_resources/rust.md", "paused"]).unwrap();
        assert_eq!(
            args.command,
            Command::Status {
                resource: ResourceId::new("04_resources/rust.md"),
                status: LearningStatus::Paused,
            }
        );
        assert_eq!(
            parse(&["status", "a.md", "sleeping"]).unwrap_err(),
            ArgsError::InvalidStatus {
                raw: "sleeping".into()
            }
        );
    }

    #[test]
    fn hours_takes_a_non_negative_amount() {
        let args = parse(&["hours", "04_resources/rust.md", "1.5"]).unwrap();
        assert_eq!(
            args.command,
            Command::Hours {
                resource: ResourceId::new("04_resources/rust.md"),
                hours: 1.5,
            }
        );
        assert_eq!(
            parse(&["hours", "a.md", "-2"]).unwrap_err(),
            ArgsError::InvalidHours { raw: "-2".into() }
        );
        assert_eq!(
            parse(&["hours", "a.md"]).unwrap_err(),
            ArgsError::MissingArgument { what: "hours" }
        );
    }

    #[test]
    fn quiz_collects_recall_questions() {
        let args = parse(&["quiz", "a.md", "What is a lifetime?", "What is Send?"]).unwrap();
        assert_eq!(
            args.command,
            Command::Quiz {
                resource: ResourceId::new("a.md"),
                questions: vec![
                    QuizQuestion::recall("What is a lifetime?"),
                    QuizQuestion::recall("What is Send?"),
                ],
            }
        );
        assert_eq!(
            parse(&["quiz", "a.md"]).unwrap_err(),
            ArgsError::MissingArgument { what: "question" }
        );
    }

    #[test]
    fn answer_accepts_words_and_partial_credit() {
        let session = QuizSessionId::generate();
        let id = session.to_string();
        let args = parse(&["answer", &id, "0", "correct"]).unwrap();
        assert_eq!(
            args.command,
            Command::Answer {
                session,
                index: 0,
                result: QuestionResult::correct(),
            }
        );

        let args = parse(&["answer", &id, "1", "70"]).unwrap();
        let Command::Answer { result, .. } = args.command else {
            panic!("expected answer command");
        };
        assert!(result.correct);
        assert_eq!(result.score(), 70);

        assert_eq!(
            parse(&["answer", &id, "1", "150"]).unwrap_err(),
            ArgsError::InvalidAnswer { raw: "150".into() }
        );
        assert_eq!(
            parse(&["answer", "nope", "0", "correct"]).unwrap_err(),
            ArgsError::InvalidSessionId { raw: "nope".into() }
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(parse(&[]).unwrap_err(), ArgsError::MissingCommand);
        assert_eq!(
            parse(&["purge"]).unwrap_err(),
            ArgsError::UnknownCommand("purge".into())
        );
        assert_eq!(
            parse(&["detect", "--verbose"]).unwrap_err(),
            ArgsError::UnknownArg("--verbose".into())
        );
        assert_eq!(
            parse(&["briefing", "extra"]).unwrap_err(),
            ArgsError::UnknownArg("extra".into())
        );
        assert_eq!(
            parse(&["nudges", "--limit"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--limit" }
        );
    }

    #[test]
    fn absolute_db_paths_become_urls() {
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/coach.db".into()),
            "sqlite:///tmp/coach.db"
        );
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
