//! `markcheck` command-line interface.
//!
//! ```text
//! markcheck check README.md
//! markcheck check notes.md --lang en-GB --json --disable sentence-length
//! markcheck render README.md
//! markcheck rules
//! markcheck note add --title "Exam prep" notes.md
//! markcheck note list
//! markcheck note check 1
//! markcheck note render 1
//! ```
//!
//! Notes only outlive the process with `storage.backend: redb` configured.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use markcheck::{
    AnalysisOutcome, AnalysisRequest, AnalysisResponse, ErrorResponse, MarkcheckConfig, NewNote,
    NoteError, RuleConfig, RuleKind, init_tracing,
};

#[derive(Debug, Parser)]
#[command(name = "markcheck", version, about = "Grammar and style checks for Markdown")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, env = "MARKCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a Markdown file and print findings.
    Check {
        file: PathBuf,
        /// Language tag of the document; defaults to the configured language.
        #[arg(long)]
        lang: Option<String>,
        /// Disable a rule for this run. May be repeated.
        #[arg(long = "disable", value_name = "RULE")]
        disable: Vec<String>,
        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Render a Markdown file to HTML.
    Render { file: PathBuf },
    /// List the built-in rules.
    Rules,
    /// Manage stored notes.
    Note {
        #[command(subcommand)]
        action: NoteCommand,
    },
}

#[derive(Debug, Subcommand)]
enum NoteCommand {
    /// Store a Markdown file as a note and print its id.
    Add {
        #[arg(long)]
        title: String,
        file: PathBuf,
    },
    /// List stored notes.
    List,
    /// Check a stored note and print findings.
    Check {
        id: u64,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Render a stored note to HTML.
    Render { id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MarkcheckConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MarkcheckConfig::default(),
    };
    init_tracing(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Command::Check {
            file,
            lang,
            disable,
            json,
        } => check(&config, file, lang, disable, json).await,
        Command::Render { file } => {
            let markdown = read(&file)?;
            let coordinator = config.build_coordinator()?;
            print!("{}", coordinator.render_html(&markdown));
            Ok(ExitCode::SUCCESS)
        }
        Command::Rules => {
            for kind in RuleKind::ALL {
                println!("{}", kind.id());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Note { action } => note(&config, action).await,
    }
}

async fn note(config: &MarkcheckConfig, action: NoteCommand) -> anyhow::Result<ExitCode> {
    let notebook = config.build_notebook()?;
    let result = match action {
        NoteCommand::Add { title, file } => {
            let content = read(&file)?;
            notebook.create(NewNote::new(title, content)).await.map(|note| {
                println!("{}", note.id);
            })
        }
        NoteCommand::List => notebook.list().await.map(|notes| {
            for note in notes {
                println!("{}\t{}\t{}", note.id, note.created_at.to_rfc3339(), note.title);
            }
        }),
        NoteCommand::Check { id, lang, json } => {
            return match notebook.analyze(id, lang, None).await {
                Ok(outcome) => report(&format!("note {id}"), outcome, json),
                Err(NoteError::Analysis(err)) if json => {
                    println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
                    Ok(ExitCode::from(2))
                }
                Err(err) => {
                    eprintln!("note {id}: {err} [{}]", err.code());
                    Ok(ExitCode::from(2))
                }
            };
        }
        NoteCommand::Render { id } => notebook.render_html(id).await.map(|html| {
            print!("{html}");
        }),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{err} [{}]", err.code());
            Ok(ExitCode::from(2))
        }
    }
}

async fn check(
    config: &MarkcheckConfig,
    file: PathBuf,
    lang: Option<String>,
    disable: Vec<String>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let markdown = read(&file)?;
    let coordinator = config.build_coordinator()?;

    let language = lang.unwrap_or_else(|| config.normalize.default_language.clone());
    let mut request = AnalysisRequest::new(markdown, language);
    if !disable.is_empty() {
        let overrides = disable.into_iter().fold(RuleConfig::new(), RuleConfig::disable);
        request = request.with_rule_config(overrides);
    }

    let outcome = match coordinator.analyze(request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
            } else {
                eprintln!("{}: {err} [{}]", file.display(), err.code());
            }
            return Ok(ExitCode::from(2));
        }
    };

    report(&file.display().to_string(), outcome, json)
}

/// Print an outcome; exit code 1 when there are findings.
fn report(label: &str, outcome: AnalysisOutcome, json: bool) -> anyhow::Result<ExitCode> {
    let has_findings = !outcome.findings.is_empty();
    if json {
        let response = AnalysisResponse::from(outcome);
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        for finding in &outcome.findings {
            println!("{label}: {}", finding.describe());
        }
        for warning in &outcome.warnings {
            eprintln!("{label}: warning: {warning}");
        }
    }

    Ok(if has_findings {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
