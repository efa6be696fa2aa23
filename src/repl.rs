//! Interactive git-like shell on stdin.
//!
//! ```text
//! git clone https://github.com/apache/spark.git
//! git checkout branch-3.5
//! git branch
//! git log [page size]
//! exit
//! ```

use std::fmt::Write as _;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::history::SharedRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clone(String),
    Checkout(String),
    Branch,
    Log { page: i64, size: Option<i64> },
    Exit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command")]
    NotGit,

    #[error("Command invalid, see valid example below:\n$ {0}")]
    Usage(&'static str),

    #[error("Invalid command, valid commands: 'clone', 'checkout', 'branch' and 'log'")]
    Unknown,
}

/// Why the shell stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The user typed `exit`.
    Requested,
    /// Stdin closed.
    Eof,
}

const CLONE_USAGE: &str = "git clone https://github.com/apache/spark.git";
const CHECKOUT_USAGE: &str = "git checkout master";
const BRANCH_USAGE: &str = "git branch";
const LOG_USAGE: &str = "git log [page size]";

const NO_PROJECT: &str = "Please clone a project first.";

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let words: Vec<&str> = line.split_whitespace().collect();

    if words[..] == ["exit"] {
        return Ok(Command::Exit);
    }
    if words.len() < 2 || words[0] != "git" {
        return Err(CommandError::NotGit);
    }

    match (words[1], &words[2..]) {
        ("clone", [reference]) => Ok(Command::Clone(reference.to_string())),
        ("clone", _) => Err(CommandError::Usage(CLONE_USAGE)),
        ("checkout", [branch]) => Ok(Command::Checkout(branch.to_string())),
        ("checkout", _) => Err(CommandError::Usage(CHECKOUT_USAGE)),
        ("branch", []) => Ok(Command::Branch),
        ("branch", _) => Err(CommandError::Usage(BRANCH_USAGE)),
        ("log", []) => Ok(Command::Log { page: 1, size: None }),
        ("log", [page, size]) => match (page.parse::<i64>(), size.parse::<i64>()) {
            (Ok(page), Ok(size)) => Ok(Command::Log {
                page,
                size: Some(size),
            }),
            _ => Err(CommandError::Usage(LOG_USAGE)),
        },
        ("log", _) => Err(CommandError::Usage(LOG_USAGE)),
        _ => Err(CommandError::Unknown),
    }
}

/// Run one command and render its output.
pub async fn execute(registry: &SharedRegistry, command: Command) -> String {
    let has_project = matches!(registry.active(), Ok(Some(_)));

    match command {
        Command::Exit => String::new(),
        Command::Clone(reference) => {
            if registry.open_project(&reference).await {
                format!("Project started with URL: {}", reference)
            } else {
                format!("Failed starting project with URL: {}", reference)
            }
        }
        _ if !has_project => NO_PROJECT.to_string(),
        Command::Checkout(branch) => {
            if registry.checkout_branch(&branch).await {
                format!("Switched to branch '{}'", branch)
            } else {
                format!("Failed to check out branch: {}", branch)
            }
        }
        Command::Branch => {
            let current = registry
                .active()
                .ok()
                .flatten()
                .and_then(|project| project.current_branch().ok().flatten());

            let mut out = String::from("The list below shows the branch cached locally:");
            for branch in registry.list_branches() {
                if current.as_deref() == Some(branch.as_str()) {
                    let _ = write!(out, "\n[current] {}", branch);
                } else {
                    let _ = write!(out, "\n{}", branch);
                }
            }
            out
        }
        Command::Log { page, size } => {
            let size = size.unwrap_or_else(|| i64::try_from(registry.page_size()).unwrap_or(i64::MAX));
            match registry.get_page(page, size).await {
                Ok(commits) if commits.is_empty() => "No commits.".to_string(),
                Ok(commits) => {
                    let mut out = String::new();
                    for commit in commits {
                        let _ = write!(
                            out,
                            "sha: {}\nauthor: {}\ndate: {}\nmessage: {}\n\n-------------------------------\n\n",
                            commit.sha, commit.author, commit.date, commit.message
                        );
                    }
                    out.trim_end().to_string()
                }
                Err(e) => {
                    tracing::warn!("git log failed: {}", e);
                    format!("Error trying to retrieve commits: {}", e)
                }
            }
        }
    }
}

/// Read commands from stdin until `exit` or end of input.
pub async fn run(registry: SharedRegistry) -> anyhow::Result<ShellExit> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Program started!");
    println!("Insert your input:");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(Command::Exit) => return Ok(ShellExit::Requested),
            Ok(command) => println!("{}", execute(&registry, command).await),
            Err(e) => println!("{}", e),
        }
        println!("Insert your input:");
    }

    Ok(ShellExit::Eof)
}
