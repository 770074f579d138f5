//! gh-commander CLI
//!
//! The `gh` command line tool: access the GitHub API from a shell prompt
//! for things usually done in the browser, and automate tasks that are
//! tedious at best when done by clicking around on a web page.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{Read, Write};

use gh_commander::{
    auth,
    dataset::{self, Format},
    github::{api_host, ClientFactory, Session, UserProfile, DEFAULT_BASE_URL},
    reconcile::{reconcile, DesiredLabels, LabelStore, Outcome},
    Error, Result,
};

/// gh-commander CLI
#[derive(Parser)]
#[command(
    name = "gh",
    version,
    about = "Access the GitHub API and automate issue label management",
    long_about = "A command line tool to access the GitHub API from a shell prompt \
    for things usually done in the browser. Manages user account inspection and \
    issue label list/export/import across repositories."
)]
struct Cli {
    /// Be quiet (show only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Create extra verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Managing user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Managing issue labels
    Label {
        #[command(subcommand)]
        command: LabelCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Dump information about the logged-in or given user(s)
    Show { users: Vec<String> },
}

#[derive(Subcommand)]
enum LabelCommands {
    /// Dump labels within the given repo(s)
    #[command(alias = "ls")]
    List {
        /// Repositories as 'owner/repo', or bare names owned by you
        #[arg(required = true)]
        repos: Vec<String>,
    },

    /// Export labels of the given repo(s) to a file ('-' for stdout)
    Export {
        /// Dataset format (inferred from the file extension when omitted)
        #[arg(short = 'f', long, value_parser = parse_format)]
        format: Option<Format>,

        /// Repositories followed by the output file; an optional literal
        /// 'to' before the file is accepted
        #[arg(required = true)]
        args: Vec<String>,
    },

    /// Import labels into the given repo(s) from a file ('-' for stdin)
    Import {
        /// Dataset format (inferred from the file extension when omitted)
        #[arg(short = 'f', long, value_parser = parse_format)]
        format: Option<Format>,

        /// Repositories followed by the input file; an optional literal
        /// 'from' before the file is accepted
        #[arg(required = true)]
        args: Vec<String>,
    },
}

fn parse_format(value: &str) -> std::result::Result<Format, String> {
    value.parse::<Format>().map_err(|e| e.to_string())
}

/// Console output helper: banners and notes go to stderr so that data
/// written to stdout stays clean for piping
struct Console {
    quiet: bool,
    verbose: bool,
}

impl Console {
    fn banner(&self, text: &str) {
        if !self.quiet {
            eprintln!("{}", format!("⎇  {}", text).white().on_blue().bold());
        }
    }

    fn note(&self, text: &str) {
        if !self.quiet {
            eprintln!("{}", text.cyan());
        }
    }

    fn soft_error(&self, text: &str) {
        eprintln!("{}", text.white().on_red().bold());
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}", e.to_string().white().on_red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let console = Console {
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::User {
            command: UserCommands::Show { users },
        } => run_user_show(&console, users).await,

        Commands::Label { command } => match command {
            LabelCommands::List { repos } => run_label_list(&console, repos).await,
            LabelCommands::Export { format, args } => {
                run_label_export(&console, format, args).await
            }
            LabelCommands::Import { format, args } => {
                run_label_import(&console, format, args).await
            }
        },
    }
}

/// Open an authenticated session against the default API host
async fn open_session(factory: &mut ClientFactory) -> Result<Session> {
    let credentials = auth::resolve_credentials(&api_host(DEFAULT_BASE_URL))?;
    factory.session(&credentials, DEFAULT_BASE_URL).await
}

/// Execute `user show`
async fn run_user_show(console: &Console, users: Vec<String>) -> Result<()> {
    let mut factory = ClientFactory::new();
    let session = open_session(&mut factory).await?;

    let targets: Vec<Option<String>> = if users.is_empty() {
        vec![None]
    } else {
        users.into_iter().map(Some).collect()
    };

    for (idx, username) in targets.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        match session.user_profile(username.as_deref()).await {
            Ok(profile) => print_profile(&profile),
            Err(e) if !e.is_fatal() => {
                let who = username.as_deref().unwrap_or(session.login());
                console.soft_error(&format!("Unknown user '{}' ({})", who, e));
            }
            Err(e) => return Err(e),
        }
    }

    show_rate_limit(console, &session).await;
    Ok(())
}

/// Dump one account profile to stdout
fn print_profile(profile: &UserProfile) {
    let count = |value: Option<u64>| {
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    };

    println!(
        "ACCOUNT     {} [{} / {} #{}]",
        profile.name.as_deref().unwrap_or("n/a"),
        profile.login.cyan(),
        profile.account_type,
        profile.id
    );
    println!(
        "SINCE/LAST  {} / {}",
        profile.created_at.format("%Y-%m-%d %H:%M:%S"),
        profile.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("URL         {}", profile.html_url);
    if let Some(email) = &profile.email {
        println!("EMAIL       {}", email);
    }
    if let Some(location) = &profile.location {
        println!("LOCATION    {}", location);
    }
    println!(
        "REPOS/GISTS {} public / {} private / {} public gists / {} private gists",
        profile.public_repos,
        count(profile.total_private_repos),
        profile.public_gists,
        count(profile.private_gists)
    );
    println!(
        "STATS       {} followers / {} following / {} KB used",
        profile.followers,
        profile.following,
        count(profile.disk_usage)
    );
}

/// Execute `label list`
async fn run_label_list(console: &Console, repos: Vec<String>) -> Result<()> {
    let mut factory = ClientFactory::new();
    let session = open_session(&mut factory).await?;

    for (idx, spec) in repos.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let repo = session.repo(spec)?;
        match repo.list_labels().await {
            Ok(mut labels) => {
                labels.sort_by(|a, b| a.name.cmp(&b.name));
                println!(
                    "{}",
                    format!("⎇  {}", repo.full_name()).white().on_blue().bold()
                );
                println!("{}", label_table(&labels));
            }
            Err(Error::RepositoryNotFound(_)) => {
                console.soft_error(&format!("Non-existing repo '{}'!", repo.full_name()));
            }
            Err(e) if !e.is_fatal() => console.soft_error(&e.to_string()),
            Err(e) => return Err(e),
        }
    }

    show_rate_limit(console, &session).await;
    Ok(())
}

/// Render labels as a terminal table
fn label_table(labels: &[gh_commander::Label]) -> tabled::Table {
    #[derive(tabled::Tabled)]
    struct LabelRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Color")]
        color: String,
    }

    let rows: Vec<LabelRow> = labels
        .iter()
        .map(|label| LabelRow {
            name: label.name.clone(),
            color: format!("#{}", label.color),
        })
        .collect();

    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    table
}

/// Execute `label export`
async fn run_label_export(
    console: &Console,
    format: Option<Format>,
    args: Vec<String>,
) -> Result<()> {
    let (repos, outfile) = split_target_args(args, "to")?;
    let format = Format::resolve(format, &outfile)?;

    let mut factory = ClientFactory::new();
    let session = open_session(&mut factory).await?;

    let mut records: Vec<dataset::Record> = Vec::new();
    for spec in &repos {
        let repo = session.repo(spec)?;
        console.banner(&repo.full_name());
        match repo.list_labels().await {
            Ok(mut labels) => {
                labels.sort_by(|a, b| a.name.cmp(&b.name));
                for label in labels {
                    records.push((label.name, format!("#{}", label.color)));
                }
            }
            Err(Error::RepositoryNotFound(_)) => {
                console.soft_error(&format!("Non-existing repo '{}'!", repo.full_name()));
            }
            Err(e) if !e.is_fatal() => console.soft_error(&e.to_string()),
            Err(e) => return Err(e),
        }
    }

    let bytes = dataset::encode(&records, format)?;
    write_output(&outfile, &bytes)?;

    if outfile != "-" {
        console.note(&format!(
            "{} labels written to '{}' as {}",
            records.len(),
            outfile,
            format
        ));
    }

    show_rate_limit(console, &session).await;
    Ok(())
}

/// Execute `label import`
async fn run_label_import(
    console: &Console,
    format: Option<Format>,
    args: Vec<String>,
) -> Result<()> {
    let (repos, infile) = split_target_args(args, "from")?;
    let format = Format::resolve(format, &infile)?;

    // Decode and validate before any network access: invalid input must
    // not partially apply.
    let bytes = read_input(&infile)?;
    let records = dataset::decode(&bytes, format)?;
    let desired = DesiredLabels::from_records(records)?;

    for note in desired.notes() {
        console.note(&format!(
            "Duplicate label '{}' in input, using #{} instead of #{}",
            note.name, note.new_color, note.old_color
        ));
    }

    let mut factory = ClientFactory::new();
    let session = open_session(&mut factory).await?;

    for spec in &repos {
        let repo = session.repo(spec)?;
        console.banner(&repo.full_name());
        let outcome = reconcile(&repo, &desired).await;
        render_outcome(console, &outcome);
    }

    show_rate_limit(console, &session).await;
    Ok(())
}

/// Render one reconciliation outcome to the console
fn render_outcome(console: &Console, outcome: &Outcome) {
    if !outcome.repo_found {
        console.soft_error(&format!("Non-existing repo '{}'!", outcome.repo));
        return;
    }

    if !outcome.has_changes() {
        println!("{}: no changes", outcome.repo);
    } else {
        for label in &outcome.created {
            println!(
                "{}: created label '{}' with #{}",
                outcome.repo,
                label.name.green(),
                label.color
            );
        }
        for update in &outcome.updated {
            println!(
                "{}: updated label '{}' from #{} to #{}",
                outcome.repo,
                update.name.yellow(),
                update.old_color,
                update.new_color
            );
        }
        for failure in &outcome.failed {
            console.soft_error(&format!(
                "{}: failed to {} label '{}' ({})",
                outcome.repo, failure.action, failure.name, failure.reason
            ));
        }
    }

    if !outcome.unique_existing.is_empty() {
        println!(
            "{}: unique labels: {}",
            outcome.repo,
            outcome.unique_existing.join(", ")
        );
    }
}

/// Split trailing file argument off the repository list
///
/// The literal `keyword` (`to` / `from`) before the file is accepted and
/// skipped, mirroring the fluent CLI of the original tool.
fn split_target_args(mut args: Vec<String>, keyword: &str) -> Result<(Vec<String>, String)> {
    if args.len() < 2 {
        return Err(Error::usage(format!(
            "Expected at least one repository and a file (e.g. 'owner/repo {} labels.yaml')",
            keyword
        )));
    }

    let file = args.pop().unwrap_or_default();
    if args.last().map(String::as_str) == Some(keyword) {
        args.pop();
    }
    if args.is_empty() {
        return Err(Error::usage("No target repositories given"));
    }

    Ok((args, file))
}

fn read_input(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().lock().read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        Ok(std::fs::read(source)?)
    }
}

fn write_output(target: &str, bytes: &[u8]) -> Result<()> {
    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()?;
        Ok(())
    } else {
        std::fs::write(target, bytes).map_err(|source| Error::WriteFile {
            path: target.to_string(),
            source,
        })
    }
}

/// Show remaining API calls, color-coded as they run low
///
/// Near-exhaustion is cosmetic only; nothing hard-stops on a drained
/// call budget.
async fn show_rate_limit(console: &Console, session: &Session) {
    if !console.verbose {
        return;
    }
    if let Ok(rate) = session.rate_limit().await {
        let remaining = rate.remaining.to_string();
        let styled = if rate.remaining == 0 {
            remaining.red().bold()
        } else if rate.remaining < rate.limit / 10 {
            remaining.yellow()
        } else {
            remaining.green()
        };
        eprintln!(
            "{} of {} API calls remaining (resets at {})",
            styled,
            rate.limit,
            rate.reset_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_target_args_with_keyword() {
        let (repos, file) =
            split_target_args(strings(&["owner/repo", "to", "labels.yaml"]), "to").unwrap();
        assert_eq!(repos, strings(&["owner/repo"]));
        assert_eq!(file, "labels.yaml");
    }

    #[test]
    fn test_split_target_args_without_keyword() {
        let (repos, file) =
            split_target_args(strings(&["one", "two", "labels.csv"]), "to").unwrap();
        assert_eq!(repos, strings(&["one", "two"]));
        assert_eq!(file, "labels.csv");
    }

    #[test]
    fn test_split_target_args_dash_target() {
        let (repos, file) = split_target_args(strings(&["waif", "-"]), "to").unwrap();
        assert_eq!(repos, strings(&["waif"]));
        assert_eq!(file, "-");
    }

    #[test]
    fn test_split_target_args_too_few() {
        assert!(split_target_args(strings(&["labels.yaml"]), "to").is_err());
        assert!(split_target_args(Vec::new(), "from").is_err());
    }

    #[test]
    fn test_split_target_args_keyword_only_repo_missing() {
        let result = split_target_args(strings(&["to", "labels.yaml"]), "to");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_format_values() {
        assert_eq!(parse_format("yaml").unwrap(), Format::Yaml);
        assert_eq!(parse_format("JSON").unwrap(), Format::Json);
        assert!(parse_format("bogus").is_err());
    }

    #[test]
    fn test_render_outcome_does_not_panic() {
        use gh_commander::reconcile::{Action, CallFailure, LabelUpdate};

        let console = Console {
            quiet: true,
            verbose: false,
        };

        let mut outcome = Outcome::new("owner/repo");
        render_outcome(&console, &outcome);

        outcome.created.push(gh_commander::Label::new("a", "111111"));
        outcome.updated.push(LabelUpdate {
            name: "b".to_string(),
            old_color: "222222".to_string(),
            new_color: "333333".to_string(),
        });
        outcome.failed.push(CallFailure {
            action: Action::Create,
            name: "c".to_string(),
            reason: "boom".to_string(),
        });
        outcome.unique_existing.push("d".to_string());
        render_outcome(&console, &outcome);

        outcome.repo_found = false;
        render_outcome(&console, &outcome);
    }
}
