use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::doctor::{self, DoctorOptions};
use crate::commands::extract::{self, ExtractOptions};
use crate::commands::CommandReport;
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "history-chunker")]
#[command(version)]
#[command(about = "Extract bounded, month-bucketed chunks of a Letta agent's conversation history")]
pub struct Cli {
    /// Debug-level logging on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write one text chunk per (conversation, month) and print the manifest
    Extract(ExtractArgs),

    /// Check credentials, configuration and API reachability
    Doctor {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Agent to probe (defaults to LETTA_AGENT_ID)
        #[arg(long)]
        agent_id: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Directory for chunk files (default: a fresh temp directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Lookback window in months, counted back from the newest message
    #[arg(long)]
    pub months: Option<u32>,

    /// Most recently updated conversations to consider
    #[arg(long)]
    pub max_conversations: Option<usize>,

    /// Extractions allowed in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Agent whose history is extracted (defaults to LETTA_AGENT_ID)
    #[arg(long)]
    pub agent_id: Option<String>,

    /// Print the work plan without fetching messages or writing files
    #[arg(long)]
    pub dry_run: bool,
}

impl From<ExtractArgs> for ExtractOptions {
    fn from(args: ExtractArgs) -> Self {
        Self {
            output_dir: args.output_dir,
            months: args.months,
            max_conversations: args.max_conversations,
            concurrency: args.concurrency,
            agent_id: args.agent_id,
            dry_run: args.dry_run,
        }
    }
}

fn render_report(report: &CommandReport) -> String {
    let mut out = format!(
        "{}: {}\n",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        out.push_str(&format!("  - {detail}\n"));
    }
    for issue in &report.issues {
        out.push_str(&format!("  ! {issue}\n"));
    }
    out
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_report(report));
    }
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Command::Extract(args) => {
            let opts = ExtractOptions::from(args);
            let output = runtime.block_on(extract::run(&opts))?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Command::Doctor { json, agent_id } => {
            let opts = DoctorOptions { agent_id };
            let report = runtime.block_on(doctor::run(&opts))?;
            print_report(&report, json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, render_report};
    use crate::commands::CommandReport;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_extract_flags() {
        let cli = Cli::try_parse_from([
            "history-chunker",
            "extract",
            "--output-dir",
            "/tmp/out",
            "--months",
            "3",
            "--max-conversations",
            "5",
            "--concurrency",
            "2",
            "--agent-id",
            "agent-1",
            "--dry-run",
        ])
        .expect("parse");
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(args.months, Some(3));
        assert_eq!(args.max_conversations, Some(5));
        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.agent_id.as_deref(), Some("agent-1"));
        assert!(args.dry_run);
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["history-chunker", "doctor", "--json", "--verbose"])
            .expect("parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Doctor { json: true, .. }));
    }

    #[test]
    fn rejects_negative_months() {
        assert!(Cli::try_parse_from(["history-chunker", "extract", "--months", "-1"]).is_err());
    }

    #[test]
    fn text_report_lists_details_and_issues() {
        let mut report = CommandReport::new("doctor");
        report.detail("base_url=https://api.letta.com");
        report.issue("conversations: HTTP 401");
        let text = render_report(&report);
        assert!(text.starts_with("doctor: failed\n"));
        assert!(text.contains("  - base_url=https://api.letta.com\n"));
        assert!(text.contains("  ! conversations: HTTP 401\n"));
    }
}
