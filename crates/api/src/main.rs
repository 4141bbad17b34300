//! `slotflow` command line entry point
//!
//! ```text
//! slotflow update --user <ID> [--premium] [--input <FILE>]
//! slotflow show <WORKFLOW_ID>
//! slotflow health
//! ```
//!
//! `update` reads a JSON workflow update from `--input` or stdin and prints
//! the reloaded workflow plus the reconcile report as JSON.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use slotflow_core::ActingUser;
use slotflow_domain::WorkflowUpdate;
use slotflow_lib::commands::{get_workflow, update_workflow};
use slotflow_lib::utils::logging::{init_tracing, LogFormat};
use slotflow_lib::AppContext;

const USAGE: &str = "usage:
  slotflow update --user <ID> [--premium] [--input <FILE>]
  slotflow show <WORKFLOW_ID>
  slotflow health";

enum Command {
    Update { user: ActingUser, input: Option<PathBuf> },
    Show { id: i64 },
    Health,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        bail!("missing command\n{USAGE}");
    };

    match command.as_str() {
        "update" => {
            let mut user_id: Option<i64> = None;
            let mut is_premium = false;
            let mut input: Option<PathBuf> = None;
            let mut rest = args[1..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--user" => {
                        let value = rest.next().ok_or_else(|| anyhow!("--user needs a value"))?;
                        user_id = Some(value.parse().with_context(|| format!("bad user id {value}"))?);
                    }
                    "--premium" => is_premium = true,
                    "--input" => {
                        let value = rest.next().ok_or_else(|| anyhow!("--input needs a value"))?;
                        input = Some(PathBuf::from(value));
                    }
                    other => bail!("unknown argument {other}\n{USAGE}"),
                }
            }
            let id = user_id.ok_or_else(|| anyhow!("--user is required\n{USAGE}"))?;
            Ok(Command::Update { user: ActingUser { id, is_premium }, input })
        }
        "show" => {
            let value = args.get(1).ok_or_else(|| anyhow!("missing workflow id\n{USAGE}"))?;
            let id = value.parse().with_context(|| format!("bad workflow id {value}"))?;
            Ok(Command::Show { id })
        }
        "health" => Ok(Command::Health),
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}

fn read_update(input: Option<PathBuf>) -> Result<WorkflowUpdate> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("invalid workflow update JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    let ctx = AppContext::new().context("failed to initialise application context")?;

    match command {
        Command::Update { user, input } => {
            let update = read_update(input)?;
            let outcome = update_workflow(&ctx, user, update).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Show { id } => {
            let workflow = get_workflow(&ctx, id).await?;
            println!("{}", serde_json::to_string_pretty(&workflow)?);
        }
        Command::Health => {
            ctx.health_check()?;
            println!("ok");
        }
    }

    Ok(())
}
