use crate::Context;
use crate::cli::ActionArgs;
use crate::commands::{find_service, load_services};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use dialoguer::Password;
use launchkit::{Action, ActionOptions, ActionResult, FailureKind};
use std::io::IsTerminal;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(ctx: &Context, action: Action, args: ActionArgs) -> Result<()> {
    let client = ctx.client()?;
    let services = load_services(ctx, &client).await?;
    let service = find_service(&client, &services, &args.label)?;

    let mut options = ActionOptions {
        dry_run: args.dry_run,
        password: None,
    };
    if args.password_stdin {
        options.password = Some(read_password_stdin().await?);
    }

    let mut result = client.perform_action(action, service, &options).await;

    if result.failure == Some(FailureKind::NeedsPassword)
        && options.password.is_none()
        && std::io::stdin().is_terminal()
    {
        let prompt = format!("Password to {} {}", action.as_str(), service.label);
        options.password = Some(prompt_password(prompt).await?);
        result = client.perform_action(action, service, &options).await;
    }

    report(&result, options.dry_run)
}

async fn read_password_stdin() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Empty password on stdin");
    }
    Ok(password)
}

async fn prompt_password(prompt: String) -> Result<String> {
    tokio::task::spawn_blocking(move || Password::new().with_prompt(prompt).interact())
        .await
        .context("Password prompt task failed")?
        .context("Failed to read password")
}

fn report(result: &ActionResult, dry_run: bool) -> Result<()> {
    if dry_run && result.success {
        ui::info("Dry run, nothing was executed");
        if let Some(command) = &result.command {
            println!("  {command}");
        }
        return Ok(());
    }

    if result.success {
        ui::success(&result.message);
        if let Some(info) = result.retry_info.as_ref().filter(|i| i.retried) {
            ui::dim(&format!("Succeeded after {} attempts", info.attempts));
        }
        return Ok(());
    }

    if let Some(error) = &result.error {
        ui::dim(error);
    }
    if let Some(hint) = result.failure.and_then(hint) {
        ui::dim(hint);
    }
    bail!("{}", result.message)
}

fn hint(kind: FailureKind) -> Option<&'static str> {
    match kind {
        FailureKind::Protected => Some("Protected services cannot be modified"),
        FailureKind::Permission | FailureKind::NeedsPassword => {
            Some("Run from a desktop session or pass --password-stdin")
        }
        FailureKind::Timeout => Some("launchd did not respond; try again shortly"),
        _ => None,
    }
}
