use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};

use iq_agent::config::{DEFAULT_INTERVAL_SECS, DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS, ServiceKind};
use iq_agent::{ConfigValue, Configuration};

/// Writes or edits the iq-agent configuration file.
#[derive(Parser)]
#[command(name = "iq-agent-config", version, about)]
struct Args {
    /// Configuration file to create or update.
    #[arg(short, long, default_value = "/etc/iq-agent/agent.toml")]
    config: PathBuf,

    /// Assign `key=value` (dot-path key); repeatable. Skips the prompts.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    assignments: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = load_or_empty(&args.config)?;

    if args.assignments.is_empty() {
        prompt_all(&mut cfg)?;
    } else {
        for raw in &args.assignments {
            let (key, value) = split_assignment(raw)?;
            cfg.set(key, ConfigValue::parse_literal(value))
                .with_context(|| format!("cannot set `{key}`"))?;
        }
    }

    cfg.save(&args.config)?;
    println!("saved {}", args.config.display());
    Ok(())
}

fn load_or_empty(path: &Path) -> Result<Configuration> {
    if path.exists() {
        Ok(Configuration::load(path)?)
    } else {
        Ok(Configuration::new())
    }
}

fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("expected KEY=VALUE, got `{raw}`"),
    }
}

fn prompt_all(cfg: &mut Configuration) -> Result<()> {
    prompt_text(cfg, "agent.access_token", "Access token", None)?;
    prompt_text(cfg, "agent.client_id", "Client ID", None)?;
    prompt_secret(cfg, "agent.client_secret", "Client secret (base64 PEM)")?;
    prompt_text(cfg, "agent.logging.level", "Log level", Some("info"))?;

    for kind in ServiceKind::ALL {
        let enabled_key = kind.key("enabled");
        let current = cfg.get_bool(&enabled_key)?.unwrap_or(false);
        let enabled = Confirm::new()
            .with_prompt(format!("Enable {kind}?"))
            .default(current)
            .interact()?;
        cfg.set(&enabled_key, enabled)?;
        if !enabled {
            continue;
        }

        prompt_text(cfg, &kind.key("url"), &format!("{kind} URL"), None)?;
        prompt_number(cfg, &kind.key("interval"), "interval (s)", DEFAULT_INTERVAL_SECS)?;
        match kind {
            ServiceKind::Vitals => {
                prompt_number(cfg, &kind.key("timeout"), "timeout (s)", DEFAULT_TIMEOUT_SECS)?;
            }
            ServiceKind::Journald => {
                prompt_number(cfg, &kind.key("retries"), "retries", u64::from(DEFAULT_RETRIES))?;
                prompt_number(cfg, &kind.key("timeout"), "timeout (s)", DEFAULT_TIMEOUT_SECS)?;
            }
            ServiceKind::Shell => {
                let poll = kind.key("poll_timeout");
                let reply = kind.key("reply_timeout");
                let retries = kind.key("reply_retries");
                prompt_number(cfg, &poll, "poll timeout (s)", DEFAULT_TIMEOUT_SECS)?;
                prompt_number(cfg, &reply, "reply timeout (s)", DEFAULT_TIMEOUT_SECS)?;
                prompt_number(cfg, &retries, "reply retries", u64::from(DEFAULT_RETRIES))?;
            }
        }
    }
    Ok(())
}

fn prompt_text(
    cfg: &mut Configuration,
    key: &str,
    prompt: &str,
    fallback: Option<&str>,
) -> Result<()> {
    let current = cfg.get_str(key)?.or_else(|| fallback.map(str::to_string));
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(current) = current {
        input = input.default(current);
    }
    let value: String = input.interact_text()?;
    cfg.set(key, value.trim())?;
    Ok(())
}

fn prompt_secret(cfg: &mut Configuration, key: &str, prompt: &str) -> Result<()> {
    let keep = cfg.get_str(key)?.filter(|s| !s.is_empty()).is_some();
    let value = Password::new()
        .with_prompt(if keep {
            format!("{prompt} [leave empty to keep]")
        } else {
            prompt.to_string()
        })
        .allow_empty_password(keep)
        .interact()?;
    if !value.is_empty() {
        cfg.set(key, value.trim())?;
    }
    Ok(())
}

fn prompt_number(cfg: &mut Configuration, key: &str, label: &str, default: u64) -> Result<()> {
    let current = cfg
        .get_int(key)?
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(default);
    let value: u64 = Input::new()
        .with_prompt(format!("  {label}"))
        .default(current)
        .interact_text()?;
    cfg.set(key, value)?;
    Ok(())
}
