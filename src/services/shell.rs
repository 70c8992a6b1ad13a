//! # Shell command executor.
//!
//! Each cycle asks the service for pending commands, runs them one after the
//! other with the platform shell and replies with a [`ServerCommandResult`]:
//!
//! ```text
//! GET  {url}?status=pending            200 → [ServerCommand], otherwise none
//! for each command:
//!   sh -c <command>                    capture exit code, stdout, stderr, timing
//!   POST {url}{id}/result/             signed, retried, expect 201
//! ```
//!
//! A cancelled cycle token kills the running child.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::TaskError;
use crate::policies::RetryPolicy;
use crate::services::http::{ServiceClient, expect_status};
use crate::services::models::{ServerCommand, ServerCommandResult};
use crate::tasks::Task;

/// Runs remote-issued commands on this host.
pub struct ShellExecutor {
    client: ServiceClient,
    poll_timeout: Duration,
    reply_timeout: Duration,
    reply_retry: RetryPolicy,
}

impl ShellExecutor {
    pub fn new(
        client: ServiceClient,
        poll_timeout: Duration,
        reply_timeout: Duration,
        reply_retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            poll_timeout,
            reply_timeout,
            reply_retry,
        }
    }

    /// Fetches pending commands; a non-200 answer means "nothing to do".
    pub async fn poll(&self, ctx: &CancellationToken) -> Result<Vec<ServerCommand>, TaskError> {
        let url = format!("{}?status=pending", self.client.url());
        let resp = self.client.get(ctx, &url, self.poll_timeout).await?;
        if resp.status() != StatusCode::OK {
            warn!(status = %resp.status(), "command poll rejected");
            return Ok(Vec::new());
        }
        Ok(resp.json::<Vec<ServerCommand>>().await?)
    }

    async fn reply(
        &self,
        ctx: &CancellationToken,
        command: &ServerCommand,
        result: &ServerCommandResult,
    ) -> Result<(), TaskError> {
        let url = format!("{}{}/result/", self.client.url(), command.id);
        let payload = self.client.sign(result)?;
        let (client, url, payload, timeout) = (&self.client, url.as_str(), &payload, self.reply_timeout);
        self.reply_retry
            .run(ctx, "send command result", move |_| async move {
                let resp = client.post_payload(ctx, url, payload, timeout).await?;
                expect_status(resp, StatusCode::CREATED, "send command result").await?;
                Ok::<(), TaskError>(())
            })
            .await
    }
}

#[async_trait]
impl Task for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let commands = self.poll(&ctx).await?;
        let mut last_error = None;

        for command in &commands {
            info!(id = %command.id, user = %command.user_name, "executing command");
            let result = execute(&ctx, &command.command).await?;
            info!(id = %command.id, exit_code = result.exit_code, "command finished");

            match self.reply(&ctx, command, &result).await {
                Ok(()) => {}
                Err(TaskError::Canceled) => return Err(TaskError::Canceled),
                Err(e) => {
                    error!(id = %command.id, error = %e, "command result not delivered");
                    last_error = Some(e);
                }
            }
        }

        last_error.map_or(Ok(()), Err)
    }
}

fn shell(command: &str) -> Command {
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };
    #[cfg(not(windows))]
    let mut cmd = {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Runs `command` with the platform shell.
///
/// A command that cannot be started still yields a result (exit code `-1`,
/// the error on stderr) so the requester learns what happened.
pub async fn execute(
    ctx: &CancellationToken,
    command: &str,
) -> Result<ServerCommandResult, TaskError> {
    let start_date = Utc::now();
    let started = Instant::now();

    let output = match shell(command).spawn() {
        Ok(child) => tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(TaskError::Canceled),
            out = child.wait_with_output() => out,
        },
        Err(e) => Err(e),
    };

    let total_time = started.elapsed().as_secs_f64();
    let end_date = Utc::now();
    Ok(match output {
        Ok(out) => ServerCommandResult {
            start_date,
            end_date,
            total_time,
            exit_code: out.status.code().unwrap_or(-1),
            stdout: Some(String::from_utf8_lossy(&out.stdout).into_owned()),
            stderr: Some(String::from_utf8_lossy(&out.stderr).into_owned()),
        },
        Err(e) => ServerCommandResult {
            start_date,
            end_date,
            total_time,
            exit_code: -1,
            stdout: None,
            stderr: Some(e.to_string()),
        },
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::policies::BackoffPolicy;
    use crate::services::http::testing::{self, Captured};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const COMMAND_ID: &str = "6f1c1f5e-9a43-4a4e-8d0a-1d3f3c2b9e11";

    fn pending(command: &str) -> String {
        serde_json::json!([{
            "id": COMMAND_ID,
            "create_date": "2024-05-01T10:00:00Z",
            "channel_id": "C042",
            "server_id": "0b9a0c0e-2f7d-4d55-9a52-7a1f5d0f6c33",
            "user_id": "2c7e1a55-5b1e-4c1f-8f6a-3d2b1a0f9e44",
            "channel_name": "ops",
            "server_name": "web-01",
            "user_name": "dana",
            "query": "say hi",
            "command": command,
            "status": "pending",
            "notification_url": null
        }])
        .to_string()
    }

    fn executor(base: &str, attempts: u32) -> ShellExecutor {
        let client = ServiceClient::new("shell", format!("{base}/commands/"), testing::security()).unwrap();
        ShellExecutor::new(
            client,
            Duration::from_secs(5),
            Duration::from_secs(5),
            RetryPolicy::new(attempts, BackoffPolicy::constant(Duration::from_millis(10))),
        )
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let res = execute(&CancellationToken::new(), "echo out; echo err 1>&2; exit 3")
            .await
            .unwrap();
        assert_eq!(res.exit_code, 3);
        assert_eq!(res.stdout.as_deref(), Some("out\n"));
        assert_eq!(res.stderr.as_deref(), Some("err\n"));
        assert!(res.end_date >= res.start_date);
    }

    #[tokio::test]
    async fn cancellation_kills_the_command() {
        let ctx = CancellationToken::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let started = Instant::now();
        let err = execute(&ctx, "sleep 30").await.unwrap_err();
        assert!(matches!(err, TaskError::Canceled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn polls_executes_and_replies() {
        let body = pending("echo hello");
        let (base, mut rx) = testing::serve(move |req: &Captured| {
            if req.method == "GET" {
                (200, body.clone())
            } else {
                (201, "{}".into())
            }
        })
        .await;

        executor(&base, 3).run(CancellationToken::new()).await.unwrap();

        let poll = rx.recv().await.unwrap();
        assert_eq!(poll.path, "/commands/?status=pending");
        assert_eq!(poll.header("authorization"), Some("Bearer tok-1"));

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.path, format!("/commands/{COMMAND_ID}/result/"));
        assert!(reply.header("signature").is_some());
        let result: ServerCommandResult = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn rejected_poll_means_no_commands() {
        let (base, mut rx) = testing::serve(|_: &Captured| (503, "{}".into())).await;
        executor(&base, 3).run(CancellationToken::new()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().method, "GET");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reply_is_retried_then_fails_the_cycle() {
        let posts = Arc::new(AtomicU32::new(0));
        let seen = posts.clone();
        let body = pending("true");
        let (base, _rx) = testing::serve(move |req: &Captured| {
            if req.method == "GET" {
                (200, body.clone())
            } else {
                seen.fetch_add(1, Ordering::SeqCst);
                (500, r#"{"detail":"store failed"}"#.into())
            }
        })
        .await;

        let err = executor(&base, 2).run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("store failed"));
        assert_eq!(posts.load(Ordering::SeqCst), 2);
    }
}
