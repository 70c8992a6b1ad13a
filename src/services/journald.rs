//! # Journal monitor.
//!
//! Forwards journal entries of priority `err` or higher to the service.
//!
//! ```text
//! cycle 1:  journalctl --lines=1            → remember the tail cursor, send nothing
//! cycle n:  journalctl --priority=err --after-cursor=<cursor>
//!             ├─ skip entries without a non-empty MESSAGE
//!             ├─ skip messages repeated within this read
//!             └─ POST LogEvent{source="journald"} (retried), expect 201
//! ```
//!
//! The cursor advances past every entry read, delivered or not, so a failing
//! service never makes the monitor resend old entries. A message that recurs in
//! a later read (a new entry past the cursor) is sent again. The cycle fails if
//! any entry could not be delivered.

use std::collections::HashSet;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::TaskError;
use crate::policies::RetryPolicy;
use crate::services::http::{ServiceClient, expect_status};
use crate::services::models::{LogEvent, LogProperty};
use crate::tasks::Task;

const SOURCE: &str = "journald";

/// Where the next read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    /// After the entry with this cursor.
    Cursor(String),
    /// From this UNIX time (the journal was empty when we started).
    Since(i64),
}

/// Posts new error-level journal entries every cycle.
pub struct JournaldMonitor {
    client: ServiceClient,
    retry: RetryPolicy,
    timeout: Duration,
    program: OsString,
    base_args: Vec<OsString>,
    position: Mutex<Option<Position>>,
}

impl JournaldMonitor {
    pub fn new(client: ServiceClient, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            client,
            retry,
            timeout,
            program: OsString::from("journalctl"),
            base_args: Vec::new(),
            position: Mutex::new(None),
        }
    }

    /// Overrides the journal reader invocation (for example to read a
    /// different journal directory through a wrapper).
    pub fn with_command(
        mut self,
        program: impl Into<OsString>,
        base_args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        self.program = program.into();
        self.base_args = base_args.into_iter().map(Into::into).collect();
        self
    }

    async fn journalctl(&self, ctx: &CancellationToken, args: &[String]) -> Result<String, TaskError> {
        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TaskError::fail(format!("cannot run journalctl: {e}")))?;

        let out = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(TaskError::Canceled),
            out = child.wait_with_output() => out?,
        };
        if !out.status.success() {
            return Err(TaskError::fail(format!(
                "journalctl exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    async fn tail_position(&self, ctx: &CancellationToken) -> Result<Position, TaskError> {
        let args = ["--no-pager".to_string(), "--output=json".into(), "--lines=1".into()];
        let out = self.journalctl(ctx, &args).await?;
        Ok(parse_entries(&out)
            .iter()
            .rev()
            .find_map(cursor)
            .map(Position::Cursor)
            .unwrap_or_else(|| Position::Since(Utc::now().timestamp())))
    }

    async fn deliver(&self, ctx: &CancellationToken, event: &LogEvent) -> Result<(), TaskError> {
        let payload = self.client.sign(event)?;
        let (client, payload, timeout) = (&self.client, &payload, self.timeout);
        self.retry
            .run(ctx, "send log event", move |_| async move {
                let resp = client
                    .post_payload(ctx, client.url(), payload, timeout)
                    .await?;
                expect_status(resp, StatusCode::CREATED, "send log event").await?;
                Ok::<(), TaskError>(())
            })
            .await
    }
}

#[async_trait]
impl Task for JournaldMonitor {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut stored = self.position.lock().await;

        let Some(position) = stored.clone() else {
            let position = self.tail_position(&ctx).await?;
            debug!(?position, "journal positioned at tail");
            *stored = Some(position);
            return Ok(());
        };

        let out = self.journalctl(&ctx, &read_args(&position)).await?;
        let entries = parse_entries(&out);
        if let Some(c) = entries.iter().rev().find_map(cursor) {
            *stored = Some(Position::Cursor(c));
        }
        drop(stored);

        let mut seen = HashSet::new();
        let mut failed = 0usize;
        let mut last_error = None;
        for entry in &entries {
            let Some(message) = message(entry) else {
                continue;
            };
            if !seen.insert(message) {
                continue;
            }
            let event = to_log_event(entry, Utc::now());
            match self.deliver(&ctx, &event).await {
                Ok(()) => {}
                Err(TaskError::Canceled) => return Err(TaskError::Canceled),
                Err(e) => {
                    error!(error = %e, "journal entry not delivered");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            None => Ok(()),
            Some(e) => Err(TaskError::fail(format!(
                "{failed} journal entries not delivered, last error: {e}"
            ))),
        }
    }
}

fn read_args(position: &Position) -> Vec<String> {
    let mut args = vec![
        "--no-pager".to_string(),
        "--output=json".to_string(),
        "--priority=err".to_string(),
    ];
    match position {
        Position::Cursor(c) => args.push(format!("--after-cursor={c}")),
        Position::Since(secs) => args.push(format!("--since=@{secs}")),
    }
    args
}

/// One JSON object per line; unparsable lines are skipped.
fn parse_entries(output: &str) -> Vec<Map<String, Value>> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str::<Map<String, Value>>(l) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping unparsable journal line");
                None
            }
        })
        .collect()
}

fn cursor(entry: &Map<String, Value>) -> Option<String> {
    entry.get("__CURSOR").map(field_value)
}

fn message(entry: &Map<String, Value>) -> Option<String> {
    entry
        .get("MESSAGE")
        .map(field_value)
        .filter(|m| !m.is_empty())
}

/// Journal fields are strings, byte arrays (non-UTF-8 data) or arrays of
/// strings (repeated fields).
fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) if items.iter().all(Value::is_u64) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(Value::as_u64)
                .map(|b| b.min(u64::from(u8::MAX)) as u8)
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Value::Array(items) => items.iter().map(field_value).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

fn to_log_event(entry: &Map<String, Value>, now: DateTime<Utc>) -> LogEvent {
    let event_date = entry
        .get("__REALTIME_TIMESTAMP")
        .map(field_value)
        .and_then(|micros| micros.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .unwrap_or(now);

    LogEvent {
        event_date,
        source: SOURCE.to_string(),
        properties: entry
            .iter()
            .map(|(name, value)| LogProperty {
                name: name.to_lowercase(),
                value: field_value(value),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn converts_entry_to_log_event() {
        let e = entry(json!({
            "MESSAGE": "disk full",
            "PRIORITY": "3",
            "_PID": 812,
            "__REALTIME_TIMESTAMP": "1714557600000000",
        }));
        let ev = to_log_event(&e, Utc::now());
        assert_eq!(ev.source, "journald");
        assert_eq!(ev.event_date.timestamp(), 1_714_557_600);
        assert!(ev.properties.contains(&LogProperty {
            name: "message".into(),
            value: "disk full".into()
        }));
        assert!(ev.properties.contains(&LogProperty {
            name: "_pid".into(),
            value: "812".into()
        }));
    }

    #[test]
    fn byte_array_messages_are_decoded() {
        let e = entry(json!({ "MESSAGE": [104, 105] }));
        assert_eq!(message(&e).as_deref(), Some("hi"));
        assert_eq!(message(&entry(json!({ "MESSAGE": "" }))), None);
        assert_eq!(message(&entry(json!({ "PRIORITY": "3" }))), None);
    }

    #[test]
    fn read_args_follow_the_position() {
        let args = read_args(&Position::Cursor("s=abc;i=1".into()));
        assert!(args.contains(&"--priority=err".to_string()));
        assert!(args.contains(&"--after-cursor=s=abc;i=1".to_string()));
        let args = read_args(&Position::Since(1_700_000_000));
        assert!(args.contains(&"--since=@1700000000".to_string()));
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let out = "{\"MESSAGE\":\"a\",\"__CURSOR\":\"c1\"}\nnot json\n\n{\"MESSAGE\":\"b\",\"__CURSOR\":\"c2\"}\n";
        let entries = parse_entries(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().rev().find_map(cursor).as_deref(), Some("c2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn first_cycle_primes_then_forwards_unique_messages() {
        use crate::policies::BackoffPolicy;
        use crate::services::http::testing::{self, Captured};

        const FAKE_JOURNAL: &str = r#"cat <<'JSON'
{"__CURSOR":"c1","MESSAGE":"oom killer invoked","PRIORITY":"3"}
{"__CURSOR":"c2","MESSAGE":"oom killer invoked","PRIORITY":"3"}
{"__CURSOR":"c3","PRIORITY":"2"}
{"__CURSOR":"c4","MESSAGE":"fs read-only","PRIORITY":"2"}
JSON"#;

        let (base, mut rx) = testing::serve(|_: &Captured| (201, "{}".into())).await;
        let client = ServiceClient::new("journald", format!("{base}/logs/"), testing::security()).unwrap();
        let retry = RetryPolicy::new(2, BackoffPolicy::constant(Duration::from_millis(10)));
        let monitor = JournaldMonitor::new(client, retry, Duration::from_secs(5))
            .with_command("sh", ["-c", FAKE_JOURNAL, "journalctl"]);

        let ctx = CancellationToken::new();
        monitor.run(ctx.clone()).await.unwrap();
        assert!(rx.try_recv().is_err(), "priming must not send anything");

        monitor.run(ctx.clone()).await.unwrap();
        let first: LogEvent = serde_json::from_slice(&rx.recv().await.unwrap().body).unwrap();
        let second: LogEvent = serde_json::from_slice(&rx.recv().await.unwrap().body).unwrap();
        let messages: Vec<String> = [first, second]
            .iter()
            .filter_map(|ev| ev.properties.iter().find(|p| p.name == "message"))
            .map(|p| p.value.clone())
            .collect();
        assert_eq!(messages, vec!["oom killer invoked", "fs read-only"]);
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recurring_message_is_sent_again_in_a_later_cycle() {
        use crate::policies::BackoffPolicy;
        use crate::services::http::testing::{self, Captured};

        // Every read yields one new entry with the same message.
        const GROWING_JOURNAL: &str = r#"n=$(cat "$1" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$1"
printf '{"__CURSOR":"c%s","MESSAGE":"disk full","PRIORITY":"3"}\n' "$n""#;

        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("reads");
        let (base, mut rx) = testing::serve(|_: &Captured| (201, "{}".into())).await;
        let client = ServiceClient::new("journald", format!("{base}/logs/"), testing::security()).unwrap();
        let retry = RetryPolicy::new(1, BackoffPolicy::constant(Duration::from_millis(10)));
        let monitor = JournaldMonitor::new(client, retry, Duration::from_secs(5)).with_command(
            "sh",
            [
                OsString::from("-c"),
                OsString::from(GROWING_JOURNAL),
                OsString::from("journalctl"),
                counter.into_os_string(),
            ],
        );

        let ctx = CancellationToken::new();
        monitor.run(ctx.clone()).await.unwrap();
        monitor.run(ctx.clone()).await.unwrap();
        monitor.run(ctx).await.unwrap();

        let mut posted = Vec::new();
        while let Ok(req) = rx.try_recv() {
            posted.push(serde_json::from_slice::<LogEvent>(&req.body).unwrap());
        }
        assert_eq!(posted.len(), 2, "one post per cycle after priming");
        for ev in &posted {
            assert!(ev.properties.iter().any(|p| p.name == "message" && p.value == "disk full"));
        }
        let cursors: Vec<&str> = posted
            .iter()
            .filter_map(|ev| ev.properties.iter().find(|p| p.name == "__cursor"))
            .map(|p| p.value.as_str())
            .collect();
        assert_eq!(cursors, vec!["c2", "c3"]);
    }
}
