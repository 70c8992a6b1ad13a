//! # Vitals reporter.
//!
//! Each cycle takes a snapshot of the host (system, boot time, CPU, memory,
//! swap, disks, network, installed packages), wraps the JSON document in a
//! [`VitalsEvent`] and posts it to the service. Anything but `201 Created`
//! fails the cycle.
//!
//! Host metrics are sampled on the blocking pool (CPU usage needs two
//! samples). Package managers run as child processes bounded by the service
//! timeout and the cycle token; a hung one is killed and reported in the
//! document instead of stalling the runner.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::services::http::{ServiceClient, expect_status};
use crate::services::models::VitalsEvent;
use crate::tasks::Task;

/// Posts a host snapshot every cycle.
pub struct VitalsMonitor {
    client: ServiceClient,
    timeout: Duration,
}

impl VitalsMonitor {
    pub fn new(client: ServiceClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Task for VitalsMonitor {
    fn name(&self) -> &str {
        "vitals"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut vitals = tokio::task::spawn_blocking(collect_vitals)
            .await
            .map_err(|e| TaskError::fail(format!("vitals collection aborted: {e}")))?;
        vitals.extend(collect_packages(&ctx, self.timeout).await?);
        let event = VitalsEvent {
            vitals: serde_json::to_string_pretty(&vitals)?,
        };

        let resp = self
            .client
            .post_signed(&ctx, self.client.url(), &event, self.timeout)
            .await?;
        expect_status(resp, StatusCode::CREATED, "send vitals").await?;
        debug!(bytes = event.vitals.len(), "vitals delivered");
        Ok(())
    }
}

/// Renders a byte count with binary units: `1536` → `1.50KB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["", "K", "M", "G", "T", "P", "E"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2}{}B", UNITS[unit])
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        ((part as f64 / total as f64) * 1000.0).round() / 10.0
    }
}

const PACKAGE_MANAGERS: [(&str, &str); 3] = [
    ("pip", "python_packages"),
    ("dpkg", "deb_packages"),
    ("rpm", "rpm_packages"),
];

/// Collects the host metrics (everything but package lists).
pub fn collect_vitals() -> Map<String, Value> {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_all();
    sys.refresh_memory();

    let mut doc = Map::new();
    doc.insert("system_info".into(), system_info());
    doc.insert("boot_time".into(), boot_time());
    doc.insert("cpu_info".into(), cpu_info(&sys));
    doc.insert("memory_info".into(), memory_info(&sys));
    doc.insert("swap_info".into(), swap_info(&sys));
    doc.insert("disk_info".into(), disk_info());
    doc.insert("network_info".into(), network_info());
    doc
}

/// Lists installed packages of every package manager found on the host.
///
/// Each command gets at most `limit` (zero means no limit). Only
/// cancellation fails the call; other listing errors land in the document.
pub async fn collect_packages(
    ctx: &CancellationToken,
    limit: Duration,
) -> Result<Map<String, Value>, TaskError> {
    let mut doc = Map::new();
    for (command, key) in PACKAGE_MANAGERS {
        match command_output(ctx, command, &["--version"], limit).await {
            Ok(out) if out.status.success() => {}
            Err(TaskError::Canceled) => return Err(TaskError::Canceled),
            _ => continue,
        }
        doc.insert(key.into(), installed_packages(ctx, command, limit).await?);
    }
    Ok(doc)
}

fn system_info() -> Value {
    json!({
        "system": System::name().unwrap_or_default(),
        "node_name": System::host_name().unwrap_or_default(),
        "release": System::kernel_version().unwrap_or_default(),
        "version": System::long_os_version().unwrap_or_default(),
        "machine": std::env::consts::ARCH,
    })
}

fn boot_time() -> Value {
    let boot = i64::try_from(System::boot_time())
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();
    json!({ "boot_time": boot })
}

fn cpu_info(sys: &System) -> Value {
    let cpus = sys.cpus();
    let frequencies: Vec<u64> = cpus.iter().map(|c| c.frequency()).collect();
    json!({
        "cpu_brand": cpus.first().map(|c| c.brand().trim().to_string()).unwrap_or_default(),
        "total_cores": cpus.len(),
        "max_frequency": frequencies.iter().copied().max().unwrap_or(0),
        "min_frequency": frequencies.iter().copied().min().unwrap_or(0),
        "current_frequency": frequencies.first().copied().unwrap_or(0),
        "cpu_usage_per_core": cpus.iter().map(|c| c.cpu_usage()).collect::<Vec<f32>>(),
        "total_cpu_usage": sys.global_cpu_usage(),
    })
}

fn memory_info(sys: &System) -> Value {
    let total = sys.total_memory();
    json!({
        "total": human_size(total),
        "available": human_size(sys.available_memory()),
        "used": human_size(sys.used_memory()),
        "percentage": percent(sys.used_memory(), total),
    })
}

fn swap_info(sys: &System) -> Value {
    let total = sys.total_swap();
    json!({
        "total": human_size(total),
        "free": human_size(sys.free_swap()),
        "used": human_size(sys.used_swap()),
        "percentage": percent(sys.used_swap(), total),
    })
}

fn disk_info() -> Value {
    let disks = Disks::new_with_refreshed_list();
    let partitions: Vec<Value> = disks
        .list()
        .iter()
        .map(|d| {
            let total = d.total_space();
            let used = total.saturating_sub(d.available_space());
            json!({
                "device": d.name().to_string_lossy(),
                "mountpoint": d.mount_point().display().to_string(),
                "fstype": d.file_system().to_string_lossy(),
                "total_size": human_size(total),
                "used": human_size(used),
                "free": human_size(d.available_space()),
                "percentage": percent(used, total),
            })
        })
        .collect();
    json!({ "partitions": partitions })
}

fn network_info() -> Value {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces = Map::new();
    let (mut sent, mut received) = (0u64, 0u64);

    for (name, data) in networks.list() {
        sent = sent.saturating_add(data.total_transmitted());
        received = received.saturating_add(data.total_received());
        let addresses: Vec<Value> = data
            .ip_networks()
            .iter()
            .map(|ip| json!({ "address": ip.addr.to_string(), "prefix": ip.prefix }))
            .collect();
        interfaces.insert(
            name.clone(),
            json!({ "mac": data.mac_address().to_string(), "addresses": addresses }),
        );
    }

    json!({
        "host_name": System::host_name().unwrap_or_default(),
        "interfaces": interfaces,
        "io_counters": {
            "bytes_sent": human_size(sent),
            "bytes_recv": human_size(received),
        },
    })
}

/// Runs `program args`, killing it on cancellation or once `limit` passes.
async fn command_output(
    ctx: &CancellationToken,
    program: &str,
    args: &[&str],
    limit: Duration,
) -> Result<Output, TaskError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let deadline = async {
        if limit.is_zero() {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(limit).await;
        }
    };

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        _ = deadline => Err(TaskError::Timeout { timeout: limit }),
        out = child.wait_with_output() => Ok(out?),
    }
}

async fn installed_packages(
    ctx: &CancellationToken,
    command: &str,
    limit: Duration,
) -> Result<Value, TaskError> {
    let args: &[&str] = match command {
        "pip" => &["list"],
        "dpkg" => &["-l"],
        _ => &["-qa"],
    };
    match command_output(ctx, command, args, limit).await {
        Ok(out) if out.status.success() => Ok(parse_packages(
            command,
            &String::from_utf8_lossy(&out.stdout),
        )),
        Ok(out) => {
            warn!(command, status = %out.status, "package listing failed");
            Ok(listing_error(command, String::from_utf8_lossy(&out.stderr).trim()))
        }
        Err(TaskError::Canceled) => Err(TaskError::Canceled),
        Err(e) => {
            warn!(command, error = %e, "package listing failed");
            Ok(listing_error(command, &e.to_string()))
        }
    }
}

fn listing_error(command: &str, message: &str) -> Value {
    let mut err = Map::new();
    err.insert(format!("{command}_error"), Value::from(message));
    Value::Object(err)
}

/// Turns package manager output into `[[name, version], ...]` (or names for rpm).
fn parse_packages(command: &str, output: &str) -> Value {
    let lines = output.trim().lines();
    match command {
        // Two header lines: column titles and dashes.
        "pip" => Value::from(
            lines
                .skip(2)
                .filter_map(|l| name_version(l.split_whitespace()))
                .collect::<Vec<_>>(),
        ),
        // Installed packages start with `ii`; columns: state, name, version, ...
        "dpkg" => Value::from(
            lines
                .filter(|l| l.starts_with("ii"))
                .filter_map(|l| name_version(l.split_whitespace().skip(1)))
                .collect::<Vec<_>>(),
        ),
        _ => Value::from(
            lines
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect::<Vec<_>>(),
        ),
    }
}

fn name_version<'a>(mut cols: impl Iterator<Item = &'a str>) -> Option<Value> {
    let name = cols.next()?;
    let version = cols.next()?;
    Some(json!([name, version]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::http::testing::{self, Captured};

    #[test]
    fn human_size_uses_binary_units() {
        assert_eq!(human_size(0), "0.00B");
        assert_eq!(human_size(1023), "1023.00B");
        assert_eq!(human_size(1536), "1.50KB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024), "5.00GB");
        assert!(human_size(u64::MAX).ends_with("EB"));
    }

    #[test]
    fn package_listings_are_parsed() {
        let pip = "Package    Version\n---------- -------\nrequests   2.31.0\nsix        1.16.0\n";
        assert_eq!(
            parse_packages("pip", pip),
            json!([["requests", "2.31.0"], ["six", "1.16.0"]])
        );

        let dpkg = "Desired=Unknown\n||/ Name Version Arch Description\n+++-====\nii  bash  5.2-1  amd64  GNU shell\nrc  old  1.0  amd64  removed\n";
        assert_eq!(parse_packages("dpkg", dpkg), json!([["bash", "5.2-1"]]));

        let rpm = "bash-5.2-1.x86_64\n\ncoreutils-9.1-1.x86_64\n";
        assert_eq!(
            parse_packages("rpm", rpm),
            json!(["bash-5.2-1.x86_64", "coreutils-9.1-1.x86_64"])
        );
    }

    #[test]
    fn snapshot_has_every_section() {
        let doc = collect_vitals();
        for section in [
            "system_info",
            "boot_time",
            "cpu_info",
            "memory_info",
            "swap_info",
            "disk_info",
            "network_info",
        ] {
            assert!(doc.get(section).is_some(), "missing {section}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_command_is_killed_at_the_limit() {
        let limit = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let err = command_output(&CancellationToken::new(), "sleep", &["30"], limit)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Timeout { timeout } if timeout == limit), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_stops_a_listing() {
        let ctx = CancellationToken::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let err = command_output(&ctx, "sleep", &["30"], Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, TaskError::Canceled));
    }

    #[tokio::test]
    async fn missing_package_manager_is_skipped() {
        let out = command_output(
            &CancellationToken::new(),
            "iq-agent-no-such-package-manager",
            &["--version"],
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(out, Err(TaskError::Fail { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn posts_wrapped_document_and_requires_201() {
        let (base, mut rx) = testing::serve(|_: &Captured| (201, "{}".into())).await;
        let client = ServiceClient::new("vitals", format!("{base}/vitals/"), testing::security()).unwrap();
        let monitor = VitalsMonitor::new(client, Duration::from_secs(30));

        monitor.run(CancellationToken::new()).await.unwrap();

        let req = rx.recv().await.unwrap();
        assert_eq!(req.path, "/vitals/");
        let event: VitalsEvent = serde_json::from_slice(&req.body).unwrap();
        let doc: Value = serde_json::from_str(&event.vitals).unwrap();
        assert!(doc.get("memory_info").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_report_fails_the_cycle() {
        let (base, _rx) = testing::serve(|_: &Captured| (500, r#"{"detail":"db down"}"#.into())).await;
        let client = ServiceClient::new("vitals", base, testing::security()).unwrap();
        let monitor = VitalsMonitor::new(client, Duration::from_secs(30));

        let err = monitor.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("db down"));
    }
}
