//! ICMP echo via the system `ping` binary (Linux iputils flags, no root needed).

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, instrument, warn};

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<tx>\d+)\s+packets?\s+transmitted,\s+(?P<rx>\d+)\s+(?:packets?\s+)?received,(?:.*?)\s(?P<loss>[\d.]+)%\s+packet\s+loss",
    )
    .expect("valid ping summary regex")
});

static RTT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:rtt|round-trip)\s+min/avg/max/(?:mdev|stddev)\s*=\s*(?P<min>[\d.]+)/(?P<avg>[\d.]+)/(?P<max>[\d.]+)/(?P<std>[\d.]+)",
    )
    .expect("valid ping rtt regex")
});

const TAIL_LINES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    pub count: u32,
    /// Overall `-w` deadline; `None` lets `count` alone bound the run.
    pub deadline: Option<Duration>,
    /// Per-reply `-W` wait.
    pub reply_timeout: Duration,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            count: 10,
            deadline: Some(Duration::from_secs(20)),
            reply_timeout: Duration::from_secs(2),
        }
    }
}

impl PingOptions {
    /// Hard cap on the child process: one reply window per packet, at least the `-w` deadline
    /// plus a second, never less than 5s.
    pub fn hard_timeout(&self) -> Duration {
        let per_packet = self.reply_timeout.as_secs().max(1) + 1;
        let by_count = u64::from(self.count) * per_packet;
        let by_deadline = self.deadline.map_or(0, |d| d.as_secs() + 1);
        Duration::from_secs(by_count.max(by_deadline).max(5))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingResult {
    pub ok: bool,
    pub transmitted: u32,
    pub received: u32,
    pub loss_pct: f64,
    pub min_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub stddev_ms: Option<f64>,
    /// Last lines of the tool output (statistics block), or the failure reason.
    pub raw_tail: String,
}

impl PingResult {
    fn failed(raw_tail: impl Into<String>) -> Self {
        Self {
            ok: false,
            transmitted: 0,
            received: 0,
            loss_pct: 100.0,
            min_ms: None,
            avg_ms: None,
            max_ms: None,
            stddev_ms: None,
            raw_tail: raw_tail.into(),
        }
    }
}

#[async_trait]
pub trait PingProbe: Send + Sync {
    async fn ping(&self, host: &str, options: PingOptions) -> PingResult;
}

/// Runs `ping -c COUNT -n -W REPLY [-w DEADLINE] HOST`.
#[derive(Debug, Clone, Default)]
pub struct SystemPing;

impl SystemPing {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PingProbe for SystemPing {
    #[instrument(skip(self))]
    async fn ping(&self, host: &str, options: PingOptions) -> PingResult {
        let mut command = Command::new("ping");
        command
            .arg("-c")
            .arg(options.count.to_string())
            .arg("-n")
            .arg("-W")
            .arg(options.reply_timeout.as_secs().max(1).to_string());
        if let Some(deadline) = options.deadline {
            command.arg("-w").arg(deadline.as_secs().max(1).to_string());
        }
        command.arg(host).kill_on_drop(true);

        let hard_timeout = options.hard_timeout();
        let output = match tokio::time::timeout(hard_timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(host = %host, error = %e, "step: ping spawn failed");
                return PingResult::failed(format!("ping failed: {}", e));
            }
            Err(_) => {
                warn!(host = %host, timeout_secs = hard_timeout.as_secs(), "step: ping timed out");
                return PingResult::failed(format!(
                    "ping failed: timed out after {}s",
                    hard_timeout.as_secs()
                ));
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            text.push('\n');
            text.push_str(&stderr);
        }

        let result = parse_ping_output(&text);
        info!(
            host = %host,
            ok = result.ok,
            transmitted = result.transmitted,
            received = result.received,
            "step: ping finished"
        );
        result
    }
}

/// Parses iputils/BSD `ping` output. Missing statistics yield a failed result carrying the output tail.
pub fn parse_ping_output(output: &str) -> PingResult {
    let tail = tail_lines(output, TAIL_LINES);

    let Some(summary) = SUMMARY_RE.captures(output) else {
        let fallback = if tail.is_empty() {
            "ping produced no output".to_string()
        } else {
            tail
        };
        return PingResult::failed(fallback);
    };

    let transmitted = summary["tx"].parse().unwrap_or(0);
    let received = summary["rx"].parse().unwrap_or(0);
    let loss_pct = summary["loss"].parse().unwrap_or(100.0);

    let rtt = RTT_RE.captures(output);
    let field = |name: &str| rtt.as_ref().and_then(|c| c[name].parse::<f64>().ok());

    PingResult {
        ok: received > 0 && loss_pct < 100.0,
        transmitted,
        received,
        loss_pct,
        min_ms: field("min"),
        avg_ms: field("avg"),
        max_ms: field("max"),
        stddev_ms: field("std"),
        raw_tail: tail,
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
