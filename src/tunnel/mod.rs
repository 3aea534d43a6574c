//! Tunnel client session management.
//!
//! Spawns the ngrok client as a child process, watches its structured log
//! stream for the public URL, and shuts it down with a bounded grace period.

pub mod signal;

use crate::process::{self, Signal, KILL_GRACE};
use crate::{log_debug, log_debug_content};
use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use regex::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Placeholder shipped in setup docs; never a real credential.
pub const AUTHTOKEN_PLACEHOLDER: &str = "YOUR_NGROK_AUTHTOKEN";

/// How long `open` waits for the client to publish a URL.
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for log lines or child exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Client log lines kept for error reporting.
const LOG_TAIL_CAP: usize = 40;

/// Reject a missing or placeholder authtoken before any subprocess runs.
pub fn validate_authtoken(token: &str) -> Result<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        bail!("ngrok authtoken is not set (set NGROK_AUTHTOKEN or pass --authtoken)");
    }
    if trimmed == AUTHTOKEN_PLACEHOLDER {
        bail!(
            "ngrok authtoken is still the {AUTHTOKEN_PLACEHOLDER} placeholder; \
             replace it with the token from your ngrok dashboard"
        );
    }
    Ok(trimmed.to_string())
}

/// Options for a single tunnel session.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Tunnel client binary (name or path).
    pub client_cmd: String,
    /// Local port to expose.
    pub port: u16,
    /// Credential passed to the client through its environment.
    pub authtoken: String,
    /// Optional reserved domain to bind instead of a random hostname.
    pub domain: Option<String>,
}

/// Structured log record emitted by the tunnel client in JSON mode.
#[derive(Debug, Deserialize)]
struct ClientLogRecord {
    #[serde(default)]
    msg: String,
    #[serde(default)]
    url: Option<String>,
}

/// One running tunnel client and the URL it published.
///
/// Owns the child process; dropping the session shuts the client down.
#[derive(Debug)]
pub struct TunnelSession {
    child: Option<Child>,
    /// Public HTTPS URL announced by the client.
    pub public_url: String,
    lines_rx: Receiver<String>,
    _reader_threads: Vec<thread::JoinHandle<()>>,
    closed: bool,
}

impl TunnelSession {
    /// Spawn the tunnel client and wait for it to publish a public URL.
    ///
    /// The caller must run `validate_authtoken` first; this function assumes
    /// the credential gate has already passed.
    pub fn open(config: &TunnelConfig) -> Result<Self> {
        let mut command = Command::new(&config.client_cmd);
        command
            .arg("http")
            .arg(config.port.to_string())
            .args(["--log", "stdout", "--log-format", "json"]);
        if let Some(domain) = &config.domain {
            command.args(["--domain", domain]);
        }
        command
            .env("NGROK_AUTHTOKEN", &config.authtoken)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start tunnel client `{}`", config.client_cmd))?;
        log_debug(&format!(
            "tunnel client `{}` started (pid {})",
            config.client_cmd,
            child.id()
        ));

        let (tx, rx) = bounded(100);
        let mut reader_threads = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            reader_threads.push(spawn_line_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            reader_threads.push(spawn_line_reader(stderr, tx.clone()));
        }
        drop(tx);

        let public_url = match wait_for_url(&mut child, &rx, OPEN_TIMEOUT) {
            Ok(url) => url,
            Err(err) => {
                // Don't leave a half-started client behind.
                shutdown_child(&mut child);
                return Err(err);
            }
        };

        log_debug(&format!("tunnel established for port {}", config.port));
        Ok(Self {
            child: Some(child),
            public_url,
            lines_rx: rx,
            _reader_threads: reader_threads,
            closed: false,
        })
    }

    /// Drain any buffered client log lines without blocking.
    pub fn drain_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.lines_rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Non-blocking check for client exit; reaps the child on completion.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.closed = true;
                Some(status)
            }
            Ok(None) => None,
            Err(err) => {
                log_debug(&format!("tunnel client wait failed: {err}"));
                None
            }
        }
    }

    /// Terminate the client with SIGTERM, escalating to SIGKILL once the
    /// grace period runs out. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let Some(mut child) = self.child.take() else {
            return;
        };
        log_debug("closing tunnel client");
        shutdown_child(&mut child);
    }

    #[cfg(test)]
    fn child_pid(&self) -> Option<u32> {
        self.child.as_ref().map(|child| child.id())
    }
}

impl Drop for TunnelSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Forward each line from a client pipe into the shared channel.
fn spawn_line_reader<R>(pipe: R, tx: Sender<String>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log_debug(&format!("tunnel client pipe read failed: {err}"));
                    break;
                }
            }
        }
    })
}

/// Watch client log lines until a public URL shows up, the client dies, or
/// the deadline passes.
fn wait_for_url(child: &mut Child, lines_rx: &Receiver<String>, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut tail: VecDeque<String> = VecDeque::with_capacity(LOG_TAIL_CAP);
    loop {
        match lines_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => {
                log_debug_content(&format!("tunnel client: {line}"));
                if let Some(url) = url_from_log_line(&line) {
                    return Ok(url);
                }
                push_tail(&mut tail, line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Pipes are closed; the exit check below settles it.
                thread::sleep(POLL_INTERVAL);
            }
        }
        if let Some(status) = child.try_wait().ok().flatten() {
            while let Ok(line) = lines_rx.try_recv() {
                if let Some(url) = url_from_log_line(&line) {
                    return Ok(url);
                }
                push_tail(&mut tail, line);
            }
            bail!(
                "tunnel client exited before publishing a URL ({}){}",
                process::describe_status(status),
                render_tail(&tail)
            );
        }
        if Instant::now() >= deadline {
            bail!(
                "timed out after {}s waiting for the tunnel URL{}",
                timeout.as_secs(),
                render_tail(&tail)
            );
        }
    }
}

/// Extract the public URL from one client log line.
///
/// ngrok announces it as `{"msg":"started tunnel","url":"https://..."}`; the
/// regex fallback covers clients logging the same event as plain text.
fn url_from_log_line(line: &str) -> Option<String> {
    if let Ok(record) = serde_json::from_str::<ClientLogRecord>(line) {
        if record.msg == "started tunnel" {
            return record.url.filter(|url| !url.is_empty());
        }
        return None;
    }
    if !line.contains("started tunnel") {
        return None;
    }
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE
        .get_or_init(|| Regex::new(r#"https://[^\s"']+"#).expect("tunnel URL regex should compile"));
    re.find(line).map(|found| found.as_str().to_string())
}

fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == LOG_TAIL_CAP {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Render the most recent client log lines for an error message.
fn render_tail(tail: &VecDeque<String>) -> String {
    if tail.is_empty() {
        return String::new();
    }
    let recent: Vec<&str> = tail
        .iter()
        .rev()
        .take(5)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!(": {}", recent.join(" | "))
}

/// SIGTERM, bounded wait, then SIGKILL. Always reaps the child.
fn shutdown_child(child: &mut Child) {
    let pid = child.id();
    process::send_signal(pid, Signal::Term);
    let deadline = Instant::now() + KILL_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                log_debug(&format!(
                    "tunnel client stopped ({})",
                    process::describe_status(status)
                ));
                return;
            }
            Ok(None) => {}
            Err(err) => {
                log_debug(&format!("tunnel client wait failed: {err}"));
                return;
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    process::send_signal(pid, Signal::Kill);
    match child.wait() {
        Ok(status) => log_debug(&format!(
            "tunnel client killed ({})",
            process::describe_status(status)
        )),
        Err(err) => log_debug(&format!("failed to reap tunnel client: {err}")),
    }
}
