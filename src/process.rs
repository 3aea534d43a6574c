//! Subprocess helpers shared by the ops flows and the tunnel launcher.
//!
//! Every external CLI this crate touches goes through here: spawn with
//! captured output, report failures with the stderr tail, and deliver
//! signals with a bounded TERM to KILL escalation.

use crate::log_debug;
use anyhow::{bail, Context, Result};
#[cfg(test)]
use std::sync::atomic::AtomicUsize;
use std::{
    io,
    path::Path,
    process::{Command, ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

/// How long a politely-stopped process gets before SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_millis(2_000);

const KILL_POLL_MS: u64 = 50;

/// Run a command to completion with stdout and stderr captured.
pub fn run_captured(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output()
        .with_context(|| format!("failed to run `{}`", render_command(program, args)))
}

/// Run a command and fail with its stderr tail when it exits non-zero.
pub fn run_checked(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
    let output = run_captured(program, args, cwd)?;
    if !output.status.success() {
        let tail = stderr_tail(&output, 6);
        if tail.is_empty() {
            bail!(
                "`{}` failed ({})",
                render_command(program, args),
                describe_status(output.status)
            );
        }
        bail!(
            "`{}` failed ({}): {tail}",
            render_command(program, args),
            describe_status(output.status)
        );
    }
    Ok(output)
}

pub fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        return program.to_string();
    }
    format!("{program} {}", args.join(" "))
}

pub fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Last `lines` lines of stderr, flattened for error messages.
pub fn stderr_tail(output: &Output, lines: usize) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let tail: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = tail.len().saturating_sub(lines);
    tail[start..].join(" | ")
}

pub enum Signal {
    Term,
    Kill,
}

#[cfg(test)]
static SEND_SIGNAL_FAILURES: AtomicUsize = AtomicUsize::new(0);

#[cfg(test)]
pub(crate) fn reset_send_signal_failures() {
    SEND_SIGNAL_FAILURES.store(0, std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
pub(crate) fn send_signal_failures() -> usize {
    SEND_SIGNAL_FAILURES.load(std::sync::atomic::Ordering::SeqCst)
}

pub fn send_signal(pid: u32, signal: Signal) {
    #[cfg(unix)]
    unsafe {
        let signo = match signal {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        if libc::kill(pid as i32, signo) != 0 {
            #[cfg(test)]
            SEND_SIGNAL_FAILURES.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            log_debug(&format!(
                "failed to send signal {signo} to pid {pid}: {}",
                io::Error::last_os_error()
            ));
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        let _ = signal;
        log_debug("signal requested, but signals are unsupported on this platform");
    }
}

/// True while `pid` still exists (signal 0 probe).
pub fn pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    unsafe {
        libc::kill(pid as i32, 0) == 0
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Politely stop a process, escalating to SIGKILL when it lingers past `grace`.
/// Returns true when the process is gone afterwards. Only for pids this
/// process does not own; our own children are reaped through `Child`.
pub fn terminate_pid(pid: u32, grace: Duration) -> bool {
    if !pid_alive(pid) {
        return true;
    }
    log_debug(&format!("terminating pid {pid}; sending SIGTERM"));
    send_signal(pid, Signal::Term);
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(KILL_POLL_MS));
    }
    log_debug(&format!("pid {pid} outlived its grace period; sending SIGKILL"));
    send_signal(pid, Signal::Kill);
    thread::sleep(Duration::from_millis(KILL_POLL_MS));
    !pid_alive(pid)
}

/// Pids bound to a local TCP port, via `lsof -ti`.
/// An empty result is normal; a missing `lsof` binary is an error the
/// caller decides how to downgrade.
pub fn port_pids(port: u16) -> Result<Vec<u32>> {
    let spec = format!("-ti:{port}");
    let output = run_captured("lsof", &[spec.as_str()], None)?;
    // lsof exits 1 when nothing matches; that is not a failure here.
    Ok(parse_pid_lines(&String::from_utf8_lossy(&output.stdout)))
}

/// Pids whose name (or full command line with `full`) matches `pattern`.
pub fn pgrep_pids(pattern: &str, full: bool) -> Result<Vec<u32>> {
    let args: Vec<&str> = if full {
        vec!["-f", pattern]
    } else {
        vec!["-x", pattern]
    };
    let output = run_captured("pgrep", &args, None)?;
    Ok(parse_pid_lines(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_pid_lines(text: &str) -> Vec<u32> {
    text.lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}
