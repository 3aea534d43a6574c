//! Status and shutdown helpers for the two tunnel technologies.

use crate::log_debug;
use crate::process::{self, KILL_GRACE};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Local ngrok agent inspection endpoint.
const NGROK_AGENT_API: &str = "http://127.0.0.1:4040/api/tunnels";

/// Reply shape of the ngrok agent's `/api/tunnels` endpoint.
#[derive(Debug, Deserialize)]
struct AgentTunnels {
    #[serde(default)]
    tunnels: Vec<AgentTunnel>,
}

#[derive(Debug, Deserialize)]
struct AgentTunnel {
    #[serde(default)]
    public_url: String,
}

/// True when `tailscale funnel status` shows a forward to `port`.
pub fn funnel_active(tailscale_cmd: &str, port: u16) -> Result<bool> {
    let output = process::run_captured(tailscale_cmd, &["funnel", "status"], None)?;
    if !output.status.success() {
        bail!(
            "`{tailscale_cmd} funnel status` failed ({}): {}",
            process::describe_status(output.status),
            process::stderr_tail(&output, 3)
        );
    }
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(funnel_status_mentions_port(&text, port))
}

/// Turn the funnel for `https_port` off. Returns whether anything was on.
pub fn funnel_off(tailscale_cmd: &str, https_port: u16, port: u16) -> Result<bool> {
    if !funnel_active(tailscale_cmd, port)? {
        return Ok(false);
    }
    let https_flag = format!("--https={https_port}");
    process::run_checked(tailscale_cmd, &["funnel", &https_flag, "off"], None)?;
    Ok(true)
}

fn funnel_status_mentions_port(text: &str, port: u16) -> bool {
    let loopback = format!("127.0.0.1:{port}");
    let localhost = format!("localhost:{port}");
    text.lines()
        .any(|line| line.contains(&loopback) || line.contains(&localhost))
}

/// Pids of running ngrok agents.
pub fn ngrok_pids() -> Vec<u32> {
    process::pgrep_pids("ngrok", false).unwrap_or_else(|err| {
        log_debug(&format!("pgrep for ngrok failed: {err:#}"));
        Vec::new()
    })
}

/// Public URLs the local ngrok agent is currently serving.
pub fn ngrok_tunnel_urls() -> Result<Vec<String>> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(2))
        .timeout_read(Duration::from_secs(2))
        .build();
    let body = agent
        .get(NGROK_AGENT_API)
        .call()
        .context("ngrok agent API is not reachable on 127.0.0.1:4040")?
        .into_string()
        .context("could not read the ngrok agent API reply")?;
    let reply: AgentTunnels =
        serde_json::from_str(&body).context("could not parse the ngrok agent API reply")?;
    Ok(reply
        .tunnels
        .into_iter()
        .map(|tunnel| tunnel.public_url)
        .filter(|url| !url.is_empty())
        .collect())
}

/// Terminate every running ngrok agent. Returns how many were stopped.
pub fn stop_ngrok() -> usize {
    let mut stopped = 0;
    for pid in ngrok_pids() {
        if process::terminate_pid(pid, KILL_GRACE) {
            stopped += 1;
        } else {
            log_debug(&format!("ngrok pid {pid} survived termination"));
        }
    }
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funnel_status_matches_loopback_and_localhost() {
        let status = "\
https://host.tailnet.ts.net (Funnel on)
|-- / proxy http://127.0.0.1:3000
";
        assert!(funnel_status_mentions_port(status, 3000));
        assert!(!funnel_status_mentions_port(status, 8080));
        assert!(funnel_status_mentions_port("forwarding to localhost:8080", 8080));
    }

    #[test]
    fn agent_reply_parses_public_urls() {
        let reply: AgentTunnels = serde_json::from_str(
            r#"{"tunnels":[{"name":"command_line","public_url":"https://x.ngrok-free.app","proto":"https"}],"uri":"/api/tunnels"}"#,
        )
        .unwrap();
        assert_eq!(reply.tunnels.len(), 1);
        assert_eq!(reply.tunnels[0].public_url, "https://x.ngrok-free.app");
    }

    #[test]
    fn agent_reply_tolerates_missing_fields() {
        let reply: AgentTunnels = serde_json::from_str(r#"{"uri":"/api/tunnels"}"#).unwrap();
        assert!(reply.tunnels.is_empty());
    }
}
