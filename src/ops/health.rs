//! Local HTTP health probe for the managed server.

use std::time::Duration;

/// Outcome of probing the local server.
#[derive(Debug, PartialEq, Eq)]
pub enum HealthStatus {
    /// The server answered; any HTTP status counts as alive.
    Responding(u16),
    /// Connection or protocol failure, with detail.
    Unreachable(String),
}

fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(2))
        .timeout_read(Duration::from_secs(2))
        .timeout_write(Duration::from_secs(2))
        .build()
}

/// Probe `http://127.0.0.1:{port}/` with short timeouts.
pub fn probe_local_server(port: u16) -> HealthStatus {
    let url = format!("http://127.0.0.1:{port}/");
    match http_agent().get(&url).call() {
        Ok(response) => HealthStatus::Responding(response.status()),
        Err(ureq::Error::Status(code, _)) => HealthStatus::Responding(code),
        Err(err) => HealthStatus::Unreachable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn one_shot_server(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let port = listener.local_addr().expect("listener addr").port();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        port
    }

    #[test]
    fn reports_responding_server() {
        let port = one_shot_server("HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n");
        assert_eq!(probe_local_server(port), HealthStatus::Responding(204));
    }

    #[test]
    fn http_error_statuses_still_count_as_alive() {
        let port = one_shot_server("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n");
        assert_eq!(probe_local_server(port), HealthStatus::Responding(503));
    }

    #[test]
    fn reports_unreachable_port() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
            listener.local_addr().expect("listener addr").port()
        };
        match probe_local_server(port) {
            HealthStatus::Unreachable(detail) => assert!(!detail.is_empty()),
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }
}
