//! Check command: diagnostics for configuration, storage and the collector.

use std::io::Write;

use anyhow::{Context, Result, bail};
use tp_client::CollectorClient;
use tp_store::Store;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let settings = config.agent_settings().context("invalid configuration")?;
    writeln!(
        writer,
        "Configuration: ok (batch size {}, queue capacity {}, interval {}s)",
        settings.batch_size,
        settings.limits.capacity(),
        settings.batch_interval.as_secs()
    )?;

    let store = Store::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    match tp_store::load_identity(&store).context("stored installation identity is invalid")? {
        Some(identity) => writeln!(writer, "Installation: {identity}")?,
        None => writeln!(writer, "Installation: assigned on first run")?,
    }

    let client = CollectorClient::new(&config.endpoint, config.request_timeout())
        .context("invalid collector endpoint")?;
    writeln!(writer, "Endpoint: {}", client.endpoint())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    match runtime.block_on(client.ping()) {
        Ok(status) => {
            writeln!(writer, "Collector: reachable (HTTP {status})")?;
            Ok(())
        }
        Err(err) => {
            writeln!(writer, "Collector: unreachable ({err})")?;
            bail!("collector at {} is unreachable", client.endpoint())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::thread;

    fn config_for(dir: &tempfile::TempDir, endpoint: String) -> Config {
        Config {
            database_path: dir.path().join("tabpulse.db"),
            endpoint,
            request_timeout_secs: 5,
            ..Config::default()
        }
    }

    /// Answers a single request with `204 No Content`.
    fn one_shot_collector() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/events", listener.local_addr().unwrap());
        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n")
                .unwrap();
        });
        endpoint
    }

    #[test]
    fn test_check_reports_reachable_collector() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp, one_shot_collector());

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with("Configuration: ok (batch size 10, queue capacity 1000"));
        assert!(output.contains("Installation: assigned on first run"));
        assert!(output.contains("Collector: reachable (HTTP 204)"));
    }

    #[test]
    fn test_check_fails_when_collector_is_down() {
        let temp = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/events", listener.local_addr().unwrap());
        drop(listener);
        let config = config_for(&temp, endpoint);

        let mut output = Vec::new();
        let err = run(&mut output, &config).unwrap_err();
        assert!(err.to_string().contains("unreachable"));
        assert!(String::from_utf8(output).unwrap().contains("Collector: unreachable"));
    }

    #[test]
    fn test_check_rejects_bad_endpoint() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp, "ftp://collector.example.com".to_string());

        let err = run(&mut Vec::new(), &config).unwrap_err();
        assert!(format!("{err:#}").contains("invalid collector endpoint"));
    }

    #[test]
    fn test_check_rejects_invalid_settings() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            batch_size: 0,
            ..config_for(&temp, one_shot_collector())
        };
        let err = run(&mut Vec::new(), &config).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }
}
