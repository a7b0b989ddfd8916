use anyhow::Result;
use serde_json::Value;
use std::{path::Path, process::Stdio, time::Duration};
use tokio::process::{Child, Command};

use crate::upstream::TEST_API_KEY;

/// A `bytebeam-tools` server running as a child process.
pub struct ServerProcess {
    http_client: reqwest::Client,
    base_url: String,
    /// Killed when the handle is dropped.
    _process: Child,
}

impl ServerProcess {
    /// Starts `binary` on a port derived from `name`, pointed at
    /// `upstream_url` as its OpenRouter endpoint, and waits until it answers.
    pub async fn start(binary: &Path, name: &str, upstream_url: Option<&str>) -> Result<Self> {
        let port = deterministic_port(name);
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut command = Command::new(binary);
        command
            .arg("--port")
            .arg(port.to_string())
            .arg("--bind")
            .arg("127.0.0.1")
            .env_remove("OPENROUTER_API_KEY")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(url) = upstream_url {
            command
                .env("OPENROUTER_BASE_URL", url)
                .env("OPENROUTER_API_KEY", TEST_API_KEY);
        }

        eprintln!("Spawning {:?} on port {}", binary, port);
        let process = command.spawn()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        for attempt in 0..30 {
            if let Ok(resp) = http_client
                .get(format!("{}/api/tools/status", base_url))
                .send()
                .await
            {
                if resp.status().is_success() {
                    eprintln!("Server for {} ready on port {} (attempt {})", name, port, attempt + 1);
                    return Ok(Self {
                        http_client,
                        base_url,
                        _process: process,
                    });
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Err(anyhow::anyhow!(
            "Server for {} did not come up on port {} within 15 seconds",
            name,
            port
        ))
    }

    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<(u16, Value)> {
        let resp = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Deterministic port based on a test name hash
fn deterministic_port(name: &str) -> u16 {
    let hash: u32 = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    23000 + (hash % 1000) as u16
}
