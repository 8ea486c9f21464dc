use crate::{
    config::ProxyConfig,
    proxy::{AbortRx, Aborted, Proxy},
};
use anyhow::{Context, Result};
use serde_json::json;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg(unix)]
const SIGKILL: i32 = 9;

/// Launches a hot-restartable proxy binary, one process per epoch.
///
/// Each epoch gets its own bootstrap file under the configuration
/// directory and is passed `--restart-epoch`, so a newer process can take
/// over the listeners of the one it replaces.
pub struct CommandProxy {
    binary: PathBuf,
    config_dir: PathBuf,
    drain_time: Duration,
    extra_args: Vec<String>,
}

impl CommandProxy {
    pub fn new(binary: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_dir: config_dir.into(),
            drain_time: Duration::from_secs(45),
            extra_args: Vec::new(),
        }
    }

    /// How long a replaced epoch is given to wind down its listeners.
    pub fn drain_time(mut self, drain_time: Duration) -> Self {
        self.drain_time = drain_time;
        self
    }

    /// Additional arguments appended to every launch.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    fn bootstrap_path(&self, epoch: u64) -> PathBuf {
        self.config_dir.join(format!("envoy-rev{}.json", epoch))
    }

    fn write_bootstrap(
        &self,
        config: &ProxyConfig<serde_json::Value>,
        epoch: u64,
    ) -> Result<PathBuf> {
        // A drain epoch takes over the fleet's listeners without accepting
        // new connections.
        let bootstrap = match config {
            ProxyConfig::Config(value) => value.clone(),
            ProxyConfig::Drain => json!({ "drain": true }),
        };
        let path = self.bootstrap_path(epoch);
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("creating {}", self.config_dir.display()))?;
        std::fs::write(&path, serde_json::to_vec_pretty(&bootstrap)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[async_trait::async_trait]
impl Proxy for CommandProxy {
    type Config = serde_json::Value;

    async fn run(
        &self,
        config: ProxyConfig<Self::Config>,
        epoch: u64,
        mut abort: AbortRx,
    ) -> Result<()> {
        let bootstrap = self.write_bootstrap(&config, epoch)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--config-path")
            .arg(&bootstrap)
            .arg("--restart-epoch")
            .arg(epoch.to_string())
            .arg("--drain-time-s")
            .arg(self.drain_time.as_secs().to_string())
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        info!(epoch, binary = %self.binary.display(), "starting proxy");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", self.binary.display()))?;

        tokio::select! {
            status = child.wait() => {
                let status = status.context("waiting on proxy")?;
                exit_result(epoch, status)
            }
            _ = abort.recv() => {
                warn!(epoch, "abort requested; killing proxy");
                if let Err(error) = child.start_kill() {
                    warn!(epoch, %error, "failed to kill proxy");
                }
                let _ = child.wait().await;
                Err(Aborted.into())
            }
        }
    }

    fn cleanup(&self, epoch: u64) {
        let path = self.bootstrap_path(epoch);
        debug!(epoch, path = %path.display(), "removing bootstrap");
        if let Err(error) = std::fs::remove_file(&path) {
            debug!(%error, path = %path.display(), "failed to remove bootstrap");
        }
    }
}

fn exit_result(epoch: u64, status: std::process::ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(SIGKILL) {
            anyhow::bail!("proxy epoch {} exited: signal: killed", epoch);
        }
    }
    anyhow::bail!("proxy epoch {} exited: {}", epoch, status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::proxy::abort_channel;
    use std::{os::unix::fs::PermissionsExt, path::Path};

    /// Writes an executable script standing in for the proxy binary.
    fn mk_proxy_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("proxy.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mesh-proxy-agent-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn clean_exit_and_cleanup() {
        let dir = test_dir("clean-exit");
        let script = mk_proxy_script(&dir, "exit 0");
        let proxy = CommandProxy::new(script, &dir);

        let (_abort_tx, abort_rx) = abort_channel();
        let config = ProxyConfig::Config(json!({ "listeners": [] }));
        proxy.run(config, 0, abort_rx).await.expect("clean exit");

        assert!(proxy.bootstrap_path(0).exists());
        proxy.cleanup(0);
        assert!(!proxy.bootstrap_path(0).exists());
    }

    #[tokio::test]
    async fn abort_kills_the_process() {
        let dir = test_dir("abort");
        let script = mk_proxy_script(&dir, "sleep 30");
        let proxy = CommandProxy::new(script, &dir);

        let (abort_tx, abort_rx) = abort_channel();
        abort_tx.abort();
        let error = proxy
            .run(ProxyConfig::Drain, 1, abort_rx)
            .await
            .expect_err("aborted");
        assert!(error.is::<Aborted>());
        proxy.cleanup(1);
    }

    #[tokio::test]
    async fn kernel_kill_is_reported_distinctively() {
        let dir = test_dir("oom");
        let script = mk_proxy_script(&dir, "kill -9 $$");
        let proxy = CommandProxy::new(script, &dir);

        let (_abort_tx, abort_rx) = abort_channel();
        let error = proxy
            .run(ProxyConfig::Config(json!({})), 2, abort_rx)
            .await
            .expect_err("killed");
        assert!(error.to_string().contains("signal: killed"));
        proxy.cleanup(2);
    }
}
