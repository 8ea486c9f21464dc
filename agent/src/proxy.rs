use crate::config::ProxyConfig;
use tokio::sync::mpsc;

/// Sentinel delivered to an epoch when the supervisor requests its
/// shutdown.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("epoch aborted by supervisor")]
pub struct Aborted;

/// Requests an epoch's shutdown.
///
/// Sends never block: the channel holds one slot and a second abort for the
/// same epoch is redundant.
#[derive(Clone, Debug)]
pub struct AbortTx(mpsc::Sender<Aborted>);

impl AbortTx {
    pub fn abort(&self) {
        let _ = self.0.try_send(Aborted);
    }
}

/// The receive half observed by a running proxy epoch.
pub type AbortRx = mpsc::Receiver<Aborted>;

pub fn abort_channel() -> (AbortTx, AbortRx) {
    let (tx, rx) = mpsc::channel(1);
    (AbortTx(tx), rx)
}

/// Launches and tears down one generation of the data-plane proxy.
#[async_trait::async_trait]
pub trait Proxy: Send + Sync + 'static {
    /// The opaque bootstrap configuration. Compared structurally to decide
    /// whether a change warrants a new epoch.
    type Config: Clone + PartialEq + Send + Sync + 'static;

    /// Runs the proxy at `epoch` and blocks until the process exits.
    ///
    /// Implementations observe `abort` and initiate shutdown when a value
    /// arrives; the supervisor never kills an epoch directly.
    async fn run(
        &self,
        config: ProxyConfig<Self::Config>,
        epoch: u64,
        abort: AbortRx,
    ) -> anyhow::Result<()>;

    /// Releases per-epoch resources. Invoked exactly once after `run`
    /// returns; must not block.
    fn cleanup(&self, epoch: u64);
}
