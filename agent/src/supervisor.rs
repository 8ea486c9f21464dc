use crate::{
    config::ProxyConfig,
    proxy::{abort_channel, AbortTx, Aborted, Proxy},
};
use ahash::AHashMap as HashMap;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Substring identifying a proxy killed by the kernel, as reported by the
/// process exit wrapper. Almost always the OOM killer.
const OOM_SIGNATURE: &str = "signal: killed";

struct Exit {
    epoch: u64,
    status: anyhow::Result<()>,
}

/// Drives successive epochs of a data-plane proxy through its hot-restart
/// protocol.
///
/// A single control loop reacts to configuration changes, epoch exits, and
/// shutdown. Each accepted configuration launches exactly one new epoch at
/// `max(running) + 1`. Old epochs are left to exit on their own per the
/// hot-restart handshake; they are aborted en masse only when the newest
/// epoch dies or after the shutdown drain.
pub struct Supervisor<P: Proxy> {
    config_rx: mpsc::Receiver<P::Config>,
    status_rx: mpsc::UnboundedReceiver<Exit>,
    state: State<P>,
}

struct State<P: Proxy> {
    proxy: Arc<P>,

    /// The most recent configuration accepted from the config channel.
    desired: Option<ProxyConfig<P::Config>>,

    /// The configuration the newest epoch was started with.
    current: Option<ProxyConfig<P::Config>>,

    /// The highest epoch ever started.
    current_epoch: Option<u64>,

    /// One abort handle per live epoch, held until its exit is observed.
    aborts: HashMap<u64, AbortTx>,

    status_tx: mpsc::UnboundedSender<Exit>,
    drain_duration: Duration,
}

impl<P: Proxy> Supervisor<P> {
    /// Returns a supervisor and the sender used to push configuration
    /// changes into it.
    pub fn new(proxy: P, drain_duration: Duration) -> (Self, mpsc::Sender<P::Config>) {
        let (config_tx, config_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            config_rx,
            status_rx,
            state: State {
                proxy: Arc::new(proxy),
                desired: None,
                current: None,
                current_epoch: None,
                aborts: HashMap::default(),
                status_tx,
                drain_duration,
            },
        };
        (supervisor, config_tx)
    }

    /// Runs the control loop until every epoch has exited, or until
    /// `shutdown` resolves and the drain sequence completes.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let Self {
            mut config_rx,
            mut status_rx,
            mut state,
        } = self;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                config = config_rx.recv() => match config {
                    Some(config) => state.accept(ProxyConfig::Config(config)),
                    None => {
                        debug!("configuration channel closed");
                        state.terminate().await;
                        return;
                    }
                },
                Some(exit) = status_rx.recv() => {
                    if state.handle_exit(exit) {
                        return;
                    }
                }
                _ = &mut shutdown => {
                    state.terminate().await;
                    return;
                }
            }
        }
    }
}

impl<P: Proxy> State<P> {
    fn accept(&mut self, config: ProxyConfig<P::Config>) {
        if self.desired.as_ref() == Some(&config) {
            debug!("desired configuration unchanged; ignoring");
            return;
        }
        self.desired = Some(config);
        self.reconcile();
    }

    /// Launches a new epoch whenever the desired configuration differs from
    /// the one the newest epoch was started with.
    fn reconcile(&mut self) {
        if self.desired == self.current {
            return;
        }
        let Some(config) = self.desired.clone() else {
            return;
        };

        let epoch = self.current_epoch.map_or(0, |epoch| epoch + 1);
        self.current_epoch = Some(epoch);
        let (abort_tx, abort_rx) = abort_channel();
        self.aborts.insert(epoch, abort_tx);
        self.current = self.desired.clone();

        info!(epoch, "starting proxy epoch");
        let proxy = self.proxy.clone();
        let status_tx = self.status_tx.clone();
        tokio::spawn(async move {
            let status = proxy.run(config, epoch, abort_rx).await;
            let _ = status_tx.send(Exit { epoch, status });
        });
    }

    /// Records an epoch's exit. Returns true when no epoch remains and the
    /// loop should stop.
    fn handle_exit(&mut self, exit: Exit) -> bool {
        let Exit { epoch, status } = exit;
        self.aborts.remove(&epoch);
        self.proxy.cleanup(epoch);

        match status {
            Ok(()) => info!(epoch, "proxy epoch exited"),
            Err(error) if error.is::<Aborted>() => warn!(epoch, "proxy epoch aborted"),
            Err(error) if format!("{error:#}").contains(OOM_SIGNATURE) => {
                warn!(
                    epoch,
                    %error,
                    "proxy epoch was killed, likely by the kernel OOM killer; \
                     consider raising the proxy's memory limits"
                );
            }
            Err(error) => {
                // No retry timer: the epoch slot is freed and the next
                // accepted configuration launches a fresh epoch.
                error!(epoch, %error, "proxy epoch failed");
            }
        }

        if Some(epoch) == self.current_epoch {
            // The newest epoch is gone, so no epoch is left to complete the
            // hot-restart handshake for the ones behind it.
            self.abort_all();
        }
        self.aborts.is_empty()
    }

    /// Rolls the fleet onto a draining configuration, waits out the drain
    /// window, then aborts every epoch.
    async fn terminate(&mut self) {
        info!("draining proxy fleet");
        self.desired = Some(ProxyConfig::Drain);
        self.reconcile();
        tokio::time::sleep(self.drain_duration).await;
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for (&epoch, abort) in &self.aborts {
            warn!(epoch, "aborting proxy epoch");
            abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::AbortRx;
    use std::{collections::HashMap, future::pending, sync::Mutex};
    use tokio::{
        sync::oneshot,
        time::{self, Instant},
    };

    #[derive(Clone, Default)]
    struct MockProxy(Arc<MockState>);

    #[derive(Default)]
    struct MockState {
        runs: Mutex<Vec<(ProxyConfig<u32>, u64)>>,
        cleanups: Mutex<Vec<u64>>,
        exits: Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<()>>>>,
        aborted: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl Proxy for MockProxy {
        type Config = u32;

        async fn run(
            &self,
            config: ProxyConfig<u32>,
            epoch: u64,
            mut abort: AbortRx,
        ) -> anyhow::Result<()> {
            let (exit_tx, exit_rx) = oneshot::channel();
            self.0.runs.lock().unwrap().push((config, epoch));
            self.0.exits.lock().unwrap().insert(epoch, exit_tx);
            tokio::select! {
                status = exit_rx => status.unwrap_or(Ok(())),
                _ = abort.recv() => {
                    self.0.aborted.lock().unwrap().push(epoch);
                    Err(Aborted.into())
                }
            }
        }

        fn cleanup(&self, epoch: u64) {
            self.0.cleanups.lock().unwrap().push(epoch);
        }
    }

    impl MockProxy {
        async fn wait_started(&self, epoch: u64) {
            while !self.0.exits.lock().unwrap().contains_key(&epoch) {
                time::sleep(Duration::from_millis(1)).await;
            }
        }

        async fn wait_cleanup(&self, epoch: u64) {
            while !self.0.cleanups.lock().unwrap().contains(&epoch) {
                time::sleep(Duration::from_millis(1)).await;
            }
        }

        async fn wait_aborted(&self, count: usize) {
            while self.0.aborted.lock().unwrap().len() < count {
                time::sleep(Duration::from_millis(1)).await;
            }
        }

        fn exit(&self, epoch: u64, status: anyhow::Result<()>) {
            self.0
                .exits
                .lock()
                .unwrap()
                .remove(&epoch)
                .expect("epoch not running")
                .send(status)
                .ok();
        }

        fn runs(&self) -> Vec<(ProxyConfig<u32>, u64)> {
            self.0.runs.lock().unwrap().clone()
        }

        fn cleanups(&self) -> Vec<u64> {
            self.0.cleanups.lock().unwrap().clone()
        }

        fn aborted(&self) -> Vec<u64> {
            self.0.aborted.lock().unwrap().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rollover_launches_one_epoch_per_config() {
        let proxy = MockProxy::default();
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), Duration::from_secs(5));
        let control = tokio::spawn(supervisor.run(pending()));

        config_tx.send(1).await.unwrap();
        proxy.wait_started(0).await;
        config_tx.send(2).await.unwrap();
        proxy.wait_started(1).await;

        assert_eq!(
            proxy.runs(),
            vec![(ProxyConfig::Config(1), 0), (ProxyConfig::Config(2), 1)]
        );
        assert!(proxy.aborted().is_empty());

        // The old epoch exits on its own; the newer one keeps running.
        proxy.exit(0, Ok(()));
        proxy.wait_cleanup(0).await;
        assert_eq!(proxy.cleanups(), vec![0]);
        assert!(proxy.aborted().is_empty());
        assert!(!control.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_configs_are_ignored() {
        let proxy = MockProxy::default();
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), Duration::from_secs(5));
        let _control = tokio::spawn(supervisor.run(pending()));

        config_tx.send(7).await.unwrap();
        proxy.wait_started(0).await;
        config_tx.send(7).await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(proxy.runs().len(), 1);

        config_tx.send(8).await.unwrap();
        proxy.wait_started(1).await;
        assert_eq!(proxy.runs().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn newest_epoch_failure_aborts_the_fleet() {
        let proxy = MockProxy::default();
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), Duration::from_secs(5));
        let control = tokio::spawn(supervisor.run(pending()));

        config_tx.send(1).await.unwrap();
        proxy.wait_started(0).await;
        config_tx.send(2).await.unwrap();
        proxy.wait_started(1).await;

        proxy.exit(1, Err(anyhow::anyhow!("bootstrap rejected")));
        control.await.unwrap();

        assert_eq!(proxy.cleanups(), vec![1, 0]);
        assert_eq!(proxy.aborted(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn lone_epoch_failure_stops_the_loop() {
        let proxy = MockProxy::default();
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), Duration::from_secs(5));
        let control = tokio::spawn(supervisor.run(pending()));

        config_tx.send(1).await.unwrap();
        proxy.wait_started(0).await;
        proxy.exit(0, Err(anyhow::anyhow!("exited: signal: killed")));
        control.await.unwrap();

        assert_eq!(proxy.cleanups(), vec![0]);
        assert!(proxy.aborted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_then_aborts() {
        let proxy = MockProxy::default();
        let drain = Duration::from_secs(30);
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), drain);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let control = tokio::spawn(supervisor.run(async move {
            shutdown_rx.await.ok();
        }));

        config_tx.send(1).await.unwrap();
        proxy.wait_started(0).await;
        config_tx.send(2).await.unwrap();
        proxy.wait_started(1).await;

        let draining_since = Instant::now();
        shutdown_tx.send(()).unwrap();
        control.await.unwrap();
        assert!(draining_since.elapsed() >= drain);

        assert_eq!(proxy.runs().last(), Some(&(ProxyConfig::Drain, 2)));
        proxy.wait_aborted(3).await;
        let mut aborted = proxy.aborted();
        aborted.sort_unstable();
        assert_eq!(aborted, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_config_channel_triggers_drain() {
        let proxy = MockProxy::default();
        let (supervisor, config_tx) = Supervisor::new(proxy.clone(), Duration::from_secs(10));
        let control = tokio::spawn(supervisor.run(pending()));

        config_tx.send(1).await.unwrap();
        proxy.wait_started(0).await;
        drop(config_tx);
        control.await.unwrap();

        assert_eq!(
            proxy.runs(),
            vec![(ProxyConfig::Config(1), 0), (ProxyConfig::Drain, 1)]
        );
        proxy.wait_aborted(2).await;
        let mut aborted = proxy.aborted();
        aborted.sort_unstable();
        assert_eq!(aborted, vec![0, 1]);
    }
}
