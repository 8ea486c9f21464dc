/// The configuration a proxy epoch is started with: an opaque bootstrap
/// value, or the distinguished drain state used while shutting the fleet
/// down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProxyConfig<C> {
    Config(C),
    Drain,
}

impl<C> ProxyConfig<C> {
    pub fn is_drain(&self) -> bool {
        matches!(self, ProxyConfig::Drain)
    }
}
