//! Sidecar proxy supervision.
//!
//! Manages successive epochs of a data-plane proxy process through its
//! hot-restart protocol: every accepted configuration change launches
//! exactly one new epoch at `max(running) + 1`, failed fleets are torn down
//! by cascading aborts, and shutdown executes a bounded drain before
//! stopping every epoch.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod command;
mod config;
mod proxy;
mod supervisor;

pub use self::{
    command::CommandProxy,
    config::ProxyConfig,
    proxy::{abort_channel, AbortRx, AbortTx, Aborted, Proxy},
    supervisor::Supervisor,
};
