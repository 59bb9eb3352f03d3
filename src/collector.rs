//! Telemetry collector task
//!
//! One per registered agent, independent of the watchdog: consumes the
//! endpoint's telemetry feed and applies every item through the agent's
//! monotonic cache. A feed that ends or cannot be opened is reopened after
//! one probe interval. Readers never wait on this task.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::agent::AgentHandle;
use crate::link::VehicleLink;

pub(crate) fn spawn(
    agent: Arc<AgentHandle>,
    link: Arc<dyn VehicleLink>,
    reopen_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        'outer: loop {
            let opened = tokio::select! {
                result = link.telemetry_stream(agent.endpoint()) => result,
                _ = shutdown.changed() => break,
            };

            let mut feed = match opened {
                Ok(feed) => feed,
                Err(e) => {
                    debug!(agent = %agent.id(), error = %e, "Telemetry feed unavailable");
                    tokio::select! {
                        _ = sleep(reopen_interval) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            };

            loop {
                tokio::select! {
                    item = feed.next() => match item {
                        Some(sample) => {
                            if !agent.telemetry_cache().apply(sample).await {
                                debug!(agent = %agent.id(), "Discarded stale telemetry update");
                            }
                        }
                        None => {
                            debug!(agent = %agent.id(), "Telemetry feed ended");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break 'outer,
                }
            }

            tokio::select! {
                _ = sleep(reopen_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        debug!(agent = %agent.id(), "Collector stopped");
    })
}
