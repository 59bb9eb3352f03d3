//! Connection watchdog task
//!
//! One per registered agent: probes the link at a fixed cadence and drives
//! the liveness state machine. Probing continues at the same cadence while
//! Offline (passive retry, no backoff); a single successful probe restores
//! Connected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentHandle, LinkState};
use crate::events::FleetEvent;
use crate::link::VehicleLink;
use crate::now_ms;

pub(crate) fn spawn(
    agent: Arc<AgentHandle>,
    link: Arc<dyn VehicleLink>,
    events: UnboundedSender<FleetEvent>,
    probe_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // First probe after one full interval, not immediately: a freshly
        // registered agent stays observable in Discovering.
        let mut ticker = interval_at(Instant::now() + probe_interval, probe_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let alive = link.probe(agent.endpoint()).await;

                    let (transition, failures) = {
                        let mut liveness = agent.liveness().write().await;
                        let transition = if alive {
                            liveness.record_success()
                        } else {
                            liveness.record_failure()
                        };
                        (transition, liveness.consecutive_failures())
                    };

                    if transition.changed() {
                        match transition.to {
                            LinkState::Connected => {
                                info!(agent = %agent.id(), from = %transition.from, "Link established")
                            }
                            LinkState::Degraded => {
                                warn!(agent = %agent.id(), failures, "Link degraded")
                            }
                            LinkState::Offline => {
                                error!(agent = %agent.id(), failures, "Link offline")
                            }
                            LinkState::Discovering => {}
                        }
                        let _ = events.send(FleetEvent::StateChanged {
                            agent: agent.id().clone(),
                            from: transition.from,
                            to: transition.to,
                            timestamp_ms: now_ms(),
                        });
                    } else if !alive {
                        debug!(agent = %agent.id(), failures, "Probe failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!(agent = %agent.id(), "Watchdog stopped");
    })
}
