//! One sequential worker per connected switch.

use futures::future::join_all;
use log::{debug, info, warn};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

use vlan_tenancy_common::{
    command::PacketIn, config::SessionConfig, types::SwitchId, Error, Result,
};
use vlan_tenancy_engine::Controller;

/// A live switch session.
#[derive(Debug)]
struct Session {
    events: mpsc::Sender<PacketIn>,
    worker: JoinHandle<()>,
}

/// Tracks switch sessions and feeds their packet-in events to the controller.
///
/// Events of one switch are decided strictly in arrival order; different
/// switches proceed concurrently.
pub struct SessionHub {
    controller: Arc<Controller>,
    config: SessionConfig,
    sessions: Mutex<HashMap<SwitchId, Session>>,
}

impl SessionHub {
    pub fn new(controller: Arc<Controller>, config: SessionConfig) -> Self {
        Self {
            controller,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Open a session for `switch`, installing its table-miss rule first.
    ///
    /// A live session for the same switch is closed before the new one
    /// starts. The session map is not held while the old worker drains, so
    /// other switches keep receiving events.
    pub async fn connect(&self, switch: SwitchId) {
        let old = self.sessions.lock().await.remove(&switch);
        if let Some(old) = old {
            warn!("[session {}] reconnect, closing previous session", switch);
            self.close(switch, old).await;
        }

        self.controller.switch_connected(switch);

        let (events, rx) = mpsc::channel(self.config.inbound_queue.max(1));
        let worker = tokio::spawn(run_session(Arc::clone(&self.controller), switch, rx));
        let replaced = self
            .sessions
            .lock()
            .await
            .insert(switch, Session { events, worker });
        self.controller.metrics().active_sessions.increment();
        info!("[session {}] opened", switch);

        // A concurrent connect for the same switch won the race.
        if let Some(stale) = replaced {
            self.close(switch, stale).await;
        }
    }

    /// Queue a packet-in on the session of the switch that sent it.
    pub async fn deliver(&self, event: PacketIn) -> Result<()> {
        let switch = event.switch_id;
        let events = {
            let sessions = self.sessions.lock().await;
            match sessions.get(&switch) {
                Some(session) => session.events.clone(),
                None => return Err(Error::SessionClosed(switch.to_string())),
            }
        };

        events
            .send(event)
            .await
            .map_err(|_| Error::SessionClosed(switch.to_string()))
    }

    /// Close the session of `switch` after its queued events are decided.
    /// Returns `false` when there was no session.
    pub async fn disconnect(&self, switch: SwitchId) -> bool {
        let session = self.sessions.lock().await.remove(&switch);
        match session {
            Some(session) => {
                self.close(switch, session).await;
                true
            }
            None => false,
        }
    }

    /// Close every session.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();
        join_all(
            sessions
                .into_iter()
                .map(|(switch, session)| self.close(switch, session)),
        )
        .await;
    }

    pub async fn is_connected(&self, switch: SwitchId) -> bool {
        self.sessions.lock().await.contains_key(&switch)
    }

    pub async fn connected(&self) -> Vec<SwitchId> {
        let mut switches: Vec<_> = self.sessions.lock().await.keys().copied().collect();
        switches.sort();
        switches
    }

    async fn close(&self, switch: SwitchId, session: Session) {
        let Session { events, worker } = session;
        // The worker exits once the queue is drained and every sender is gone.
        drop(events);
        if let Err(e) = worker.await {
            warn!("[session {}] worker ended abnormally: {}", switch, e);
        }
        self.controller.metrics().active_sessions.decrement();
        info!("[session {}] closed", switch);
    }
}

async fn run_session(controller: Arc<Controller>, switch: SwitchId, mut events: mpsc::Receiver<PacketIn>) {
    debug!("[session {}] worker started", switch);
    let mut handled = 0u64;
    while let Some(event) = events.recv().await {
        controller.packet_in(&event);
        handled += 1;
    }
    debug!("[session {}] worker stopped after {} events", switch, handled);
}
