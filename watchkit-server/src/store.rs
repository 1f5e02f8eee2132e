use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use watchkit_proto::{Event, Object};

/// One recorded change, stamped with the version it produced.
#[derive(Debug, Clone)]
pub struct Change {
    pub version: u64,
    pub event: Event,
}

/// The requested checkpoint predates the retained history; the client must
/// start over instead of resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredVersion {
    pub requested: u64,
    pub oldest: u64,
}

struct StoreState {
    history: VecDeque<Change>,
    next_version: u64,
}

/// Versioned in-memory change log with live fan-out.
///
/// Every applied change gets a monotonically increasing resource version,
/// stamped onto the object before it is recorded. Watchers resume from a
/// checkpoint by replaying retained history and then following the broadcast
/// channel.
pub struct Store {
    state: RwLock<StoreState>,
    tx: broadcast::Sender<Change>,
    history_limit: usize,
}

impl Store {
    pub fn new(history_limit: usize) -> Self {
        let (tx, _) = broadcast::channel(history_limit.max(16));
        Self {
            state: RwLock::new(StoreState {
                history: VecDeque::new(),
                next_version: 1,
            }),
            tx,
            history_limit,
        }
    }

    pub async fn add(&self, object: Object) -> u64 {
        self.record(object, Event::Added).await
    }

    pub async fn modify(&self, object: Object) -> u64 {
        self.record(object, Event::Modified).await
    }

    pub async fn delete(&self, object: Object) -> u64 {
        self.record(object, Event::Deleted).await
    }

    async fn record(&self, mut object: Object, make: fn(Object) -> Event) -> u64 {
        let mut state = self.state.write().await;
        let version = state.next_version;
        state.next_version += 1;

        object.metadata_mut().resource_version = version.to_string();
        let change = Change {
            version,
            event: make(object),
        };

        state.history.push_back(change.clone());
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }

        debug!(
            "Recorded {} change at version {}",
            change.event.kind(),
            version
        );

        // Receivers that lag behind handle their own catch-up; a send with no
        // subscribers is fine.
        let _ = self.tx.send(change);
        version
    }

    /// Returns the retained changes after `checkpoint` plus a live receiver
    /// for everything that follows, atomically with respect to new changes.
    ///
    /// `None` means "from now on": no replay. A checkpoint at or beyond the
    /// newest version also yields no replay. A checkpoint older than retained
    /// history is `ExpiredVersion`.
    pub async fn subscribe_from(
        &self,
        checkpoint: Option<u64>,
    ) -> Result<(Vec<Change>, broadcast::Receiver<Change>), ExpiredVersion> {
        let state = self.state.read().await;
        let rx = self.tx.subscribe();

        let Some(requested) = checkpoint else {
            return Ok((Vec::new(), rx));
        };

        if let Some(oldest) = state.history.front().map(|c| c.version) {
            // Resuming from `requested` needs every change after it retained
            if requested + 1 < oldest {
                return Err(ExpiredVersion { requested, oldest });
            }
        }

        let replay = state
            .history
            .iter()
            .filter(|change| change.version > requested)
            .cloned()
            .collect();
        Ok((replay, rx))
    }
}
