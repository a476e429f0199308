use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use linkrelay_core::CanonicalUrl;
use std::sync::Arc;
use tokio::sync::watch;

/// Registry of URLs currently being resolved.
///
/// The first caller to [`claim`](Self::claim) a URL becomes its owner and
/// does the work; everyone after that gets a receiver for the owner's result.
/// The entry disappears when the owner's guard is dropped, whether or not a
/// value was published.
#[derive(Debug)]
pub struct Inflight<T> {
    pending: DashMap<CanonicalUrl, watch::Receiver<Option<T>>>,
}

pub enum Claim<T> {
    Owner(OwnerGuard<T>),
    Waiter(Waiter<T>),
}

impl<T: Clone + Send + Sync + 'static> Inflight<T> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    pub fn claim(self: &Arc<Self>, url: &CanonicalUrl) -> Claim<T> {
        match self.pending.entry(url.clone()) {
            Entry::Occupied(existing) => Claim::Waiter(Waiter {
                rx: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                Claim::Owner(OwnerGuard {
                    registry: Arc::clone(self),
                    url: url.clone(),
                    tx,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Inflight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the task resolving a URL.
pub struct OwnerGuard<T> {
    registry: Arc<Inflight<T>>,
    url: CanonicalUrl,
    tx: watch::Sender<Option<T>>,
}

impl<T> OwnerGuard<T> {
    /// Publishes the result to every waiter and releases the URL.
    pub fn complete(self, value: T) {
        // no receivers is fine, the map holds one until drop
        self.tx.send_replace(Some(value));
    }
}

impl<T> Drop for OwnerGuard<T> {
    fn drop(&mut self) {
        self.registry.pending.remove(&self.url);
    }
}

pub struct Waiter<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Waiter<T> {
    /// Waits for the owner's result. `None` means the owner went away
    /// without publishing one, e.g. because it was aborted.
    pub async fn wait(mut self) -> Option<T> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }
}
