use crate::authorizer::{ActionQuery, Fallback, Query, check, deny_all};
use crate::error::Result;
use crate::permission::PermissionIndex;
use crate::store::{NoStorage, Storage};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const DEFAULT_STORAGE_KEY: &str = "auth";

/// Snapshot slot of an [`AsyncAuthorizer`].
///
/// Two independent completion events drive it: a persisted-snapshot read and
/// the live computation. Cached data only ever fills an empty slot; live data
/// forces `Final` regardless of the current state, so the last settled value is
/// always the live result.
#[derive(Debug, Default, Clone, PartialEq)]
enum CacheState {
    #[default]
    Empty,
    Provisional(PermissionIndex),
    Final(PermissionIndex),
}

impl CacheState {
    fn snapshot(&self) -> Option<&PermissionIndex> {
        match self {
            CacheState::Empty => None,
            CacheState::Provisional(index) | CacheState::Final(index) => Some(index),
        }
    }

    fn apply_cached(&mut self, index: PermissionIndex) {
        if matches!(self, CacheState::Empty) {
            *self = CacheState::Provisional(index);
        }
    }

    fn apply_live(&mut self, index: PermissionIndex) {
        *self = CacheState::Final(index);
    }
}

/// Authorization cache over an asynchronously produced permission index.
///
/// Wraps a producer (`Fn() -> Future<Output = Result<PermissionIndex>>`) behind
/// a synchronous [`can`](Self::can) surface. [`load`](Self::load) is the single
/// cooperative task that races the live computation against a previously
/// persisted snapshot: whichever resolves first becomes visible, and the live
/// result always overwrites whatever the persisted read produced. Queries never
/// wait — before any resolution they answer through the fallback (default:
/// deny).
pub struct AsyncAuthorizer<P, S = NoStorage> {
    producer: P,
    storage: S,
    storage_key: String,
    fallback: Fallback,
    state: Arc<Mutex<CacheState>>,
}

impl<P> AsyncAuthorizer<P, NoStorage> {
    /// Creates a cache without persistence.
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            storage: NoStorage,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            fallback: deny_all(),
            state: Arc::new(Mutex::new(CacheState::Empty)),
        }
    }
}

impl<P, S> AsyncAuthorizer<P, S> {
    /// Attaches a storage collaborator for snapshot persistence.
    pub fn storage<S2>(self, storage: S2) -> AsyncAuthorizer<P, S2> {
        AsyncAuthorizer {
            producer: self.producer,
            storage,
            storage_key: self.storage_key,
            fallback: self.fallback,
            state: self.state,
        }
    }

    /// Overrides the storage key (default `"auth"`).
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Replaces the fallback consulted for actions the snapshot does not know.
    pub fn fallback(
        mut self,
        fallback: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    /// Returns the best available snapshot; `None` before the first resolution.
    pub fn permissions(&self) -> Option<PermissionIndex> {
        self.state.lock().expect("poisoned lock").snapshot().cloned()
    }

    /// Answers whether every action in `action` covers every object in `object`.
    pub fn can<'a, 'o>(&self, action: impl Into<Query<'a>>, object: impl Into<Query<'o>>) -> bool {
        self.query(&action.into(), &object.into())
    }

    /// Binds one action for repeated object queries.
    pub fn action<'s>(&'s self, action: &'s str) -> ActionQuery<'s> {
        ActionQuery::bind(move |object| self.query(&Query::One(action), object))
    }

    fn query(&self, action: &Query<'_>, object: &Query<'_>) -> bool {
        let state = self.state.lock().expect("poisoned lock");
        check(state.snapshot(), &self.fallback, action, object)
    }
}

impl<P, Fut, S> AsyncAuthorizer<P, S>
where
    P: Fn() -> Fut,
    Fut: Future<Output = Result<PermissionIndex>>,
    S: Storage,
{
    /// Runs the live computation and the persisted-snapshot read concurrently.
    ///
    /// The cache is queryable as soon as either source resolves; the live
    /// result wins regardless of resolution order. A failed live computation is
    /// swallowed here so a previously persisted snapshot stays usable; call
    /// [`refresh`](Self::refresh) directly to observe producer errors.
    pub async fn load(&self) {
        let live = async {
            if let Err(error) = self.refresh().await {
                warn!(%error, "live permission computation failed");
            }
        };
        let cached = async {
            if let Some(index) = self.read_snapshot().await {
                let mut state = self.state.lock().expect("poisoned lock");
                state.apply_cached(index);
            }
        };
        futures::join!(live, cached);
    }

    /// Re-invokes the producer and republishes its result.
    ///
    /// The new snapshot is visible before persistence starts; persistence
    /// failures are swallowed, producer failures are returned.
    pub async fn refresh(&self) -> Result<()> {
        let index = (self.producer)().await?;
        {
            let mut state = self.state.lock().expect("poisoned lock");
            state.apply_live(index.clone());
        }
        self.persist(&index).await;
        Ok(())
    }

    async fn read_snapshot(&self) -> Option<PermissionIndex> {
        match self.storage.get(&self.storage_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(index) => Some(index),
                Err(error) => {
                    debug!(%error, "ignoring unreadable permission snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "failed to read persisted permission snapshot");
                None
            }
        }
    }

    async fn persist(&self, index: &PermissionIndex) {
        match serde_json::to_string(index) {
            Ok(raw) => {
                if let Err(error) = self.storage.set(&self.storage_key, &raw).await {
                    warn!(%error, "failed to persist permission snapshot");
                }
            }
            Err(error) => warn!(%error, "failed to serialize permission snapshot"),
        }
    }
}
