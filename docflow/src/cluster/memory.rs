use async_trait::async_trait;
use bytes::Bytes;
use docflow_config::shared::ClusterMode;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bail;
use crate::cluster::backend::{
    Connector, CoordinationBackend, Member, SharedCountDown, SharedQueue,
};
use crate::error::{DocflowResult, ErrorKind};

#[derive(Debug)]
struct MemberEntry {
    id: Uuid,
    attributes: HashMap<String, String>,
    /// Shared with the connection of this member, so that a crash closes it.
    closed: Arc<AtomicBool>,
}

#[derive(Debug)]
struct QueuedItem {
    /// Connection that offered the element.
    owner: Uuid,
    payload: Bytes,
}

#[derive(Debug)]
struct QueueState {
    name: String,
    items: Mutex<VecDeque<QueuedItem>>,
    available: Notify,
}

#[derive(Debug)]
struct CountDownState {
    name: String,
    /// `None` until the count has been set.
    count: watch::Sender<Option<u64>>,
}

#[derive(Debug, Default)]
struct Inner {
    members: Vec<MemberEntry>,
    queues: HashMap<String, Arc<QueueState>>,
    count_downs: HashMap<String, Arc<CountDownState>>,
}

/// In-memory coordination hub shared by simulated processes.
///
/// Each call to [`Connector::connect`] behaves like a separate process attaching to the same
/// cluster: queues and countdown signals with the same name are shared, and members see each
/// other's attributes. Clones share the same hub.
///
/// Queues are unbounded and follow the weak delivery model of distributed queues:
/// [`MemoryCluster::crash_member`] drops every unconsumed element offered by the crashed member.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCluster {
    /// Creates an empty cluster without members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an abrupt failure of member `id`.
    ///
    /// The member disappears from the membership list, its connection stops working and the
    /// elements it offered that nobody consumed yet are lost. Returns the number of lost
    /// elements.
    pub async fn crash_member(&self, id: Uuid) -> usize {
        let mut inner = self.inner.lock().await;

        let Some(position) = inner.members.iter().position(|member| member.id == id) else {
            return 0;
        };
        let member = inner.members.remove(position);
        member.closed.store(true, Ordering::SeqCst);

        let mut lost = 0;
        for queue in inner.queues.values() {
            let mut items = queue.items.lock().await;
            let before = items.len();
            items.retain(|item| item.owner != id);
            lost += before - items.len();
        }

        warn!(member_id = %id, lost, "cluster member crashed");

        lost
    }

    /// Number of members currently in the cluster.
    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    async fn queue_state(&self, name: &str) -> Arc<QueueState> {
        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(QueueState {
                    name: name.to_string(),
                    items: Mutex::new(VecDeque::new()),
                    available: Notify::new(),
                })
            })
            .clone()
    }

    async fn count_down_state(&self, name: &str) -> Arc<CountDownState> {
        let mut inner = self.inner.lock().await;
        inner
            .count_downs
            .entry(name.to_string())
            .or_insert_with(|| {
                let (count, _) = watch::channel(None);
                Arc::new(CountDownState {
                    name: name.to_string(),
                    count,
                })
            })
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryCluster {
    async fn connect(&self, mode: ClusterMode) -> DocflowResult<Arc<dyn CoordinationBackend>> {
        let mut inner = self.inner.lock().await;
        let id = Uuid::new_v4();
        let closed = Arc::new(AtomicBool::new(false));

        let member_id = match mode {
            ClusterMode::Member => {
                inner.members.push(MemberEntry {
                    id,
                    attributes: HashMap::new(),
                    closed: closed.clone(),
                });
                Some(id)
            }
            ClusterMode::Client => {
                if inner.members.is_empty() {
                    bail!(
                        ErrorKind::BackendUnavailable,
                        "No cluster member to connect to",
                        "client mode requires at least one running member"
                    );
                }
                None
            }
        };

        info!(connection_id = %id, %mode, "connected to in-memory cluster");

        Ok(Arc::new(MemoryBackend {
            cluster: self.clone(),
            id,
            member_id,
            closed,
        }))
    }
}

/// Connection of one simulated process to a [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryBackend {
    cluster: MemoryCluster,
    id: Uuid,
    /// Set for member connections only.
    member_id: Option<Uuid>,
    closed: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Identifier of this connection, equal to the member id in member mode.
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn ensure_open(&self) -> DocflowResult<()> {
        ensure_open(&self.closed)
    }
}

fn ensure_open(closed: &AtomicBool) -> DocflowResult<()> {
    if closed.load(Ordering::SeqCst) {
        bail!(
            ErrorKind::BackendShutdown,
            "Cluster connection has been shut down"
        );
    }

    Ok(())
}

#[async_trait]
impl CoordinationBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn queue(&self, name: &str) -> DocflowResult<Arc<dyn SharedQueue>> {
        self.ensure_open()?;

        Ok(Arc::new(MemoryQueue {
            state: self.cluster.queue_state(name).await,
            owner: self.id,
            closed: self.closed.clone(),
        }))
    }

    async fn count_down_latch(&self, name: &str) -> DocflowResult<Arc<dyn SharedCountDown>> {
        self.ensure_open()?;

        Ok(Arc::new(MemoryCountDown {
            state: self.cluster.count_down_state(name).await,
            closed: self.closed.clone(),
        }))
    }

    async fn members(&self) -> DocflowResult<Vec<Member>> {
        self.ensure_open()?;

        let inner = self.cluster.inner.lock().await;
        let members = inner
            .members
            .iter()
            .map(|entry| Member {
                id: entry.id,
                local: Some(entry.id) == self.member_id,
                attributes: entry.attributes.clone(),
            })
            .collect();

        Ok(members)
    }

    async fn set_local_attribute(&self, key: &str, value: &str) -> DocflowResult<()> {
        self.ensure_open()?;

        let Some(member_id) = self.member_id else {
            bail!(
                ErrorKind::InvalidState,
                "Only cluster members carry attributes",
                "the connection was opened in client mode"
            );
        };

        let mut inner = self.cluster.inner.lock().await;
        let Some(entry) = inner.members.iter_mut().find(|entry| entry.id == member_id) else {
            bail!(
                ErrorKind::BackendShutdown,
                "Local member is no longer part of the cluster"
            );
        };
        entry.attributes.insert(key.to_string(), value.to_string());

        debug!(%member_id, key, value, "set local member attribute");

        Ok(())
    }

    async fn shutdown(&self) -> DocflowResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(member_id) = self.member_id {
            let mut inner = self.cluster.inner.lock().await;
            inner.members.retain(|entry| entry.id != member_id);
        }

        info!(connection_id = %self.id, "left in-memory cluster");

        Ok(())
    }
}

/// Handle on a named queue of a [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryQueue {
    state: Arc<QueueState>,
    owner: Uuid,
    closed: Arc<AtomicBool>,
}

impl MemoryQueue {
    async fn pop(&self) -> Option<Bytes> {
        let mut items = self.state.items.lock().await;
        items.pop_front().map(|item| item.payload)
    }
}

#[async_trait]
impl SharedQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.state.name
    }

    async fn offer(&self, item: Bytes) -> DocflowResult<()> {
        ensure_open(&self.closed)?;

        self.state.items.lock().await.push_back(QueuedItem {
            owner: self.owner,
            payload: item,
        });
        self.state.available.notify_waiters();

        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> DocflowResult<Option<Bytes>> {
        ensure_open(&self.closed)?;

        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so that an offer in between is not missed.
            let notified = self.state.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.pop().await {
                return Ok(Some(item));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> DocflowResult<usize> {
        ensure_open(&self.closed)?;

        Ok(self.state.items.lock().await.len())
    }
}

/// Handle on a named countdown signal of a [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryCountDown {
    state: Arc<CountDownState>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl SharedCountDown for MemoryCountDown {
    fn name(&self) -> &str {
        &self.state.name
    }

    async fn count(&self) -> DocflowResult<u64> {
        ensure_open(&self.closed)?;

        Ok(self.state.count.borrow().unwrap_or(0))
    }

    async fn try_set_count(&self, count: u64) -> DocflowResult<bool> {
        ensure_open(&self.closed)?;

        let set = self.state.count.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }

            *current = Some(count);
            true
        });

        Ok(set)
    }

    async fn count_down(&self) -> DocflowResult<()> {
        ensure_open(&self.closed)?;

        self.state.count.send_if_modified(|current| match current {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        });

        Ok(())
    }

    async fn wait_zero(&self, timeout: Duration) -> DocflowResult<bool> {
        ensure_open(&self.closed)?;

        // A signal that was never set is not complete, so late initializers cannot be skipped.
        let mut count = self.state.count.subscribe();
        let reached = tokio::time::timeout(timeout, count.wait_for(|count| *count == Some(0)))
            .await
            .is_ok_and(|result| result.is_ok());

        Ok(reached)
    }
}
