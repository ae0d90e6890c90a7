//! Lookup worker pool
//!
//! A single logical lookup fans out into one [`LookupTask`] per candidate
//! device. Tasks go through a flume queue drained by a fixed set of tokio
//! worker tasks; completion order across devices is unspecified.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::comrade::Comrade;
use super::node::MergeNode;
use super::MergeError;
use crate::backing::{BackingStore, StoreError};
use crate::device::DeviceId;

/// One device's share of a fan-out
#[derive(Debug)]
pub struct LookupTask {
    pub device: DeviceId,
    /// Backing path, `device_view/<selector>/...`
    pub path: String,
    pub node: Arc<MergeNode>,
}

/// Cloneable handle for queueing lookup tasks
#[derive(Debug, Clone)]
pub struct LookupDispatcher {
    tx: flume::Sender<LookupTask>,
}

/// Receiving side of the lookup queue, handed to the workers
#[derive(Debug, Clone)]
pub struct LookupReceiver {
    rx: flume::Receiver<LookupTask>,
}

impl LookupDispatcher {
    pub fn new() -> (Self, LookupReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, LookupReceiver { rx })
    }

    /// Queue a task. The caller must already have counted it in the
    ///  node's lookup group.
    pub fn dispatch(&self, task: LookupTask) -> Result<(), MergeError> {
        tracing::debug!("dispatching lookup of {} on device {}", task.path, task.device);
        self.tx.send(task).map_err(|e| {
            MergeError::ResourceExhausted(format!(
                "lookup queue closed, dropped lookup of {}",
                e.into_inner().path
            ))
        })
    }
}

impl LookupReceiver {
    pub async fn recv(&self) -> Option<LookupTask> {
        self.rx.recv_async().await.ok()
    }
}

/// Spawn `count` workers resolving tasks against `store`.
///  Workers exit once every dispatcher handle is dropped.
pub fn spawn_workers(
    receiver: LookupReceiver,
    store: Arc<dyn BackingStore>,
    count: usize,
    timeout: Option<Duration>,
) -> Vec<JoinHandle<()>> {
    (0..count.max(1))
        .map(|id| {
            let receiver = receiver.clone();
            let store = store.clone();
            tokio::spawn(async move {
                while let Some(task) = receiver.recv().await {
                    run_task(store.as_ref(), task, timeout).await;
                }
                tracing::debug!("lookup worker {} shutting down", id);
            })
        })
        .collect()
}

/// Resolve one backing path and offer the result to the node.
///  The list lock is released before the group is updated.
pub async fn run_task(store: &dyn BackingStore, task: LookupTask, timeout: Option<Duration>) {
    let LookupTask { device, path, node } = task;

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, store.lookup(&path)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("lookup timed out after {:?}", limit),
            ))),
        },
        None => store.lookup(&path).await,
    };

    let accepted = match result {
        Ok(entry) => match node.registry().attach_validated(Comrade::new(device, entry)) {
            Ok(()) => true,
            Err(rejected) => {
                tracing::debug!(
                    "device {} rejected for {}: {:?}",
                    device,
                    path,
                    rejected.reason
                );
                false
            }
        },
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} not present on device {}", path, device);
            false
        }
        Err(e) => {
            tracing::warn!("lookup of {} on device {} failed: {}", path, device, e);
            false
        }
    };

    node.work().finish(accepted);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backing::MemoryStore;

    #[tokio::test]
    async fn test_run_task_attaches_comrade() {
        let store = MemoryStore::new();
        store.add_dir("device_view/local/a").unwrap();
        let node = MergeNode::root(1);
        node.work().begin(2);

        run_task(
            &store,
            LookupTask {
                device: DeviceId::LOCAL,
                path: "device_view/local/a".into(),
                node: node.clone(),
            },
            None,
        )
        .await;
        run_task(
            &store,
            LookupTask {
                device: DeviceId(1),
                path: "device_view/missing/a".into(),
                node: node.clone(),
            },
            None,
        )
        .await;

        assert_eq!(node.registry().devices(), vec![DeviceId::LOCAL]);
        let state = node.work().state();
        assert_eq!(state.pending, 0);
        assert_eq!(state.accepted, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_absent() {
        let store = MemoryStore::new();
        store.add_dir("device_view/slow/a").unwrap();
        let _gate = store.gate("device_view/slow");
        let node = MergeNode::root(1);
        node.work().begin(1);

        run_task(
            &store,
            LookupTask {
                device: DeviceId(4),
                path: "device_view/slow/a".into(),
                node: node.clone(),
            },
            Some(Duration::from_millis(20)),
        )
        .await;
        assert!(node.is_empty());
        assert!(node.work().is_idle());
    }

    #[tokio::test]
    async fn test_workers_drain_queue() {
        let store = Arc::new(MemoryStore::new());
        store.add_dir("device_view/local/d").unwrap();
        let (dispatcher, receiver) = LookupDispatcher::new();
        let handles = spawn_workers(receiver, store.clone(), 2, None);

        let node = MergeNode::root(1);
        node.work().begin(1);
        dispatcher
            .dispatch(LookupTask {
                device: DeviceId::LOCAL,
                path: "device_view/local/d".into(),
                node: node.clone(),
            })
            .unwrap();
        node.work().wait_idle().await;
        assert_eq!(node.registry().len(), 1);

        drop(dispatcher);
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
