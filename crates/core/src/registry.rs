use crate::backend::BackendId;
use crate::error::BackendError;
use crate::traits::{BackendClient, BackendFactory};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

type Slot = Mutex<Option<Arc<dyn BackendClient>>>;

/// Outcome of closing every live client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub closed: Vec<BackendId>,
    pub failures: Vec<(BackendId, String)>,
    pub already_shut_down: bool,
}

/// Lazily created, shared backend clients.
///
/// Each backend has its own slot lock, so concurrent first use of one backend
/// creates a single client while other backends proceed independently.
pub struct ClientRegistry {
    factory: Arc<dyn BackendFactory>,
    slots: Vec<Slot>,
    shut_down: AtomicBool,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            slots: BackendId::ALL.iter().map(|_| Mutex::new(None)).collect(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub async fn acquire(&self, backend: BackendId) -> Result<Arc<dyn BackendClient>, BackendError> {
        if self.is_shut_down() {
            return Err(BackendError::ShutDown);
        }

        let mut slot = self.slots[backend.index()].lock().await;
        if self.is_shut_down() {
            return Err(BackendError::ShutDown);
        }
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = self.factory.connect(backend).await?;
        info!(backend = %backend, "backend client created");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Closes every live client. Safe to call more than once.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return ShutdownReport {
                already_shut_down: true,
                ..ShutdownReport::default()
            };
        }

        let mut live = Vec::new();
        for slot in &self.slots {
            if let Some(client) = slot.lock().await.take() {
                live.push(client);
            }
        }

        let outcomes = join_all(live.iter().map(|client| async move {
            (client.backend(), client.close().await)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (backend, outcome) in outcomes {
            match outcome {
                Ok(()) => report.closed.push(backend),
                Err(error) => {
                    warn!(backend = %backend, error = %error, "backend client failed to close");
                    report.failures.push((backend, error.to_string()));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            "client registry shut down"
        );
        report
    }
}
