//! Scoped ownership of acquired environments
//!
//! Every successful `acquire` is wrapped in a [`Lease`]. Teardown runs at most
//! once per lease no matter how many times `release` is called, and every
//! lease taken by a pipeline run is tracked in that run's [`LeaseSet`] so the
//! runner can sweep anything left behind by a panicking or cancelled task.

use crate::environment::{ExecutionEnvironment, Provisioner};
use crate::error::ProvisionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// An acquired environment with idempotent release
pub struct Lease {
    env: Box<dyn ExecutionEnvironment>,
    released: AtomicBool,
}

impl Lease {
    /// Acquire a fresh environment for `image`
    pub async fn acquire(provisioner: &dyn Provisioner, image: &str) -> Result<Arc<Self>, ProvisionError> {
        let env = provisioner.acquire(image).await?;
        debug!("Acquired environment {} ({})", env.id(), image);
        Ok(Arc::new(Self {
            env,
            released: AtomicBool::new(false),
        }))
    }

    pub fn environment(&self) -> &dyn ExecutionEnvironment {
        self.env.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Tear the environment down; later calls are no-ops
    ///
    /// Returns true if this call performed the teardown. A failing teardown is
    /// logged and still counts as released.
    pub async fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        match self.env.teardown().await {
            Ok(()) => debug!("Released environment {}", self.env.id()),
            Err(e) => warn!("{}", e),
        }
        true
    }
}

/// All leases taken during one pipeline run
#[derive(Clone, Default)]
pub struct LeaseSet {
    leases: Arc<Mutex<Vec<Arc<Lease>>>>,
}

impl LeaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn track(&self, lease: Arc<Lease>) {
        self.leases.lock().await.push(lease);
    }

    /// Number of tracked leases not yet released
    pub async fn outstanding(&self) -> usize {
        self.leases
            .lock()
            .await
            .iter()
            .filter(|l| !l.is_released())
            .count()
    }

    /// Release every tracked lease; returns how many were still held
    pub async fn release_all(&self) -> usize {
        let leases: Vec<Arc<Lease>> = self.leases.lock().await.clone();
        let mut released = 0;
        for lease in leases {
            if lease.release().await {
                released += 1;
            }
        }
        released
    }
}
