//! Slot admission control: per-slot concurrency caps and the
//! `gpu` ↔ `browser_headful` mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::job::Slot;

/// Held while a job occupies a slot; dropping it releases the permit
/// (and the per-domain permit, for `NetworkClient`).
pub struct SlotPermit {
    _global: OwnedSemaphorePermit,
    _domain: Option<OwnedSemaphorePermit>,
}

/// Owns the semaphores backing every slot class.
///
/// `gpu` and `browser_headful` share a single semaphore of capacity 1:
/// they must never run concurrently, and modeling them as one
/// semaphore makes that true by construction rather than by an extra
/// check that could race.
pub struct SlotAdmission {
    gpu_and_headful: Arc<Semaphore>,
    network_global: Arc<Semaphore>,
    network_per_domain: DashMap<String, Arc<Semaphore>>,
    cpu_nlp: Arc<Semaphore>,
}

impl SlotAdmission {
    pub fn new(network_client_cap: usize, cpu_nlp_cap: usize) -> Self {
        Self {
            gpu_and_headful: Arc::new(Semaphore::new(1)),
            network_global: Arc::new(Semaphore::new(network_client_cap)),
            network_per_domain: DashMap::new(),
            cpu_nlp: Arc::new(Semaphore::new(cpu_nlp_cap.max(1))),
        }
    }

    /// Sized from the host's available parallelism, per the `cpu_nlp`
    /// slot's default of "#cores".
    pub fn with_defaults() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(4, cores)
    }

    /// Try to acquire a permit for `slot` without blocking. Returns
    /// `None` if the slot (or, for `NetworkClient`, the per-domain
    /// limit) is saturated.
    pub fn try_acquire(&self, slot: Slot, domain: Option<&str>) -> Option<SlotPermit> {
        match slot {
            Slot::Gpu | Slot::BrowserHeadful => {
                let permit = Arc::clone(&self.gpu_and_headful).try_acquire_owned().ok()?;
                Some(SlotPermit {
                    _global: permit,
                    _domain: None,
                })
            }
            Slot::NetworkClient => {
                let global = Arc::clone(&self.network_global).try_acquire_owned().ok()?;
                let domain_permit = match domain {
                    Some(domain) => {
                        let sem = self
                            .network_per_domain
                            .entry(domain.to_string())
                            .or_insert_with(|| Arc::new(Semaphore::new(1)))
                            .clone();
                        Some(sem.try_acquire_owned().ok()?)
                    }
                    None => None,
                };
                Some(SlotPermit {
                    _global: global,
                    _domain: domain_permit,
                })
            }
            Slot::CpuNlp => {
                let permit = Arc::clone(&self.cpu_nlp).try_acquire_owned().ok()?;
                Some(SlotPermit {
                    _global: permit,
                    _domain: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_and_browser_headful_share_one_permit() {
        let admission = SlotAdmission::new(4, 2);
        let gpu_permit = admission.try_acquire(Slot::Gpu, None);
        assert!(gpu_permit.is_some());
        assert!(admission.try_acquire(Slot::BrowserHeadful, None).is_none());
        drop(gpu_permit);
        assert!(admission.try_acquire(Slot::BrowserHeadful, None).is_some());
    }

    #[test]
    fn network_client_caps_per_domain_at_one() {
        let admission = SlotAdmission::new(4, 2);
        let first = admission.try_acquire(Slot::NetworkClient, Some("example.org"));
        assert!(first.is_some());
        assert!(admission
            .try_acquire(Slot::NetworkClient, Some("example.org"))
            .is_none());
        // A different domain is unaffected.
        assert!(admission
            .try_acquire(Slot::NetworkClient, Some("other.org"))
            .is_some());
    }

    #[test]
    fn network_client_respects_global_cap() {
        let admission = SlotAdmission::new(1, 2);
        let _first = admission.try_acquire(Slot::NetworkClient, Some("a.org"));
        assert!(admission
            .try_acquire(Slot::NetworkClient, Some("b.org"))
            .is_none());
    }
}
