//! Timed construction.
//!
//! Progress is a pure function of elapsed time since the job started:
//! `clamp01(elapsed / duration)`. The scheduler keeps no timers of its own;
//! the controller polls it every update with the session clock. Untracked
//! instances are not being built and report full progress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::{ConstructionCompleted, ConstructionStarted, EventBus, LifecycleChanged};
use crate::math::{fixed_serde, ratio_clamped, Fixed};
use crate::registry::{BuildingRegistry, InstanceId, LifecycleState};

/// One tracked construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionJob {
    /// Session time the job started, in seconds.
    #[serde(with = "fixed_serde")]
    pub started_at: Fixed,
    /// Total build time in seconds.
    #[serde(with = "fixed_serde")]
    pub duration: Fixed,
    /// Last computed progress in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
}

impl ConstructionJob {
    /// A job with no progress yet.
    #[must_use]
    pub const fn new(started_at: Fixed, duration: Fixed) -> Self {
        Self {
            started_at,
            duration,
            progress: Fixed::ZERO,
        }
    }
}

/// Result of ticking one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The instance has no construction job.
    NotTracked,
    /// Still building, at this progress.
    Progressed(Fixed),
    /// Finished on this tick.
    Completed,
}

/// Tracks every building under construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionScheduler {
    jobs: BTreeMap<InstanceId, ConstructionJob>,
}

impl ConstructionScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking `id`, starting at session time `now`.
    pub fn start_construction(
        &mut self,
        id: InstanceId,
        duration: Fixed,
        now: Fixed,
        bus: &EventBus,
    ) {
        if self.jobs.insert(id, ConstructionJob::new(now, duration)).is_some() {
            tracing::warn!(%id, "Construction restarted for an already tracked instance");
        }
        tracing::debug!(%id, %duration, "Construction started");
        bus.publish(ConstructionStarted {
            instance: id,
            duration,
        });
    }

    /// Re-track a job restored from a host's save data.
    pub fn resume(&mut self, id: InstanceId, job: ConstructionJob) {
        self.jobs.insert(id, job);
    }

    /// Update progress for `id` given the seconds elapsed since its start.
    ///
    /// On reaching full progress the instance becomes Completed, tracking
    /// stops, and [`ConstructionCompleted`] is published exactly once.
    pub fn tick(
        &mut self,
        id: InstanceId,
        elapsed: Fixed,
        registry: &mut BuildingRegistry,
        bus: &EventBus,
    ) -> TickOutcome {
        if !self.jobs.contains_key(&id) {
            return TickOutcome::NotTracked;
        }
        let definition = match registry.get(id) {
            Some(instance) if instance.state == LifecycleState::UnderConstruction => {
                instance.definition.clone()
            }
            Some(instance) => {
                tracing::warn!(%id, state = ?instance.state, "Dropping construction job for a finished instance");
                self.jobs.remove(&id);
                return TickOutcome::NotTracked;
            }
            None => {
                tracing::warn!(%id, "Dropping construction job for a missing instance");
                self.jobs.remove(&id);
                return TickOutcome::NotTracked;
            }
        };

        let Some(job) = self.jobs.get_mut(&id) else {
            return TickOutcome::NotTracked;
        };
        let progress = ratio_clamped(elapsed, job.duration);
        job.progress = progress;
        registry.set_progress(id, progress);
        if progress < Fixed::ONE {
            return TickOutcome::Progressed(progress);
        }

        self.jobs.remove(&id);
        if let Some(from) = registry.set_state(id, LifecycleState::Completed) {
            bus.publish(LifecycleChanged {
                instance: id,
                from,
                to: LifecycleState::Completed,
            });
        }
        tracing::info!(%id, %definition, "Construction completed");
        bus.publish(ConstructionCompleted {
            instance: id,
            definition,
        });
        TickOutcome::Completed
    }

    /// Tick every tracked job against session time `now`.
    ///
    /// Returns the instances that completed, in id order.
    pub fn sweep(
        &mut self,
        now: Fixed,
        registry: &mut BuildingRegistry,
        bus: &EventBus,
    ) -> Vec<InstanceId> {
        let due: Vec<(InstanceId, Fixed)> = self
            .jobs
            .iter()
            .map(|(id, job)| (*id, now - job.started_at))
            .collect();
        due.into_iter()
            .filter(|(id, elapsed)| self.tick(*id, *elapsed, registry, bus) == TickOutcome::Completed)
            .map(|(id, _)| id)
            .collect()
    }

    /// Stop tracking `id`. Returns whether it was tracked.
    pub fn cancel(&mut self, id: InstanceId) -> bool {
        let removed = self.jobs.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, "Construction cancelled");
        }
        removed
    }

    /// Progress of `id`; full for untracked instances.
    #[must_use]
    pub fn progress(&self, id: InstanceId) -> Fixed {
        self.jobs.get(&id).map_or(Fixed::ONE, |job| job.progress)
    }

    /// Whether `id` is under construction.
    #[must_use]
    pub fn is_tracked(&self, id: InstanceId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Number of jobs.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.jobs.len()
    }

    /// Job for `id`, if tracked.
    #[must_use]
    pub fn job(&self, id: InstanceId) -> Option<&ConstructionJob> {
        self.jobs.get(&id)
    }

    /// All jobs in id order.
    pub fn jobs(&self) -> impl Iterator<Item = (InstanceId, &ConstructionJob)> {
        self.jobs.iter().map(|(id, job)| (*id, job))
    }
}
