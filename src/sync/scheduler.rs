use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use ::time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::BridgeError;
use crate::registry::AccessoryRegistry;
use crate::service::{Credentials, TagService};
use crate::sync::identity::LocalId;
use crate::sync::projector::SlaveDirectory;
use crate::sync::reconcile::{ReconcileReport, Reconciler};
use crate::utils::format_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Unauthenticated,
    Authenticating,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(ReconcileReport),
    /// A previous cycle still held the reconciler when the tick fired.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    /// Sign in again before each tick's fetch.
    pub reauthenticate: bool,
    pub beep_duration: u32,
}

/// One fetch+reconcile pass, built per tick so it can run on its own task.
struct Cycle<R> {
    service: Arc<dyn TagService>,
    credentials: Arc<Credentials>,
    engine: Arc<Mutex<Reconciler<R>>>,
    reauthenticate: bool,
}

impl<R: AccessoryRegistry> Cycle<R> {
    async fn run(&self) -> Result<CycleOutcome, BridgeError> {
        // Holding the reconciler for the whole pass makes cycles single-flight.
        let Ok(mut engine) = self.engine.try_lock() else {
            warn!("Previous update still running, skipping this tick");
            return Ok(CycleOutcome::Skipped);
        };

        info!(
            "Starting update of wireless tags at {}",
            format_datetime(&OffsetDateTime::now_utc())
        );

        if self.reauthenticate {
            self.service
                .authenticate(&self.credentials)
                .await
                .map_err(BridgeError::Authentication)?;
        }

        let snapshot = self
            .service
            .fetch_snapshot()
            .await
            .map_err(BridgeError::Fetch)?;

        if snapshot.is_empty() {
            warn!("Tag manager returned no tags");
        }

        Ok(CycleOutcome::Completed(engine.reconcile(&snapshot)))
    }
}

fn log_cycle(result: &Result<CycleOutcome, BridgeError>) {
    match result {
        Ok(CycleOutcome::Completed(report)) => info!(
            "Updated wireless tag data: {} added, {} updated, {} ignored, {} failed",
            report.added, report.updated, report.ignored, report.failed
        ),
        Ok(CycleOutcome::Skipped) => {}
        Err(e) => error!("Failed to update wireless tags: {}", e),
    }
}

/// Drives authentication and periodic reconciliation for the process lifetime.
pub struct Poller<R> {
    service: Arc<dyn TagService>,
    credentials: Arc<Credentials>,
    engine: Arc<Mutex<Reconciler<R>>>,
    slaves: SlaveDirectory,
    settings: PollSettings,
    state: PollState,
}

impl<R: AccessoryRegistry + 'static> Poller<R> {
    pub fn new(
        service: Arc<dyn TagService>,
        credentials: Credentials,
        engine: Reconciler<R>,
        slaves: SlaveDirectory,
        settings: PollSettings,
    ) -> Self {
        Poller {
            service,
            credentials: Arc::new(credentials),
            engine: Arc::new(Mutex::new(engine)),
            slaves,
            settings,
            state: PollState::Unauthenticated,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> PollState {
        self.state
    }

    #[cfg(test)]
    pub fn engine(&self) -> Arc<Mutex<Reconciler<R>>> {
        Arc::clone(&self.engine)
    }

    fn cycle(&self, reauthenticate: bool) -> Cycle<R> {
        Cycle {
            service: Arc::clone(&self.service),
            credentials: Arc::clone(&self.credentials),
            engine: Arc::clone(&self.engine),
            reauthenticate,
        }
    }

    /// Sign in, then fetch and reconcile once right away.
    ///
    /// On authentication failure the poller stays `Unauthenticated`. A failed
    /// first fetch still enters `Polling`; the next tick tries again.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        self.state = PollState::Authenticating;

        if let Err(e) = self.service.authenticate(&self.credentials).await {
            self.state = PollState::Unauthenticated;
            return Err(BridgeError::Authentication(e));
        }
        info!("Authenticated to tag manager as {}", self.credentials.username);

        let initial = self.cycle(false).run().await;
        log_cycle(&initial);

        self.state = PollState::Polling;
        Ok(())
    }

    /// Run one scheduled tick inline.
    pub async fn tick(&self) -> Result<CycleOutcome, BridgeError> {
        self.cycle(self.settings.reauthenticate).run().await
    }

    /// Beep the tag behind `id`, addressed by its cached slave id.
    pub async fn identify(&self, id: &LocalId) -> Result<(), BridgeError> {
        let Some(slave_id) = self.slaves.get(id) else {
            warn!("Identify requested for unknown accessory {}", id);
            return Ok(());
        };

        info!("Identify {}: beeping tag {}", id, slave_id);
        self.service
            .beep(slave_id, self.settings.beep_duration)
            .await
            .map_err(|source| BridgeError::Command { slave_id, source })
    }

    /// Run until the surrounding task is dropped.
    ///
    /// Each tick's cycle runs on its own task so identify requests are served
    /// while a slow fetch is in flight; overlapping ticks are skipped by the
    /// cycle itself.
    pub async fn run(mut self, mut identify_rx: mpsc::Receiver<LocalId>) {
        if let Err(e) = self.start().await {
            error!("{}; staying {:?} until restart", e, self.state);
            while let Some(id) = identify_rx.recv().await {
                warn!("Ignoring identify for {}: not signed in", id);
            }
            std::future::pending::<()>().await;
            return;
        }

        let period = self.settings.interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut identify_open = true;

        info!("Polling tag manager every {}ms", period.as_millis());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cycle = self.cycle(self.settings.reauthenticate);
                    tokio::spawn(async move {
                        log_cycle(&cycle.run().await);
                    });
                }
                request = identify_rx.recv(), if identify_open => match request {
                    Some(id) => {
                        if let Err(e) = self.identify(&id).await {
                            error!("{}", e);
                        }
                    }
                    None => identify_open = false,
                },
            }
        }
    }
}
