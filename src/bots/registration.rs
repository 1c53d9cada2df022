//! The registration bot: chat intake plus the timed drain task.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::chat::{ChatEvent, IncomingMessage};
use crate::registration::{DrainWorker, Intake, IntakeOutcome};

pub struct RegistrationBot {
    intake: Intake,
    drain: Arc<DrainWorker>,
    drain_interval: Duration,
}

impl RegistrationBot {
    pub fn new(intake: Intake, drain: Arc<DrainWorker>, drain_interval: Duration) -> Self {
        Self {
            intake,
            drain,
            drain_interval,
        }
    }

    /// Run a drain cycle every `drain_interval`, first one after a full interval
    pub fn spawn_drain(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let drain = Arc::clone(&self.drain);
        let period = self.drain_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => match drain.run_cycle().await {
                        Ok(report) => info!("Drain cycle: {:?}", report),
                        Err(e) => error!("Drain cycle failed: {}", e),
                    },
                }
            }
            info!("Drain task stopped");
        })
    }

    /// Handle chat events until the channel closes or shutdown is signalled
    pub async fn run(
        self,
        mut events: mpsc::Receiver<ChatEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        let drain_task = self.spawn_drain(shutdown.clone());
        let mut shutdown = shutdown;
        let mut listening = true;
        info!(
            "Registration bot listening, draining every {:?}",
            self.drain_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv(), if listening => match event {
                    Some(ChatEvent::Message(message)) => self.handle(&message).await,
                    None => {
                        info!("Chat event stream closed, drain keeps running");
                        listening = false;
                    }
                },
            }
        }

        if let Err(e) = drain_task.await {
            warn!("Drain task ended abnormally: {}", e);
        }
    }

    async fn handle(&self, message: &IncomingMessage) {
        match self.intake.handle(message).await {
            Ok(IntakeOutcome::Ignored) => {}
            Ok(outcome) => info!("{} -> {:?}", message.author_id, outcome),
            Err(e) => error!("Registration from {} failed: {}", message.author_id, e),
        }
    }
}
