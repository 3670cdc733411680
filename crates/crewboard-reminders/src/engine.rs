use crate::{
    snooze_reminder, CheckSummary, Clock, DispatchSettings, EngineError, Haptics, IntentSender,
    NoHaptics, NotificationDispatcher, NotificationIntent, NotificationPlatform, Permission,
    PermissionGate, ReminderSource, SilentPlayer, SnoozeDirective, SnoozeError, SnoozeZone,
    SoundPlayer, SystemClock,
};
use chrono::{DateTime, Utc};
use crewboard_config::NotificationConfig;
use crewboard_core::{Priority, ReminderId};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Receives resolved snoozes; the host persists `until` as the reminder's `snoozed_until`.
pub trait SnoozeHandler: Send + Sync {
    fn snoozed(&self, id: &ReminderId, until: DateTime<Utc>);
}

impl<F> SnoozeHandler for F
where
    F: Fn(&ReminderId, DateTime<Utc>) + Send + Sync,
{
    fn snoozed(&self, id: &ReminderId, until: DateTime<Utc>) {
        self(id, until)
    }
}

pub struct ReminderEngine {
    source: Arc<dyn ReminderSource>,
    clock: Arc<dyn Clock>,
    gate: PermissionGate,
    dispatcher: Mutex<NotificationDispatcher>,
    snooze_handler: Arc<dyn SnoozeHandler>,
    zone: SnoozeZone,
    poll_interval: Duration,
    changed: Notify,
    intents: IntentSender,
    intent_rx: StdMutex<Option<mpsc::UnboundedReceiver<NotificationIntent>>>,
}

impl ReminderEngine {
    pub fn new(
        config: &NotificationConfig,
        source: Arc<dyn ReminderSource>,
        platform: Arc<dyn NotificationPlatform>,
        snooze_handler: Arc<dyn SnoozeHandler>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let zone = SnoozeZone::from(config.timezone()?);
        let (intents, intent_rx) = IntentSender::channel();

        let dispatcher = NotificationDispatcher::new(
            DispatchSettings::from(config),
            platform.clone(),
            Arc::new(SilentPlayer),
            Arc::new(NoHaptics),
        );

        Ok(Self {
            source,
            clock: Arc::new(SystemClock),
            gate: PermissionGate::new(platform),
            dispatcher: Mutex::new(dispatcher),
            snooze_handler,
            zone,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            changed: Notify::new(),
            intents,
            intent_rx: StdMutex::new(Some(intent_rx)),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sound_player(mut self, sound: Arc<dyn SoundPlayer>) -> Self {
        self.dispatcher.get_mut().set_sound_player(sound);
        self
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.dispatcher.get_mut().set_haptics(haptics);
        self
    }

    pub fn with_zone(mut self, zone: SnoozeZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn permission(&self) -> Permission {
        self.gate.permission()
    }

    pub async fn request_permission(&self) -> bool {
        self.gate.request_permission().await
    }

    /// Runs one check over the current snapshot.
    pub async fn check_reminders(&self) -> CheckSummary {
        let reminders = self.source.snapshot();
        let now = self.clock.now();
        let permission = self.gate.permission();

        let summary = self
            .dispatcher
            .lock()
            .await
            .check(&reminders, permission, now, &self.intents);

        if summary.dispatched > 0 || summary.failed > 0 {
            tracing::info!(
                reminders = reminders.len(),
                dispatched = summary.dispatched,
                failed = summary.failed,
                "reminder check completed"
            );
        } else {
            tracing::trace!(reminders = reminders.len(), "reminder check completed");
        }
        summary
    }

    pub async fn play_sound(&self, priority: Priority) {
        self.dispatcher.lock().await.play_sound(priority);
    }

    /// Resolves `directive` against the engine clock and reports it to the snooze handler.
    pub fn snooze(
        &self,
        reminder_id: &ReminderId,
        directive: SnoozeDirective,
    ) -> Result<DateTime<Utc>, SnoozeError> {
        let handler = &self.snooze_handler;
        snooze_reminder(
            reminder_id,
            directive,
            self.clock.now(),
            &self.zone,
            |id, until| handler.snoozed(id, until),
        )
    }

    /// Tells the polling task that the reminder collection changed; it re-checks right away.
    pub fn reminders_changed(&self) {
        self.changed.notify_one();
    }

    fn handle_intent(&self, intent: NotificationIntent) {
        match intent {
            NotificationIntent::Snooze {
                reminder_id,
                directive,
            } => {
                if let Err(err) = self.snooze(&reminder_id, directive) {
                    tracing::warn!(reminder_id = %reminder_id, "snooze from notification failed: {err}");
                }
            }
            NotificationIntent::Dismiss { reminder_id } => {
                tracing::debug!(reminder_id = %reminder_id, "reminder notification dismissed");
            }
        }
    }

    /// Spawns the polling task: one check immediately, then every poll interval,
    /// plus a check whenever [`reminders_changed`](Self::reminders_changed) is called.
    /// An engine can be started once.
    pub fn start(self: &Arc<Self>) -> Result<PollHandle, EngineError> {
        let mut intent_rx = self
            .intent_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(EngineError::AlreadyStarted)?;

        let gate = self.gate.clone();
        tokio::spawn(async move {
            if let Some(granted) = gate.request_if_undecided().await {
                tracing::debug!(granted, "first-run notification permission prompt finished");
            }
        });

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let engine = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(period = ?engine.poll_interval, "reminder polling started");

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    Some(intent) = intent_rx.recv() => engine.handle_intent(intent),
                    _ = engine.changed.notified() => {
                        engine.check_reminders().await;
                    }
                    _ = ticker.tick() => {
                        engine.check_reminders().await;
                    }
                }
            }

            intent_rx.close();
            tracing::info!("reminder polling stopped");
        });

        Ok(PollHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
            gate: self.gate.clone(),
        })
    }
}

/// Owner of a running polling task. Dropping it aborts the task.
pub struct PollHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    gate: PermissionGate,
}

impl PollHandle {
    /// Stops polling, waits for the task to exit and drops pending notification intents.
    pub async fn shutdown(mut self) {
        self.gate.dispose();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    tracing::error!("reminder polling task failed: {err}");
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.gate.dispose();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
