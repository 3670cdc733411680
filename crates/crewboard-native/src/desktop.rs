//! Desktop backends for the reminder engine: notify-rust toasts and a sound
//! player that shells out to the platform's audio tool.

use async_trait::async_trait;
use crewboard_config::SoundTable;
use crewboard_core::{Priority, ReminderId};
use crewboard_reminders::{
    IntentSender, NotificationIntent, NotificationPlatform, NotifyError, Permission,
    PlatformNotification, SnoozeDirective, SoundError, SoundPlayer, SoundRequest,
};
use notify_rust::{Notification, Timeout};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(all(unix, not(target_os = "macos")))]
use std::collections::HashMap;
#[cfg(all(unix, not(target_os = "macos")))]
use std::sync::{Arc, Mutex, PoisonError};

const ACTION_CLICK: &str = "default";
const ACTION_SNOOZE: &str = "snooze";
const ACTION_TOMORROW: &str = "snooze-tomorrow";
const ACTION_CLOSED: &str = "__closed";
const QUICK_SNOOZE_MINUTES: u32 = 10;

pub struct DesktopNotifier {
    app_name: String,
    /// Server-side ids of live notifications, so a repeat for the same reminder replaces it.
    #[cfg(all(unix, not(target_os = "macos")))]
    live: Arc<Mutex<HashMap<ReminderId, u32>>>,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            #[cfg(all(unix, not(target_os = "macos")))]
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn present(
        &self,
        mut toast: Notification,
        notification: PlatformNotification,
        intents: IntentSender,
    ) -> Result<(), NotifyError> {
        toast
            .urgency(urgency_for(notification.priority))
            .action(ACTION_CLICK, "Open")
            .action(ACTION_SNOOZE, "Snooze 10 min")
            .action(ACTION_TOMORROW, "Tomorrow 9:00");
        if let Some(id) = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&notification.tag)
        {
            toast.id(*id);
        }

        // Showing and waiting for the action share a thread because the
        // handle owns the D-Bus connection the action arrives on.
        let (shown_tx, shown_rx) = std::sync::mpsc::channel();
        let live = Arc::clone(&self.live);
        std::thread::Builder::new()
            .name("crewboard-notification".to_string())
            .spawn(move || {
                let handle = match toast.show() {
                    Ok(handle) => handle,
                    Err(err) => {
                        let _ = shown_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                let server_id = handle.id();
                live.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(notification.tag.clone(), server_id);
                let _ = shown_tx.send(Ok(()));

                handle.wait_for_action(|action| route_action(action, &notification, &intents));

                let mut live = live.lock().unwrap_or_else(PoisonError::into_inner);
                if live.get(&notification.tag) == Some(&server_id) {
                    live.remove(&notification.tag);
                }
            })
            .map_err(|err| NotifyError::Show(err.to_string()))?;

        crate::blocking::run_blocking(|| shown_rx.recv())
            .map_err(|_| NotifyError::Show("notification thread exited".to_string()))?
            .map_err(NotifyError::Show)
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn present(
        &self,
        toast: Notification,
        _notification: PlatformNotification,
        _intents: IntentSender,
    ) -> Result<(), NotifyError> {
        crate::blocking::run_blocking(|| toast.show())
            .map(|_| ())
            .map_err(|err| NotifyError::Show(err.to_string()))
    }
}

#[async_trait]
impl NotificationPlatform for DesktopNotifier {
    fn permission(&self) -> Result<Permission, NotifyError> {
        // Linux hosts may run without a notification daemon; probe it on request.
        if cfg!(all(unix, not(target_os = "macos"))) {
            Ok(Permission::Default)
        } else {
            Ok(Permission::Granted)
        }
    }

    async fn request_permission(&self) -> Result<Permission, NotifyError> {
        tokio::task::spawn_blocking(probe_server)
            .await
            .map_err(|err| NotifyError::Unsupported(err.to_string()))?
    }

    fn show(
        &self,
        notification: PlatformNotification,
        intents: IntentSender,
    ) -> Result<(), NotifyError> {
        let mut toast = Notification::new();
        toast
            .appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.body)
            .timeout(if notification.require_interaction {
                Timeout::Never
            } else {
                Timeout::Default
            });
        self.present(toast, notification, intents)
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe_server() -> Result<Permission, NotifyError> {
    let info = notify_rust::get_server_information()
        .map_err(|err| NotifyError::Unsupported(err.to_string()))?;
    tracing::info!(
        server = %info.name,
        vendor = %info.vendor,
        version = %info.version,
        "notification server available"
    );
    Ok(Permission::Granted)
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn probe_server() -> Result<Permission, NotifyError> {
    Ok(Permission::Granted)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn urgency_for(priority: Priority) -> notify_rust::Urgency {
    match priority {
        Priority::Urgent => notify_rust::Urgency::Critical,
        Priority::High | Priority::Medium => notify_rust::Urgency::Normal,
        Priority::Low => notify_rust::Urgency::Low,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ActionOutcome {
    OpenApp,
    Intent(NotificationIntent),
    Ignore,
}

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn classify_action(action: &str, reminder_id: &ReminderId) -> ActionOutcome {
    let reminder_id = reminder_id.clone();
    match action {
        ACTION_CLICK => ActionOutcome::OpenApp,
        ACTION_SNOOZE => ActionOutcome::Intent(NotificationIntent::Snooze {
            reminder_id,
            directive: SnoozeDirective::Minutes(QUICK_SNOOZE_MINUTES),
        }),
        ACTION_TOMORROW => ActionOutcome::Intent(NotificationIntent::Snooze {
            reminder_id,
            directive: SnoozeDirective::TomorrowMorning,
        }),
        ACTION_CLOSED => ActionOutcome::Intent(NotificationIntent::Dismiss { reminder_id }),
        _ => ActionOutcome::Ignore,
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn route_action(action: &str, notification: &PlatformNotification, intents: &IntentSender) {
    match classify_action(action, &notification.tag) {
        ActionOutcome::OpenApp => {
            if let Err(err) = open::that(notification.deep_link.as_str()) {
                tracing::warn!(reminder_id = %notification.tag, "failed to open reminder: {err}");
            }
        }
        ActionOutcome::Intent(intent) => {
            if !intents.send(intent) {
                tracing::debug!(reminder_id = %notification.tag, "engine stopped before action arrived");
            }
        }
        ActionOutcome::Ignore => {
            tracing::debug!(reminder_id = %notification.tag, action, "unhandled notification action");
        }
    }
}

/// Plays the priority's sound file through `afplay`, `paplay` or PowerShell.
pub struct CommandSoundPlayer {
    sounds_dir: PathBuf,
    sounds: SoundTable,
}

impl CommandSoundPlayer {
    pub fn new(sounds_dir: impl Into<PathBuf>, sounds: SoundTable) -> Self {
        Self {
            sounds_dir: sounds_dir.into(),
            sounds,
        }
    }

    fn sound_file(&self, priority: Priority) -> PathBuf {
        self.sounds_dir.join(self.sounds.for_priority(priority))
    }
}

impl SoundPlayer for CommandSoundPlayer {
    fn play(&self, request: SoundRequest) -> Result<(), SoundError> {
        let file = self.sound_file(request.priority);
        if !file.is_file() {
            return Err(SoundError::Missing(request.priority));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| SoundError::Playback(err.to_string()))?;
        let _entered = runtime.enter();

        let mut child = player_command(&file, request.volume)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!(%status, "sound player exited with failure");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("sound player did not finish: {err}"),
            }
        });
        Ok(())
    }
}

fn player_command(file: &Path, volume: f32) -> Command {
    let volume = volume.clamp(0.0, 1.0);
    if cfg!(target_os = "macos") {
        let mut command = Command::new("afplay");
        command.arg("-v").arg(format!("{volume:.2}")).arg(file);
        command
    } else if cfg!(windows) {
        let mut command = Command::new("powershell");
        command.arg("-NoProfile").arg("-Command").arg(format!(
            "(New-Object Media.SoundPlayer '{}').PlaySync()",
            file.display()
        ));
        command
    } else {
        // PulseAudio volume is linear with 65536 as 100%.
        let scaled = (volume * 65536.0).round() as u32;
        let mut command = Command::new("paplay");
        command.arg(format!("--volume={scaled}")).arg(file);
        command
    }
}
