use std::env;
use std::process::Command;
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

pub const ALARM_NOTIFICATION_TITLE: &str = "Alarm Triggered!";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("desktop notifications are not supported here")]
    Unsupported,
    #[error("failed to launch notifier: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
}

impl NotificationPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationPermission::Default => "default",
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
        }
    }
}

pub trait NotificationBackend {
    fn is_supported(&self) -> bool;
    fn request_permission(&mut self) -> NotificationPermission;
    /// Must not block the caller.
    fn show(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

pub trait FocusProbe {
    fn is_focused(&self) -> bool;
}

pub struct FixedFocus(pub bool);

impl FocusProbe for FixedFocus {
    fn is_focused(&self) -> bool {
        self.0
    }
}

/// Best-effort notifier: emits only with granted permission while the app is
/// out of focus, and swallows every failure.
pub struct NotificationNotifier {
    backend: Box<dyn NotificationBackend>,
    focus: Box<dyn FocusProbe>,
    permission: NotificationPermission,
}

impl NotificationNotifier {
    pub fn new(backend: Box<dyn NotificationBackend>, focus: Box<dyn FocusProbe>) -> Self {
        Self {
            backend,
            focus,
            permission: NotificationPermission::Default,
        }
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    pub fn request_permission(&mut self) -> NotificationPermission {
        if self.permission != NotificationPermission::Granted {
            self.permission = self.backend.request_permission();
            debug!(permission = self.permission.as_str(), "notification permission");
        }
        self.permission
    }

    /// Returns whether a notification was handed to the backend.
    pub fn notify(&self, title: &str, body: &str) -> bool {
        if self.permission != NotificationPermission::Granted
            || !self.backend.is_supported()
            || self.focus.is_focused()
        {
            return false;
        }
        match self.backend.show(title, body) {
            Ok(()) => true,
            Err(err) => {
                warn!("notification failed: {err}");
                false
            }
        }
    }
}

pub fn alarm_notification_body(name: &str) -> String {
    format!("{name} is ringing!")
}

/// Delivers through the platform's command-line notifier.
pub struct DesktopNotificationBackend {
    enabled: bool,
    program: Option<&'static str>,
}

impl DesktopNotificationBackend {
    pub fn new(enabled: bool) -> Self {
        let program = platform_program().filter(|program| find_on_path(program));
        Self { enabled, program }
    }
}

impl NotificationBackend for DesktopNotificationBackend {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn request_permission(&mut self) -> NotificationPermission {
        if self.enabled && self.program.is_some() {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        }
    }

    fn show(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let program = self.program.ok_or(NotifyError::Unsupported)?;
        let mut command = notifier_command(program, title, body);
        let mut child = command.spawn()?;
        thread::spawn(move || {
            if let Err(err) = child.wait() {
                warn!("notifier process did not finish cleanly: {err}");
            }
        });
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn platform_program() -> Option<&'static str> {
    Some("osascript")
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_program() -> Option<&'static str> {
    Some("notify-send")
}

#[cfg(not(unix))]
fn platform_program() -> Option<&'static str> {
    None
}

fn notifier_command(program: &str, title: &str, body: &str) -> Command {
    let mut command = Command::new(program);
    if program == "osascript" {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(body),
            escape_applescript(title)
        );
        command.arg("-e").arg(script);
    } else {
        command.arg("--app-name=neonclock").arg(title).arg(body);
    }
    command
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn find_on_path(program: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}


#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::testing::RecordingNotificationBackend;
    use super::*;

    #[test]
    fn notifies_in_background_after_permission() {
        let (backend, shown) = RecordingNotificationBackend::granted();
        let mut notifier = NotificationNotifier::new(Box::new(backend), Box::new(FixedFocus(false)));
        assert!(!notifier.notify(ALARM_NOTIFICATION_TITLE, "early"));

        assert_eq!(notifier.request_permission(), NotificationPermission::Granted);
        assert!(notifier.notify(ALARM_NOTIFICATION_TITLE, &alarm_notification_body("Wake")));
        assert_eq!(
            shown.borrow().as_slice(),
            &[(
                "Alarm Triggered!".to_string(),
                "Wake is ringing!".to_string()
            )]
        );
    }

    #[test]
    fn stays_quiet_while_focused() {
        let (backend, shown) = RecordingNotificationBackend::granted();
        let mut notifier = NotificationNotifier::new(Box::new(backend), Box::new(FixedFocus(true)));
        notifier.request_permission();
        assert!(!notifier.notify(ALARM_NOTIFICATION_TITLE, "body"));
        assert!(shown.borrow().is_empty());
    }

    #[test]
    fn denied_or_unsupported_never_shows() {
        let (mut backend, shown) = RecordingNotificationBackend::granted();
        backend.grant = false;
        let mut notifier = NotificationNotifier::new(Box::new(backend), Box::new(FixedFocus(false)));
        assert_eq!(notifier.request_permission(), NotificationPermission::Denied);
        assert!(!notifier.notify(ALARM_NOTIFICATION_TITLE, "body"));

        let (mut backend, _) = RecordingNotificationBackend::granted();
        backend.supported = false;
        let mut notifier = NotificationNotifier::new(Box::new(backend), Box::new(FixedFocus(false)));
        notifier.request_permission();
        assert!(!notifier.notify(ALARM_NOTIFICATION_TITLE, "body"));
        assert!(shown.borrow().is_empty());
    }

    #[test]
    #[traced_test]
    fn backend_failures_are_swallowed() {
        let (mut backend, _) = RecordingNotificationBackend::granted();
        backend.fail = true;
        let mut notifier = NotificationNotifier::new(Box::new(backend), Box::new(FixedFocus(false)));
        notifier.request_permission();
        assert!(!notifier.notify(ALARM_NOTIFICATION_TITLE, "body"));
        assert!(logs_contain("notification failed"));
    }

    #[test]
    fn disabled_desktop_backend_is_denied() {
        let mut backend = DesktopNotificationBackend::new(false);
        assert_eq!(backend.request_permission(), NotificationPermission::Denied);
    }

    #[test]
    fn applescript_text_is_escaped() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
