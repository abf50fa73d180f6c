//! notify-send notification adapter

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::application::ports::{NotificationError, NotificationIcon, Notifier};

/// Desktop notifications through the `notify-send` tool
pub struct NotifySendNotifier {
    app_name: String,
}

impl NotifySendNotifier {
    pub fn new() -> Self {
        Self::with_app_name("drainify")
    }

    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn args(&self, title: &str, message: &str, icon: NotificationIcon) -> Vec<String> {
        let urgency = match icon {
            NotificationIcon::Warning => "critical",
            NotificationIcon::Recording => "low",
            NotificationIcon::Saved => "normal",
        };

        vec![
            "--app-name".to_string(),
            self.app_name.clone(),
            "--icon".to_string(),
            icon.icon_name().to_string(),
            "--urgency".to_string(),
            urgency.to_string(),
            title.to_string(),
            message.to_string(),
        ]
    }
}

impl Default for NotifySendNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for NotifySendNotifier {
    async fn notify(
        &self,
        title: &str,
        message: &str,
        icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        let status = Command::new("notify-send")
            .args(self.args(title, message, icon))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    NotificationError::NotifySendNotFound
                } else {
                    NotificationError::SendFailed(e.to_string())
                }
            })?;

        if !status.success() {
            return Err(NotificationError::SendFailed(format!(
                "notify-send exited with {}",
                status
            )));
        }

        Ok(())
    }
}
