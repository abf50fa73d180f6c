//! Notification infrastructure module

mod notify_send;

pub use notify_send::NotifySendNotifier;

use crate::application::ports::{Notifier, SilentNotifier};

/// Notifier for the `notify` setting
pub fn create_notifier(enabled: bool) -> Box<dyn Notifier> {
    if enabled {
        Box::new(NotifySendNotifier::new())
    } else {
        Box::new(SilentNotifier)
    }
}
