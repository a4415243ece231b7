use tracing::info;

use motorhub_types::Participant;

/// Push-notification sink. Delivery is fire-and-forget: implementations
/// must not block and never report failure back to the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, user: &Participant, title: &str, body: &str);
}

/// Notifier that uses the `tracing` crate.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, user: &Participant, title: &str, body: &str) {
        info!(target: "motorhub::notify", user = %user, title, "{}", body);
    }
}

/// No-op notifier (default when notifications are disabled).
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _user: &Participant, _title: &str, _body: &str) {}
}
