use log::info;

/// Best-effort message delivery. Implementations log their own failures.
pub trait Notifier {
    fn send(&mut self, message: &str) -> bool;
}

/// Stand-in when no messaging endpoint is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&mut self, message: &str) -> bool {
        info!("notification: {message}");
        true
    }
}
