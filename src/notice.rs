use tracing::warn;

/// Receives the messages a user has to see (a missing path, mostly)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Prints notices to stderr, next to the rendered tree
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        warn!(notice = message, "User notice");
        eprintln!("! {}", message);
    }
}
