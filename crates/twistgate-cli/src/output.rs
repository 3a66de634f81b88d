//! Prints every bus output to stdout, one JSON object per line.

use std::io::Write;

use tokio::task::JoinHandle;
use tracing::warn;
use twistgate_middleware::{EventBus, Topic};
use twistgate_types::Event;

/// Subscribe to every topic and spawn one printer task per topic.
///
/// Subscriptions are taken before this returns, so nothing published
/// afterwards is missed.  The tasks end once the bus is dropped and drained.
pub fn spawn_printers(bus: &EventBus) -> Vec<JoinHandle<()>> {
    Topic::ALL
        .iter()
        .map(|&topic| {
            let mut rx = bus.subscribe_to(topic);
            tokio::spawn(async move {
                while let Some(event) = rx.next().await {
                    print_event(&event);
                }
            })
        })
        .collect()
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{line}") {
                warn!(error = %e, "failed to write output");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode output"),
    }
}
