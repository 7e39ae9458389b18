//! Turns process termination requests into [`InputEvent::Terminate`].
//!
//! Ctrl+C, SIGTERM and SIGHUP (the hosting terminal window was closed) all
//! count as the window-close event the control loop stops on.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::InputEvent;

/// Spawn a task that queues one `Terminate` event on the first termination request
///
/// The handlers are installed before this returns, so a request that arrives
/// before the task first runs is still caught.
///
/// # Errors
///
/// Returns an I/O error if the signal handlers cannot be installed.
pub fn spawn_termination_watcher(
    events: mpsc::UnboundedSender<InputEvent>,
) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let source = tokio::select! {
            _ = interrupt.recv() => "Ctrl+C",
            _ = terminate.recv() => "SIGTERM",
            _ = hangup.recv() => "SIGHUP",
        };

        info!("Received {}, shutting down...", source);
        let _ = events.send(InputEvent::Terminate);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn send_signal(name: &str) {
        let status = std::process::Command::new("kill")
            .arg(format!("-{}", name))
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_interrupt_before_first_poll_terminates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = spawn_termination_watcher(tx).unwrap();
        assert!(rx.try_recv().is_err());

        // The watcher task has not been polled yet
        send_signal("INT");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Timed out waiting for Terminate");
        assert_eq!(event, Some(InputEvent::Terminate));

        tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .expect("Watcher did not finish")
            .unwrap();
    }
}
