//! Execution context threaded through every command.

use super::events::ExecutionEvent;
use super::services::Services;
use super::variables::VariableScope;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returned by cancellable waits when a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cloneable stop handle. Cancelling drops the channel sender, which wakes
/// every sleeper at once.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    wake_tx: Arc<Mutex<Option<Sender<()>>>>,
    wake_rx: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake_tx: Arc::new(Mutex::new(Some(tx))),
            wake_rx: rx,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Ok(mut tx) = self.wake_tx.lock() {
            tx.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.check()?;
        match self.wake_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.check(),
            _ => Err(Cancelled),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores the execution state for one macro run.
pub struct ExecutionContext {
    pub variables: VariableScope,
    pub token: CancellationToken,
    pub services: Services,
    events: Option<std::sync::mpsc::Sender<ExecutionEvent>>,
}

impl ExecutionContext {
    pub fn new(services: Services) -> Self {
        Self {
            variables: VariableScope::new(),
            token: CancellationToken::new(),
            services,
            events: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_variables(mut self, variables: VariableScope) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_events(mut self, tx: std::sync::mpsc::Sender<ExecutionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Logs through the `log` facade and mirrors the line to the event channel.
    pub fn log(&self, msg: String) {
        log::info!("{}", msg);
        self.emit(ExecutionEvent::Log(msg));
    }

    pub fn warn(&self, msg: String) {
        log::warn!("{}", msg);
        self.emit(ExecutionEvent::Log(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn sleep_runs_full_duration_without_cancel() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(30)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_wakes_sleepers_early() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_secs(5)), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();

        // Stays cancelled for later waits
        assert_eq!(token.sleep(Duration::from_millis(1)), Err(Cancelled));
        assert!(token.is_cancelled());
    }
}
