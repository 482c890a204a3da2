//! Pause point for in-memory collaborators.
//!
//! An armed `CallGate` holds the next call that passes through it until the
//! test releases it, so the environment can be changed while an operation is
//! suspended inside a collaborator.

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct Armed {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// One-shot pause point.
#[derive(Default)]
pub struct CallGate {
    armed: Mutex<Option<Armed>>,
}

impl CallGate {
    /// Unarmed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the next call at this gate. Re-arming replaces a pending arm.
    pub fn arm(&self) -> GateHandle {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.armed.lock() = Some(Armed {
            entered: entered_tx,
            release: release_rx,
        });
        GateHandle {
            entered: Some(entered_rx),
            release: Some(release_tx),
        }
    }

    /// True while an arm is waiting for a call.
    pub fn is_armed(&self) -> bool {
        self.armed.lock().is_some()
    }

    /// Pass the gate. Waits for release if armed, else returns at once.
    pub async fn pass(&self) {
        let armed = self.armed.lock().take();
        if let Some(armed) = armed {
            let _ = armed.entered.send(());
            // A dropped handle releases too.
            let _ = armed.release.await;
        }
    }
}

/// Controls one armed pause.
///
/// Dropping the handle releases the held call.
pub struct GateHandle {
    entered: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl GateHandle {
    /// Wait until a call is held at the gate.
    pub async fn entered(&mut self) {
        if let Some(entered) = self.entered.take() {
            let _ = entered.await;
        }
    }

    /// Let the held call continue.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        self.release();
    }
}
