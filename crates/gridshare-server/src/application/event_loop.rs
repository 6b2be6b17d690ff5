//! The single-threaded run loop that drives the [`SwitchEngine`].
//!
//! Every producer (platform hooks, client connections, the service control
//! handler) posts [`EngineEvent`]s into one unbounded queue.  The loop takes
//! them one at a time, so the engine never needs a lock.  When the switch
//! controller has a deadline armed (a switch delay or a double-tap window) the
//! loop wakes at that instant and feeds the engine a [`EngineEvent::Tick`].
//!
//! ```text
//!  platform ──┐
//!  network  ──┼──► EventQueue ──► EventLoop::run ──► SwitchEngine
//!  service  ──┘                      ▲
//!                   sleep_until(deadline) ── Tick
//! ```

use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::application::route_input::{EngineError, EngineEvent, SwitchEngine};

/// Cloneable handle for posting events to a running loop.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: UnboundedSender<EngineEvent>,
}

impl EventQueue {
    /// A queue and its receiving end, for callers that drain events
    /// themselves instead of through an [`EventLoop`].
    pub fn channel() -> (Self, UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Posts an event.  Returns `false` once the loop has exited.
    pub fn post(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Asks the loop to stop after the events already queued.
    pub fn quit(&self) -> bool {
        self.post(EngineEvent::Quit)
    }
}

/// Owns the engine and the receiving end of its queue.
pub struct EventLoop {
    engine: SwitchEngine,
    rx: UnboundedReceiver<EngineEvent>,
    queue: EventQueue,
}

impl EventLoop {
    pub fn new(engine: SwitchEngine) -> (Self, EventQueue) {
        let (queue, rx) = EventQueue::channel();
        let event_loop = Self {
            engine,
            rx,
            queue: queue.clone(),
        };
        (event_loop, queue)
    }

    /// Another handle to this loop's queue.
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    pub fn engine(&self) -> &SwitchEngine {
        &self.engine
    }

    pub fn into_engine(self) -> SwitchEngine {
        self.engine
    }

    /// Starts the engine, processes events until [`EngineEvent::Quit`] and
    /// stops the engine again.
    ///
    /// Errors from individual events are logged and do not end the loop.
    ///
    /// # Errors
    ///
    /// Returns the error from [`SwitchEngine::start`] if the engine cannot be
    /// started; nothing is processed in that case.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.engine.start()?;
        info!("event loop running");

        loop {
            let deadline = self.engine.next_deadline();
            let event = tokio::select! {
                received = self.rx.recv() => match received {
                    Some(event) => event,
                    // Every sender is gone, including our own: cannot happen
                    // while `self.queue` lives, but treat it as a quit.
                    None => EngineEvent::Quit,
                },
                _ = sleep_until_deadline(deadline) => EngineEvent::Tick,
            };

            if event == EngineEvent::Quit {
                debug!("quit requested");
                break;
            }
            if let Err(e) = self.engine.handle_event(event, Instant::now()).await {
                warn!(error = %e, "event handling failed");
            }
        }

        self.engine.stop(Instant::now()).await;
        info!("event loop stopped");
        Ok(())
    }
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
