//! Service lifecycle: hosting the engine as a pausable, stoppable daemon.
//!
//! # How the lifecycle works (for beginners)
//!
//! An OS service manager talks to a daemon through *control requests*
//! (pause, continue, stop, ...) that arrive on a thread the daemon does not
//! own.  The daemon's own thread runs the engine's event loop.  The two meet
//! in a [`ServiceHost`]: one mutex-guarded [`ServiceState`] plus a condition
//! variable.
//!
//! ```text
//!            ┌──────────── continue ─────────────┐
//!            ▼                                   │
//!  StartPending ──► Running ── pause ──► PausePending ──► Paused
//!   (run loop       (set_running)                         │
//!    starting)         │                                  │ stop
//!                      └── stop ──► StopPending ◄─────────┘
//!                                        │
//!                                        ▼
//!                                     Stopped
//! ```
//!
//! A pause or stop request moves the state to its pending form, posts `Quit`
//! into the engine queue so the run loop returns, and blocks until the daemon
//! thread has reached `Paused` or `Stopped`.  The daemon thread
//! ([`ServiceHost::run_daemon`]) calls the run function again after a
//! continue.  A request that arrives while the host is still
//! `StartPending` is honoured the same way: a pause parks the daemon before
//! its first run, a stop ends it without running.
//!
//! Control requests wait without a timeout: a run loop that never drains its
//! queue blocks the request forever.  A panic inside the run function is not
//! caught and leaves the state where it was.
//!
//! Some service APIs only accept a bare function pointer as the control
//! handler.  For those, [`install_global`] parks the active host in a
//! process-wide slot and [`dispatch_global`] forwards to it.

pub mod manager;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::application::event_loop::EventQueue;

/// Lifecycle state of the hosted daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    StartPending,
    Running,
    PausePending,
    Paused,
    ContinuePending,
    StopPending,
    Stopped,
}

impl ServiceState {
    /// `true` for the states in which the run function should be executing.
    pub fn is_run_state(self) -> bool {
        matches!(
            self,
            ServiceState::StartPending | ServiceState::ContinuePending | ServiceState::Running
        )
    }
}

/// A control request from the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceControl {
    Pause,
    Continue,
    Stop,
    /// System shutdown; handled like `Stop`.
    Shutdown,
    /// Report the current state without changing it.
    Interrogate,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<ServiceState>,
    changed: Condvar,
    /// Queue of the event loop currently running, if any.
    queue: Mutex<Option<EventQueue>>,
}

/// Shared lifecycle context between the control handler and the daemon
/// thread.  Cloning is cheap; every clone refers to the same state.
#[derive(Debug, Clone)]
pub struct ServiceHost {
    inner: Arc<Inner>,
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHost {
    /// A host in `StartPending`: the first call to the run function happens
    /// as soon as [`ServiceHost::run_daemon`] is entered.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ServiceState::StartPending),
                changed: Condvar::new(),
                queue: Mutex::new(None),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ServiceState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, Option<EventQueue>> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ServiceState {
        *self.lock_state()
    }

    fn set_state(&self, state: &mut MutexGuard<'_, ServiceState>, next: ServiceState) {
        debug!(from = ?**state, to = ?next, "service state changed");
        **state = next;
        self.inner.changed.notify_all();
    }

    /// Registers the queue of the event loop that is about to run, so control
    /// requests can interrupt it.
    ///
    /// If a pause or stop was requested before the loop got this far, `Quit`
    /// is posted immediately.
    pub fn attach_queue(&self, queue: EventQueue) {
        let state = self.lock_state();
        if matches!(*state, ServiceState::PausePending | ServiceState::StopPending) {
            queue.quit();
        }
        *self.lock_queue() = Some(queue);
    }

    /// Reports that the run function has finished starting up.
    pub fn set_running(&self) {
        let mut state = self.lock_state();
        if state.is_run_state() {
            self.set_state(&mut state, ServiceState::Running);
            info!("service running");
        }
    }

    fn interrupt_run_loop(&self) {
        if let Some(queue) = self.lock_queue().as_ref() {
            if !queue.quit() {
                debug!("event loop already gone");
            }
        }
    }

    /// Applies a control request and returns the resulting state.
    ///
    /// `Pause` blocks until the run function has returned and the host is
    /// `Paused`; `Stop` and `Shutdown` block until it is `Stopped`.  Requests
    /// after `Stopped` are ignored.
    pub fn control(&self, request: ServiceControl) -> ServiceState {
        let mut state = self.lock_state();
        if *state == ServiceState::Stopped {
            debug!(?request, "control request ignored; service is stopped");
            return *state;
        }

        match request {
            ServiceControl::Pause => {
                if !state.is_run_state() {
                    return *state;
                }
                info!("service pausing");
                self.set_state(&mut state, ServiceState::PausePending);
                self.interrupt_run_loop();
                while *state == ServiceState::PausePending {
                    state = self
                        .inner
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            ServiceControl::Continue => {
                if *state == ServiceState::Paused {
                    info!("service continuing");
                    self.set_state(&mut state, ServiceState::ContinuePending);
                }
            }
            ServiceControl::Stop | ServiceControl::Shutdown => {
                info!(?request, "service stopping");
                self.set_state(&mut state, ServiceState::StopPending);
                self.interrupt_run_loop();
                while *state != ServiceState::Stopped {
                    state = self
                        .inner
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            ServiceControl::Interrogate => {}
        }
        *state
    }

    /// Runs the daemon on the calling thread until the host is stopped.
    ///
    /// `run` is called whenever the host is in a run state and must return
    /// once its event loop has quit.  It is expected to call
    /// [`ServiceHost::attach_queue`] and [`ServiceHost::set_running`].  A
    /// return while `PausePending` pauses the host; any other return stops
    /// it.  A pause requested before `run` is entered completes without
    /// calling it.  Returns the last value `run` returned.
    pub fn run_daemon<F>(&self, mut run: F) -> i32
    where
        F: FnMut(&ServiceHost) -> i32,
    {
        let mut result = 0;
        let mut state = self.lock_state();
        while *state != ServiceState::Stopped {
            loop {
                let current = *state;
                match current {
                    // Paused before the run function was entered: nothing to
                    // interrupt, so the pause completes here.
                    ServiceState::PausePending => {
                        self.set_state(&mut state, ServiceState::Paused);
                        info!("service paused before running");
                    }
                    ServiceState::StopPending => break,
                    _ if current.is_run_state() => break,
                    _ => {}
                }
                state = self
                    .inner
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }

            if *state != ServiceState::StopPending {
                drop(state);
                result = run(self);
                state = self.lock_state();
            }

            *self.lock_queue() = None;
            let next = if *state == ServiceState::PausePending {
                ServiceState::Paused
            } else {
                ServiceState::Stopped
            };
            self.set_state(&mut state, next);
            info!(state = ?next, result, "service run function returned");
        }
        result
    }
}

// ── Process-wide slot ─────────────────────────────────────────────────────────

static ACTIVE_HOST: Mutex<Option<ServiceHost>> = Mutex::new(None);

fn active_slot() -> MutexGuard<'static, Option<ServiceHost>> {
    ACTIVE_HOST.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Makes `host` the target of [`dispatch_global`], replacing any previous
/// host.
pub fn install_global(host: &ServiceHost) {
    *active_slot() = Some(host.clone());
}

/// Empties the process-wide slot.
pub fn clear_global() {
    *active_slot() = None;
}

/// Forwards a control request to the installed host.  Returns `None` if no
/// host is installed.
pub fn dispatch_global(request: ServiceControl) -> Option<ServiceState> {
    // Clone out of the slot so a blocking request does not hold its lock.
    let host = active_slot().clone()?;
    Some(host.control(request))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::route_input::EngineEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    /// A run function that serves a bare queue until it sees `Quit`.
    fn queue_runner(runs: Arc<AtomicUsize>) -> impl FnMut(&ServiceHost) -> i32 {
        move |host| {
            runs.fetch_add(1, Ordering::SeqCst);
            let (queue, mut rx) = EventQueue::channel();
            host.attach_queue(queue);
            host.set_running();
            while let Some(event) = rx.blocking_recv() {
                if event == EngineEvent::Quit {
                    break;
                }
            }
            7
        }
    }

    fn wait_for(host: &ServiceHost, wanted: ServiceState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while host.state() != wanted {
            assert!(Instant::now() < deadline, "timed out waiting for {wanted:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_run_states() {
        assert!(ServiceState::StartPending.is_run_state());
        assert!(ServiceState::Running.is_run_state());
        assert!(ServiceState::ContinuePending.is_run_state());
        assert!(!ServiceState::PausePending.is_run_state());
        assert!(!ServiceState::Paused.is_run_state());
        assert!(!ServiceState::Stopped.is_run_state());
    }

    #[test]
    fn test_stop_blocks_until_stopped_and_returns_run_result() {
        // Arrange
        let host = ServiceHost::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let daemon = {
            let host = host.clone();
            let runner = queue_runner(Arc::clone(&runs));
            thread::spawn(move || host.run_daemon(runner))
        };
        wait_for(&host, ServiceState::Running);

        // Act
        let state = host.control(ServiceControl::Stop);

        // Assert
        assert_eq!(state, ServiceState::Stopped);
        assert_eq!(daemon.join().unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pause_then_continue_runs_again() {
        // Arrange
        let host = ServiceHost::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let daemon = {
            let host = host.clone();
            let runner = queue_runner(Arc::clone(&runs));
            thread::spawn(move || host.run_daemon(runner))
        };
        wait_for(&host, ServiceState::Running);

        // Act / Assert
        assert_eq!(host.control(ServiceControl::Pause), ServiceState::Paused);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert_eq!(
            host.control(ServiceControl::Continue),
            ServiceState::ContinuePending
        );
        wait_for(&host, ServiceState::Running);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert_eq!(host.control(ServiceControl::Shutdown), ServiceState::Stopped);
        daemon.join().unwrap();
    }

    #[test]
    fn test_stop_while_paused_does_not_run_again() {
        let host = ServiceHost::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let daemon = {
            let host = host.clone();
            let runner = queue_runner(Arc::clone(&runs));
            thread::spawn(move || host.run_daemon(runner))
        };
        wait_for(&host, ServiceState::Running);
        host.control(ServiceControl::Pause);

        assert_eq!(host.control(ServiceControl::Stop), ServiceState::Stopped);

        daemon.join().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_requests_after_stop_are_ignored() {
        let host = ServiceHost::new();
        let daemon = {
            let host = host.clone();
            thread::spawn(move || host.run_daemon(queue_runner(Arc::new(AtomicUsize::new(0)))))
        };
        wait_for(&host, ServiceState::Running);
        host.control(ServiceControl::Stop);
        daemon.join().unwrap();

        assert_eq!(host.control(ServiceControl::Continue), ServiceState::Stopped);
        assert_eq!(host.control(ServiceControl::Interrogate), ServiceState::Stopped);
    }

    #[test]
    fn test_stop_before_queue_is_attached_still_quits() {
        // Arrange: the run function stalls before attaching its queue
        let host = ServiceHost::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();
        let daemon = {
            let host = host.clone();
            thread::spawn(move || {
                host.run_daemon(|host| {
                    let _ = entered_tx.send(());
                    let _ = go_rx.recv();
                    let (queue, mut rx) = EventQueue::channel();
                    host.attach_queue(queue);
                    match rx.blocking_recv() {
                        Some(EngineEvent::Quit) => 0,
                        _ => 1,
                    }
                })
            })
        };

        entered_rx.recv().unwrap();

        // Act: stop from another thread, then let the run function continue
        let stopper = {
            let host = host.clone();
            thread::spawn(move || host.control(ServiceControl::Stop))
        };
        wait_for(&host, ServiceState::StopPending);
        go_tx.send(()).unwrap();

        // Assert
        assert_eq!(stopper.join().unwrap(), ServiceState::Stopped);
        assert_eq!(daemon.join().unwrap(), 0);
    }

    // ── Requests while StartPending ───────────────────────────────────────────

    #[test]
    fn test_pause_before_daemon_starts_parks_without_running() {
        // Arrange: the pause lands before run_daemon is entered
        let host = ServiceHost::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let pauser = {
            let host = host.clone();
            thread::spawn(move || host.control(ServiceControl::Pause))
        };
        wait_for(&host, ServiceState::PausePending);

        // Act
        let daemon = {
            let host = host.clone();
            let runner = queue_runner(Arc::clone(&runs));
            thread::spawn(move || host.run_daemon(runner))
        };

        // Assert: the pause completes and nothing ran
        assert_eq!(pauser.join().unwrap(), ServiceState::Paused);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert_eq!(
            host.control(ServiceControl::Continue),
            ServiceState::ContinuePending
        );
        wait_for(&host, ServiceState::Running);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert_eq!(host.control(ServiceControl::Stop), ServiceState::Stopped);
        assert_eq!(daemon.join().unwrap(), 7);
    }

    #[test]
    fn test_stop_before_daemon_starts_never_runs() {
        let host = ServiceHost::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let stopper = {
            let host = host.clone();
            thread::spawn(move || host.control(ServiceControl::Stop))
        };
        wait_for(&host, ServiceState::StopPending);

        let daemon = {
            let host = host.clone();
            let runner = queue_runner(Arc::clone(&runs));
            thread::spawn(move || host.run_daemon(runner))
        };

        assert_eq!(stopper.join().unwrap(), ServiceState::Stopped);
        assert_eq!(daemon.join().unwrap(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_continue_while_start_pending_is_ignored() {
        let host = ServiceHost::new();

        assert_eq!(
            host.control(ServiceControl::Continue),
            ServiceState::StartPending
        );
        assert_eq!(host.state(), ServiceState::StartPending);
    }

    #[test]
    fn test_pause_while_run_function_starts_up() {
        // Arrange: run entered (StartPending) but its queue is not attached
        let host = ServiceHost::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();
        let runs = Arc::new(AtomicUsize::new(0));
        let daemon = {
            let host = host.clone();
            let runs = Arc::clone(&runs);
            thread::spawn(move || {
                host.run_daemon(|host| {
                    if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                        let _ = entered_tx.send(());
                        let _ = go_rx.recv();
                    }
                    let (queue, mut rx) = EventQueue::channel();
                    host.attach_queue(queue);
                    host.set_running();
                    while let Some(event) = rx.blocking_recv() {
                        if event == EngineEvent::Quit {
                            break;
                        }
                    }
                    0
                })
            })
        };
        entered_rx.recv().unwrap();

        // Act
        let pauser = {
            let host = host.clone();
            thread::spawn(move || host.control(ServiceControl::Pause))
        };
        wait_for(&host, ServiceState::PausePending);
        go_tx.send(()).unwrap();

        // Assert
        assert_eq!(pauser.join().unwrap(), ServiceState::Paused);
        assert_eq!(host.control(ServiceControl::Stop), ServiceState::Stopped);
        assert_eq!(daemon.join().unwrap(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_slot_dispatches_to_installed_host() {
        // Arrange
        clear_global();
        assert_eq!(dispatch_global(ServiceControl::Interrogate), None);
        let host = ServiceHost::new();

        // Act
        install_global(&host);
        let state = dispatch_global(ServiceControl::Interrogate);
        clear_global();

        // Assert
        assert_eq!(state, Some(ServiceState::StartPending));
    }
}
