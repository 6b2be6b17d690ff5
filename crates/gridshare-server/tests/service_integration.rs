//! Integration tests for the service lifecycle and the service-manager
//! helpers.
//!
//! The engine tests host a real `SwitchEngine` on the headless platform, the
//! way the binary does, and drive it with control requests from another
//! thread.  The manager tests use an in-memory `ServiceManager` whose removal
//! completes only after a few status checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use gridshare_core::{Rect, Screen, ServerConfig, Topology};
use gridshare_server::application::event_loop::EventLoop;
use gridshare_server::application::route_input::{RoutingLayer, SwitchEngine};
use gridshare_server::infrastructure::platform::headless::HeadlessScreen;
use gridshare_server::infrastructure::platform::PlatformScreen;
use gridshare_server::infrastructure::routing::LogRouting;
use gridshare_server::infrastructure::service::manager::{
    service_arguments, uninstall_and_wait, RetryPolicy, ServiceControlError, ServiceManager,
};
use gridshare_server::infrastructure::service::{
    clear_global, dispatch_global, install_global, ServiceControl, ServiceHost, ServiceState,
};

// ── Hosted engine ─────────────────────────────────────────────────────────────

fn office() -> ServerConfig {
    let mut topology = Topology::default();
    topology.set_screen(7, Screen::new("server")).unwrap();
    topology.set_screen(8, Screen::new("laptop")).unwrap();
    ServerConfig::new(topology)
}

/// Starts a daemon thread that builds a fresh engine on every run.
fn spawn_daemon(host: &ServiceHost, runs: Arc<AtomicUsize>) -> thread::JoinHandle<i32> {
    let host = host.clone();
    thread::spawn(move || {
        let platform = Arc::new(HeadlessScreen::new(Rect::new(0, 0, 1920, 1080)));
        let routing = Arc::new(LogRouting::new());
        host.run_daemon(|host| {
            runs.fetch_add(1, Ordering::SeqCst);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let engine = SwitchEngine::new(
                office(),
                "server",
                Arc::clone(&platform) as Arc<dyn PlatformScreen>,
                Arc::clone(&routing) as Arc<dyn RoutingLayer>,
            )
            .unwrap();
            let (mut event_loop, queue) = EventLoop::new(engine);
            host.attach_queue(queue);
            host.set_running();
            match runtime.block_on(event_loop.run()) {
                Ok(()) => 0,
                Err(_) => 1,
            }
        })
    })
}

fn wait_for(host: &ServiceHost, wanted: ServiceState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while host.state() != wanted {
        assert!(Instant::now() < deadline, "timed out waiting for {wanted:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_hosted_engine_pauses_continues_and_stops() {
    // Arrange
    let host = ServiceHost::new();
    let runs = Arc::new(AtomicUsize::new(0));
    let daemon = spawn_daemon(&host, Arc::clone(&runs));
    wait_for(&host, ServiceState::Running);

    // Act
    let paused = host.control(ServiceControl::Pause);
    let continued = host.control(ServiceControl::Continue);
    wait_for(&host, ServiceState::Running);
    let stopped = host.control(ServiceControl::Stop);

    // Assert
    assert_eq!(paused, ServiceState::Paused);
    assert!(continued.is_run_state());
    assert_eq!(stopped, ServiceState::Stopped);
    assert_eq!(daemon.join().unwrap(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_global_dispatch_stops_the_installed_host() {
    // Arrange
    let host = ServiceHost::new();
    let daemon = spawn_daemon(&host, Arc::new(AtomicUsize::new(0)));
    wait_for(&host, ServiceState::Running);
    install_global(&host);

    // Act
    let interrogated = dispatch_global(ServiceControl::Interrogate);
    let stopped = dispatch_global(ServiceControl::Shutdown);
    clear_global();

    // Assert
    assert_eq!(interrogated, Some(ServiceState::Running));
    assert_eq!(stopped, Some(ServiceState::Stopped));
    assert_eq!(daemon.join().unwrap(), 0);
    assert_eq!(dispatch_global(ServiceControl::Stop), None);
}

// ── In-memory service manager ─────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryManager {
    services: Mutex<HashMap<String, String>>,
    /// Status checks left before a pending removal takes effect.
    removal_lag: Mutex<HashMap<String, u32>>,
    lag: u32,
}

impl InMemoryManager {
    fn with_lag(lag: u32) -> Self {
        Self {
            lag,
            ..Self::default()
        }
    }
}

impl ServiceManager for InMemoryManager {
    fn install(&self, name: &str, command_line: &str) -> Result<(), ServiceControlError> {
        let mut services = self.services.lock().unwrap();
        if services.contains_key(name) {
            return Err(ServiceControlError::AlreadyExists(name.to_string()));
        }
        services.insert(name.to_string(), command_line.to_string());
        Ok(())
    }

    fn uninstall(&self, name: &str) -> Result<(), ServiceControlError> {
        if !self.services.lock().unwrap().contains_key(name) {
            return Err(ServiceControlError::NotInstalled(name.to_string()));
        }
        self.removal_lag
            .lock()
            .unwrap()
            .insert(name.to_string(), self.lag);
        Ok(())
    }

    fn is_installed(&self, name: &str) -> Result<bool, ServiceControlError> {
        let mut lag = self.removal_lag.lock().unwrap();
        if let Some(left) = lag.get_mut(name) {
            if *left == 0 {
                lag.remove(name);
                self.services.lock().unwrap().remove(name);
            } else {
                *left -= 1;
            }
        }
        Ok(self.services.lock().unwrap().contains_key(name))
    }

    fn start(&self, _name: &str) -> Result<(), ServiceControlError> {
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), ServiceControlError> {
        if self.services.lock().unwrap().contains_key(name) {
            Ok(())
        } else {
            Err(ServiceControlError::NotInstalled(name.to_string()))
        }
    }

    fn stored_command_line(&self, name: &str) -> Option<String> {
        self.services.lock().unwrap().get(name).cloned()
    }
}

fn fast(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        interval: Duration::from_millis(1),
    }
}

#[test]
fn test_install_then_start_with_stored_arguments() {
    // Arrange
    let manager = InMemoryManager::default();
    manager
        .install("gridshare", r#"--settings "/etc/grid share/settings.toml" --name desk"#)
        .unwrap();

    // Act
    let stored = manager.stored_command_line("gridshare");
    let args = service_arguments(&["gridshare".to_string()], stored.as_deref());

    // Assert
    assert_eq!(
        args,
        vec![
            "gridshare",
            "--settings",
            "/etc/grid share/settings.toml",
            "--name",
            "desk"
        ]
    );
    assert_eq!(
        manager.install("gridshare", ""),
        Err(ServiceControlError::AlreadyExists("gridshare".into()))
    );
}

#[test]
fn test_uninstall_waits_for_delayed_removal() {
    let manager = InMemoryManager::with_lag(2);
    manager.install("gridshare", "").unwrap();

    let result = uninstall_and_wait(&manager, "gridshare", fast(5));

    assert_eq!(result, Ok(()));
    assert_eq!(manager.is_installed("gridshare"), Ok(false));
}

#[test]
fn test_uninstall_gives_up_when_removal_lags_too_long() {
    let manager = InMemoryManager::with_lag(10);
    manager.install("gridshare", "").unwrap();

    let result = uninstall_and_wait(&manager, "gridshare", fast(3));

    assert_eq!(
        result,
        Err(ServiceControlError::Timeout {
            name: "gridshare".into(),
            attempts: 3
        })
    );
}

#[test]
fn test_uninstalling_a_missing_service_fails() {
    let manager = InMemoryManager::default();

    let result = uninstall_and_wait(&manager, "gridshare", fast(3));

    assert_eq!(result, Err(ServiceControlError::NotInstalled("gridshare".into())));
}
