//! SwitchEngine: routes the server's input to whichever screen owns it.
//!
//! This use case is the heart of the server.  It receives queued events
//! (platform input, client connections, clipboard offers, timer ticks),
//! consults the [`SwitchController`] and the [`HotkeyEngine`], and tells the
//! [`RoutingLayer`] what to deliver where.
//!
//! # Architecture
//!
//! The engine depends only on traits ([`PlatformScreen`], [`RoutingLayer`])
//! and on the pure domain types in `gridshare_core`.  All infrastructure is
//! injected at construction time, making the engine fully unit-testable.
//!
//! # The virtual cursor
//!
//! While the server screen is active the physical cursor moves freely and
//! its position is fed straight to the controller.  Once a client is active
//! the physical cursor is parked at the centre of the server screen.  Every
//! reported motion is turned into a delta from the centre, the cursor is
//! warped back, and the delta moves a *virtual* cursor clamped to the
//! client's shape.  Edge detection on the client runs on that virtual
//! cursor.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use gridshare_core::{
    Action, ActionKind, ClipboardId, ClipboardRelay, Direction, HotkeyEngine, HotkeyMatch, Key,
    KeyCombo, KeySequence, ModifierMask, MouseButton, Rect, ServerConfig, SwitchController,
    SwitchDecision, SwitchRequest, SwitchState, Topology, TopologyError,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::application::manage_screens::{AdmitError, ScreenRegistry};
use crate::infrastructure::platform::{
    HotKeyHandle, KeyAction, PlatformError, PlatformEvent, PlatformScreen,
};

/// Error type for the switch engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("routing layer error: {0}")]
    Routing(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("screen {0:?} is not in the layout and the centre cell is occupied")]
    ServerNotInLayout(String),

    #[error("invalid layout: {0}")]
    Topology(#[from] TopologyError),

    #[error("client refused: {0}")]
    Admit(#[from] AdmitError),
}

/// Input delivered to a client screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardedInput {
    KeyDown { key: Key, modifiers: ModifierMask },
    KeyUp { key: Key, modifiers: ModifierMask },
    /// Absolute position in the client's coordinates.
    MouseMove { x: i32, y: i32 },
    /// Motion delta, sent instead of `MouseMove` with `relativeMouseMoves`.
    MouseRelativeMove { dx: i32, dy: i32 },
    MouseDown(u8),
    MouseUp(u8),
    MouseWheel { x_delta: i32, y_delta: i32 },
}

/// Trait for notifying the network side about routing decisions.
///
/// Screens are identified by their canonical names.  Infrastructure
/// implementations talk to connected clients; test implementations record
/// calls.
#[async_trait]
pub trait RoutingLayer: Send + Sync {
    /// Input control moved from `from` to `to`; the cursor enters `to` at
    /// `(x, y)`.
    async fn switched(&self, from: &str, to: &str, x: i32, y: i32) -> Result<(), String>;

    /// Delivers input to a client screen.
    async fn forward(&self, screen: &str, input: ForwardedInput) -> Result<(), String>;

    /// `owner` has new content on clipboard `id`; `peers` must pull it.
    async fn clipboard_changed(
        &self,
        owner: &str,
        id: ClipboardId,
        sequence: u32,
        peers: &[String],
    ) -> Result<(), String>;

    /// `target` just received input control and must pull clipboard `id`
    /// from `owner`.
    async fn clipboard_handoff(
        &self,
        owner: &str,
        target: &str,
        id: ClipboardId,
        sequence: u32,
    ) -> Result<(), String>;

    /// Drops and re-establishes every client connection.
    async fn restart_connections(&self) -> Result<(), String>;
}

/// One item of the engine queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Observed on the server's own devices.
    Platform(PlatformEvent),
    /// A client finished its handshake.
    ScreenConnected { name: String, shape: Rect },
    ScreenDisconnected { name: String },
    /// A client (or the server) announced new clipboard content.
    ClipboardOffered {
        screen: String,
        id: ClipboardId,
        sequence: u32,
        size: u64,
    },
    /// A controller deadline may have passed.
    Tick,
    /// Leave the run loop.
    Quit,
}

/// Modifier keys currently held on the server keyboard.
#[derive(Debug, Default, Clone)]
struct ModifierState {
    held: HashSet<Key>,
}

impl ModifierState {
    fn mask(&self) -> ModifierMask {
        self.held.iter().filter_map(|key| key.modifier()).collect()
    }

    fn update(&mut self, key: Key, is_down: bool) {
        if key.modifier().is_none() {
            return;
        }
        if is_down {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }
}

/// The switch engine.
pub struct SwitchEngine {
    config: ServerConfig,
    server_name: String,
    server_index: usize,
    server_shape: Rect,
    controller: SwitchController,
    hotkeys: HotkeyEngine,
    clipboard: ClipboardRelay,
    registry: ScreenRegistry,
    modifiers: ModifierState,
    /// Cursor on the active screen, in that screen's coordinates.
    cursor: (i32, i32),
    hot_key_handles: Vec<HotKeyHandle>,
    started: bool,
    platform: Arc<dyn PlatformScreen>,
    routing: Arc<dyn RoutingLayer>,
}

impl SwitchEngine {
    /// Creates an engine for the server screen called `server_name`.
    ///
    /// If the layout has no screen by that name, the server is placed in the
    /// centre cell.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ServerNotInLayout`] if the name is unknown and
    /// the centre cell is taken.
    pub fn new(
        mut config: ServerConfig,
        server_name: &str,
        platform: Arc<dyn PlatformScreen>,
        routing: Arc<dyn RoutingLayer>,
    ) -> Result<Self, EngineError> {
        let server_index = match config.topology.find_by_name(server_name) {
            Some(index) => index,
            None => config
                .topology
                .fix_no_server(server_name)
                .ok_or_else(|| EngineError::ServerNotInLayout(server_name.to_string()))?,
        };
        config.topology.mark_server(server_index)?;

        let server_name = config
            .topology
            .screen_at(server_index)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| server_name.to_string());
        let controller = SwitchController::new(server_index, config.switch_policy_for(server_index));
        let hotkeys = HotkeyEngine::from_hotkeys(&config.hotkeys);
        let clipboard = config.options.clipboard_relay();

        Ok(Self {
            server_name,
            server_index,
            server_shape: platform.shape(),
            controller,
            hotkeys,
            clipboard,
            registry: ScreenRegistry::new(),
            modifiers: ModifierState::default(),
            cursor: platform.cursor_pos(),
            hot_key_handles: Vec::new(),
            started: false,
            config,
            platform,
            routing,
        })
    }

    /// Places unknown clients next to the server instead of refusing them.
    pub fn set_auto_add(&mut self, direction: Option<Direction>) {
        self.registry.set_auto_add(direction);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.config.topology
    }

    pub fn registry(&self) -> &ScreenRegistry {
        &self.registry
    }

    pub fn clipboard(&self) -> &ClipboardRelay {
        &self.clipboard
    }

    pub fn switch_state(&self) -> SwitchState {
        self.controller.state()
    }

    pub fn server_index(&self) -> usize {
        self.server_index
    }

    pub fn active_screen(&self) -> usize {
        self.controller.active_screen()
    }

    /// Canonical name of the screen that owns input.
    pub fn active_name(&self) -> String {
        self.name_of(self.active_screen())
    }

    /// Cursor position on the active screen.
    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// When the run loop must wake up even without events.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.next_deadline()
    }

    fn on_server(&self) -> bool {
        self.active_screen() == self.server_index
    }

    fn name_of(&self, index: usize) -> String {
        self.config
            .topology
            .screen_at(index)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn shape_of(&self, index: usize) -> Option<Rect> {
        if index == self.server_index {
            Some(self.server_shape)
        } else {
            self.registry.get(index).map(|s| s.shape)
        }
    }

    /// Enables the platform and registers every key hotkey with it.
    ///
    /// A hotkey the platform refuses is logged and dropped; the engine
    /// continues without it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Platform`] if the platform cannot be enabled.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.started {
            return Ok(());
        }
        self.platform.enable()?;

        let triggers: Vec<KeySequence> = self.hotkeys.triggers().copied().collect();
        for trigger in triggers {
            let KeySequence::Key { key, modifiers } = trigger else {
                continue;
            };
            match self.platform.register_hot_key(key, modifiers) {
                Ok(handle) => self.hot_key_handles.push(handle),
                Err(e) => {
                    warn!(%trigger, error = %e, "hot key registration failed; continuing without it");
                    self.hotkeys.unbind(&trigger);
                }
            }
        }

        self.started = true;
        info!(
            screen = %self.server_name,
            hotkeys = self.hotkeys.len(),
            "switch engine started"
        );
        Ok(())
    }

    /// Returns input to the server, unregisters hotkeys and disables the
    /// platform.  Errors are logged; stopping always completes.
    pub async fn stop(&mut self, now: Instant) {
        if !self.started {
            return;
        }
        if let Err(e) = self.return_to_server(now).await {
            warn!(error = %e, "could not notify routing layer while stopping");
        }
        for handle in self.hot_key_handles.drain(..) {
            if let Err(e) = self.platform.unregister_hot_key(handle) {
                warn!(handle = handle.0, error = %e, "failed to unregister hot key");
            }
        }
        self.platform.disable();
        self.started = false;
        info!("switch engine stopped");
    }

    /// Processes one queued event.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Routing`] if the routing layer fails, and
    /// [`EngineError::Admit`] if a connecting client is refused.  The engine
    /// stays usable after any error.
    pub async fn handle_event(&mut self, event: EngineEvent, now: Instant) -> Result<(), EngineError> {
        match event {
            EngineEvent::Platform(event) => self.handle_platform_event(event, now).await,
            EngineEvent::ScreenConnected { name, shape } => {
                self.registry
                    .admit(&mut self.config.topology, &self.server_name, &name, shape)?;
                Ok(())
            }
            EngineEvent::ScreenDisconnected { name } => self.handle_disconnect(&name, now).await,
            EngineEvent::ClipboardOffered {
                screen,
                id,
                sequence,
                size,
            } => self.handle_clipboard_offer(&screen, id, sequence, size).await,
            EngineEvent::Tick => {
                let decision = self.controller.on_tick(now);
                self.apply_decision(decision, now).await
            }
            EngineEvent::Quit => Ok(()),
        }
    }

    // ── Private event handlers ────────────────────────────────────────────────

    async fn handle_platform_event(
        &mut self,
        event: PlatformEvent,
        now: Instant,
    ) -> Result<(), EngineError> {
        match event {
            PlatformEvent::KeyDown { key } => self.handle_key(key, true, now).await,
            PlatformEvent::KeyUp { key } => self.handle_key(key, false, now).await,
            PlatformEvent::MouseMove { x, y } => self.handle_mouse_move(x, y, now).await,
            PlatformEvent::MouseDown(button) => self.handle_mouse_button(button, true, now).await,
            PlatformEvent::MouseUp(button) => self.handle_mouse_button(button, false, now).await,
            PlatformEvent::MouseWheel { x_delta, y_delta } => {
                self.forward_to_active(ForwardedInput::MouseWheel { x_delta, y_delta })
                    .await
            }
            PlatformEvent::ClipboardGrabbed(id) => self.handle_local_clipboard(id).await,
            PlatformEvent::ShapeChanged(shape) => {
                debug!(width = shape.width, height = shape.height, "server shape changed");
                self.server_shape = shape;
                if self.on_server() {
                    self.cursor = shape.clamp(self.cursor.0, self.cursor.1);
                } else {
                    let (cx, cy) = shape.center();
                    self.platform.warp_cursor(cx, cy);
                }
                Ok(())
            }
            PlatformEvent::ScreensaverChanged(active) => {
                if active {
                    debug!("screensaver started; returning to server screen");
                    self.return_to_server(now).await?;
                }
                Ok(())
            }
        }
    }

    async fn handle_key(&mut self, key: Key, is_down: bool, now: Instant) -> Result<(), EngineError> {
        // The trigger's mask leaves out the modifier the key itself drives.
        let mut trigger_mask = self.modifiers.mask();
        if let Some(own) = key.modifier() {
            trigger_mask.set(own, false);
        }
        let trigger = KeySequence::key(key, trigger_mask);
        self.modifiers.update(key, is_down);

        let matched = if is_down {
            self.hotkeys.press(trigger)
        } else {
            self.hotkeys.release(trigger)
        };
        if matched.bound {
            for action in &matched.actions {
                self.execute(action, now).await?;
            }
            return Ok(());
        }

        if self.on_server() {
            return Ok(());
        }
        let modifiers = self.remap(self.active_screen(), self.modifiers.mask());
        let input = if is_down {
            ForwardedInput::KeyDown { key, modifiers }
        } else {
            ForwardedInput::KeyUp { key, modifiers }
        };
        self.forward_to_active(input).await
    }

    async fn handle_mouse_move(&mut self, x: i32, y: i32, now: Instant) -> Result<(), EngineError> {
        if self.on_server() {
            self.cursor = (x, y);
            let decision =
                self.controller
                    .on_pointer(&self.config.topology, self.server_shape, x, y, now);
            return self.apply_decision(decision, now).await;
        }

        let (cx, cy) = self.server_shape.center();
        let (dx, dy) = (x - cx, y - cy);
        if dx == 0 && dy == 0 {
            // Echo of our own warp.
            return Ok(());
        }
        self.platform.warp_cursor(cx, cy);

        let Some(shape) = self.shape_of(self.active_screen()) else {
            return Ok(());
        };
        let (vx, vy) = shape.clamp(self.cursor.0 + dx, self.cursor.1 + dy);
        self.cursor = (vx, vy);

        let input = if self.config.options.relative_mouse_moves {
            ForwardedInput::MouseRelativeMove { dx, dy }
        } else {
            ForwardedInput::MouseMove { x: vx, y: vy }
        };
        self.forward_to_active(input).await?;

        let decision = self
            .controller
            .on_pointer(&self.config.topology, shape, vx, vy, now);
        self.apply_decision(decision, now).await
    }

    async fn handle_mouse_button(
        &mut self,
        button: u8,
        is_down: bool,
        now: Instant,
    ) -> Result<(), EngineError> {
        // Buttons past the hotkey range are never bound.
        let matched = match MouseButton::new(button).map(KeySequence::Mouse) {
            Some(trigger) if is_down => self.hotkeys.press(trigger),
            Some(trigger) => self.hotkeys.release(trigger),
            None => HotkeyMatch::default(),
        };
        if matched.bound {
            for action in &matched.actions {
                self.execute(action, now).await?;
            }
            return Ok(());
        }

        self.controller.on_button(button, is_down);
        let input = if is_down {
            ForwardedInput::MouseDown(button)
        } else {
            ForwardedInput::MouseUp(button)
        };
        self.forward_to_active(input).await
    }

    async fn handle_disconnect(&mut self, name: &str, now: Instant) -> Result<(), EngineError> {
        let Some(index) = self.config.topology.find_by_name(name) else {
            warn!(name, "disconnect from a screen that is not in the layout");
            return Ok(());
        };
        if self.registry.remove(index).is_none() {
            debug!(name, "disconnect from a screen that was not connected");
            return Ok(());
        }
        self.clipboard.forget_screen(index);
        if self.active_screen() == index {
            info!(name, "active screen disconnected; returning to server");
            self.return_to_server(now).await?;
        }
        Ok(())
    }

    /// The server and every connected client, in grid order.
    fn peers(&self) -> Vec<usize> {
        let mut peers: Vec<usize> = self.registry.iter().map(|s| s.index).collect();
        peers.push(self.server_index);
        peers.sort_unstable();
        peers
    }

    async fn handle_clipboard_offer(
        &mut self,
        screen: &str,
        id: ClipboardId,
        sequence: u32,
        size: u64,
    ) -> Result<(), EngineError> {
        let Some(index) = self.config.topology.find_by_name(screen) else {
            warn!(screen, "clipboard offer from a screen that is not in the layout");
            return Ok(());
        };
        if index != self.server_index && !self.registry.is_connected(index) {
            debug!(screen, "clipboard offer from a disconnected screen ignored");
            return Ok(());
        }
        self.offer_clipboard(index, id, sequence, size).await
    }

    async fn handle_local_clipboard(&mut self, id: ClipboardId) -> Result<(), EngineError> {
        let Some(data) = self.platform.clipboard(id) else {
            return Ok(());
        };
        let sequence = self.clipboard.state(id).sequence.wrapping_add(1);
        self.offer_clipboard(self.server_index, id, sequence, data.len() as u64)
            .await
    }

    async fn offer_clipboard(
        &mut self,
        index: usize,
        id: ClipboardId,
        sequence: u32,
        size: u64,
    ) -> Result<(), EngineError> {
        let peers = self.peers();
        match self.clipboard.offer(index, id, sequence, size, &peers) {
            Ok(targets) => {
                let owner = self.name_of(index);
                let names: Vec<String> = targets.into_iter().map(|i| self.name_of(i)).collect();
                debug!(%owner, ?id, sequence, peers = names.len(), "clipboard ownership changed");
                self.routing
                    .clipboard_changed(&owner, id, sequence, &names)
                    .await
                    .map_err(EngineError::Routing)
            }
            Err(rejected) => {
                debug!(screen = index, ?id, %rejected, "clipboard offer rejected");
                Ok(())
            }
        }
    }

    async fn apply_decision(&mut self, decision: SwitchDecision, now: Instant) -> Result<(), EngineError> {
        match decision {
            SwitchDecision::Stay => Ok(()),
            SwitchDecision::Pending { to, deadline } => {
                trace!(to, ?deadline, "switch pending");
                Ok(())
            }
            SwitchDecision::Switch(request) => self.try_switch(request, now).await,
        }
    }

    /// Commits a proposed switch unless the target is offline or the
    /// platform vetoes leaving the server.
    async fn try_switch(&mut self, request: SwitchRequest, now: Instant) -> Result<(), EngineError> {
        let (Some(from_shape), Some(to_shape)) = (self.shape_of(request.from), self.shape_of(request.to))
        else {
            debug!(to = request.to, "switch target is not connected");
            self.controller.cancel();
            return Ok(());
        };
        if request.from == self.server_index && !self.platform.can_leave() {
            debug!("platform vetoed leaving the server screen");
            self.controller.cancel();
            return Ok(());
        }

        let (x, y) = match request.direction {
            Some(direction) => to_shape.entry_from(&from_shape, direction, self.cursor.0, self.cursor.1),
            None => to_shape.center(),
        };
        self.controller.commit(request, now);
        self.controller
            .set_policy(self.config.switch_policy_for(request.to));
        self.cursor = (x, y);

        if request.from == self.server_index {
            self.platform.leave();
            let (cx, cy) = self.server_shape.center();
            self.platform.warp_cursor(cx, cy);
        }
        if request.to == self.server_index {
            self.platform.enter();
            self.platform.warp_cursor(x, y);
        }
        self.notify_switch(request.from, request.to).await
    }

    /// Moves input back to the server without consulting the controller's
    /// gates.  Used when the active client goes away.
    async fn return_to_server(&mut self, now: Instant) -> Result<(), EngineError> {
        let from = self.active_screen();
        if from == self.server_index {
            return Ok(());
        }
        self.controller.reset_to(self.server_index, now);
        self.controller
            .set_policy(self.config.switch_policy_for(self.server_index));
        self.cursor = self.server_shape.center();
        self.platform.enter();
        self.platform.warp_cursor(self.cursor.0, self.cursor.1);
        self.notify_switch(from, self.server_index).await
    }

    async fn notify_switch(&mut self, from: usize, to: usize) -> Result<(), EngineError> {
        let from_name = self.name_of(from);
        let to_name = self.name_of(to);
        let (x, y) = self.cursor;
        info!(from = %from_name, to = %to_name, x, y, "switched screens");
        self.routing
            .switched(&from_name, &to_name, x, y)
            .await
            .map_err(EngineError::Routing)?;

        for handoff in self.clipboard.on_switch(to) {
            let owner = self.name_of(handoff.owner);
            self.routing
                .clipboard_handoff(&owner, &to_name, handoff.id, handoff.sequence)
                .await
                .map_err(EngineError::Routing)?;
        }
        Ok(())
    }

    async fn forward_to_active(&self, input: ForwardedInput) -> Result<(), EngineError> {
        if self.on_server() {
            return Ok(());
        }
        let screen = self.active_name();
        self.routing
            .forward(&screen, input)
            .await
            .map_err(EngineError::Routing)
    }

    /// Applies the screen's modifier remapping to `mask`.
    fn remap(&self, index: usize, mask: ModifierMask) -> ModifierMask {
        match self.config.topology.screen_at(index) {
            Some(screen) => mask.iter().map(|m| screen.modifier_map.map(m)).collect(),
            None => mask,
        }
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    async fn execute(&mut self, action: &Action, now: Instant) -> Result<(), EngineError> {
        debug!(%action, "executing action");
        match action.kind() {
            ActionKind::SwitchToScreen(name) => {
                let decision = self
                    .controller
                    .request_switch_to(&self.config.topology, name, now);
                self.apply_decision(decision, now).await
            }
            ActionKind::SwitchInDirection(direction) => {
                let decision = self.controller.request_switch_in_direction(
                    &self.config.topology,
                    *direction,
                    now,
                );
                self.apply_decision(decision, now).await
            }
            ActionKind::LockCursorToScreen(mode) => {
                match self.controller.apply_lock(*mode) {
                    Some(locked) => info!(locked, "cursor lock changed"),
                    None => debug!("lockCursorToScreen ignored: locking is disabled"),
                }
                Ok(())
            }
            ActionKind::RestartAllConnections => {
                info!("restarting all connections");
                self.routing
                    .restart_connections()
                    .await
                    .map_err(EngineError::Routing)
            }
            kind => self.deliver_input(action, kind).await,
        }
    }

    /// Synthesises an input action on every screen it targets: the server
    /// through the platform, clients through the routing layer.
    async fn deliver_input(&self, action: &Action, kind: &ActionKind) -> Result<(), EngineError> {
        let targets: Vec<usize> = self
            .peers()
            .into_iter()
            .filter(|&i| action.targets(&self.name_of(i)))
            .collect();

        for index in targets {
            if index == self.server_index {
                self.inject_local(kind);
                continue;
            }
            let screen = self.name_of(index);
            for input in forwarded_steps(kind) {
                self.routing
                    .forward(&screen, input)
                    .await
                    .map_err(EngineError::Routing)?;
            }
        }
        Ok(())
    }

    fn inject_local(&self, kind: &ActionKind) {
        let platform = &self.platform;
        match *kind {
            ActionKind::KeyDown(KeyCombo { key, modifiers }) => {
                platform.fake_key(key, modifiers, KeyAction::Down)
            }
            ActionKind::KeyUp(KeyCombo { key, modifiers }) => {
                platform.fake_key(key, modifiers, KeyAction::Up)
            }
            ActionKind::Keystroke(KeyCombo { key, modifiers }) => {
                platform.fake_key(key, modifiers, KeyAction::Stroke)
            }
            ActionKind::MouseDown(button) => platform.fake_mouse_button(button.number(), true),
            ActionKind::MouseUp(button) => platform.fake_mouse_button(button.number(), false),
            ActionKind::MouseButton(button) => {
                platform.fake_mouse_button(button.number(), true);
                platform.fake_mouse_button(button.number(), false);
            }
            _ => {}
        }
    }
}

/// The client-side input sequence for an input action.
fn forwarded_steps(kind: &ActionKind) -> Vec<ForwardedInput> {
    fn key_steps(combo: KeyCombo, down: bool, up: bool) -> Vec<ForwardedInput> {
        let KeyCombo { key, modifiers } = combo;
        let mut steps = Vec::with_capacity(2);
        if down {
            steps.push(ForwardedInput::KeyDown { key, modifiers });
        }
        if up {
            steps.push(ForwardedInput::KeyUp { key, modifiers });
        }
        steps
    }

    match *kind {
        ActionKind::KeyDown(combo) => key_steps(combo, true, false),
        ActionKind::KeyUp(combo) => key_steps(combo, false, true),
        ActionKind::Keystroke(combo) => key_steps(combo, true, true),
        ActionKind::MouseDown(button) => vec![ForwardedInput::MouseDown(button.number())],
        ActionKind::MouseUp(button) => vec![ForwardedInput::MouseUp(button.number())],
        ActionKind::MouseButton(button) => vec![
            ForwardedInput::MouseDown(button.number()),
            ForwardedInput::MouseUp(button.number()),
        ],
        _ => Vec::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
