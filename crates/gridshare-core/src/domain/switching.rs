//! The switching state machine.
//!
//! [`SwitchController`] decides when live input moves from the active screen
//! to a neighbour.  It consumes cursor positions (in the active screen's
//! local coordinates), button state, lock requests and explicit switch
//! requests, and answers with a [`SwitchDecision`].
//!
//! Switching is two-phase.  The controller *proposes* a switch with
//! [`SwitchDecision::Switch`]; the caller checks anything the controller
//! cannot see (a platform veto, whether the target is connected) and then
//! calls [`SwitchController::commit`] or [`SwitchController::cancel`].
//!
//! All times are caller-supplied [`Instant`]s so the machine can be driven
//! deterministically in tests.  "Within N ms" comparisons are strict.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::geometry::{Corner, CornerSet, Direction, Rect};
use super::topology::Topology;
use crate::hotkey::action::LockMode;

/// Policy knobs taken from the server options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchPolicy {
    /// How long the cursor must stay on an edge before switching.  `None` or
    /// zero switches immediately.
    pub switch_delay: Option<Duration>,
    /// Window in which a second corner entry triggers the corner's switch.
    /// `None` means a single entry suffices.
    pub double_tap: Option<Duration>,
    /// Corners that trigger a switch.
    pub corners: CornerSet,
    /// Side of each corner zone in pixels; 0 is the single corner pixel.
    pub corner_size: u32,
    /// Ignore `lockCursorToScreen` actions.
    pub disable_lock_to_screen: bool,
}

/// Current phase of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Idle,
    /// A corner was entered once and waits for the double tap.
    AtCorner { corner: Corner, entered: Instant },
    /// A switch to `to` is pending, either on the delay timer or on the
    /// caller's commit.
    Switching {
        from: usize,
        to: usize,
        direction: Option<Direction>,
        since: Instant,
    },
}

/// A proposed move of input control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRequest {
    pub from: usize,
    pub to: usize,
    /// Edge the cursor leaves through, or `None` for a jump by name.
    pub direction: Option<Direction>,
}

/// What the caller should do after feeding the controller an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchDecision {
    /// Input stays on the active screen.
    Stay,
    /// A delayed edge switch is armed; check again at `deadline`.
    Pending { to: usize, deadline: Instant },
    /// Switch now, subject to the caller's veto.
    Switch(SwitchRequest),
}

/// Read-only snapshot of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    pub active_screen: usize,
    pub locked_to_screen: bool,
    pub pending_corner: Option<Corner>,
    pub corner_enter_time: Option<Instant>,
    pub last_switch_time: Option<Instant>,
    pub last_click_screen: Option<usize>,
}

/// The real-time switching state machine.  Owned by the engine's run loop.
#[derive(Debug, Clone)]
pub struct SwitchController {
    policy: SwitchPolicy,
    active: usize,
    phase: SwitchPhase,
    locked: bool,
    /// Corner zone the cursor is currently inside; entries are edges of this.
    inside_corner: Option<Corner>,
    buttons_held: u32,
    last_switch: Option<Instant>,
    last_click_screen: Option<usize>,
}

impl SwitchController {
    /// Creates a controller with `active` (normally the server cell) owning
    /// input.
    pub fn new(active: usize, policy: SwitchPolicy) -> Self {
        Self {
            policy,
            active,
            phase: SwitchPhase::Idle,
            locked: false,
            inside_corner: None,
            buttons_held: 0,
            last_switch: None,
            last_click_screen: None,
        }
    }

    pub fn policy(&self) -> &SwitchPolicy {
        &self.policy
    }

    /// Replaces the policy.  Any pending corner or delay is dropped.
    pub fn set_policy(&mut self, policy: SwitchPolicy) {
        self.policy = policy;
        if policy.disable_lock_to_screen {
            self.locked = false;
        }
        self.phase = SwitchPhase::Idle;
    }

    pub fn active_screen(&self) -> usize {
        self.active
    }

    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    pub fn is_locked_to_screen(&self) -> bool {
        self.locked
    }

    pub fn state(&self) -> SwitchState {
        let (pending_corner, corner_enter_time) = match self.phase {
            SwitchPhase::AtCorner { corner, entered } => (Some(corner), Some(entered)),
            _ => (None, None),
        };
        SwitchState {
            active_screen: self.active,
            locked_to_screen: self.locked,
            pending_corner,
            corner_enter_time,
            last_switch_time: self.last_switch,
            last_click_screen: self.last_click_screen,
        }
    }

    /// Returns `true` if edge and corner switching is currently suppressed.
    pub fn switching_blocked(&self) -> bool {
        self.locked || self.buttons_held != 0
    }

    /// When the caller should call [`SwitchController::on_tick`] next.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            SwitchPhase::Switching {
                direction: Some(_),
                since,
                ..
            } => self.delay().map(|delay| since + delay),
            SwitchPhase::AtCorner { entered, .. } => {
                self.policy.double_tap.map(|window| entered + window)
            }
            _ => None,
        }
    }

    fn delay(&self) -> Option<Duration> {
        self.policy.switch_delay.filter(|d| !d.is_zero())
    }

    /// Feeds a cursor position on the active screen, whose shape is `shape`.
    pub fn on_pointer(
        &mut self,
        topology: &Topology,
        shape: Rect,
        x: i32,
        y: i32,
        now: Instant,
    ) -> SwitchDecision {
        if self.switching_blocked() {
            self.inside_corner = None;
            self.drop_pending_switch();
            return SwitchDecision::Stay;
        }

        let corner = shape
            .corner_at(x, y, self.policy.corner_size)
            .filter(|c| self.policy.corners.contains(*c));
        if let Some(corner) = corner {
            let fresh_entry = self.inside_corner != Some(corner);
            self.inside_corner = Some(corner);
            self.drop_pending_switch();
            return if fresh_entry {
                self.on_corner_entry(topology, corner, now)
            } else {
                SwitchDecision::Stay
            };
        }
        self.inside_corner = None;

        let Some(direction) = shape.edge_at(x, y) else {
            if let SwitchPhase::Switching { to, .. } = self.phase {
                debug!(to, "cursor left the edge; pending switch cancelled");
                self.phase = SwitchPhase::Idle;
            }
            return SwitchDecision::Stay;
        };

        let Some(to) = topology.neighbor(self.active, direction) else {
            trace!(?direction, "edge without neighbour");
            self.drop_pending_switch();
            return SwitchDecision::Stay;
        };

        let request = SwitchRequest {
            from: self.active,
            to,
            direction: Some(direction),
        };
        let Some(delay) = self.delay() else {
            return self.propose(request, now);
        };

        match self.phase {
            SwitchPhase::Switching {
                to: pending,
                direction: Some(pending_dir),
                since,
                ..
            } if pending == to && pending_dir == direction => {
                if now.saturating_duration_since(since) >= delay {
                    SwitchDecision::Switch(request)
                } else {
                    SwitchDecision::Pending {
                        to,
                        deadline: since + delay,
                    }
                }
            }
            _ => {
                debug!(to, ?direction, ?delay, "switch delay armed");
                self.phase = SwitchPhase::Switching {
                    from: self.active,
                    to,
                    direction: Some(direction),
                    since: now,
                };
                SwitchDecision::Pending {
                    to,
                    deadline: now + delay,
                }
            }
        }
    }

    /// Fires expired timers: commits to a delayed switch whose delay has run
    /// out, and forgets a corner tap whose double-tap window has closed.
    pub fn on_tick(&mut self, now: Instant) -> SwitchDecision {
        match self.phase {
            SwitchPhase::Switching {
                from,
                to,
                direction: Some(direction),
                since,
            } => match self.delay() {
                Some(delay) if now.saturating_duration_since(since) >= delay => {
                    SwitchDecision::Switch(SwitchRequest {
                        from,
                        to,
                        direction: Some(direction),
                    })
                }
                Some(delay) => SwitchDecision::Pending {
                    to,
                    deadline: since + delay,
                },
                None => SwitchDecision::Stay,
            },
            SwitchPhase::AtCorner { entered, .. } => {
                let expired = self
                    .policy
                    .double_tap
                    .map_or(true, |window| now.saturating_duration_since(entered) >= window);
                if expired {
                    self.phase = SwitchPhase::Idle;
                }
                SwitchDecision::Stay
            }
            _ => SwitchDecision::Stay,
        }
    }

    fn on_corner_entry(&mut self, topology: &Topology, corner: Corner, now: Instant) -> SwitchDecision {
        if let Some(window) = self.policy.double_tap {
            let second_tap = matches!(
                self.phase,
                SwitchPhase::AtCorner { corner: armed, entered }
                    if armed == corner && now.saturating_duration_since(entered) < window
            );
            if !second_tap {
                debug!(corner = corner.name(), "corner armed for double tap");
                self.phase = SwitchPhase::AtCorner {
                    corner,
                    entered: now,
                };
                return SwitchDecision::Stay;
            }
        }

        let target = corner
            .switch_directions()
            .into_iter()
            .find_map(|d| topology.neighbor(self.active, d).map(|to| (d, to)));
        match target {
            Some((direction, to)) => self.propose(
                SwitchRequest {
                    from: self.active,
                    to,
                    direction: Some(direction),
                },
                now,
            ),
            None => {
                self.phase = SwitchPhase::Idle;
                SwitchDecision::Stay
            }
        }
    }

    fn propose(&mut self, request: SwitchRequest, now: Instant) -> SwitchDecision {
        self.phase = SwitchPhase::Switching {
            from: request.from,
            to: request.to,
            direction: request.direction,
            since: now,
        };
        SwitchDecision::Switch(request)
    }

    fn drop_pending_switch(&mut self) {
        if matches!(self.phase, SwitchPhase::Switching { .. }) {
            self.phase = SwitchPhase::Idle;
        }
    }

    /// Requests a switch to the screen answering to `name`, bypassing edges,
    /// delay and lock.  An unknown or unoccupied target, or the active screen
    /// itself, is a no-op.
    pub fn request_switch_to(&mut self, topology: &Topology, name: &str, now: Instant) -> SwitchDecision {
        match topology.find_by_name(name) {
            Some(to) if to != self.active => self.propose(
                SwitchRequest {
                    from: self.active,
                    to,
                    direction: None,
                },
                now,
            ),
            _ => SwitchDecision::Stay,
        }
    }

    /// Requests a switch to the occupied neighbour in `direction`.
    pub fn request_switch_in_direction(
        &mut self,
        topology: &Topology,
        direction: Direction,
        now: Instant,
    ) -> SwitchDecision {
        match topology.neighbor(self.active, direction) {
            Some(to) => self.propose(
                SwitchRequest {
                    from: self.active,
                    to,
                    direction: Some(direction),
                },
                now,
            ),
            None => SwitchDecision::Stay,
        }
    }

    /// Applies a `lockCursorToScreen` action.  Returns the new lock state, or
    /// `None` if locking is disabled by policy.
    pub fn apply_lock(&mut self, mode: LockMode) -> Option<bool> {
        if self.policy.disable_lock_to_screen {
            return None;
        }
        self.locked = mode.apply(self.locked);
        if self.locked {
            self.drop_pending_switch();
        }
        debug!(locked = self.locked, "lock to screen changed");
        Some(self.locked)
    }

    /// Records a mouse button transition on the active screen.  While any
    /// button is held, edge and corner switching is suppressed.
    pub fn on_button(&mut self, button: u8, down: bool) {
        let bit = 1u32 << (button.min(31));
        if down {
            self.buttons_held |= bit;
            self.last_click_screen = Some(self.active);
            self.drop_pending_switch();
        } else {
            self.buttons_held &= !bit;
        }
    }

    /// Commits a proposed switch.
    pub fn commit(&mut self, request: SwitchRequest, now: Instant) {
        debug!(from = request.from, to = request.to, "switch committed");
        self.active = request.to;
        self.phase = SwitchPhase::Idle;
        self.inside_corner = None;
        self.last_switch = Some(now);
    }

    /// Abandons a proposed or pending switch.
    pub fn cancel(&mut self) {
        self.drop_pending_switch();
    }

    /// Forces input back to `index` without a proposal, e.g. when the active
    /// client disconnects.
    pub fn reset_to(&mut self, index: usize, now: Instant) {
        self.active = index;
        self.phase = SwitchPhase::Idle;
        self.inside_corner = None;
        self.buttons_held = 0;
        self.last_switch = Some(now);
    }
}
