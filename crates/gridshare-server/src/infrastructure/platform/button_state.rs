//! Per-button mouse state used by the injection path.
//!
//! Injection back ends need to know whether a synthetic motion is a plain
//! move or a drag.  Each button runs a small state machine:
//!
//! ```text
//!        press            motion
//!  Up ─────────► Down ─────────► Dragged
//!   ▲                               │
//!   └────────────── release ────────┘   (release from Down goes to Up too)
//! ```
//!
//! Writers take a mutex and update the machine; after every write a bitmask
//! of the buttons that are not `Up` is published through an `AtomicU32`, so
//! readers on the hot path never block.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Number of tracked buttons.  Buttons are numbered from 1.
pub const NUM_BUTTONS: u8 = 32;

/// State of one mouse button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonState {
    #[default]
    Up,
    /// Pressed and moved since the press.
    Dragged,
    Down,
}

fn bit(button: u8) -> Option<u32> {
    (1..=NUM_BUTTONS)
        .contains(&button)
        .then(|| 1u32 << (button - 1))
}

/// Owned button state machines with a lock-free snapshot.
#[derive(Debug, Default)]
pub struct MouseButtons {
    states: Mutex<[ButtonState; NUM_BUTTONS as usize]>,
    held: AtomicU32,
}

impl MouseButtons {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, [ButtonState; NUM_BUTTONS as usize]> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, states: &[ButtonState; NUM_BUTTONS as usize]) {
        let mask = states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != ButtonState::Up)
            .fold(0u32, |mask, (i, _)| mask | (1 << i));
        self.held.store(mask, Ordering::Release);
    }

    /// Forces `button` into `state`.  Out-of-range buttons are ignored.
    pub fn set(&self, button: u8, state: ButtonState) {
        if bit(button).is_none() {
            return;
        }
        let mut states = self.lock();
        states[usize::from(button - 1)] = state;
        self.publish(&states);
    }

    pub fn press(&self, button: u8) {
        self.set(button, ButtonState::Down);
    }

    pub fn release(&self, button: u8) {
        self.set(button, ButtonState::Up);
    }

    /// Records cursor motion: every `Down` button becomes `Dragged`.
    /// Returns `true` if the motion is a drag.
    pub fn on_motion(&self) -> bool {
        let mut states = self.lock();
        let mut dragging = false;
        for state in states.iter_mut() {
            if *state != ButtonState::Up {
                *state = ButtonState::Dragged;
                dragging = true;
            }
        }
        self.publish(&states);
        dragging
    }

    /// Current state of `button`.  Takes the lock.
    pub fn state(&self, button: u8) -> ButtonState {
        match bit(button) {
            Some(_) => self.lock()[usize::from(button - 1)],
            None => ButtonState::Up,
        }
    }

    /// Returns `true` if `button` is not `Up`.  Never blocks.
    pub fn is_held(&self, button: u8) -> bool {
        bit(button).is_some_and(|b| self.held.load(Ordering::Acquire) & b != 0)
    }

    /// Returns `true` if any button is held.  Never blocks.
    pub fn any(&self) -> bool {
        self.held.load(Ordering::Acquire) != 0
    }

    /// Lowest-numbered held button.  Never blocks.
    pub fn first_held(&self) -> Option<u8> {
        let mask = self.held.load(Ordering::Acquire);
        (mask != 0).then(|| mask.trailing_zeros() as u8 + 1)
    }

    /// Replaces every state from a bitmask reported by the OS: set bits
    /// become `Down`, clear bits `Up`.
    pub fn overwrite(&self, mask: u32) {
        let mut states = self.lock();
        for (i, state) in states.iter_mut().enumerate() {
            *state = if mask & (1 << i) != 0 {
                ButtonState::Down
            } else {
                ButtonState::Up
            };
        }
        self.publish(&states);
    }

    pub fn reset(&self) {
        self.overwrite(0);
    }
}
