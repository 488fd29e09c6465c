//! Sync button state machine
//!
//! The physical sync button is sampled as a held / not-held signal. A short
//! press produces a "pressed" event, holding it past the threshold produces a
//! "held" event. Once an event has been delivered to the guest the button is
//! ignored until it is released.

use std::time::{Duration, Instant};

/// How long the button must be held before it counts as a long press
pub const SYNC_BUTTON_HOLD_THRESHOLD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncButtonState {
    #[default]
    Unpressed,
    Held,
    Pressed,
    LongPressed,
    Ignored,
}

/// Events waiting to be delivered to the guest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncButtonEvent {
    Pressed,
    Held,
}

#[derive(Debug, Clone)]
pub struct SyncButton {
    state: SyncButtonState,
    held_since: Option<Instant>,
    threshold: Duration,
}

impl Default for SyncButton {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncButton {
    pub fn new() -> Self {
        Self::with_threshold(SYNC_BUTTON_HOLD_THRESHOLD)
    }

    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            state: SyncButtonState::Unpressed,
            held_since: None,
            threshold,
        }
    }

    pub fn state(&self) -> SyncButtonState {
        self.state
    }

    /// Feed a sample of the physical signal taken now
    pub fn update(&mut self, is_held: bool) -> SyncButtonState {
        self.update_at(is_held, Instant::now())
    }

    /// Feed a sample of the physical signal taken at `now`
    pub fn update_at(&mut self, is_held: bool, now: Instant) -> SyncButtonState {
        if self.state == SyncButtonState::Unpressed && is_held {
            self.held_since = Some(now);
            self.state = SyncButtonState::Held;
        }

        if self.state == SyncButtonState::Held {
            let held_for = self
                .held_since
                .map(|since| now.saturating_duration_since(since))
                .unwrap_or_default();
            if is_held && held_for >= self.threshold {
                self.state = SyncButtonState::LongPressed;
            } else if !is_held {
                self.state = SyncButtonState::Pressed;
            }
        }

        if self.state == SyncButtonState::Ignored && !is_held {
            self.state = SyncButtonState::Unpressed;
        }

        self.state
    }

    /// Force a short press, bypassing the timer
    pub fn trigger_pressed(&mut self) {
        self.state = SyncButtonState::Pressed;
    }

    /// Force a long press, bypassing the timer
    pub fn trigger_held(&mut self) {
        self.state = SyncButtonState::LongPressed;
    }

    /// The event waiting to be delivered, without consuming it
    pub fn pending_event(&self) -> Option<SyncButtonEvent> {
        match self.state {
            SyncButtonState::Pressed => Some(SyncButtonEvent::Pressed),
            SyncButtonState::LongPressed => Some(SyncButtonEvent::Held),
            _ => None,
        }
    }

    /// Take the pending event, if any, moving the button to `Ignored`
    pub fn take_event(&mut self) -> Option<SyncButtonEvent> {
        let event = self.pending_event()?;
        self.state = SyncButtonState::Ignored;
        Some(event)
    }
}
