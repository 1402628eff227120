//! Overlay controls with an idle auto-hide timer.
//!
//! The timer is a single replaceable deadline. Arming it again replaces the
//! previous deadline, so at most one pending hide ever exists.

use std::time::Duration;

use tokio::time::Instant;

/// Default delay before idle controls hide.
pub const DEFAULT_IDLE_HIDE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Controls {
    visible: bool,
    hide_at: Option<Instant>,
    idle: Duration,
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_HIDE)
    }
}

impl Controls {
    /// Visible, with no timer armed.
    pub fn new(idle: Duration) -> Self {
        Self { visible: true, hide_at: None, idle }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show the controls and restart the idle timer.
    pub fn reveal(&mut self) {
        self.visible = true;
        self.hide_at = Some(Instant::now() + self.idle);
    }

    /// Pending hide deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    /// Hide the controls if the deadline has passed. Returns whether they
    /// were hidden by this call.
    pub fn expire(&mut self) -> bool {
        match self.hide_at {
            Some(at) if Instant::now() >= at => {
                self.visible = false;
                self.hide_at = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm the timer without changing visibility.
    pub fn cancel(&mut self) {
        self.hide_at = None;
    }
}
