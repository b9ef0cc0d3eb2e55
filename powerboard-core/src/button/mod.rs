//! Mechanical button debouncing.
//!
//! Each button keeps a 32-sample shift register. One sample is shifted in
//! per poll; the button only counts as held once every sample in the window
//! agrees, so contact bounce and glitches never reach the host.

/// Samples that must agree before a button reads as held.
pub const DEBOUNCE_WINDOW: u32 = 32;

/// Shift-register debouncer for a single input.
#[derive(Copy, Clone, Debug, Default)]
pub struct Debouncer {
    history: u32,
}

impl Debouncer {
    #[must_use]
    pub const fn new() -> Self {
        Self { history: 0 }
    }

    /// Shifts in one sample. `active` is the logical pressed state; callers
    /// invert active-low inputs before this point.
    pub fn sample(&mut self, active: bool) {
        self.history = (self.history << 1) | u32::from(active);
    }

    /// `true` once the whole window reads active.
    #[must_use]
    pub fn held(&self) -> bool {
        self.history == u32::MAX
    }
}

/// The board's two buttons, polled together.
#[derive(Copy, Clone, Debug, Default)]
pub struct ButtonPair {
    internal: Debouncer,
    external: Debouncer,
}

impl ButtonPair {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            internal: Debouncer::new(),
            external: Debouncer::new(),
        }
    }

    /// Shifts one sample into each debouncer.
    pub fn sample(&mut self, internal_active: bool, external_active: bool) {
        self.internal.sample(internal_active);
        self.external.sample(external_active);
    }

    /// `true` while either debounced button is held.
    #[must_use]
    pub fn either_held(&self) -> bool {
        self.internal.held() || self.external.held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_full_stable_window() {
        let mut button = Debouncer::new();
        for _ in 0..DEBOUNCE_WINDOW - 1 {
            button.sample(true);
            assert!(!button.held());
        }
        button.sample(true);
        assert!(button.held());
    }

    #[test]
    fn one_glitch_restarts_the_window() {
        let mut button = Debouncer::new();
        for _ in 0..DEBOUNCE_WINDOW {
            button.sample(true);
        }
        assert!(button.held());

        button.sample(false);
        assert!(!button.held());

        for _ in 0..DEBOUNCE_WINDOW - 1 {
            button.sample(true);
            assert!(!button.held());
        }
        button.sample(true);
        assert!(button.held());
    }

    #[test]
    fn either_button_satisfies_the_pair() {
        let mut pair = ButtonPair::new();
        for _ in 0..DEBOUNCE_WINDOW {
            pair.sample(false, true);
        }
        assert!(pair.either_held());

        for _ in 0..DEBOUNCE_WINDOW {
            pair.sample(false, false);
        }
        assert!(!pair.either_held());
    }
}
