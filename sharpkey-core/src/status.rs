/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Visual status feedback.
use core::time::Duration;

/// The mode of a status LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedMode {
    Off,
    On,
    Blink,
}

/// A complete status LED setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LedPattern {
    pub mode: LedMode,
    /// The percentage of a blink `period` the LED is lit.
    pub duty_cycle: u8,
    /// The number of blinks before the LED goes off, 0 blinks forever.
    pub max_blinks: u32,
    pub period: Duration,
}

impl LedPattern {
    /// The idle state.
    pub const OFF: LedPattern = LedPattern::steady(LedMode::Off);
    /// A key is being processed.
    pub const ACTIVITY: LedPattern = LedPattern::blink(50, 1, Duration::from_millis(100));
    /// The option select sequence is armed and awaits a command key.
    pub const OPTION_ARMED: LedPattern = LedPattern::blink(50, 0, Duration::from_millis(1000));
    /// An option command changed the configuration.
    pub const OPTION_APPLIED: LedPattern = LedPattern::blink(50, 3, Duration::from_millis(250));
    /// Persisting the configuration failed, changes will not survive a restart.
    pub const WARNING: LedPattern = LedPattern::blink(10, 10, Duration::from_millis(150));

    pub const fn steady(mode: LedMode) -> Self {
        LedPattern { mode, duty_cycle: 100, max_blinks: 0, period: Duration::from_millis(0) }
    }

    pub const fn blink(duty_cycle: u8, max_blinks: u32, period: Duration) -> Self {
        LedPattern { mode: LedMode::Blink, duty_cycle, max_blinks, period }
    }
}

/// A fire-and-forget visual status indicator.
pub trait StatusIndicator {
    fn set_mode(&mut self, mode: LedMode, duty_cycle: u8, max_blinks: u32, period: Duration);
    /// Shows one of the predefined patterns.
    #[inline]
    fn show(&mut self, pattern: LedPattern) {
        self.set_mode(pattern.mode, pattern.duty_cycle, pattern.max_blinks, pattern.period)
    }
}

/// A status indicator that ignores every request.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct NullIndicator;

impl StatusIndicator for NullIndicator {
    #[inline(always)]
    fn set_mode(&mut self, _mode: LedMode, _duty_cycle: u8, _max_blinks: u32, _period: Duration) {}
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    #[inline]
    fn set_mode(&mut self, mode: LedMode, duty_cycle: u8, max_blinks: u32, period: Duration) {
        (**self).set_mode(mode, duty_cycle, max_blinks, period)
    }
}

/// A status indicator that remembers every pattern shown, useful for tests and diagnostics.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct PatternLog(pub Vec<LedPattern>);

impl StatusIndicator for PatternLog {
    fn set_mode(&mut self, mode: LedMode, duty_cycle: u8, max_blinks: u32, period: Duration) {
        self.0.push(LedPattern { mode, duty_cycle, max_blinks, period })
    }
}

impl PatternLog {
    /// Returns `true` if `pattern` was shown at least once.
    pub fn has_shown(&self, pattern: LedPattern) -> bool {
        self.0.contains(&pattern)
    }
}
