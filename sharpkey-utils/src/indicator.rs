/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
use core::time::Duration;

use log::{Level, log};

use sharpkey_core::status::{LedMode, LedPattern, StatusIndicator};

/// A [StatusIndicator] reporting status changes to the log instead of lighting a LED.
///
/// Repeated requests of the same pattern are logged once.
#[derive(Clone, Debug)]
pub struct LogIndicator {
    pub level: Level,
    last: Option<LedPattern>,
}

impl Default for LogIndicator {
    fn default() -> Self {
        LogIndicator::new(Level::Info)
    }
}

impl LogIndicator {
    pub fn new(level: Level) -> Self {
        LogIndicator { level, last: None }
    }
    /// Returns the most recently requested pattern.
    pub fn last(&self) -> Option<LedPattern> {
        self.last
    }
}

fn describe(pattern: &LedPattern) -> &'static str {
    const NAMES: [(LedPattern, &str); 5] = [
        (LedPattern::OFF, "off"),
        (LedPattern::ACTIVITY, "activity"),
        (LedPattern::OPTION_ARMED, "option select armed"),
        (LedPattern::OPTION_APPLIED, "option applied"),
        (LedPattern::WARNING, "warning"),
    ];
    NAMES.iter().find(|(p, _)| p == pattern).map_or("custom", |&(_, name)| name)
}

impl StatusIndicator for LogIndicator {
    fn set_mode(&mut self, mode: LedMode, duty_cycle: u8, max_blinks: u32, period: Duration) {
        let pattern = LedPattern { mode, duty_cycle, max_blinks, period };
        if self.last == Some(pattern) {
            return
        }
        self.last = Some(pattern);
        match mode {
            LedMode::Blink => log!(self.level, "status: {} ({:?} {}% x{})",
                                   describe(&pattern), period, duty_cycle, max_blinks),
            _ => log!(self.level, "status: {} ({:?})", describe(&pattern), mode)
        }
    }
}
