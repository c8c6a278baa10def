/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! A textual notation of scan code sequences.
//!
//! A script is a list of whitespace separated tokens, `#` starts a comment till the end
//! of a line:
//!
//! * `+[MODS-]KEY` - a key press (make) event,
//! * `-[MODS-]KEY` - a key release (break) event,
//! * `[MODS-]KEY` - a key tap, i.e. a press followed by a release,
//! * `wait:MS` or `@MS` - a pause of `MS` milliseconds.
//!
//! `KEY` is one of the [ps2key] names (case insensitive) or a hexadecimal code, e.g. `0x7f`.
//! `MODS` are the [MODIFIER_PREFIXES] letters, each followed by a `-`, e.g. `+S-C-ESC`.
//!
//! This is the same notation in which [ScanCode] is displayed, so a logged scan code can be
//! replayed as is.
use core::fmt;
use core::num::ParseIntError;
use core::time::Duration;
use std::error::Error;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use sharpkey_core::scancode::{ps2key, KeyFlags, ScanCode, MODIFIER_PREFIXES};

/// A single step of a parsed script.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptStep {
    Scan(ScanCode),
    Pause(Duration),
}

impl fmt::Display for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptStep::Scan(scan) => fmt::Display::fmt(scan, f),
            ScriptStep::Pause(delay) => write!(f, "@{}", delay.as_millis())
        }
    }
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// A key name or code is not recognized.
    UnknownKey(String),
    /// A modifier prefix letter is not recognized.
    UnknownModifier(char),
    /// The pause duration is not a valid number of milliseconds.
    InvalidPause(ParseIntError),
}

/// An error returned when parsing a script fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseScriptError {
    /// The 1-based line number of the offending token.
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl Error for ParseScriptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ScriptErrorKind::InvalidPause(err) => Some(err),
            _ => None
        }
    }
}

impl fmt::Display for ParseScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ScriptErrorKind::UnknownKey(key) => write!(f, "unknown key: {:?}", key),
            ScriptErrorKind::UnknownModifier(ch) => write!(f, "unknown modifier: {:?}", ch),
            ScriptErrorKind::InvalidPause(err) => write!(f, "invalid pause: {}", err),
        }
    }
}

fn modifier(prefix: char) -> Option<KeyFlags> {
    MODIFIER_PREFIXES.iter().find(|&&(_, ch)| ch == prefix.to_ascii_uppercase()).map(|&(flag, _)| flag)
}

fn key_code(name: &str) -> Result<u8, ScriptErrorKind> {
    let hex = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X"));
    match hex {
        Some(digits) => u8::from_str_radix(digits, 16).ok(),
        None => ps2key::from_name(name)
    }.ok_or_else(|| ScriptErrorKind::UnknownKey(name.to_string()))
}

fn parse_pause(millis: &str) -> Result<ScriptStep, ScriptErrorKind> {
    let millis: u64 = millis.parse().map_err(ScriptErrorKind::InvalidPause)?;
    Ok(ScriptStep::Pause(Duration::from_millis(millis)))
}

fn parse_token(token: &str, steps: &mut Vec<ScriptStep>) -> Result<(), ScriptErrorKind> {
    if let Some(millis) = token.strip_prefix('@').or_else(|| token.strip_prefix("wait:")) {
        steps.push(parse_pause(millis)?);
        return Ok(())
    }
    let (event, mut rest) = match token.as_bytes()[0] {
        b'+' if token.len() > 1 => (Some(false), &token[1..]),
        b'-' if token.len() > 1 => (Some(true), &token[1..]),
        _ => (None, token)
    };
    let mut flags = KeyFlags::empty();
    while rest.len() > 2 && rest.as_bytes()[1] == b'-' {
        let prefix = char::from(rest.as_bytes()[0]);
        flags |= modifier(prefix).ok_or(ScriptErrorKind::UnknownModifier(prefix))?;
        rest = &rest[2..];
    }
    let code = key_code(rest)?;
    match event {
        Some(false) => steps.push(ScriptStep::Scan(ScanCode::make(code, flags))),
        Some(true) => steps.push(ScriptStep::Scan(ScanCode::release(code, flags))),
        None => {
            steps.push(ScriptStep::Scan(ScanCode::make(code, flags)));
            steps.push(ScriptStep::Scan(ScanCode::release(code, flags)));
        }
    }
    Ok(())
}

/// Parses a script `source` into a list of steps.
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>, ParseScriptError> {
    let mut steps = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let line = match line.find('#') {
            Some(end) => &line[..end],
            None => line
        };
        for token in line.split_whitespace() {
            parse_token(token, &mut steps).map_err(|kind| ParseScriptError { line: index + 1, kind })?;
        }
    }
    Ok(steps)
}

/// Returns the scan codes of `steps`, skipping pauses.
pub fn scan_codes<'a, I>(steps: I) -> impl Iterator<Item=ScanCode> + 'a
    where I: IntoIterator<Item=&'a ScriptStep>,
          I::IntoIter: 'a
{
    steps.into_iter().filter_map(|step| match step {
        ScriptStep::Scan(scan) => Some(*scan),
        ScriptStep::Pause(..) => None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScriptStep::*;

    #[test]
    fn parse_script_works() {
        let steps = parse_script("+L_SHIFT +S-1 -S-1 -L_SHIFT # an exclamation mark\n\
                                  @20 a wait:5\n  C-S-esc 0x7f").unwrap();
        assert_eq!(steps, [
            Scan(ScanCode::make(ps2key::L_SHIFT, KeyFlags::empty())),
            Scan(ScanCode::make(ps2key::N1, KeyFlags::SHIFT)),
            Scan(ScanCode::release(ps2key::N1, KeyFlags::SHIFT)),
            Scan(ScanCode::release(ps2key::L_SHIFT, KeyFlags::empty())),
            Pause(Duration::from_millis(20)),
            Scan(ScanCode::make(ps2key::A, KeyFlags::empty())),
            Scan(ScanCode::release(ps2key::A, KeyFlags::empty())),
            Pause(Duration::from_millis(5)),
            Scan(ScanCode::make(ps2key::ESC, KeyFlags::CTRL|KeyFlags::SHIFT)),
            Scan(ScanCode::release(ps2key::ESC, KeyFlags::CTRL|KeyFlags::SHIFT)),
            Scan(ScanCode::make(0x7f, KeyFlags::empty())),
            Scan(ScanCode::release(0x7f, KeyFlags::empty())),
        ]);
        assert_eq!(scan_codes(&steps).count(), 10);
        assert!(parse_script("  # nothing\n\n").unwrap().is_empty());
    }

    #[test]
    fn single_letter_keys() {
        // key names that are also modifier letters
        assert_eq!(parse_script("+S-S -S +c-L").unwrap(), [
            Scan(ScanCode::make(ps2key::S, KeyFlags::SHIFT)),
            Scan(ScanCode::release(ps2key::S, KeyFlags::empty())),
            Scan(ScanCode::make(ps2key::L, KeyFlags::CTRL)),
        ]);
        assert!(parse_script("-").is_err());
        assert!(parse_script("S-").is_err());
    }

    #[test]
    fn display_parses_back() {
        let scans = [
            ScanCode::make(ps2key::ESC, KeyFlags::CTRL|KeyFlags::SHIFT),
            ScanCode::release(ps2key::KP_DOT, KeyFlags::CAPS|KeyFlags::ALTGR),
            ScanCode::make(0xFE, KeyFlags::FUNCTION|KeyFlags::GUI|KeyFlags::ALT),
            ScanCode::release(ps2key::L, KeyFlags::empty()),
        ];
        for scan in scans.iter() {
            let steps = parse_script(&scan.to_string()).unwrap();
            assert_eq!(steps, [Scan(*scan)]);
            assert_eq!(steps[0].to_string(), scan.to_string());
        }
        assert_eq!(Pause(Duration::from_millis(15)).to_string(), "@15");
    }

    #[test]
    fn errors_are_reported() {
        let err = parse_script("A\n+S-NOPE").unwrap_err();
        assert_eq!(err, ParseScriptError { line: 2, kind: ScriptErrorKind::UnknownKey("NOPE".into()) });
        assert_eq!(err.to_string(), r#"line 2: unknown key: "NOPE""#);
        let err = parse_script("+Q-A").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UnknownModifier('Q'));
        let err = parse_script("@soon").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::InvalidPause(..)));
        assert!(err.source().is_some());
        assert!(parse_script("0x100").is_err());
    }
}
