// ── Command payloads and the mode-set retry ladder ──
//
// Devices answer an unsupported `led/mode` literal with a hint code; the
// ladder maps each code to the literal worth trying next. The number of
// resends is bounded.

use twinkly_api::{CODE_OK, Generation, LedMode};

/// "Try movie" hint.
pub const CODE_TRY_MOVIE: i64 = 1105;
/// "Try effect" hint.
pub const CODE_TRY_EFFECT: i64 = 1104;

/// The literal to send first for a requested on/off state.
pub fn initial_mode(generation: Generation, on: bool) -> LedMode {
    if on { generation.on_mode() } else { LedMode::Off }
}

/// What to do after a `led/mode` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderStep {
    /// Device accepted the mode.
    Done,
    /// Resend with this literal.
    Retry(LedMode),
    /// Out of resends; `last_code` was the final reply.
    Exhausted { attempts: u32, last_code: i64 },
}

/// Bounded retry state for one `set_mode` call.
#[derive(Debug, Clone)]
pub struct ModeLadder {
    mode: LedMode,
    attempts: u32,
    max_retries: u32,
}

impl ModeLadder {
    pub fn new(first: LedMode, max_retries: u32) -> Self {
        Self {
            mode: first,
            attempts: 0,
            max_retries,
        }
    }

    /// The literal to send on this attempt.
    pub fn mode(&self) -> LedMode {
        self.mode
    }

    /// Attempts sent so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feed the status code of the reply to the current attempt.
    pub fn next(&mut self, code: i64) -> LadderStep {
        self.attempts += 1;
        if code == CODE_OK {
            return LadderStep::Done;
        }
        if self.attempts > self.max_retries {
            return LadderStep::Exhausted {
                attempts: self.attempts,
                last_code: code,
            };
        }
        self.mode = match code {
            CODE_TRY_MOVIE => LedMode::Movie,
            CODE_TRY_EFFECT => LedMode::Effect,
            _ => LedMode::Off,
        };
        LadderStep::Retry(self.mode)
    }
}
