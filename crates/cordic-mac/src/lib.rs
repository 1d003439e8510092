//! Fixed-point CORDIC/MAC accelerator with a byte-serial register protocol.
//!
//! Two independent compute units — a CORDIC rotation/vectoring engine and a
//! multiply-accumulate unit — share one narrow external bus. A wrapper state
//! machine decodes a command byte, collects the command's operand words,
//! pulses the selected unit's start line, holds busy while it runs, and then
//! serves the result back over the same data path.
//!
//! # Register interface
//!
//! Three externally visible access points:
//! - **Data register, write** — command codes, then operand bytes
//! - **Data register, read** — result bytes (open-bus `$FF` outside the
//!   read phase)
//! - **Status register, read-only** — bit 7 = busy; bits 5:3 = wrapper
//!   phase (0 idle, 1 operands, 2 dispatch, 3 running, 4 result). Only the
//!   busy bit is contractual.
//!
//! # Command set
//!
//! | Code | Operation   | Operand words | Result words           |
//! |------|-------------|---------------|------------------------|
//! | $01  | Sin/cos     | angle         | cos, sin               |
//! | $02  | Atan2       | y, x          | angle                  |
//! | $03  | Normalize   | x, y          | magnitude, y, x        |
//! | $10  | Multiply    | a, b          | product                |
//! | $11  | Mac         | a, b          | accumulator            |
//! | $12  | Msu         | a, b          | accumulator            |
//! | $13  | Clear acc.  | —             | —                      |
//!
//! All other codes are reserved and ignored. Each word is `W/8` bytes,
//! least significant byte first, in both directions; multi-word results are
//! read least significant field first. `W` follows the build profile (16,
//! 24, or 32 bits).
//!
//! # State machine
//!
//! Idle → AwaitingOperands (operand bytes accumulate) → Dispatching (start
//! pulse, one tick) → Running (selected unit iterates) → AwaitingRead
//! (result bytes read out) → Idle. Clear-accumulator takes effect at
//! command latch and never leaves idle. Only one unit is ever dispatched at
//! a time, so the two units cannot race on the bus or on their registers.

pub mod cordic;
pub mod mac;

pub use cordic::{Cordic, CordicParams, Normalized, ParamsError};
pub use mac::Mac;

use fixed_q::QFormat;
use fx_core::{Observable, Tickable, Value};

/// Compute-unit execution state.
///
/// Owned exclusively by the unit; the wrapper derives `busy` and per-result
/// readiness from it, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No operation in flight, no result waiting.
    Idle,
    /// Operation in flight; advances every tick.
    Running,
    /// Result latched and waiting to be taken.
    Done,
}

/// CORDIC sin/cos command code.
pub const CMD_SIN_COS: u8 = 0x01;
/// CORDIC atan2 command code.
pub const CMD_ATAN2: u8 = 0x02;
/// CORDIC normalize command code.
pub const CMD_NORMALIZE: u8 = 0x03;
/// MAC multiply command code.
pub const CMD_MULTIPLY: u8 = 0x10;
/// MAC multiply-accumulate command code.
pub const CMD_MAC: u8 = 0x11;
/// MAC multiply-subtract command code.
pub const CMD_MSU: u8 = 0x12;
/// MAC clear-accumulator command code.
pub const CMD_CLEAR: u8 = 0x13;

/// Busy flag in the status byte.
pub const STATUS_BUSY: u8 = 0x80;

/// Decoded command, doubling as the active-unit selector while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    SinCos,
    Atan2,
    Normalize,
    Multiply,
    MacAccumulate,
    MacSubtract,
}

impl Command {
    /// Decode a command byte. Clear-accumulator is handled at the write
    /// site because it never occupies the wrapper.
    fn decode(code: u8) -> Option<Self> {
        match code {
            CMD_SIN_COS => Some(Self::SinCos),
            CMD_ATAN2 => Some(Self::Atan2),
            CMD_NORMALIZE => Some(Self::Normalize),
            CMD_MULTIPLY => Some(Self::Multiply),
            CMD_MAC => Some(Self::MacAccumulate),
            CMD_MSU => Some(Self::MacSubtract),
            _ => None,
        }
    }

    /// Number of operand words the command consumes.
    fn operand_words(self) -> usize {
        match self {
            Self::SinCos => 1,
            _ => 2,
        }
    }
}

/// Wrapper state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperPhase {
    /// Waiting for a command byte.
    Idle,
    /// Collecting operand bytes.
    AwaitingOperands,
    /// Start pulse pending; issued on the next tick.
    Dispatching,
    /// Selected unit is iterating.
    Running,
    /// Result bytes latched; host reads them out.
    AwaitingRead,
}

impl WrapperPhase {
    /// 3-bit state code reported in status bits 5:3.
    fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AwaitingOperands => 1,
            Self::Dispatching => 2,
            Self::Running => 3,
            Self::AwaitingRead => 4,
        }
    }
}

/// The accelerator chip: both compute units plus the register wrapper.
pub struct CordicMac {
    cordic: Cordic,
    mac: Mac,
    format: QFormat,
    phase: WrapperPhase,
    /// Latched command; `None` outside a command's lifetime.
    command: Option<Command>,
    /// Completed operand words, sign-extended to `W` bits.
    operands: Vec<i32>,
    /// Partial operand word being assembled, LSB first.
    word_buf: u32,
    word_bytes: usize,
    /// Serialized result bytes and read cursor.
    result_buf: Vec<u8>,
    result_index: usize,
}

impl CordicMac {
    /// Build the chip for one precision profile.
    #[must_use]
    pub fn new(params: CordicParams) -> Self {
        let format = params.format();
        Self {
            cordic: Cordic::new(params),
            mac: Mac::new(format),
            format,
            phase: WrapperPhase::Idle,
            command: None,
            operands: Vec::with_capacity(2),
            word_buf: 0,
            word_bytes: 0,
            result_buf: Vec::new(),
            result_index: 0,
        }
    }

    /// The Q-format of every transported word.
    #[must_use]
    pub fn format(&self) -> QFormat {
        self.format
    }

    /// Current wrapper phase (for testing/debugging).
    #[must_use]
    pub fn phase(&self) -> WrapperPhase {
        self.phase
    }

    /// Read the status register.
    ///
    /// Bit 7 is busy: set from the moment a command's operands are complete
    /// until its result is latched. Bits 5:3 carry the wrapper phase code.
    #[must_use]
    pub fn read_status(&self) -> u8 {
        let busy = matches!(
            self.phase,
            WrapperPhase::Dispatching | WrapperPhase::Running
        );
        let busy_bit = if busy { STATUS_BUSY } else { 0 };
        busy_bit | (self.phase.code() << 3)
    }

    /// Write the data register: a command byte in idle, operand bytes while
    /// a command is collecting.
    ///
    /// Unrecognized command bytes are ignored with no state change. Writes
    /// during dispatch, run, or read-out are ignored.
    pub fn write_data(&mut self, value: u8) {
        match self.phase {
            WrapperPhase::Idle => {
                if value == CMD_CLEAR {
                    // Not an iterative operation: applied at latch, no busy.
                    self.mac.clear_accumulator();
                    return;
                }
                if let Some(command) = Command::decode(value) {
                    self.command = Some(command);
                    self.operands.clear();
                    self.word_buf = 0;
                    self.word_bytes = 0;
                    self.phase = WrapperPhase::AwaitingOperands;
                }
            }
            WrapperPhase::AwaitingOperands => {
                self.word_buf |= u32::from(value) << (8 * self.word_bytes);
                self.word_bytes += 1;
                if self.word_bytes == self.format.bytes() {
                    let raw = self.format.sign_extend(self.word_buf as i32);
                    self.operands.push(raw);
                    self.word_buf = 0;
                    self.word_bytes = 0;

                    let expected = self
                        .command
                        .map_or(0, Command::operand_words);
                    if self.operands.len() == expected {
                        self.phase = WrapperPhase::Dispatching;
                    }
                }
            }
            _ => {}
        }
    }

    /// Read the data register.
    ///
    /// During the read-out phase, returns successive result bytes, least
    /// significant byte of the least significant field first. When the last
    /// byte is read the wrapper returns to idle. Reads in any other phase
    /// return open-bus `$FF`.
    pub fn read_data(&mut self) -> u8 {
        if self.phase != WrapperPhase::AwaitingRead {
            return 0xFF;
        }
        let byte = self.result_buf[self.result_index];
        self.result_index += 1;
        if self.result_index >= self.result_buf.len() {
            self.phase = WrapperPhase::Idle;
            self.result_buf.clear();
            self.result_index = 0;
        }
        byte
    }

    /// Reset input: both units to idle, accumulator to zero, wrapper to
    /// idle with busy deasserted. The only way to abort a dispatched
    /// operation.
    pub fn reset(&mut self) {
        self.cordic.reset();
        self.mac.reset();
        self.phase = WrapperPhase::Idle;
        self.command = None;
        self.operands.clear();
        self.word_buf = 0;
        self.word_bytes = 0;
        self.result_buf.clear();
        self.result_index = 0;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Issue the start pulse for the latched command. Operands are complete
    /// by construction when this runs.
    fn dispatch(&mut self) {
        let Some(command) = self.command else {
            return;
        };
        match command {
            Command::SinCos => self.cordic.start_rotation(self.operands[0]),
            Command::Atan2 => {
                self.cordic.start_vectoring(self.operands[0], self.operands[1]);
            }
            Command::Normalize => {
                self.cordic.start_normalize(self.operands[0], self.operands[1]);
            }
            Command::Multiply => self.mac.start_multiply(self.operands[0], self.operands[1]),
            Command::MacAccumulate => self.mac.start_mac(self.operands[0], self.operands[1]),
            Command::MacSubtract => self.mac.start_msu(self.operands[0], self.operands[1]),
        }
        // The command frame is consumed by the pulse; only the active-unit
        // selector survives until the result is latched.
        self.operands.clear();
    }

    /// Latch the active command's result into the serial read-out buffer,
    /// if the unit has finished. Fields are serialized least significant
    /// first.
    fn try_latch_result(&mut self) {
        let Some(command) = self.command else {
            return;
        };
        match command {
            Command::SinCos => {
                if let Some((sin, cos)) = self.cordic.take_sin_cos() {
                    self.push_word(cos);
                    self.push_word(sin);
                    self.finish_latch();
                }
            }
            Command::Atan2 => {
                if let Some(angle) = self.cordic.take_atan2() {
                    self.push_word(angle);
                    self.finish_latch();
                }
            }
            Command::Normalize => {
                if let Some(result) = self.cordic.take_normalize() {
                    self.push_word(result.magnitude);
                    self.push_word(result.y);
                    self.push_word(result.x);
                    self.finish_latch();
                }
            }
            Command::Multiply | Command::MacAccumulate | Command::MacSubtract => {
                if let Some(value) = self.mac.take_result() {
                    self.push_word(value);
                    self.finish_latch();
                }
            }
        }
    }

    /// Append one word to the result buffer, LSB first.
    fn push_word(&mut self, raw: i32) {
        for k in 0..self.format.bytes() {
            self.result_buf.push((raw as u32 >> (8 * k)) as u8);
        }
    }

    fn finish_latch(&mut self) {
        self.command = None;
        self.result_index = 0;
        self.phase = WrapperPhase::AwaitingRead;
    }
}

impl Tickable for CordicMac {
    /// One rising clock edge.
    ///
    /// The dispatch phase spends its tick on the start pulse; the selected
    /// unit then iterates once per subsequent tick until done, at which
    /// point the result is latched and busy drops.
    fn tick(&mut self) {
        match self.phase {
            WrapperPhase::Dispatching => {
                self.dispatch();
                self.phase = WrapperPhase::Running;
            }
            WrapperPhase::Running => {
                self.cordic.clock();
                self.mac.clock();
                self.try_latch_result();
            }
            _ => {}
        }
    }
}

impl Observable for CordicMac {
    fn query(&self, path: &str) -> Option<Value> {
        let value = match path {
            "phase" => Value::from(phase_name(self.phase)),
            "busy" => Value::from(self.read_status() & STATUS_BUSY != 0),
            "status" => Value::from(self.read_status()),
            "cordic.state" => Value::from(engine_state_name(self.cordic.state())),
            "cordic.busy" => Value::from(self.cordic.busy()),
            "mac.state" => Value::from(engine_state_name(self.mac.state())),
            "mac.busy" => Value::from(self.mac.busy()),
            "mac.accumulator" => Value::from(self.mac.accumulator()),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "phase",
            "busy",
            "status",
            "cordic.state",
            "cordic.busy",
            "mac.state",
            "mac.busy",
            "mac.accumulator",
        ]
    }
}

fn phase_name(phase: WrapperPhase) -> &'static str {
    match phase {
        WrapperPhase::Idle => "idle",
        WrapperPhase::AwaitingOperands => "awaiting-operands",
        WrapperPhase::Dispatching => "dispatching",
        WrapperPhase::Running => "running",
        WrapperPhase::AwaitingRead => "awaiting-read",
    }
}

fn engine_state_name(state: EngineState) -> &'static str {
    match state {
        EngineState::Idle => "idle",
        EngineState::Running => "running",
        EngineState::Done => "done",
    }
}
