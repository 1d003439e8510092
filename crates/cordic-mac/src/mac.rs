//! Multiply-accumulate unit.
//!
//! A single-cycle fixed-point multiplier with a persistent accumulator.
//! Products are formed at double width, arithmetic-shifted right by `F`,
//! and truncated back to `W` bits; accumulation wraps at `W` bits like
//! every other datapath step.
//!
//! Unlike the CORDIC engine's `N`-tick latency, multiply/mac/msu complete
//! exactly one tick after the start pulse. Clearing the accumulator is not
//! an iterative operation at all: it takes effect immediately and never
//! raises busy.

use fixed_q::QFormat;

use crate::EngineState;

/// Pending operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Product only; the accumulator is not involved.
    Multiply,
    /// Accumulator += product.
    Accumulate,
    /// Accumulator -= product.
    Subtract,
}

/// Multiply-accumulate unit.
pub struct Mac {
    format: QFormat,
    state: EngineState,
    op: Op,
    /// Operands latched by the start pulse.
    a: i32,
    b: i32,
    /// Persistent accumulator; survives across operations until cleared.
    accumulator: i32,
    /// Result latched on completion (product or new accumulator value).
    result: i32,
}

impl Mac {
    #[must_use]
    pub fn new(format: QFormat) -> Self {
        Self {
            format,
            state: EngineState::Idle,
            op: Op::Multiply,
            a: 0,
            b: 0,
            accumulator: 0,
            result: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Current accumulator contents.
    #[must_use]
    pub fn accumulator(&self) -> i32 {
        self.accumulator
    }

    /// Start a plain multiply. Ignored while an operation is running.
    pub fn start_multiply(&mut self, a: i32, b: i32) {
        self.begin(Op::Multiply, a, b);
    }

    /// Start a multiply-accumulate. Ignored while an operation is running.
    pub fn start_mac(&mut self, a: i32, b: i32) {
        self.begin(Op::Accumulate, a, b);
    }

    /// Start a multiply-subtract. Ignored while an operation is running.
    pub fn start_msu(&mut self, a: i32, b: i32) {
        self.begin(Op::Subtract, a, b);
    }

    /// Zero the accumulator. Immediate: bypasses the busy/done machinery.
    pub fn clear_accumulator(&mut self) {
        self.accumulator = 0;
    }

    fn begin(&mut self, op: Op, a: i32, b: i32) {
        if self.busy() {
            return;
        }
        self.op = op;
        self.a = self.format.sign_extend(a);
        self.b = self.format.sign_extend(b);
        self.state = EngineState::Running;
    }

    /// Complete the pending operation. Does nothing unless running.
    ///
    /// The accumulator read-modify-write happens entirely inside this one
    /// tick; no partial state is ever observable.
    pub fn clock(&mut self) {
        if self.state != EngineState::Running {
            return;
        }

        let product = self.format.mul(self.a, self.b);
        self.result = match self.op {
            Op::Multiply => product,
            Op::Accumulate => {
                self.accumulator = self.format.add(self.accumulator, product);
                self.accumulator
            }
            Op::Subtract => {
                self.accumulator = self.format.sub(self.accumulator, product);
                self.accumulator
            }
        };
        self.state = EngineState::Done;
    }

    /// True when a completed result is waiting.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.state == EngineState::Done
    }

    /// Take the latched result, returning the unit to idle.
    pub fn take_result(&mut self) -> Option<i32> {
        if !self.ready() {
            return None;
        }
        self.state = EngineState::Idle;
        Some(self.result)
    }

    /// Force the unit back to idle and zero the accumulator.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.a = 0;
        self.b = 0;
        self.accumulator = 0;
        self.result = 0;
    }
}
