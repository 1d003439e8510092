//! CORDIC rotation/vectoring engine.
//!
//! The engine computes trigonometric results with nothing but shifts and
//! adds: each iteration rotates the working vector by `±atan(2^-i)`,
//! choosing the direction that drives the residual (the angle in rotation
//! mode, the y component in vectoring mode) toward zero. The shift amount
//! grows by one per iteration, which is what gives the recurrence its
//! logarithmic convergence.
//!
//! One iteration executes per clock tick; an operation takes exactly `N`
//! ticks from start to done, with no early exit. Every intermediate value is
//! sign-extended to the configured `W` bits.
//!
//! Rotation mode seeds `x` with the gain constant `K` so that sin/cos come
//! out at unit scale. Vectoring and normalize results are NOT gain-corrected:
//! the magnitude accumulated by the recurrence carries the inherent CORDIC
//! gain (~1.6468), and callers that need a unity-gain length must scale by
//! `K` themselves.

use std::fmt;

use fixed_q::{FormatError, QFormat};

use crate::EngineState;

/// Arctangent table for the 32-iteration Q16.16 build, one entry per
/// iteration. These exact values are part of the wire contract; they are
/// close to, but not uniformly derivable from, `atan(2^-i) * 2^16`.
const ANGLES_Q16_16: [i32; 32] = [
    51471, 30385, 16054, 8149, 4091, 2047, 1024, 512, 256, 128, 64, 32, 16, 8, 4, 2, 1, 1, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Reciprocal CORDIC gain for 32 iterations, Q16.16.
const GAIN_Q16_16: i32 = 39797;

/// Arctangent table for the 20-iteration Q12.12 build
/// (`atan(2^-i) * 2^12`, rounded to nearest).
const ANGLES_Q12_12: [i32; 20] = [
    3217, 1899, 1003, 509, 256, 128, 64, 32, 16, 8, 4, 2, 1, 0, 0, 0, 0, 0, 0, 0,
];

/// Reciprocal CORDIC gain for 20 iterations, Q12.12.
const GAIN_Q12_12: i32 = 2487;

/// Arctangent table for the 16-iteration Q8.8 build
/// (`atan(2^-i) * 2^8`, rounded to nearest).
const ANGLES_Q8_8: [i32; 16] = [201, 119, 63, 32, 16, 8, 4, 2, 1, 0, 0, 0, 0, 0, 0, 0];

/// Reciprocal CORDIC gain for 16 iterations, Q8.8.
const GAIN_Q8_8: i32 = 155;

/// Rejected engine parameter set.
#[derive(Debug, PartialEq, Eq)]
pub enum ParamsError {
    /// The underlying Q-format is invalid.
    Format(FormatError),
    /// The arctangent table is empty.
    EmptyTable,
    /// A table entry is negative or not a clean `W`-bit value.
    AngleOutOfRange { index: usize, value: i32 },
    /// The gain constant is not a positive `W`-bit value.
    GainOutOfRange(i32),
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::EmptyTable => write!(f, "arctangent table is empty"),
            Self::AngleOutOfRange { index, value } => {
                write!(f, "arctangent table entry {index} out of range: {value}")
            }
            Self::GainOutOfRange(k) => write!(f, "gain constant out of range: {k}"),
        }
    }
}

impl std::error::Error for ParamsError {}

impl From<FormatError> for ParamsError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

/// Per-build engine parameters: `{N, W, F, angles[N], K}`.
///
/// Validated once at construction and immutable for the lifetime of the
/// engine. The iteration count is the table length; iteration count, bit
/// width, and scale factor are co-selected and must stay consistent within
/// one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CordicParams {
    format: QFormat,
    angles: Vec<i32>,
    gain: i32,
}

impl CordicParams {
    /// Build a parameter set, validating table and gain against the format.
    pub fn new(format: QFormat, angles: Vec<i32>, gain: i32) -> Result<Self, ParamsError> {
        if angles.is_empty() {
            return Err(ParamsError::EmptyTable);
        }
        for (index, &value) in angles.iter().enumerate() {
            if value < 0 || format.sign_extend(value) != value {
                return Err(ParamsError::AngleOutOfRange { index, value });
            }
        }
        if gain <= 0 || format.sign_extend(gain) != gain {
            return Err(ParamsError::GainOutOfRange(gain));
        }
        Ok(Self {
            format,
            angles,
            gain,
        })
    }

    /// 32 iterations over 32-bit words with 16 fractional bits.
    #[must_use]
    pub fn q16_16() -> Self {
        Self::profile(32, 16, &ANGLES_Q16_16, GAIN_Q16_16)
    }

    /// 20 iterations over 24-bit words with 12 fractional bits.
    #[must_use]
    pub fn q12_12() -> Self {
        Self::profile(24, 12, &ANGLES_Q12_12, GAIN_Q12_12)
    }

    /// 16 iterations over 16-bit words with 8 fractional bits.
    #[must_use]
    pub fn q8_8() -> Self {
        Self::profile(16, 8, &ANGLES_Q8_8, GAIN_Q8_8)
    }

    fn profile(width: u32, frac: u32, angles: &[i32], gain: i32) -> Self {
        let format = QFormat::new(width, frac).expect("profile format is consistent");
        Self::new(format, angles.to_vec(), gain).expect("profile table is consistent")
    }

    /// The Q-format all engine registers use.
    #[must_use]
    pub fn format(&self) -> QFormat {
        self.format
    }

    /// Iteration count `N` (and engine latency in ticks).
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.angles.len()
    }

    /// The arctangent table.
    #[must_use]
    pub fn angles(&self) -> &[i32] {
        &self.angles
    }

    /// The reciprocal gain constant `K`.
    #[must_use]
    pub fn gain(&self) -> i32 {
        self.gain
    }
}

/// Operating mode of an in-flight or completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Rotation,
    Vectoring,
    Normalize,
}

/// Result of a normalize operation: the input vector passed through
/// unchanged, plus its gain-scaled magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    /// Length of the input vector, carrying the CORDIC gain.
    pub magnitude: i32,
    /// The y operand, unchanged.
    pub y: i32,
    /// The x operand, unchanged.
    pub x: i32,
}

/// CORDIC engine: one shift-add iteration per clock tick.
pub struct Cordic {
    params: CordicParams,
    state: EngineState,
    mode: Mode,
    /// Next iteration index while running.
    iteration: usize,
    x: i32,
    y: i32,
    z: i32,
    /// Latched operands, passed through by normalize.
    x_in: i32,
    y_in: i32,
}

impl Cordic {
    #[must_use]
    pub fn new(params: CordicParams) -> Self {
        Self {
            params,
            state: EngineState::Idle,
            mode: Mode::Rotation,
            iteration: 0,
            x: 0,
            y: 0,
            z: 0,
            x_in: 0,
            y_in: 0,
        }
    }

    #[must_use]
    pub fn params(&self) -> &CordicParams {
        &self.params
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Start a rotation: converge `z` to zero, producing sin/cos of `angle`.
    ///
    /// Ignored while an operation is running.
    pub fn start_rotation(&mut self, angle: i32) {
        self.begin(Mode::Rotation, self.params.gain, 0, angle);
    }

    /// Start vectoring: converge `y` to zero, producing the angle of `(x, y)`.
    ///
    /// Ignored while an operation is running.
    pub fn start_vectoring(&mut self, y: i32, x: i32) {
        self.begin(Mode::Vectoring, x, y, 0);
    }

    /// Start a normalize: same recurrence as vectoring, but the result
    /// returns the untouched operands plus the gain-scaled magnitude.
    ///
    /// Ignored while an operation is running.
    pub fn start_normalize(&mut self, x: i32, y: i32) {
        self.begin(Mode::Normalize, x, y, 0);
    }

    fn begin(&mut self, mode: Mode, x: i32, y: i32, z: i32) {
        if self.busy() {
            return;
        }
        let q = self.params.format;
        self.mode = mode;
        self.iteration = 0;
        self.x = q.sign_extend(x);
        self.y = q.sign_extend(y);
        self.z = q.sign_extend(z);
        self.x_in = self.x;
        self.y_in = self.y;
        self.state = EngineState::Running;
    }

    /// Run one iteration. Does nothing unless running.
    pub fn clock(&mut self) {
        if self.state != EngineState::Running {
            return;
        }

        let q = self.params.format;
        let i = self.iteration;
        let angle = self.params.angles[i];
        let x_shifted = q.sar(self.x, i as u32);
        let y_shifted = q.sar(self.y, i as u32);

        // Rotation closes the residual angle; vectoring rotates the vector
        // toward the positive x axis.
        let clockwise = match self.mode {
            Mode::Rotation => self.z < 0,
            Mode::Vectoring | Mode::Normalize => self.y > 0,
        };

        if clockwise {
            self.x = q.add(self.x, y_shifted);
            self.y = q.sub(self.y, x_shifted);
            self.z = q.add(self.z, angle);
        } else {
            self.x = q.sub(self.x, y_shifted);
            self.y = q.add(self.y, x_shifted);
            self.z = q.sub(self.z, angle);
        }

        self.iteration += 1;
        if self.iteration == self.params.iterations() {
            self.state = EngineState::Done;
        }
    }

    /// True when a completed rotation result is waiting.
    #[must_use]
    pub fn ready_sin_cos(&self) -> bool {
        self.state == EngineState::Done && self.mode == Mode::Rotation
    }

    /// Take the rotation result `(sin, cos)`, returning the engine to idle.
    pub fn take_sin_cos(&mut self) -> Option<(i32, i32)> {
        if !self.ready_sin_cos() {
            return None;
        }
        self.state = EngineState::Idle;
        Some((self.y, self.x))
    }

    /// True when a completed vectoring result is waiting.
    #[must_use]
    pub fn ready_atan2(&self) -> bool {
        self.state == EngineState::Done && self.mode == Mode::Vectoring
    }

    /// Take the vectoring result (the accumulated angle), returning the
    /// engine to idle.
    pub fn take_atan2(&mut self) -> Option<i32> {
        if !self.ready_atan2() {
            return None;
        }
        self.state = EngineState::Idle;
        Some(self.z)
    }

    /// True when a completed normalize result is waiting.
    #[must_use]
    pub fn ready_normalize(&self) -> bool {
        self.state == EngineState::Done && self.mode == Mode::Normalize
    }

    /// Take the normalize result, returning the engine to idle.
    ///
    /// The magnitude is the length the recurrence accumulated into the x
    /// register; the operand fields are the inputs exactly as latched.
    pub fn take_normalize(&mut self) -> Option<Normalized> {
        if !self.ready_normalize() {
            return None;
        }
        self.state = EngineState::Idle;
        Some(Normalized {
            magnitude: self.x,
            y: self.y_in,
            x: self.x_in,
        })
    }

    /// Force the engine back to idle, discarding any in-flight work.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.iteration = 0;
        self.x = 0;
        self.y = 0;
        self.z = 0;
        self.x_in = 0;
        self.y_in = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut Cordic) {
        let budget = engine.params().iterations() + 4;
        for _ in 0..budget {
            if !engine.busy() {
                return;
            }
            engine.clock();
        }
        panic!("engine still busy after {budget} ticks");
    }

    #[test]
    fn rotation_zero_angle() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_rotation(0);
        run(&mut engine);
        // K seeding cancels the gain: cos lands on 1.0 in Q16.16.
        assert_eq!(engine.take_sin_cos(), Some((1, 65536)));
    }

    #[test]
    fn rotation_quarter_pi() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_rotation(51472);
        run(&mut engine);
        assert_eq!(engine.take_sin_cos(), Some((46342, 46341)));
    }

    #[test]
    fn rotation_negative_angle() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_rotation(-51472);
        run(&mut engine);
        assert_eq!(engine.take_sin_cos(), Some((-46342, 46328)));
    }

    #[test]
    fn vectoring_diagonal() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_vectoring(65536, 65536);
        run(&mut engine);
        assert_eq!(engine.take_atan2(), Some(51469));
    }

    #[test]
    fn vectoring_negative_y() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_vectoring(-65536, 65536);
        run(&mut engine);
        assert_eq!(engine.take_atan2(), Some(-51473));
    }

    #[test]
    fn latency_is_exactly_n_ticks() {
        let params = CordicParams::q12_12();
        let n = params.iterations();
        let mut engine = Cordic::new(params);
        engine.start_rotation(0);
        for tick in 0..n {
            assert!(engine.busy(), "went idle after {tick} of {n} ticks");
            engine.clock();
        }
        assert!(!engine.busy());
        assert!(engine.ready_sin_cos());
    }

    #[test]
    fn start_while_running_is_ignored() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_rotation(51472);
        engine.clock();
        engine.start_rotation(0);
        run(&mut engine);
        // The first operation's result survives.
        assert_eq!(engine.take_sin_cos(), Some((46342, 46341)));
    }

    #[test]
    fn result_taker_matches_mode() {
        let mut engine = Cordic::new(CordicParams::q16_16());
        engine.start_rotation(51472);
        run(&mut engine);
        assert!(!engine.ready_atan2());
        assert!(!engine.ready_normalize());
        assert_eq!(engine.take_atan2(), None);
        // The wrong taker must not consume the result.
        assert_eq!(engine.take_sin_cos(), Some((46342, 46341)));
        // Taking returns the engine to idle; a second take yields nothing.
        assert_eq!(engine.take_sin_cos(), None);
    }

    #[test]
    fn normalize_passes_operands_through() {
        let mut engine = Cordic::new(CordicParams::q12_12());
        engine.start_normalize(12288, 16384);
        run(&mut engine);
        let result = engine.take_normalize().expect("normalize result");
        assert_eq!(result.x, 12288);
        assert_eq!(result.y, 16384);
        // |(3,4)| = 5, times the CORDIC gain, in Q12.12.
        assert_eq!(result.magnitude, 33728);
    }

    #[test]
    fn q8_8_profile_stays_in_tolerance() {
        let mut engine = Cordic::new(CordicParams::q8_8());
        engine.start_rotation(201); // pi/4
        run(&mut engine);
        let (sin, cos) = engine.take_sin_cos().expect("rotation result");
        assert!((sin - 181).abs() <= 10, "sin {sin}");
        assert!((cos - 181).abs() <= 10, "cos {cos}");
    }

    #[test]
    fn rejects_empty_table() {
        let format = QFormat::new(32, 16).expect("valid format");
        assert_eq!(
            CordicParams::new(format, vec![], 39797),
            Err(ParamsError::EmptyTable)
        );
    }

    #[test]
    fn rejects_wide_table_entry() {
        let format = QFormat::new(16, 8).expect("valid format");
        let result = CordicParams::new(format, vec![201, 0x1_0000], 155);
        assert_eq!(
            result,
            Err(ParamsError::AngleOutOfRange {
                index: 1,
                value: 0x1_0000
            })
        );
    }

    #[test]
    fn rejects_bad_gain() {
        let format = QFormat::new(16, 8).expect("valid format");
        assert_eq!(
            CordicParams::new(format, vec![201], 0),
            Err(ParamsError::GainOutOfRange(0))
        );
        assert_eq!(
            CordicParams::new(format, vec![201], 0x8000),
            Err(ParamsError::GainOutOfRange(0x8000))
        );
    }
}
