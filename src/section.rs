use ::biquad::{Biquad, DirectForm2Transposed};
use num_complex::Complex64;

/// Normalized taps of one second-order section, `a0` divided out. Kept in `f64` so a 20 Hz pole
/// pair stays off the unit circle even at several hundred kHz.
pub type CoefficientSet = ::biquad::Coefficients<f64>;

/// Pass-through taps used for unused cascade slots.
pub const BYPASS: CoefficientSet = ::biquad::Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

/// One slot of a cascade: a Direct Form II Transposed filter whose history belongs to this slot
/// only, plus whether the slot is in use.
#[derive(Debug, Clone)]
pub struct Section {
    filter: DirectForm2Transposed<f64>,
    coefficients: CoefficientSet,
    active: bool,
}

impl Section {
    pub fn bypassed() -> Self {
        Self {
            filter: DirectForm2Transposed::<f64>::new(BYPASS),
            coefficients: BYPASS,
            active: false,
        }
    }

    /// Installs new taps. The history is left alone so a swap in the middle of a stream does not
    /// click.
    pub fn set_coefficients(&mut self, coefficients: CoefficientSet) {
        self.filter.update_coefficients(coefficients);
        self.coefficients = coefficients;
        self.active = true;
    }

    /// Turns the slot into a pass-through and forgets whatever it was ringing with.
    pub fn bypass(&mut self) {
        self.filter.update_coefficients(BYPASS);
        self.coefficients = BYPASS;
        self.active = false;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.filter.reset_state();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn coefficients(&self) -> &CoefficientSet {
        &self.coefficients
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        if !self.active {
            return x;
        }

        self.filter.run(x as f64) as f32
    }

    /// Complex response of this slot at `omega` radians per sample.
    pub fn response(&self, omega: f64) -> Complex64 {
        if !self.active {
            return Complex64::new(1.0, 0.0);
        }

        response(&self.coefficients, omega)
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::bypassed()
    }
}

/// Evaluates `H(e^jw)` for one set of taps.
pub fn response(coefficients: &CoefficientSet, omega: f64) -> Complex64 {
    let z1 = Complex64::from_polar(1.0, -omega);
    let z2 = z1 * z1;

    let numerator = coefficients.b0 + z1 * coefficients.b1 + z2 * coefficients.b2;
    let denominator = 1.0 + z1 * coefficients.a1 + z2 * coefficients.a2;
    numerator / denominator
}

/// Both poles strictly inside the unit circle and every tap finite.
pub fn is_stable(coefficients: &CoefficientSet) -> bool {
    let taps = [
        coefficients.b0,
        coefficients.b1,
        coefficients.b2,
        coefficients.a1,
        coefficients.a2,
    ];
    if !taps.iter().all(|tap| tap.is_finite()) {
        return false;
    }

    coefficients.a2.abs() < 1.0 && coefficients.a1.abs() < 1.0 + coefficients.a2
}
