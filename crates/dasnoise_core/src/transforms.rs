//! Orthogonal discrete wavelet transforms with periodized boundaries.
//!
//! One analysis step maps a lane of even length `N` to `N/2` approximation
//! and `N/2` detail coefficients:
//!
//! ```text
//! a[k] = sum_j lo[j] * x[(2k + j) mod N]
//! d[k] = sum_j hi[j] * x[(2k + j) mod N]
//! ```
//!
//! Odd lanes are first extended by repeating their last sample. With an
//! orthonormal filter pair the step is an orthogonal matrix, so synthesis is
//! its transpose and reconstruction is exact up to rounding once the
//! recorded length is trimmed back.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::DasError;
use crate::float_trait::DasFloat;

// =============================================================================
// Filter Bank Table
// =============================================================================

const HAAR: [f64; 2] = [0.7071067811865476, 0.7071067811865476];

const DB2: [f64; 4] = [
    -0.12940952255092145,
    0.22414386804185735,
    0.836516303737469,
    0.48296291314469025,
];

const DB3: [f64; 6] = [
    0.035226291882100656,
    -0.08544127388224149,
    -0.13501102001039084,
    0.4598775021193313,
    0.8068915093133388,
    0.3326705529509569,
];

const DB4: [f64; 8] = [
    -0.010597401784997278,
    0.032883011666982945,
    0.030841381835986965,
    -0.18703481171888114,
    -0.02798376941698385,
    0.6308807679295904,
    0.7148465705525415,
    0.23037781330885523,
];

const SYM4: [f64; 8] = [
    -0.07576571478927333,
    -0.02963552764599851,
    0.49761866763201545,
    0.8037387518059161,
    0.29785779560527736,
    -0.09921954357684722,
    -0.012603967262037833,
    0.0322231006040427,
];

const COIF1: [f64; 6] = [
    -0.01565572813546454,
    -0.0727326195128539,
    0.38486484686420286,
    0.8525720202122554,
    0.3378976624578092,
    -0.0727326195128539,
];

/// Built-in orthogonal wavelet families.
///
/// `sym2`/`sym3` share their filters with `db2`/`db3`; `db1` is an alias of `haar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WaveletFamily {
    Haar,
    Db2,
    Db3,
    #[default]
    Db4,
    Sym2,
    Sym3,
    Sym4,
    Coif1,
}

impl WaveletFamily {
    pub const ALL: [WaveletFamily; 8] = [
        WaveletFamily::Haar,
        WaveletFamily::Db2,
        WaveletFamily::Db3,
        WaveletFamily::Db4,
        WaveletFamily::Sym2,
        WaveletFamily::Sym3,
        WaveletFamily::Sym4,
        WaveletFamily::Coif1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveletFamily::Haar => "haar",
            WaveletFamily::Db2 => "db2",
            WaveletFamily::Db3 => "db3",
            WaveletFamily::Db4 => "db4",
            WaveletFamily::Sym2 => "sym2",
            WaveletFamily::Sym3 => "sym3",
            WaveletFamily::Sym4 => "sym4",
            WaveletFamily::Coif1 => "coif1",
        }
    }

    /// Decomposition low-pass filter.
    fn dec_lo(self) -> &'static [f64] {
        match self {
            WaveletFamily::Haar => &HAAR,
            WaveletFamily::Db2 | WaveletFamily::Sym2 => &DB2,
            WaveletFamily::Db3 | WaveletFamily::Sym3 => &DB3,
            WaveletFamily::Db4 => &DB4,
            WaveletFamily::Sym4 => &SYM4,
            WaveletFamily::Coif1 => &COIF1,
        }
    }

    pub fn filter_len(self) -> usize {
        self.dec_lo().len()
    }
}

impl fmt::Display for WaveletFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveletFamily {
    type Err = DasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(WaveletFamily::Haar),
            "db2" => Ok(WaveletFamily::Db2),
            "db3" => Ok(WaveletFamily::Db3),
            "db4" => Ok(WaveletFamily::Db4),
            "sym2" => Ok(WaveletFamily::Sym2),
            "sym3" => Ok(WaveletFamily::Sym3),
            "sym4" => Ok(WaveletFamily::Sym4),
            "coif1" => Ok(WaveletFamily::Coif1),
            _ => Err(DasError::UnsupportedWavelet(s.to_string())),
        }
    }
}

impl TryFrom<String> for WaveletFamily {
    type Error = DasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WaveletFamily> for String {
    fn from(family: WaveletFamily) -> Self {
        family.name().to_string()
    }
}

/// Analysis filter pair in the working precision.
#[derive(Debug, Clone)]
pub struct FilterBank<F: DasFloat> {
    lo: Vec<F>,
    hi: Vec<F>,
}

impl<F: DasFloat> FilterBank<F> {
    pub fn new(family: WaveletFamily) -> Self {
        let h = family.dec_lo();
        let len = h.len();
        let lo = h.iter().map(|&v| F::from_f64_c(v)).collect();
        // Quadrature mirror: hi[j] = (-1)^j * lo[L - 1 - j]
        let hi = (0..len)
            .map(|j| {
                let v = h[len - 1 - j];
                F::from_f64_c(if j % 2 == 0 { v } else { -v })
            })
            .collect();
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.lo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lo.is_empty()
    }
}

/// Deepest useful decomposition level for a lane of `data_len` samples.
/// `floor(log2(data_len / (filter_len - 1)))`, zero when the lane is too short.
pub fn max_level(data_len: usize, filter_len: usize) -> usize {
    if filter_len < 2 || data_len < filter_len - 1 {
        return 0;
    }
    let ratio = data_len as f64 / (filter_len - 1) as f64;
    ratio.log2().floor().max(0.0) as usize
}

// =============================================================================
// 1-D Transform
// =============================================================================

/// Single analysis step. Returns (approximation, detail).
pub fn analyze<F: DasFloat>(signal: &[F], bank: &FilterBank<F>) -> (Vec<F>, Vec<F>) {
    let mut lane = signal.to_vec();
    if lane.len() % 2 == 1 {
        if let Some(&last) = lane.last() {
            lane.push(last);
        }
    }
    let n = lane.len();
    let half = n / 2;
    let mut approx = vec![F::zero(); half];
    let mut detail = vec![F::zero(); half];

    for k in 0..half {
        let mut a = F::zero();
        let mut d = F::zero();
        for (j, (&lo, &hi)) in bank.lo.iter().zip(bank.hi.iter()).enumerate() {
            let x = lane[(2 * k + j) % n];
            a += lo * x;
            d += hi * x;
        }
        approx[k] = a;
        detail[k] = d;
    }

    (approx, detail)
}

/// Single synthesis step, trimmed to `out_len` samples.
pub fn synthesize<F: DasFloat>(
    approx: &[F],
    detail: &[F],
    bank: &FilterBank<F>,
    out_len: usize,
) -> Vec<F> {
    let n = 2 * approx.len();
    let mut lane = vec![F::zero(); n];

    for (k, (&a, &d)) in approx.iter().zip(detail.iter()).enumerate() {
        for (j, (&lo, &hi)) in bank.lo.iter().zip(bank.hi.iter()).enumerate() {
            lane[(2 * k + j) % n] += lo * a + hi * d;
        }
    }

    lane.truncate(out_len);
    lane
}

/// Multilevel decomposition of one lane.
#[derive(Debug, Clone)]
pub struct Decomposition<F> {
    /// Coarsest approximation coefficients.
    pub approx: Vec<F>,
    /// Detail coefficients, finest level first.
    pub details: Vec<Vec<F>>,
    /// Input length at each level, finest first.
    lengths: Vec<usize>,
}

impl<F> Decomposition<F> {
    pub fn levels(&self) -> usize {
        self.details.len()
    }
}

/// Decompose `signal` into `level` detail bands plus an approximation.
pub fn wavedec<F: DasFloat>(signal: &[F], bank: &FilterBank<F>, level: usize) -> Decomposition<F> {
    let mut approx = signal.to_vec();
    let mut details = Vec::with_capacity(level);
    let mut lengths = Vec::with_capacity(level);

    for _ in 0..level {
        if approx.is_empty() {
            break;
        }
        lengths.push(approx.len());
        let (a, d) = analyze(&approx, bank);
        details.push(d);
        approx = a;
    }

    Decomposition {
        approx,
        details,
        lengths,
    }
}

/// Invert [`wavedec`].
pub fn waverec<F: DasFloat>(dec: &Decomposition<F>, bank: &FilterBank<F>) -> Vec<F> {
    let mut current = dec.approx.clone();
    for (detail, &len) in dec.details.iter().zip(dec.lengths.iter()).rev() {
        current = synthesize(&current, detail, bank, len);
    }
    current
}

// =============================================================================
// 2-D Separable Transform
// =============================================================================

/// Detail sub-bands of one 2-D level.
#[derive(Debug, Clone)]
pub struct DetailBands<F> {
    /// High-pass along channels, low-pass along samples.
    pub horizontal: Array2<F>,
    /// Low-pass along channels, high-pass along samples.
    pub vertical: Array2<F>,
    /// High-pass along both axes.
    pub diagonal: Array2<F>,
}

impl<F> DetailBands<F> {
    pub fn bands_mut(&mut self) -> [&mut Array2<F>; 3] {
        [
            &mut self.horizontal,
            &mut self.vertical,
            &mut self.diagonal,
        ]
    }

    pub fn bands(&self) -> [&Array2<F>; 3] {
        [&self.horizontal, &self.vertical, &self.diagonal]
    }
}

/// Multilevel 2-D decomposition.
#[derive(Debug, Clone)]
pub struct Decomposition2d<F> {
    pub approx: Array2<F>,
    /// Detail bands, finest level first.
    pub details: Vec<DetailBands<F>>,
    shapes: Vec<(usize, usize)>,
}

/// Analyze every row of `input`. Returns (low, high) halves.
fn analyze_rows<F: DasFloat>(input: ArrayView2<F>, bank: &FilterBank<F>) -> (Array2<F>, Array2<F>) {
    let (rows, cols) = input.dim();
    let half = (cols + 1) / 2;
    let mut lo = Array2::zeros((rows, half));
    let mut hi = Array2::zeros((rows, half));
    let mut lane = Vec::with_capacity(cols);

    for (r, row) in input.axis_iter(Axis(0)).enumerate() {
        lane.clear();
        lane.extend(row.iter().copied());
        let (a, d) = analyze(&lane, bank);
        for (dst, src) in lo.row_mut(r).iter_mut().zip(a) {
            *dst = src;
        }
        for (dst, src) in hi.row_mut(r).iter_mut().zip(d) {
            *dst = src;
        }
    }

    (lo, hi)
}

/// Synthesize every row from its (low, high) halves.
fn synthesize_rows<F: DasFloat>(
    lo: ArrayView2<F>,
    hi: ArrayView2<F>,
    bank: &FilterBank<F>,
    out_cols: usize,
) -> Array2<F> {
    let rows = lo.nrows();
    let mut output = Array2::zeros((rows, out_cols));
    let mut a = Vec::with_capacity(lo.ncols());
    let mut d = Vec::with_capacity(hi.ncols());

    for r in 0..rows {
        a.clear();
        a.extend(lo.row(r).iter().copied());
        d.clear();
        d.extend(hi.row(r).iter().copied());
        let lane = synthesize(&a, &d, bank, out_cols);
        for (dst, src) in output.row_mut(r).iter_mut().zip(lane) {
            *dst = src;
        }
    }

    output
}

fn analyze_cols<F: DasFloat>(input: ArrayView2<F>, bank: &FilterBank<F>) -> (Array2<F>, Array2<F>) {
    let (lo, hi) = analyze_rows(input.t(), bank);
    (lo.reversed_axes(), hi.reversed_axes())
}

fn synthesize_cols<F: DasFloat>(
    lo: ArrayView2<F>,
    hi: ArrayView2<F>,
    bank: &FilterBank<F>,
    out_rows: usize,
) -> Array2<F> {
    synthesize_rows(lo.t(), hi.t(), bank, out_rows).reversed_axes()
}

/// Separable 2-D decomposition: samples axis first, then channels axis.
pub fn wavedec2<F: DasFloat>(
    input: ArrayView2<F>,
    bank: &FilterBank<F>,
    level: usize,
) -> Decomposition2d<F> {
    let mut approx = input.to_owned();
    let mut details = Vec::with_capacity(level);
    let mut shapes = Vec::with_capacity(level);

    for _ in 0..level {
        if approx.is_empty() {
            break;
        }
        shapes.push(approx.dim());
        let (lo_s, hi_s) = analyze_rows(approx.view(), bank);
        let (ll, horizontal) = analyze_cols(lo_s.view(), bank);
        let (vertical, diagonal) = analyze_cols(hi_s.view(), bank);
        details.push(DetailBands {
            horizontal,
            vertical,
            diagonal,
        });
        approx = ll;
    }

    Decomposition2d {
        approx,
        details,
        shapes,
    }
}

/// Invert [`wavedec2`].
pub fn waverec2<F: DasFloat>(dec: &Decomposition2d<F>, bank: &FilterBank<F>) -> Array2<F> {
    let mut current = dec.approx.clone();
    for (bands, &(rows, cols)) in dec.details.iter().zip(dec.shapes.iter()).rev() {
        let lo_s = synthesize_cols(current.view(), bands.horizontal.view(), bank, rows);
        let hi_s = synthesize_cols(bands.vertical.view(), bands.diagonal.view(), bank, rows);
        current = synthesize_rows(lo_s.view(), hi_s.view(), bank, cols);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::{Distribution, Normal};

    fn random_signal(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..len).map(|_| normal.sample(&mut rng)).collect()
    }

    #[test]
    fn test_filters_are_orthonormal() {
        for family in WaveletFamily::ALL {
            let bank = FilterBank::<f64>::new(family);
            let lo_energy: f64 = bank.lo.iter().map(|v| v * v).sum();
            let hi_energy: f64 = bank.hi.iter().map(|v| v * v).sum();
            let cross: f64 = bank.lo.iter().zip(bank.hi.iter()).map(|(a, b)| a * b).sum();
            assert_abs_diff_eq!(lo_energy, 1.0, epsilon = 1e-10);
            assert_abs_diff_eq!(hi_energy, 1.0, epsilon = 1e-10);
            assert_abs_diff_eq!(cross, 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(bank.lo.iter().sum::<f64>(), 2f64.sqrt(), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_haar_single_step() {
        let bank = FilterBank::<f64>::new(WaveletFamily::Haar);
        let (a, d) = analyze(&[1.0, 3.0, 5.0, 5.0], &bank);
        let s = 2f64.sqrt();
        assert_abs_diff_eq!(a[0], 4.0 / s, epsilon = 1e-12);
        assert_abs_diff_eq!(a[1], 10.0 / s, epsilon = 1e-12);
        assert_abs_diff_eq!(d[0], -2.0 / s, epsilon = 1e-12);
        assert_abs_diff_eq!(d[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_reconstruction_all_families() {
        for family in WaveletFamily::ALL {
            let bank = FilterBank::<f64>::new(family);
            for len in [1usize, 2, 7, 16, 33, 100, 257] {
                let signal = random_signal(len, len as u64);
                let level = max_level(len, bank.len()).min(4);
                let dec = wavedec(&signal, &bank, level);
                assert_eq!(dec.levels(), level);
                let rec = waverec(&dec, &bank);
                assert_eq!(rec.len(), len);
                for (x, y) in signal.iter().zip(rec.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_energy_preserved_for_even_length() {
        let bank = FilterBank::<f64>::new(WaveletFamily::Sym4);
        let signal = random_signal(64, 3);
        let (a, d) = analyze(&signal, &bank);
        let before: f64 = signal.iter().map(|v| v * v).sum();
        let after: f64 = a.iter().chain(d.iter()).map(|v| v * v).sum();
        assert_abs_diff_eq!(before, after, epsilon = 1e-9);
    }

    #[test]
    fn test_max_level() {
        assert_eq!(max_level(1000, 8), 7);
        assert_eq!(max_level(16, 2), 4);
        assert_eq!(max_level(4, 8), 0);
        assert_eq!(max_level(0, 2), 0);
        assert_eq!(max_level(1, 2), 0);
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("db1".parse::<WaveletFamily>().unwrap(), WaveletFamily::Haar);
        assert_eq!(" Coif1 ".parse::<WaveletFamily>().unwrap(), WaveletFamily::Coif1);
        let err = "morlet".parse::<WaveletFamily>().unwrap_err();
        assert_eq!(err, DasError::UnsupportedWavelet("morlet".to_string()));
    }

    #[test]
    fn test_2d_reconstruction() {
        let bank = FilterBank::<f64>::new(WaveletFamily::Db2);
        let values = random_signal(13 * 22, 9);
        let input = Array2::from_shape_vec((13, 22), values).unwrap();
        let dec = wavedec2(input.view(), &bank, 2);
        assert_eq!(dec.details.len(), 2);
        assert_eq!(dec.approx.dim(), (4, 6));

        let rec = waverec2(&dec, &bank);
        assert_eq!(rec.dim(), input.dim());
        for (x, y) in input.iter().zip(rec.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_f32_reconstruction() {
        let bank = FilterBank::<f32>::new(WaveletFamily::Db4);
        let signal: Vec<f32> = (0..50).map(|i| (i as f32 * 0.3).cos()).collect();
        let dec = wavedec(&signal, &bank, 2);
        let rec = waverec(&dec, &bank);
        for (x, y) in signal.iter().zip(rec.iter()) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
