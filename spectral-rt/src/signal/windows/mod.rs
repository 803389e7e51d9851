//! Analysis windows analogous to the `scipy.signal.windows` family.
//!
//! A window is requested either by [`WindowSpec`] value or by name (the
//! alias table the charting hosts use). Two construction families exist: the
//! algebraic kernels are evaluated per sample, while Chebyshev and Taylor go
//! through an auxiliary pipeline (a frequency-domain transform for Chebyshev,
//! a cosine-series coefficient fit for Taylor) before sampling.
//!
//! Periodic (`fftbins`) windows are produced by evaluating the symmetric
//! window of length `M + 1` and truncating to `M`.

use core::f64::consts::PI;

use num_complex::Complex64;

use crate::fft::Direction;
use crate::kernel::{ComputeBackend, ConfigError, ExecInvariantViolation};
use crate::special::bessel_i0;

mod kernels;
pub use kernels::*;

/// Tagged window family with per-kernel shape parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSpec {
    /// Rectangular window, identically one.
    Boxcar,
    /// Triangular window with non-zero endpoints.
    Triang,
    /// Parzen piecewise-cubic window.
    Parzen,
    /// Bohman window.
    Bohman,
    /// Blackman three-term cosine window.
    Blackman,
    /// Nuttall four-term cosine window.
    Nuttall,
    /// Blackman-Harris four-term cosine window.
    BlackmanHarris,
    /// Flat-top five-term cosine window.
    FlatTop,
    /// Bartlett triangular window with zero endpoints.
    Bartlett,
    /// Hann raised-cosine window.
    Hann,
    /// Hamming window.
    Hamming,
    /// Bartlett-Hann window.
    BartlettHann,
    /// Half-cycle sine window.
    Cosine,
    /// Tukey tapered-cosine window.
    Tukey {
        /// Fraction of the window inside the cosine taper.
        alpha: f64,
    },
    /// Generalised Hamming window.
    GeneralHamming {
        /// Constant term of the cosine sum.
        alpha: f64,
    },
    /// Kaiser window.
    Kaiser {
        /// Shape parameter trading main-lobe width for sidelobe level.
        beta: f64,
    },
    /// Gaussian window.
    Gaussian {
        /// Standard deviation in samples.
        std_dev: f64,
    },
    /// Generalised Gaussian window.
    GeneralGaussian {
        /// Shape power (1 recovers the Gaussian).
        power: f64,
        /// Width parameter in samples.
        width: f64,
    },
    /// Exponential (Poisson) window.
    Exponential {
        /// Decay constant in samples.
        tau: f64,
        /// Center sample; negative means `(M - 1) / 2`.
        center: f64,
    },
    /// Weighted cosine series with caller-supplied coefficients.
    GeneralCosine {
        /// Series coefficients, constant term first.
        coeffs: Vec<f64>,
    },
    /// Taylor window.
    Taylor {
        /// Number of nearly constant-level sidelobes.
        nbar: usize,
        /// Sidelobe suppression in dB.
        sll: f64,
        /// Rescale so the central sample is one.
        norm: bool,
    },
    /// Dolph-Chebyshev equiripple window.
    Chebyshev {
        /// Sidelobe attenuation in dB.
        attenuation: f64,
    },
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec::Hann
    }
}

impl WindowSpec {
    /// Resolve a case-insensitive window name (with the usual short aliases)
    /// to a spec with that kernel's default parameters. Unknown names fall
    /// back to Hann.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "boxcar" | "box" | "ones" | "rect" | "rectangular" => WindowSpec::Boxcar,
            "triang" | "triangle" | "tri" => WindowSpec::Triang,
            "parzen" | "parz" | "par" => WindowSpec::Parzen,
            "bohman" | "bman" | "bmn" => WindowSpec::Bohman,
            "blackman" | "black" | "blk" => WindowSpec::Blackman,
            "nuttall" | "nutl" | "nut" => WindowSpec::Nuttall,
            "blackmanharris" | "blackharr" | "bkh" => WindowSpec::BlackmanHarris,
            "flattop" | "flat" | "flt" => WindowSpec::FlatTop,
            "bartlett" | "bart" | "brt" => WindowSpec::Bartlett,
            "hann" | "hanning" | "han" => WindowSpec::Hann,
            "hamming" | "hamm" | "ham" => WindowSpec::Hamming,
            "barthann" | "brthan" | "bth" => WindowSpec::BartlettHann,
            "cosine" | "halfcosine" => WindowSpec::Cosine,
            "tukey" | "tuk" => WindowSpec::Tukey { alpha: 0.5 },
            "general_hamming" => WindowSpec::GeneralHamming { alpha: 0.54 },
            "kaiser" | "ksr" => WindowSpec::Kaiser { beta: 0.0 },
            "gaussian" | "gauss" | "gss" => WindowSpec::Gaussian { std_dev: 1.0 },
            "general_gaussian" | "general gaussian" | "general gauss" | "general_gauss"
            | "ggs" => WindowSpec::GeneralGaussian {
                power: 1.0,
                width: 1.0,
            },
            "general_cosine" | "general cosine" => WindowSpec::GeneralCosine { coeffs: Vec::new() },
            "exponential" | "poisson" => WindowSpec::Exponential {
                tau: 1.0,
                center: -1.0,
            },
            "chebwin" | "cheb" => WindowSpec::Chebyshev { attenuation: 100.0 },
            "taylor" => WindowSpec::Taylor {
                nbar: 4,
                sll: 30.0,
                norm: true,
            },
            _ => WindowSpec::Hann,
        }
    }
}

/// Generate a length-`m` window.
///
/// `fftbins = false` yields the symmetric window; `fftbins = true` yields the
/// DFT-periodic variant. The backend is only exercised by the Chebyshev
/// construction, which transforms a frequency-domain sampling of the
/// Chebyshev polynomial (and may hit the naive-DFT fallback, since `M + 1`
/// is rarely a power of two).
pub fn get_window(
    spec: &WindowSpec,
    m: usize,
    fftbins: bool,
    backend: &dyn ComputeBackend,
) -> Result<Vec<f64>, ExecInvariantViolation> {
    if m == 0 {
        return Err(ConfigError::EmptyInput { arg: "m" }.into());
    }
    if m == 1 && !fftbins {
        return Ok(vec![1.0]);
    }
    let extended = if fftbins { m + 1 } else { m };
    let mut w = match spec {
        WindowSpec::Chebyshev { attenuation } => chebyshev(extended, *attenuation, backend)?,
        WindowSpec::Taylor { nbar, sll, norm } => {
            let coeffs = taylor_coefficients((*nbar).max(1), *sll);
            (0..extended)
                .map(|i| cosine_series_centered(&coeffs, *norm, i, extended))
                .collect()
        }
        _ => (0..extended)
            .map(|i| algebraic_sample(spec, i, extended))
            .collect(),
    };
    w.truncate(m);
    Ok(w)
}

/// Generate a window by host name with that kernel's default parameters.
pub fn window_by_name(
    name: &str,
    m: usize,
    fftbins: bool,
    backend: &dyn ComputeBackend,
) -> Result<Vec<f64>, ExecInvariantViolation> {
    get_window(&WindowSpec::from_name(name), m, fftbins, backend)
}

/// Evaluate one sample of an algebraic (non-derived) kernel.
fn algebraic_sample(spec: &WindowSpec, i: usize, m: usize) -> f64 {
    let n = m as f64;
    let i = i as f64;
    let hlf = (n - 1.0) / 2.0;
    match spec {
        WindowSpec::Boxcar => 1.0,
        WindowSpec::Triang => 1.0 - ((i - hlf) / ((n + 1.0) / 2.0)).abs(),
        WindowSpec::Parzen => {
            let x = ((i - hlf) / (hlf + 1.0)).abs();
            if x <= 0.5 {
                1.0 - 6.0 * x * x + 6.0 * x * x * x
            } else if x <= 1.0 {
                2.0 * (1.0 - x).powi(3)
            } else {
                0.0
            }
        }
        WindowSpec::Bohman => {
            let x = ((i - hlf) / hlf).abs();
            (1.0 - x) * (PI * x).cos() + (1.0 / PI) * (PI * x).sin()
        }
        WindowSpec::Blackman => {
            let ang = 2.0 * PI * i / (n - 1.0);
            0.42 - 0.5 * ang.cos() + 0.08 * (2.0 * ang).cos()
        }
        WindowSpec::Nuttall => {
            let ang = 2.0 * PI * i / (n - 1.0);
            0.355768 - 0.487396 * ang.cos() + 0.144232 * (2.0 * ang).cos()
                - 0.012604 * (3.0 * ang).cos()
        }
        WindowSpec::BlackmanHarris => {
            let ang = 2.0 * PI * i / (n - 1.0);
            0.35875 - 0.48829 * ang.cos() + 0.14128 * (2.0 * ang).cos()
                - 0.01168 * (3.0 * ang).cos()
        }
        WindowSpec::FlatTop => {
            let ang = 2.0 * PI * i / (n - 1.0);
            1.0 - 1.93 * ang.cos() + 1.29 * (2.0 * ang).cos() - 0.388 * (3.0 * ang).cos()
                + 0.0322 * (4.0 * ang).cos()
        }
        WindowSpec::Bartlett => 1.0 - ((i - hlf) / hlf).abs(),
        WindowSpec::Hann => {
            let ang = 2.0 * PI * i / (n - 1.0);
            0.5 - 0.5 * ang.cos()
        }
        WindowSpec::Hamming => {
            let ang = 2.0 * PI * i / (n - 1.0);
            0.54 - 0.46 * ang.cos()
        }
        WindowSpec::BartlettHann => {
            let x = ((i - hlf) / hlf).abs();
            0.62 - 0.48 * x + 0.38 * (PI * x).cos()
        }
        WindowSpec::Cosine => (PI / n * (i + 0.5)).sin(),
        WindowSpec::Tukey { alpha } => {
            if *alpha <= 0.0 {
                1.0
            } else if *alpha >= 1.0 {
                let ang = 2.0 * PI * i / (n - 1.0);
                0.5 - 0.5 * ang.cos()
            } else {
                let edge = alpha * (n - 1.0) / 2.0;
                if i < edge {
                    let ang = PI * (2.0 * i / alpha / (n - 1.0) - 1.0);
                    0.5 * (1.0 + ang.cos())
                } else if i <= (n - 1.0) * (1.0 - alpha / 2.0) {
                    1.0
                } else {
                    let ang = PI * (2.0 * i / alpha / (n - 1.0) - 2.0 / alpha + 1.0);
                    0.5 * (1.0 + ang.cos())
                }
            }
        }
        WindowSpec::GeneralHamming { alpha } => {
            let ang = 2.0 * PI * i / (n - 1.0);
            alpha - (1.0 - alpha) * ang.cos()
        }
        WindowSpec::Kaiser { beta } => {
            let r = 2.0 * i / (n - 1.0) - 1.0;
            bessel_i0(beta * (1.0 - r * r).sqrt()) / bessel_i0(*beta)
        }
        WindowSpec::Gaussian { std_dev } => {
            let x = (i - hlf) / std_dev;
            (-0.5 * x * x).exp()
        }
        WindowSpec::GeneralGaussian { power, width } => {
            let x = ((i - hlf) / width).abs();
            (-0.5 * x.powf(2.0 * power)).exp()
        }
        WindowSpec::Exponential { tau, center } => {
            let center = if *center < 0.0 { hlf } else { *center };
            (-(i - center).abs() / tau).exp()
        }
        WindowSpec::GeneralCosine { coeffs } => {
            let delta = 2.0 * PI / (n - 1.0);
            let fac = -PI + delta * i;
            coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| c * (k as f64 * fac).cos())
                .sum()
        }
        // Derived kernels are dispatched before reaching this table.
        WindowSpec::Taylor { .. } | WindowSpec::Chebyshev { .. } => f64::NAN,
    }
}

/// Evaluate one sample of a centered cosine series `1 + 2*sum_k F_k cos(k t)`
/// with optional rescaling so the central sample is one.
fn cosine_series_centered(coeffs: &[f64], norm: bool, i: usize, m: usize) -> f64 {
    let n = m as f64;
    let step = 2.0 * PI / n;
    let dot = |t: f64| -> f64 {
        coeffs
            .iter()
            .enumerate()
            .map(|(k, c)| c * (t * (k + 1) as f64).cos())
            .sum::<f64>()
    };
    let t = step * (i as f64 - n / 2.0 + 0.5);
    let mut val = 1.0 + 2.0 * dot(t);
    if norm {
        let t_center = step * ((n - 1.0) / 2.0 - n / 2.0 + 0.5);
        val /= 1.0 + 2.0 * dot(t_center);
    }
    val
}

/// Fourier coefficients `F_1 .. F_{nbar-1}` of the Taylor window.
fn taylor_coefficients(nbar: usize, sll: f64) -> Vec<f64> {
    let b = 10f64.powf(sll / 20.0);
    let a = b.acosh() / PI;
    let nb = nbar as f64;
    let s2 = nb * nb / (a * a + (nb - 0.5) * (nb - 0.5));
    let count = nbar - 1;

    let mut fm = Vec::with_capacity(count);
    for mi in 0..count {
        let m = (mi + 1) as f64;
        let sign = if mi % 2 == 0 { 1.0 } else { -1.0 };
        let mut numer = 1.0;
        for k in 0..count {
            let mk = (k + 1) as f64;
            numer *= 1.0 - m * m / (s2 * (a * a + (mk - 0.5) * (mk - 0.5)));
        }
        let mut denom = 1.0;
        for k in (0..count).filter(|&k| k != mi) {
            let mk = (k + 1) as f64;
            denom *= 1.0 - m * m / (mk * mk);
        }
        fm.push(sign * numer / (2.0 * denom));
    }
    fm
}

/// Dolph-Chebyshev window of length `mx` built in the frequency domain.
///
/// Samples `T_{mx-1}(beta * cos(k*pi/mx))`, rotates alternate bins when `mx`
/// is even, transforms, rearranges into symmetric order, and normalises by
/// the maximum.
fn chebyshev(
    mx: usize,
    attenuation: f64,
    backend: &dyn ComputeBackend,
) -> Result<Vec<f64>, ExecInvariantViolation> {
    let order = (mx - 1) as f64;
    let beta = ((1.0 / order) * 10f64.powf(attenuation.abs() / 20.0).acosh()).cosh();
    let npi = PI / mx as f64;
    let odd = mx % 2 != 0;

    let mut bins = Vec::with_capacity(mx);
    for i in 0..mx {
        let x = beta * (i as f64 * npi).cos();
        let real = if x > 1.0 {
            (order * x.acosh()).cosh()
        } else if x < -1.0 {
            let sign = if odd { 1.0 } else { -1.0 };
            sign * (order * (-x).acosh()).cosh()
        } else {
            (order * x.acos()).cos()
        };
        if odd {
            bins.push(Complex64::new(real, 0.0));
        } else {
            let ang = i as f64 * npi;
            bins.push(Complex64::new(real * ang.cos(), real * ang.sin()));
        }
    }

    backend.transform(&mut bins, Direction::Forward)?;

    let full: Vec<f64> = bins.iter().map(|v| v.re).collect();
    let mut w = Vec::with_capacity(mx);
    if odd {
        let half = (mx + 1) / 2;
        for i in (1..half).rev() {
            w.push(full[i]);
        }
        w.extend_from_slice(&full[..half]);
    } else {
        let half = mx / 2 + 1;
        for i in (1..half).rev() {
            w.push(full[i]);
        }
        w.extend_from_slice(&full[1..half]);
    }

    let mut wmax = w.iter().copied().fold(0.0, f64::max);
    if wmax == 0.0 {
        wmax = 1.0;
    }
    for v in &mut w {
        *v /= wmax;
    }
    Ok(w)
}
