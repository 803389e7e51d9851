//! Periodogram and short-time Fourier transform operators.
//!
//! Both estimators share the same pipeline: generate an FFT-periodic window,
//! load (detrended, windowed, zero-padded) frames into one contiguous complex
//! buffer, run the batched transform on the compute backend, then optionally
//! rescale the raw spectrum. The periodogram is the single-frame special
//! case and additionally keeps the complex spectrum for phase consumers.

use num_complex::Complex64;
use num_traits::Zero;

use crate::fft::{next_pow2, Direction};
use crate::kernel::{
    ComputeBackend, ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D,
};
use crate::signal::segment::{load_segments, Boundary, DetrendMode, SegmentLayout};
use crate::signal::traits::SpectrumEstimate1D;
use crate::signal::windows::{get_window, WindowSpec};

/// Output normalisation of the raw power spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scaling {
    /// Raw `|X[k]|^2`.
    #[default]
    None,
    /// Power spectral density, `1/(fs * sum(w^2))`.
    Density,
    /// Power spectrum, `1/sum(w)^2`.
    Spectrum,
}

impl Scaling {
    /// Resolve a case-insensitive scaling name; unknown names mean no
    /// scaling.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "density" => Scaling::Density,
            "spectrum" => Scaling::Spectrum,
            _ => Scaling::None,
        }
    }

    /// Amplitude factor applied to the complex spectrum, if any.
    fn amplitude_factor(self, fs: f64, wsum: f64, winpow: f64) -> Option<f64> {
        let factor = match self {
            Scaling::None => 1.0,
            Scaling::Density => {
                if winpow > 0.0 {
                    (1.0 / (fs * winpow)).sqrt()
                } else {
                    1.0
                }
            }
            Scaling::Spectrum => {
                if wsum != 0.0 {
                    1.0 / wsum
                } else {
                    1.0
                }
            }
        };
        (factor != 1.0).then_some(factor)
    }
}

/// Constructor config for [`PeriodogramKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodogramConfig {
    /// Sample rate of the input series.
    pub fs: f64,
    /// Analysis window applied to the frame.
    pub window: WindowSpec,
    /// Requested transform length; `0` derives it from the input length.
    pub nfft: usize,
    /// Per-frame trend removal.
    pub detrend: DetrendMode,
    /// Return only the non-negative half of the spectrum.
    pub onesided: bool,
    /// Output normalisation.
    pub scaling: Scaling,
}

impl Default for PeriodogramConfig {
    fn default() -> Self {
        Self {
            fs: 1.0,
            window: WindowSpec::Hann,
            nfft: 0,
            detrend: DetrendMode::None,
            onesided: true,
            scaling: Scaling::Density,
        }
    }
}

/// Periodogram result bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodogramOutput {
    /// Frequency of each returned bin.
    pub frequencies: Vec<f64>,
    /// Power per bin after scaling (onesided interior bins doubled).
    pub power: Vec<f64>,
    /// Raw complex spectrum over the full transform length, after scaling.
    pub spectrum: Vec<Complex64>,
}

/// One-shot single-frame power-spectrum estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodogramKernel {
    config: PeriodogramConfig,
}

impl KernelLifecycle for PeriodogramKernel {
    type Config = PeriodogramConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !(config.fs.is_finite() && config.fs > 0.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "fs",
                reason: "sample rate must be positive and finite",
            });
        }
        Ok(Self { config })
    }
}

impl SpectrumEstimate1D for PeriodogramKernel {
    type Output = PeriodogramOutput;

    fn run<I>(
        &self,
        input: &I,
        backend: &dyn ComputeBackend,
    ) -> Result<Self::Output, ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized,
    {
        let x = input.read_slice().map_err(ExecInvariantViolation::from)?;
        let len = x.len();
        if len == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "periodogram input must be non-empty",
            });
        }
        let cfg = &self.config;

        let nperseg = if cfg.nfft > 0 {
            cfg.nfft.min(len)
        } else {
            len
        };
        let nfft_eff = next_pow2(cfg.nfft.max(nperseg));

        let window = get_window(&cfg.window, nperseg, true, backend)?;
        let wsum: f64 = window.iter().sum();
        let winpow: f64 = window.iter().map(|v| v * v).sum();

        let mut buf = vec![Complex64::zero(); nfft_eff];
        load_segments(
            x,
            &window,
            &SegmentLayout {
                start0: 0,
                step: nperseg,
                nperseg,
                nfft: nfft_eff,
                nseg: 1,
            },
            cfg.detrend,
            Boundary::None,
            0,
            &mut buf,
        )?;

        backend.fft_batch(&mut buf, nfft_eff, Direction::Forward)?;
        if let Some(factor) = cfg.scaling.amplitude_factor(cfg.fs, wsum, winpow) {
            backend.scale(&mut buf, factor)?;
        }

        let nfreq = if cfg.onesided {
            nfft_eff / 2 + 1
        } else {
            nfft_eff
        };
        let mut frequencies = Vec::with_capacity(nfreq);
        let mut power = Vec::with_capacity(nfreq);
        for (k, bin) in buf.iter().enumerate().take(nfreq) {
            let f = if cfg.onesided {
                k as f64 * cfg.fs / nfft_eff as f64
            } else {
                let kk = if k <= nfft_eff / 2 {
                    k as f64
                } else {
                    k as f64 - nfft_eff as f64
                };
                kk * cfg.fs / nfft_eff as f64
            };
            frequencies.push(f);
            power.push(bin.norm_sqr());
        }

        if cfg.onesided {
            // Interior bins absorb their negative-frequency twins; the
            // Nyquist bin only exists unpaired when the length is even.
            let last = if nfft_eff % 2 != 0 {
                nfreq - 1
            } else {
                nfreq.saturating_sub(2)
            };
            for p in power.iter_mut().take(last + 1).skip(1) {
                *p *= 2.0;
            }
        }

        Ok(PeriodogramOutput {
            frequencies,
            power,
            spectrum: buf,
        })
    }
}

/// Constructor config for [`StftKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct StftConfig {
    /// Sample rate of the input series.
    pub fs: f64,
    /// Analysis window applied per frame.
    pub window: WindowSpec,
    /// Samples per frame; `0` means the whole input.
    pub nperseg: usize,
    /// Overlapping samples between frames; `None` means `nperseg / 2`.
    pub noverlap: Option<usize>,
    /// Requested transform length; `0` derives it from `nperseg`.
    pub nfft: usize,
    /// Per-frame trend removal.
    pub detrend: DetrendMode,
    /// Return only the non-negative half of the spectrum.
    pub onesided: bool,
    /// Output normalisation.
    pub scaling: Scaling,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            fs: 1.0,
            window: WindowSpec::Hann,
            nperseg: 256,
            noverlap: None,
            nfft: 0,
            detrend: DetrendMode::None,
            onesided: true,
            scaling: Scaling::None,
        }
    }
}

/// STFT result bundle.
///
/// The complex matrix is stored as two real matrices in `[freq][segment]`
/// layout: element `(k, s)` lives at `k * segments + s`.
#[derive(Debug, Clone, PartialEq)]
pub struct StftOutput {
    /// Frequency of each returned bin row.
    pub frequencies: Vec<f64>,
    /// Center time of each frame, in seconds.
    pub times: Vec<f64>,
    /// Real part of the packed spectrum matrix.
    pub real: Vec<f64>,
    /// Imaginary part of the packed spectrum matrix.
    pub imag: Vec<f64>,
}

impl StftOutput {
    /// Number of frames per frequency row.
    pub fn segments(&self) -> usize {
        self.times.len()
    }

    /// Complex bin at frequency row `k`, frame `s`.
    pub fn bin(&self, k: usize, s: usize) -> Complex64 {
        let idx = k * self.segments() + s;
        Complex64::new(self.real[idx], self.imag[idx])
    }
}

/// Batched short-time Fourier transform estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct StftKernel {
    config: StftConfig,
}

impl KernelLifecycle for StftKernel {
    type Config = StftConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if !(config.fs.is_finite() && config.fs > 0.0) {
            return Err(ConfigError::InvalidArgument {
                arg: "fs",
                reason: "sample rate must be positive and finite",
            });
        }
        Ok(Self { config })
    }
}

impl SpectrumEstimate1D for StftKernel {
    type Output = StftOutput;

    fn run<I>(
        &self,
        input: &I,
        backend: &dyn ComputeBackend,
    ) -> Result<Self::Output, ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized,
    {
        let x = input.read_slice().map_err(ExecInvariantViolation::from)?;
        let len = x.len();
        if len == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "stft input must be non-empty",
            });
        }
        let cfg = &self.config;

        let nperseg = if cfg.nperseg == 0 {
            len
        } else {
            cfg.nperseg.min(len)
        };
        let noverlap = cfg.noverlap.unwrap_or(nperseg / 2).min(nperseg - 1);
        let step = nperseg - noverlap;
        let nseg = (len - noverlap) / step;
        if nseg == 0 {
            return Err(ExecInvariantViolation::InvalidState {
                reason: "input is shorter than one frame",
            });
        }
        let nfft_eff = next_pow2(cfg.nfft.max(nperseg));
        let nfreq = if cfg.onesided {
            nfft_eff / 2 + 1
        } else {
            nfft_eff
        };

        let window = get_window(&cfg.window, nperseg, true, backend)?;
        let wsum: f64 = window.iter().sum();
        let winpow: f64 = window.iter().map(|v| v * v).sum();

        let mut buf = vec![Complex64::zero(); nseg * nfft_eff];
        load_segments(
            x,
            &window,
            &SegmentLayout {
                start0: 0,
                step,
                nperseg,
                nfft: nfft_eff,
                nseg,
            },
            cfg.detrend,
            Boundary::None,
            0,
            &mut buf,
        )?;

        backend.fft_batch(&mut buf, nfft_eff, Direction::Forward)?;
        if let Some(factor) = cfg.scaling.amplitude_factor(cfg.fs, wsum, winpow) {
            backend.scale(&mut buf, factor)?;
        }

        let frequencies: Vec<f64> = (0..nfreq)
            .map(|k| k as f64 * cfg.fs / nfft_eff as f64)
            .collect();
        let times: Vec<f64> = (0..nseg)
            .map(|s| ((s * step) as f64 + nperseg as f64 / 2.0) / cfg.fs)
            .collect();

        let mut real = vec![0.0; nfreq * nseg];
        let mut imag = vec![0.0; nfreq * nseg];
        for s in 0..nseg {
            for k in 0..nfreq {
                let v = buf[s * nfft_eff + k];
                let dst = k * nseg + s;
                real[dst] = v.re;
                imag[dst] = v.im;
            }
        }

        Ok(StftOutput {
            frequencies,
            times,
            real,
            imag,
        })
    }
}
