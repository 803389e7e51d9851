//! Dominant-period extraction and cross-stream synchrony metrics.
//!
//! The reducer runs a density-scaled hann periodogram over each stream at
//! `fs = 1` (so a bin's period in samples is `1/f`), picks the strongest bin
//! inside the caller's period band plus an unconstrained runner-up, then
//! folds the two streams' dominant phases into a 0-100 synchrony scale.

use core::f64::consts::PI;

use crate::kernel::{ComputeBackend, ExecInvariantViolation, KernelLifecycle};
use crate::signal::segment::DetrendMode;
use crate::signal::spectral::{
    PeriodogramConfig, PeriodogramKernel, PeriodogramOutput, Scaling,
};
use crate::signal::traits::SpectrumEstimate1D;
use crate::signal::windows::WindowSpec;

/// Width of the packed metrics vector.
pub const RESULT_FIELDS: usize = 12;

/// Period band constraining the dominant-bin search, in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodBand {
    /// Shortest admissible period.
    pub min_period: f64,
    /// Longest admissible period.
    pub max_period: f64,
}

/// Dominant bin of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DominantPeak {
    /// Strongest in-band period in samples, `0` when no bin qualifies.
    pub period: f64,
    /// Phase of the in-band dominant bin, `0` when no bin qualifies.
    pub phase: f64,
    /// Strongest period of at least two samples, band ignored.
    pub period_global: f64,
}

/// Pick the dominant in-band and global bins from a periodogram.
///
/// Bins are scanned in ascending frequency order and ties keep the first
/// winner, so the result is deterministic across runs and platforms.
pub fn dominant_peak(spectrum: &PeriodogramOutput, band: &PeriodBand) -> DominantPeak {
    let mut best_local = -1.0f64;
    let mut best_global = -1.0f64;
    let mut k_local = None;
    let mut k_global = None;

    for (k, &f) in spectrum.frequencies.iter().enumerate().skip(1) {
        if f <= 0.0 {
            continue;
        }
        let period = 1.0 / f;
        let power = spectrum.power[k];
        if period >= 2.0 && power > best_global {
            best_global = power;
            k_global = Some(k);
        }
        if period >= band.min_period && period <= band.max_period && power > best_local {
            best_local = power;
            k_local = Some(k);
        }
    }

    let mut peak = DominantPeak::default();
    if let Some(k) = k_local {
        peak.period = 1.0 / spectrum.frequencies[k];
        peak.phase = spectrum.spectrum[k].im.atan2(spectrum.spectrum[k].re);
    }
    if let Some(k) = k_global {
        peak.period_global = 1.0 / spectrum.frequencies[k];
    }
    peak
}

/// Fold `|a - b|` into `[0, pi]`.
fn wrap_phase_diff(a: f64, b: f64) -> f64 {
    let mut d = (a - b).abs();
    while d > PI {
        d = (d - 2.0 * PI).abs();
    }
    d
}

/// Synchrony metrics combining the two streams' dominant bins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncMetrics {
    /// Dominant in-band period of the price stream.
    pub per_price: f64,
    /// Unconstrained dominant period of the price stream.
    pub per_price_global: f64,
    /// Dominant in-band period of the wave stream.
    pub per_wave: f64,
    /// Unconstrained dominant period of the wave stream.
    pub per_wave_global: f64,
    /// Half the price period, `0` when no price period was found.
    pub per_sub: f64,
    /// Phase agreement of the two streams on a 0-100 scale.
    pub sync_pct: f64,
    /// `100 - sync_pct`.
    pub desync_pct: f64,
    /// Price phase progression through its cycle, 0-100.
    pub prog_price: f64,
    /// Wave phase progression through its cycle, 0-100.
    pub prog_wave: f64,
    /// Whole-sample gap between the two dominant periods.
    pub sync_bars: f64,
    /// Raw dominant phase of the price stream.
    pub phase_price: f64,
}

impl SyncMetrics {
    /// Combine the per-stream peaks.
    pub fn from_peaks(price: &DominantPeak, wave: &DominantPeak) -> Self {
        let per_sub = if price.period > 0.0 {
            price.period * 0.5
        } else {
            0.0
        };

        let phase_diff = wrap_phase_diff(price.phase, wave.phase);
        let sync_pct = if price.period > 0.0 && wave.period > 0.0 {
            (100.0 * (1.0 - phase_diff / PI)).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let prog = |phase: f64| -> f64 {
            if phase >= 0.0 {
                phase / (2.0 * PI) * 100.0
            } else {
                0.0
            }
        };

        let gap_price = if price.period > 0.0 { price.period } else { 0.0 };
        let gap_wave = if wave.period > 0.0 { wave.period } else { 0.0 };

        Self {
            per_price: price.period,
            per_price_global: price.period_global,
            per_wave: wave.period,
            per_wave_global: wave.period_global,
            per_sub,
            sync_pct,
            desync_pct: 100.0 - sync_pct,
            prog_price: prog(price.phase),
            prog_wave: prog(wave.phase),
            sync_bars: (gap_price - gap_wave).abs().floor(),
            phase_price: price.phase,
        }
    }

    /// Pack into the fixed wire layout consumers index by position.
    pub fn to_fields(&self) -> [f64; RESULT_FIELDS] {
        [
            self.per_price,
            self.per_price_global,
            self.per_wave,
            self.per_wave_global,
            self.per_sub,
            self.sync_pct,
            self.desync_pct,
            self.prog_price,
            self.prog_wave,
            self.sync_bars,
            self.phase_price,
            0.0,
        ]
    }
}

/// Analyze a price/wave pair and pack the synchrony vector.
///
/// Both streams go through the same hann/density/onesided periodogram; the
/// caller has already clamped the slices to the usable window.
pub fn analyze_pair(
    price: &[f64],
    wave: &[f64],
    nfft: usize,
    detrend: DetrendMode,
    band: &PeriodBand,
    backend: &dyn ComputeBackend,
) -> Result<[f64; RESULT_FIELDS], ExecInvariantViolation> {
    let kernel = PeriodogramKernel::try_new(PeriodogramConfig {
        fs: 1.0,
        window: WindowSpec::Hann,
        nfft,
        detrend,
        onesided: true,
        scaling: Scaling::Density,
    })
    .map_err(ExecInvariantViolation::from)?;

    let price_spec = kernel.run(price, backend)?;
    let wave_spec = kernel.run(wave, backend)?;

    let price_peak = dominant_peak(&price_spec, band);
    let wave_peak = dominant_peak(&wave_spec, band);
    Ok(SyncMetrics::from_peaks(&price_peak, &wave_peak).to_fields())
}
