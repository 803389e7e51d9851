//! Segment extraction for the framed transforms.
//!
//! Each STFT frame is produced by the same four steps: fetch (with optional
//! boundary extension), detrend, window, zero-pad to the transform length.
//! Detrending is reduced to a pure per-sample operation by precomputing the
//! per-segment sufficient statistics `(sum x, sum i*x)` up front.

use num_complex::Complex64;

use crate::kernel::ExecInvariantViolation;

/// Boundary extension applied when a frame reaches past the input.
///
/// The built-in pipeline always passes [`Boundary::None`]; the other modes
/// mirror the usual STFT edge treatments. Indices outside even the extended
/// range read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// No extension; out-of-range samples are zero.
    #[default]
    None,
    /// Even reflection about the edge sample.
    Even,
    /// Odd reflection through the edge value.
    Odd,
    /// Repeat the edge value.
    Constant,
}

/// Per-segment trend removal applied before windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetrendMode {
    /// Leave the segment as-is.
    #[default]
    None,
    /// Subtract the segment mean.
    Mean,
    /// Subtract the OLS line fit over the segment's sample indices.
    Linear,
}

impl DetrendMode {
    /// Decode the wire representation used by the flat ABI (0/1/2).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DetrendMode::Mean,
            2 => DetrendMode::Linear,
            _ => DetrendMode::None,
        }
    }
}

/// Frame geometry shared by the batched loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Start index of the first frame (may be negative under extension).
    pub start0: isize,
    /// Hop between consecutive frame starts.
    pub step: usize,
    /// Samples fetched per frame.
    pub nperseg: usize,
    /// Transform length each frame is zero-padded to.
    pub nfft: usize,
    /// Number of frames.
    pub nseg: usize,
}

/// Fetch `x[idx]` under the extension policy.
///
/// `nedge` is the number of extension samples prepended before `x[0]` in the
/// extended indexing, and `ext_valid` bounds the addressable extended range.
fn extended_value(
    x: &[f64],
    nedge: usize,
    boundary: Boundary,
    ext_valid: usize,
    idx: isize,
) -> f64 {
    if idx < 0 || idx as usize >= ext_valid {
        return 0.0;
    }
    let idx = idx as usize;
    let n = x.len();
    if boundary == Boundary::None || nedge == 0 {
        return x[idx];
    }
    if idx >= nedge && idx < nedge + n {
        return x[idx - nedge];
    }
    if idx < nedge {
        let src = (nedge - idx).min(n - 1);
        return match boundary {
            Boundary::Even => x[src],
            Boundary::Odd => 2.0 * x[0] - x[src],
            Boundary::Constant => x[0],
            Boundary::None => 0.0,
        };
    }
    let past = idx - (nedge + n);
    let src = n.saturating_sub(2).saturating_sub(past).min(n - 1);
    match boundary {
        Boundary::Even => x[src],
        Boundary::Odd => 2.0 * x[n - 1] - x[src],
        Boundary::Constant => x[n - 1],
        Boundary::None => 0.0,
    }
}

/// Load `layout.nseg` windowed frames of `x` into one contiguous complex
/// buffer of `nseg * nfft` samples.
///
/// The detrend statistics only accumulate in-range samples; extension values
/// do not participate in the fit.
pub fn load_segments(
    x: &[f64],
    window: &[f64],
    layout: &SegmentLayout,
    detrend: DetrendMode,
    boundary: Boundary,
    nedge: usize,
    out: &mut [Complex64],
) -> Result<(), ExecInvariantViolation> {
    let expected = layout.nseg * layout.nfft;
    if out.len() != expected {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "out",
            expected,
            got: out.len(),
        });
    }
    if window.len() < layout.nperseg {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "window",
            expected: layout.nperseg,
            got: window.len(),
        });
    }
    if layout.nperseg > layout.nfft {
        return Err(ExecInvariantViolation::InvalidState {
            reason: "frame length exceeds transform length",
        });
    }

    let ext_valid = match boundary {
        Boundary::None => x.len(),
        _ => x.len() + 2 * nedge,
    };

    let n = layout.nperseg as f64;
    let sum_i = (n - 1.0) * n / 2.0;
    let sum_i2 = (n - 1.0) * n * (2.0 * n - 1.0) / 6.0;

    for seg in 0..layout.nseg {
        let start = layout.start0 + (seg * layout.step) as isize;

        // Sufficient statistics over the raw in-range samples.
        let (mut s0, mut s1) = (0.0, 0.0);
        if detrend != DetrendMode::None {
            for i in 0..layout.nperseg {
                let idx = start + i as isize;
                if idx < 0 || idx as usize >= x.len() {
                    continue;
                }
                let v = x[idx as usize];
                s0 += v;
                s1 += v * i as f64;
            }
        }

        let base = seg * layout.nfft;
        for i in 0..layout.nperseg {
            let idx = start + i as isize;
            let mut xi = extended_value(x, nedge, boundary, ext_valid, idx);
            match detrend {
                DetrendMode::None => {}
                DetrendMode::Mean => xi -= s0 / n,
                DetrendMode::Linear => {
                    let denom = n * sum_i2 - sum_i * sum_i;
                    let slope = if denom != 0.0 {
                        (n * s1 - sum_i * s0) / denom
                    } else {
                        0.0
                    };
                    let intercept = (s0 - slope * sum_i) / n;
                    xi -= slope * i as f64 + intercept;
                }
            }
            out[base + i] = Complex64::new(xi * window[i], 0.0);
        }
        for v in &mut out[base + layout.nperseg..base + layout.nfft] {
            *v = Complex64::new(0.0, 0.0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layout(nperseg: usize, nfft: usize, nseg: usize, step: usize) -> SegmentLayout {
        SegmentLayout {
            start0: 0,
            step,
            nperseg,
            nfft,
            nseg,
        }
    }

    #[test]
    fn plain_load_windows_and_zero_pads() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let window = [0.5; 4];
        let mut out = vec![Complex64::new(9.0, 9.0); 8];
        load_segments(
            &x,
            &window,
            &layout(4, 8, 1, 4),
            DetrendMode::None,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");

        for i in 0..4 {
            assert_abs_diff_eq!(out[i].re, x[i] * 0.5, epsilon = 1e-12);
            assert_abs_diff_eq!(out[i].im, 0.0, epsilon = 1e-12);
        }
        for v in &out[4..] {
            assert_eq!(*v, Complex64::new(0.0, 0.0));
        }
    }

    #[test]
    fn mean_detrend_removes_the_segment_mean() {
        let x = [3.0, 5.0, 7.0, 9.0];
        let window = [1.0; 4];
        let mut out = vec![Complex64::new(0.0, 0.0); 4];
        load_segments(
            &x,
            &window,
            &layout(4, 4, 1, 4),
            DetrendMode::Mean,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");

        let sum: f64 = out.iter().map(|v| v.re).sum();
        assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0].re, -3.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_detrend_annihilates_a_ramp() {
        let x: Vec<f64> = (0..16).map(|i| 2.5 * i as f64 - 7.0).collect();
        let window = [1.0; 16];
        let mut out = vec![Complex64::new(0.0, 0.0); 16];
        load_segments(
            &x,
            &window,
            &layout(16, 16, 1, 16),
            DetrendMode::Linear,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");

        for v in &out {
            assert_abs_diff_eq!(v.re, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn degenerate_single_sample_linear_detrend_zeroes_the_frame() {
        let x = [42.0];
        let window = [1.0];
        let mut out = vec![Complex64::new(0.0, 0.0); 2];
        load_segments(
            &x,
            &window,
            &layout(1, 2, 1, 1),
            DetrendMode::Linear,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");
        assert_abs_diff_eq!(out[0].re, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn batched_frames_advance_by_step() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let window = [1.0; 4];
        let mut out = vec![Complex64::new(0.0, 0.0); 3 * 4];
        load_segments(
            &x,
            &window,
            &layout(4, 4, 3, 2),
            DetrendMode::None,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");

        for seg in 0..3 {
            for i in 0..4 {
                assert_abs_diff_eq!(
                    out[seg * 4 + i].re,
                    (seg * 2 + i) as f64,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn out_of_range_samples_read_as_zero_without_extension() {
        let x = [1.0, 1.0];
        let window = [1.0; 4];
        let mut out = vec![Complex64::new(0.0, 0.0); 4];
        load_segments(
            &x,
            &window,
            &layout(4, 4, 1, 4),
            DetrendMode::None,
            Boundary::None,
            0,
            &mut out,
        )
        .expect("load should succeed");
        assert_eq!(out[2], Complex64::new(0.0, 0.0));
        assert_eq!(out[3], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn boundary_extensions_fill_the_left_edge() {
        let x = [1.0, 2.0, 3.0];
        let window = [1.0; 3];
        let nedge = 2usize;

        let fetch = |boundary: Boundary| {
            let mut out = vec![Complex64::new(0.0, 0.0); 3];
            load_segments(
                &x,
                &window,
                &SegmentLayout {
                    start0: 0,
                    step: 3,
                    nperseg: 3,
                    nfft: 3,
                    nseg: 1,
                },
                DetrendMode::None,
                boundary,
                nedge,
                &mut out,
            )
            .expect("load should succeed");
            (out[0].re, out[1].re, out[2].re)
        };

        // With two extension samples the frame reads [ext0, ext1, x[0]]:
        // even reflection gives [x2, x1, x0], odd reflects through x[0].
        assert_eq!(fetch(Boundary::Even), (3.0, 2.0, 1.0));
        assert_eq!(fetch(Boundary::Odd), (-1.0, 0.0, 1.0));
        assert_eq!(fetch(Boundary::Constant), (1.0, 1.0, 1.0));
    }

    #[test]
    fn mismatched_output_length_is_rejected() {
        let x = [1.0; 8];
        let window = [1.0; 4];
        let mut out = vec![Complex64::new(0.0, 0.0); 7];
        let err = load_segments(
            &x,
            &window,
            &layout(4, 4, 2, 4),
            DetrendMode::None,
            Boundary::None,
            0,
            &mut out,
        )
        .expect_err("short output must fail");
        assert!(matches!(
            err,
            ExecInvariantViolation::LengthMismatch { arg: "out", .. }
        ));
    }
}
