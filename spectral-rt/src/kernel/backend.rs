use num_complex::Complex64;
use num_traits::Zero;

use super::BackendError;
use crate::fft::{self, Direction};

/// Compute capability behind the transform pipeline.
///
/// The pipeline was designed against an accelerator that exposes explicit
/// kernel enqueues over device buffers; this trait is the seam where such a
/// device plugs in. Implementations are single-tenant: a backend serialises
/// its own command stream internally, and callers may share one instance
/// across threads without further coordination.
///
/// The window library requires at least the scalar transform (its Chebyshev
/// construction is FFT-based), so every backend must implement all three
/// kernels; there is no partial capability.
pub trait ComputeBackend: Send + Sync {
    /// Short backend identifier for diagnostics.
    fn name(&self) -> &'static str;

    /// Batched in-place radix-2 transform over `data.len() / n` contiguous
    /// segments of length `n`. `n` must be a power of two that divides
    /// `data.len()`.
    fn fft_batch(
        &self,
        data: &mut [Complex64],
        n: usize,
        direction: Direction,
    ) -> Result<(), BackendError>;

    /// Naive O(N^2) transform for lengths the radix-2 pipeline cannot take.
    /// `out` must have the same length as `input`.
    fn dft(
        &self,
        input: &[Complex64],
        out: &mut [Complex64],
        direction: Direction,
    ) -> Result<(), BackendError>;

    /// Multiply every bin by `factor`.
    fn scale(&self, data: &mut [Complex64], factor: f64) -> Result<(), BackendError>;

    /// Scalar transform entry: radix-2 when the length is a power of two,
    /// DFT fallback otherwise.
    fn transform(&self, data: &mut [Complex64], direction: Direction) -> Result<(), BackendError> {
        if data.is_empty() {
            return Err(BackendError::Enqueue {
                kernel: "transform",
                reason: "input must be non-empty",
            });
        }
        if fft::is_pow2(data.len()) {
            self.fft_batch(data, data.len(), direction)
        } else {
            let mut out = vec![Complex64::zero(); data.len()];
            self.dft(data, &mut out, direction)?;
            data.copy_from_slice(&out);
            Ok(())
        }
    }
}

/// In-process backend running every kernel on the calling thread.
///
/// Stateless, so sharing one instance across threads needs no lock; an
/// accelerated implementation would hold its device queue behind one.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

impl ComputeBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn fft_batch(
        &self,
        data: &mut [Complex64],
        n: usize,
        direction: Direction,
    ) -> Result<(), BackendError> {
        if !fft::is_pow2(n) {
            return Err(BackendError::Enqueue {
                kernel: "fft_stage_batch",
                reason: "segment length is not a power of two",
            });
        }
        if data.len() % n != 0 {
            return Err(BackendError::Enqueue {
                kernel: "fft_stage_batch",
                reason: "buffer length is not a multiple of the segment length",
            });
        }
        fft::fft_batch(data, n, direction);
        Ok(())
    }

    fn dft(
        &self,
        input: &[Complex64],
        out: &mut [Complex64],
        direction: Direction,
    ) -> Result<(), BackendError> {
        if input.len() != out.len() {
            return Err(BackendError::Enqueue {
                kernel: "dft_complex",
                reason: "input and output lengths differ",
            });
        }
        fft::dft(input, out, direction);
        Ok(())
    }

    fn scale(&self, data: &mut [Complex64], factor: f64) -> Result<(), BackendError> {
        fft::scale(data, factor);
        Ok(())
    }
}
