//! Trait interfaces for the spectral kernels.
//!
//! These traits define the trait-first API shape shared by the window and
//! spectrum kernels: validated construction via
//! [`crate::kernel::KernelLifecycle`], then `run`-style execution.

use crate::kernel::{ComputeBackend, ExecInvariantViolation, Read1D, Write1D};

/// Window generation capability.
pub trait WindowGenerate {
    /// Generate window samples into a caller-provided output buffer.
    fn run_into<O>(
        &self,
        backend: &dyn ComputeBackend,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<f64> + ?Sized;

    /// Generate window samples and allocate output.
    fn run_alloc(&self, backend: &dyn ComputeBackend) -> Result<Vec<f64>, ExecInvariantViolation>;
}

/// One-shot spectrum estimation capability over a real 1D input.
pub trait SpectrumEstimate1D {
    /// Output bundle produced by the estimator.
    type Output;

    /// Run the estimator over `input` on `backend`.
    fn run<I>(
        &self,
        input: &I,
        backend: &dyn ComputeBackend,
    ) -> Result<Self::Output, ExecInvariantViolation>
    where
        I: Read1D<f64> + ?Sized;
}
