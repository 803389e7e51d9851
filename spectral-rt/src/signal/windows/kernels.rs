//! Trait-first window generation kernel.

use crate::kernel::{
    ComputeBackend, ConfigError, ExecInvariantViolation, KernelLifecycle, Write1D,
};
use crate::signal::traits::WindowGenerate;

use super::{get_window, WindowSpec};

/// Constructor config for [`WindowKernel`].
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Window family and shape parameters.
    pub spec: WindowSpec,
    /// Output length.
    pub nx: usize,
    /// Generate the DFT-periodic variant instead of the symmetric one.
    pub fftbins: bool,
}

/// Validated window generator.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowKernel {
    spec: WindowSpec,
    nx: usize,
    fftbins: bool,
}

impl KernelLifecycle for WindowKernel {
    type Config = WindowConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        if config.nx <= 1 {
            return Err(ConfigError::InvalidArgument {
                arg: "nx",
                reason: "window length must be greater than 1",
            });
        }
        match &config.spec {
            WindowSpec::GeneralCosine { coeffs } if coeffs.is_empty() => {
                return Err(ConfigError::EmptyInput { arg: "coeffs" });
            }
            WindowSpec::Taylor { nbar, .. } if *nbar == 0 => {
                return Err(ConfigError::InvalidArgument {
                    arg: "nbar",
                    reason: "taylor window needs at least one sidelobe",
                });
            }
            WindowSpec::Chebyshev { attenuation } if !attenuation.is_finite() => {
                return Err(ConfigError::InvalidArgument {
                    arg: "attenuation",
                    reason: "sidelobe attenuation must be finite",
                });
            }
            _ => {}
        }

        Ok(Self {
            spec: config.spec,
            nx: config.nx,
            fftbins: config.fftbins,
        })
    }
}

impl WindowGenerate for WindowKernel {
    fn run_into<O>(
        &self,
        backend: &dyn ComputeBackend,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        O: Write1D<f64> + ?Sized,
    {
        let generated = self.run_alloc(backend)?;
        let out_slice = out.write_slice_mut().map_err(ExecInvariantViolation::from)?;
        if out_slice.len() != generated.len() {
            return Err(ExecInvariantViolation::LengthMismatch {
                arg: "out",
                expected: generated.len(),
                got: out_slice.len(),
            });
        }
        out_slice.copy_from_slice(&generated);
        Ok(())
    }

    fn run_alloc(&self, backend: &dyn ComputeBackend) -> Result<Vec<f64>, ExecInvariantViolation> {
        get_window(&self.spec, self.nx, self.fftbins, backend)
    }
}
