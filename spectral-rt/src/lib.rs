//! Real-time spectral analysis engine for one-dimensional time series.
//!
//! Producers submit pairs of aligned real series ("price" and "wave")
//! against an opaque key; a background worker estimates their power spectra
//! with a windowed transform, locates the dominant period inside a caller
//! band, derives phase and synchrony metrics, and deposits a fixed 12-field
//! vector into a bounded per-key ring that consumers poll. The periodogram
//! and STFT primitives underneath are exposed directly as well.
//!
//! The crate is organised in layers:
//!
//! - [`kernel`]: constructor-validation substrate, 1D buffer adapters, and
//!   the [`kernel::ComputeBackend`] capability the transforms run on.
//! - [`special`] and [`fft`]: scalar special functions and the radix-2 /
//!   naive-DFT transform kernels.
//! - [`signal`]: the window library, segment loader, spectral estimators,
//!   and the dominant-period reducer.
//! - [`engine`]: the job queue, worker thread, and per-key result rings.
//! - [`ffi`]: a flat C surface over one process-wide engine, suitable for
//!   loading the crate as a dynamic library.

#![warn(missing_docs)]

pub mod engine;
pub mod ffi;
pub mod fft;
pub mod kernel;
pub mod signal;
pub mod special;
