//! Signal-processing layers of the engine: windows, segment loading,
//! spectral estimators, and the dominant-period reduction.

pub mod dominant;
pub mod segment;
pub mod spectral;
pub mod traits;
pub mod windows;
