use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// A kernel is built from a config exactly once; every argument check lives
/// in `try_new`, so a constructed kernel can run without revalidating.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}
