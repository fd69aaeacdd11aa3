/// Behavior knobs of the bridge, fixed when the module loads.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub reload: ReloadPolicy,
    pub argument_errors: ArgumentErrorStyle,
    /// Log every failure raised to the host at debug level.
    pub log_raises: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            reload: ReloadPolicy::default(),
            argument_errors: ArgumentErrorStyle::default(),
            log_raises: true,
        }
    }
}

/// What a second load of a bridged module does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Fail the load.
    #[default]
    Reject,
    /// Take over the resource types and keep the first registry.
    KeepExisting,
}

/// How argument failures are raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentErrorStyle {
    /// `%ArgumentError{message: ...}`
    #[default]
    Struct,
    /// The bare `badarg` atom.
    Badarg,
}
