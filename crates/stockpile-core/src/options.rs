use serde::Deserialize;

/// Upper bound on the stack size of charge-counted items.
pub const MAX_STACK_SIZE: i32 = 200;

/// Global knobs consulted while building the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Strip every fault list during finalization.
    pub no_faults: bool,
    /// Treat same-source redefinitions and unread record members as errors.
    pub strict: bool,
    /// Stack size cap for charge-counted items.
    pub max_stack_size: i32,
    /// Default seed for spawn-table resolution.
    pub seed: u64,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            no_faults: false,
            strict: false,
            max_stack_size: MAX_STACK_SIZE,
            seed: 0,
        }
    }
}
