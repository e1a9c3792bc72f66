//! Per-function arguments that may be copied into a `scaleway_function` body.
//!
//! Declarations can carry arbitrary keys; only the ones listed in
//! [`AllowedArg::ALL`] ever reach the generated configuration. Everything else
//! is dropped without an error so that newer declarations keep generating.

use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllowedArg {
    MinScale,
    MaxScale,
    MemoryLimit,
    // `timeout` stays out until the provider's function resource accepts it.
    Privacy,
    Description,
}

impl AllowedArg {
    pub const ALL: [AllowedArg; 5] = [
        Self::MinScale,
        Self::MaxScale,
        Self::MemoryLimit,
        Self::Privacy,
        Self::Description,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinScale => "min_scale",
            Self::MaxScale => "max_scale",
            Self::MemoryLimit => "memory_limit",
            Self::Privacy => "privacy",
            Self::Description => "description",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|arg| arg.as_str() == key)
    }
}

/// Copy every allowlisted key of `source` into `target`, overwriting.
pub fn filter_args(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if AllowedArg::from_key(key).is_some() {
            target.insert(key.clone(), value.clone());
        } else {
            debug!(key = %key, "dropping unsupported function argument");
        }
    }
}

/// Remove every allowlisted key from `target`, leaving other keys in place.
pub fn clear_allowed_args(target: &mut Map<String, Value>) {
    for arg in AllowedArg::ALL {
        target.shift_remove(arg.as_str());
    }
}
