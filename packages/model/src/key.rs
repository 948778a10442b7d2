use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key of the single root node in every state
pub const ROOT_KEY: &str = "root";

/// Stable node identifier, unique within the process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(SmolStr);

impl NodeKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(SmolStr::new(key))
    }

    pub fn root() -> Self {
        Self(SmolStr::new_static(ROOT_KEY))
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_KEY
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        Self(SmolStr::from(key))
    }
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Generate the next process-wide key
pub fn next_key() -> NodeKey {
    let id = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    NodeKey(SmolStr::from(id.to_string()))
}

/// Record a key loaded from elsewhere so generated keys never collide with it
pub fn observe_key(key: &NodeKey) {
    if let Ok(id) = key.as_str().parse::<u64>() {
        NEXT_KEY.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }
}
