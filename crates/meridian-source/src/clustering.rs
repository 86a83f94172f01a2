//! Screen-space clustering settings carried by a data source.
//!
//! Meridian does no clustering itself; these are the settings a renderer
//! reads when deciding whether to merge nearby entities.

use serde::{Deserialize, Serialize};

/// Default pixel radius within which entities are merged.
pub const DEFAULT_PIXEL_RANGE: u32 = 80;

/// Default minimum number of entities forming a cluster.
pub const DEFAULT_MINIMUM_CLUSTER_SIZE: u32 = 2;

/// Clustering settings for one data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringOptions {
    /// Whether clustering is active.
    pub enabled: bool,
    /// Pixel radius within which entities are merged.
    pub pixel_range: u32,
    /// Minimum number of entities forming a cluster.
    pub minimum_cluster_size: u32,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            pixel_range: DEFAULT_PIXEL_RANGE,
            minimum_cluster_size: DEFAULT_MINIMUM_CLUSTER_SIZE,
        }
    }
}
