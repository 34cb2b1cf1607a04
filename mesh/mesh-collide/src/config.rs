//! Configuration for hierarchy construction.
//!
//! This module provides [`BuildConfig`] for controlling how the tree
//! builder partitions a triangle set: how deep the tree may grow, when
//! a subset is still worth splitting, and when parallel construction
//! kicks in.
//!
//! # Presets
//!
//! - [`BuildConfig::default()`] - Balanced settings for general use
//! - [`BuildConfig::coarse()`] - Shallow trees with large leaves
//! - [`BuildConfig::fine()`] - Deep trees with small leaves
//!
//! # Example
//!
//! ```
//! use mesh_collide::BuildConfig;
//!
//! let config = BuildConfig::default()
//!     .with_max_depth(20)
//!     .with_min_triangles_for_split(4);
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{CollideError, CollideResult};

/// Configuration for hierarchy construction.
///
/// Controls the split budget and the subset size below which splitting
/// stops paying off. Use presets for common shapes or customize
/// individual settings through the builder methods.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Maximum number of splits along any root-to-leaf path.
    /// A value of `0` builds a single-leaf tree.
    pub max_depth: u32,

    /// Minimum number of triangles a subset must hold for a further
    /// split to be worthwhile. Smaller subsets still become child
    /// nodes, but collapse to leaves one level down. Must be at least
    /// 1; validation rejects `0`.
    pub min_triangles_for_split: usize,

    /// Subset size at which parallel construction splits work across
    /// threads. Only consulted by the parallel build entry point.
    pub parallel_threshold: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            min_triangles_for_split: 8,
            parallel_threshold: 1024,
        }
    }
}

impl BuildConfig {
    /// Create configuration for shallow trees with large leaves.
    ///
    /// Suits debug overlays and visualization, where a rough spatial
    /// breakdown is enough and construction speed matters more than
    /// pruning power.
    #[must_use]
    pub fn coarse() -> Self {
        Self {
            max_depth: 8,
            min_triangles_for_split: 32,
            parallel_threshold: 1024,
        }
    }

    /// Create configuration for deep trees with small leaves.
    ///
    /// Suits dense meshes where leaf-level pair testing dominates and
    /// aggressive pruning pays for the deeper descent.
    #[must_use]
    pub fn fine() -> Self {
        Self {
            max_depth: 32,
            min_triangles_for_split: 2,
            parallel_threshold: 1024,
        }
    }

    /// Set the maximum split depth.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_collide::BuildConfig;
    ///
    /// let config = BuildConfig::default().with_max_depth(4);
    /// assert_eq!(config.max_depth, 4);
    /// ```
    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the minimum subset size for a further split.
    ///
    /// Values below 1 are rejected when the configuration is
    /// validated at build time.
    #[must_use]
    pub fn with_min_triangles_for_split(mut self, count: usize) -> Self {
        self.min_triangles_for_split = count;
        self
    }

    /// Set the subset size at which parallel construction forks.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Check the configuration for values the builder cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::InvalidConfig`] when
    /// `min_triangles_for_split` is `0`; a zero threshold would make
    /// every subset "too small" and the request contradicts itself.
    pub fn validate(&self) -> CollideResult<()> {
        if self.min_triangles_for_split == 0 {
            return Err(CollideError::InvalidConfig {
                details: "min_triangles_for_split must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.min_triangles_for_split, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_coarse_is_shallower() {
        let coarse = BuildConfig::coarse();
        let default = BuildConfig::default();

        assert!(coarse.max_depth < default.max_depth);
        assert!(coarse.min_triangles_for_split > default.min_triangles_for_split);
    }

    #[test]
    fn test_fine_is_deeper() {
        let fine = BuildConfig::fine();
        let default = BuildConfig::default();

        assert!(fine.max_depth > default.max_depth);
        assert!(fine.min_triangles_for_split < default.min_triangles_for_split);
    }

    #[test]
    fn test_builder_methods() {
        let config = BuildConfig::default()
            .with_max_depth(3)
            .with_min_triangles_for_split(5)
            .with_parallel_threshold(64);

        assert_eq!(config.max_depth, 3);
        assert_eq!(config.min_triangles_for_split, 5);
        assert_eq!(config.parallel_threshold, 64);
    }

    #[test]
    fn test_zero_min_split_rejected() {
        let config = BuildConfig::default().with_min_triangles_for_split(0);
        let result = config.validate();

        assert!(matches!(result, Err(CollideError::InvalidConfig { .. })));
    }

    #[test]
    fn test_zero_max_depth_is_valid() {
        let config = BuildConfig::default().with_max_depth(0);
        assert!(config.validate().is_ok());
    }
}
