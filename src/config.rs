//! Volume-wide configuration, validated once at construction.

use crate::error::{Error, Result};

/// The minimum node fan-out: a bulk-built C-tree node tries to hold at least this many
/// entries before it is allowed to close on a page boundary.
pub const MIN_FANOUT: usize = 100;

/// Default pre-padding size limit for one transaction log chunk (128 KiB).
pub const DEFAULT_LOG_CHUNK_LIMIT: usize = 128 * 1024;

/// Volume-wide knobs fixed for the lifetime of an [`crate::lsm::Lsm`] container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    page_size: u32,
    min_fanout: usize,
    log_chunk_limit: usize,
}

impl Config {
    /// Creates a [`Config`] for the given page size, using the default fan-out and log
    /// chunk limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `page_size` is not a power of two, or is
    /// smaller than 512 bytes.
    pub fn new(page_size: u32) -> Result<Self> {
        if page_size < 512 {
            return Err(Error::InvalidConfig("page_size must be at least 512 bytes"));
        }
        if !page_size.is_power_of_two() {
            return Err(Error::InvalidConfig("page_size must be a power of two"));
        }
        Ok(Self {
            page_size,
            min_fanout: MIN_FANOUT,
            log_chunk_limit: DEFAULT_LOG_CHUNK_LIMIT,
        })
    }

    /// Overrides the minimum node fan-out. Mainly useful for tests that want to exercise
    /// multi-level trees with small inputs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `fanout` is zero.
    pub fn with_min_fanout(mut self, fanout: usize) -> Result<Self> {
        if fanout == 0 {
            return Err(Error::InvalidConfig("min_fanout must be non-zero"));
        }
        self.min_fanout = fanout;
        Ok(self)
    }

    /// Overrides the transaction log's pre-padding chunk size limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `limit` is zero.
    pub fn with_log_chunk_limit(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidConfig("log_chunk_limit must be non-zero"));
        }
        self.log_chunk_limit = limit;
        Ok(self)
    }

    /// The configured page size, in bytes.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The configured minimum node fan-out.
    #[must_use]
    pub fn min_fanout(&self) -> usize {
        self.min_fanout
    }

    /// The configured transaction log chunk pre-padding limit, in bytes.
    #[must_use]
    pub fn log_chunk_limit(&self) -> usize {
        self.log_chunk_limit
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn rejects_non_power_of_two_page_size() {
        assert!(Config::new(1000).is_err());
    }

    #[test]
    fn rejects_too_small_page_size() {
        assert!(Config::new(256).is_err());
    }

    #[test]
    fn accepts_4096() {
        let cfg = Config::new(4096).unwrap();
        assert_eq!(cfg.page_size(), 4096);
        assert_eq!(cfg.min_fanout(), super::MIN_FANOUT);
    }

    #[test]
    fn rejects_zero_fanout_override() {
        let cfg = Config::new(4096).unwrap();
        assert!(cfg.with_min_fanout(0).is_err());
    }
}
