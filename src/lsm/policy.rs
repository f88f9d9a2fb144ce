//! Pluggable deletion and lifecycle hooks for [`super::Lsm::merge`].

/// Hooks a compaction consults while rebuilding one layer from its two inputs.
///
/// `drop_deleted` is the only hook every policy must answer: whether a given entry is a
/// tombstone whose sole purpose is to shadow an older, now-unreachable value. The driver
/// only ever acts on a `true` answer when dropping is also *permitted* (no strictly older
/// live layer could still be shadowed by it) - a policy cannot force an unsafe drop.
pub trait MergePolicy: Send + Sync {
    /// Returns `true` if `(key, val)` is a tombstone rather than live data.
    fn drop_deleted(&self, key: &[u8], val: &[u8]) -> bool;

    /// Called once the rebuilt layer's entries have all been fed to the builder, just
    /// before [`crate::ctree::Builder::finish`].
    fn before_finish(&self) {}

    /// Called after the new layer has been installed and the source layer cleared.
    fn after_finish(&self) {}
}

/// Never drops anything. Safe default when the value schema carries no tombstone
/// convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl MergePolicy for DefaultPolicy {
    fn drop_deleted(&self, _key: &[u8], _val: &[u8]) -> bool {
        false
    }
}

/// Treats a zero-length value as a tombstone. One concrete, opt-in realization of the
/// "value-schema dependent" deletion signal; callers with a different convention supply
/// their own [`MergePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TombstonePolicy;

impl MergePolicy for TombstonePolicy {
    fn drop_deleted(&self, _key: &[u8], val: &[u8]) -> bool {
        val.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_never_drops() {
        let p = DefaultPolicy;
        assert!(!p.drop_deleted(b"k", b""));
        assert!(!p.drop_deleted(b"k", b"v"));
    }

    #[test]
    fn tombstone_policy_drops_only_empty_values() {
        let p = TombstonePolicy;
        assert!(p.drop_deleted(b"k", b""));
        assert!(!p.drop_deleted(b"k", b"v"));
    }
}
