//! Core partitioner trait definitions.

/// A partitioner converts keys into raw 64-bit hashes.
///
/// Partitioners are stateless and thread-safe. The identifier space reduces
/// the raw hash modulo the ring size, so implementations only need to spread
/// keys uniformly over `u64` and must give the same answer in every process.
pub trait Partitioner: Send + Sync + 'static {
    /// Hashes a key.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to partition
    fn hash(&self, key: &[u8]) -> u64;

    /// Returns the name of this partitioner.
    fn name(&self) -> &'static str;
}
