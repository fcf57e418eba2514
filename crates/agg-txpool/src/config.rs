//! Engine configuration

use crate::error::ConfigError;

/// Admission engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of the Future pool across all accounts
    pub max_future_entries: usize,
    /// Page size for every paginated pool query
    pub query_limit: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_future_entries: 1024,
            query_limit: 100,
        }
    }
}

impl PoolConfig {
    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_future_entries == 0 {
            return Err(ConfigError::ZeroFutureCapacity);
        }
        if self.query_limit == 0 {
            return Err(ConfigError::ZeroQueryLimit);
        }
        Ok(())
    }
}
