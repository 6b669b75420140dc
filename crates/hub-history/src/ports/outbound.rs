//! # Outbound Ports (Driven Ports)
//!
//! Storage comes from `shared_buckets::BucketStore`. The clock is injected
//! so scan bounds and default timestamps can be tested.

pub use shared_buckets::{Bucket, BucketCursor, BucketStore};

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the epoch.
    fn now_msec(&self) -> u64;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_msec(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_recent() {
        // 2020-01-01
        assert!(SystemTimeSource.now_msec() > 1_577_836_800_000);
    }
}
