use super::TimestampGenerator;
use chrono::{DateTime, Duration, Utc};

/// Zero-length idle times; timestamps are always one second past the base, which never moves.
#[derive(Debug, Clone)]
pub struct MockTimestampGenerator {
    base: DateTime<Utc>,
}

impl MockTimestampGenerator {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self { base }
    }
}

impl TimestampGenerator for MockTimestampGenerator {
    fn base_timestamp(&self) -> DateTime<Utc> {
        self.base
    }

    fn set_base_timestamp(&mut self, base: DateTime<Utc>) {
        self.base = base;
    }

    fn generate_length_for_device(&mut self, _device: usize) -> i64 {
        0
    }

    fn generate_timestamp_for_device(&mut self, _device: usize) -> DateTime<Utc> {
        self.base + Duration::milliseconds(1000)
    }
}
