//! Chronological train/test split.

use super::log::Log;
use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Log,
    pub test: Log,
}

/// Split at `floor(len * ratio)`. Both halves keep the parent's device count
/// and name mapping, so labels seen only in one half stay in range.
pub fn train_test_split(log: &Log, ratio: f64) -> Result<TrainTestSplit> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(SimError::InvalidParameter(format!(
            "split ratio must lie in [0, 1], got {ratio}"
        )));
    }
    if log.is_empty() {
        return Err(SimError::EmptyLog);
    }
    let at = (log.len() as f64 * ratio).floor() as usize;
    let (head, tail) = log.entries().split_at(at.min(log.len()));

    let mut train = Log::with_device_count(head.to_vec(), log.device_count());
    train.inherit_mapping(log);
    let mut test = Log::with_device_count(tail.to_vec(), log.device_count());
    test.inherit_mapping(log);
    Ok(TrainTestSplit { train, test })
}
