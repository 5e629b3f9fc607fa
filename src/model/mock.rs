use super::{LabelPredictor, StatefulLabelPredictor};
use crate::data::LogEntry;
use crate::error::Result;

/// Always predicts label 0. Used to wire up runs without a trained model.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockLabelModel;

impl LabelPredictor for MockLabelModel {
    fn fit(&mut self, _entries: &[LogEntry], _acyclic: bool, _device_count: usize) -> Result<()> {
        Ok(())
    }

    fn predict_entry(&mut self, _entry: &LogEntry) -> usize {
        0
    }

    fn predict_entries(&mut self, _entries: &[LogEntry]) -> usize {
        0
    }
}

impl StatefulLabelPredictor for MockLabelModel {
    fn predict_sequence_from_entry(&mut self, _entry: &LogEntry, n: usize) -> Vec<usize> {
        vec![0; n]
    }

    fn predict_sequence(&mut self, _entries: &[LogEntry], n: usize) -> Vec<usize> {
        vec![0; n]
    }

    fn reset_predictions(&mut self) {}
}
