//! Per-operation results aggregated over one batch

use crate::shared::errors::OperationError;

/// Outcome of one operation inside a batch, labelled by its target
#[derive(Debug, Clone)]
pub struct OperationRecord<T> {
    pub target: String,
    pub result: Result<T, OperationError>,
}

/// Every sibling operation runs to completion; failures are kept here
/// instead of aborting the batch.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub records: Vec<OperationRecord<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: impl Into<String>, result: Result<T, OperationError>) {
        self.records.push(OperationRecord {
            target: target.into(),
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &OperationError)> {
        self.records
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.target.as_str(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report: BatchReport<u64> = BatchReport::new();
        report.push("a", Ok(1));
        report.push("b", Err(OperationError::cap("b", "too large")));
        report.push("c", Ok(3));

        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = report.failures().map(|(t, _)| t).collect();
        assert_eq!(failures, vec!["b"]);
    }
}
