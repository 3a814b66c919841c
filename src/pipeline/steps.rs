use std::time::Duration;

use super::types::{ModelUsageRecord, ProcessingStep, Stage, StepStatus};

/// Index of a step inside a [`StepLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHandle(usize);

/// Append-only record of the steps and model usage of one run.
#[derive(Debug, Default)]
pub struct StepLog {
    steps: Vec<ProcessingStep>,
    usage: Vec<ModelUsageRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(
        &mut self,
        stage: Stage,
        description: impl Into<String>,
        model_name: impl Into<String>,
    ) -> StepHandle {
        let ordinal = self.steps.len() as u32 + 1;
        self.steps.push(ProcessingStep {
            ordinal,
            stage,
            description: description.into(),
            model_name: model_name.into(),
            duration_ms: 0,
            status: StepStatus::Processing,
        });
        StepHandle(self.steps.len() - 1)
    }

    pub fn complete(&mut self, handle: StepHandle, elapsed: Duration) {
        if let Some(step) = self.steps.get_mut(handle.0) {
            step.status = StepStatus::Completed;
            step.duration_ms = elapsed.as_millis() as u64;
        }
    }

    /// Marks every in-flight step failed. `total_elapsed` is measured from pipeline start.
    pub fn fail_in_flight(&mut self, total_elapsed: Duration) {
        self.finish_in_flight(StepStatus::Failed, total_elapsed);
    }

    pub fn cancel_in_flight(&mut self, total_elapsed: Duration) {
        self.finish_in_flight(StepStatus::Cancelled, total_elapsed);
    }

    fn finish_in_flight(&mut self, status: StepStatus, total_elapsed: Duration) {
        let ms = total_elapsed.as_millis() as u64;
        for step in self
            .steps
            .iter_mut()
            .filter(|s| s.status == StepStatus::Processing)
        {
            step.status = status;
            step.duration_ms = ms;
        }
    }

    pub fn record_usage(&mut self, record: ModelUsageRecord) {
        self.usage.push(record);
    }

    pub fn step(&self, handle: StepHandle) -> Option<&ProcessingStep> {
        self.steps.get(handle.0)
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    pub fn usage(&self) -> &[ModelUsageRecord] {
        &self.usage
    }

    /// Mean of the usage confidences, `None` when nothing was recorded.
    pub fn overall_confidence(&self) -> Option<f64> {
        mean_confidence(&self.usage)
    }

    pub fn into_parts(self) -> (Vec<ProcessingStep>, Vec<ModelUsageRecord>) {
        (self.steps, self.usage)
    }
}

pub fn mean_confidence(usage: &[ModelUsageRecord]) -> Option<f64> {
    if usage.is_empty() {
        return None;
    }
    let sum: f64 = usage.iter().map(|u| u.confidence.value()).sum();
    Some(sum / usage.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ConfidenceSource;
    use proptest::prelude::*;

    fn record(confidence: ConfidenceSource) -> ModelUsageRecord {
        ModelUsageRecord {
            model_name: "m".to_string(),
            purpose: "p".to_string(),
            tokens_consumed: 1,
            confidence,
        }
    }

    #[test]
    fn ordinals_are_one_based_and_contiguous() {
        let mut log = StepLog::new();
        let a = log.begin(Stage::Analyzing, "a", "m");
        log.complete(a, Duration::from_millis(5));
        log.begin(Stage::GeneratingPrimary, "b", "m");

        let ordinals: Vec<u32> = log.steps().iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
        assert_eq!(log.steps()[0].status, StepStatus::Completed);
        assert_eq!(log.steps()[0].duration_ms, 5);
        assert_eq!(log.steps()[1].status, StepStatus::Processing);
    }

    #[test]
    fn fail_in_flight_uses_total_elapsed_and_leaves_completed_steps() {
        let mut log = StepLog::new();
        let a = log.begin(Stage::Analyzing, "a", "m");
        log.complete(a, Duration::from_millis(3));
        log.begin(Stage::GeneratingPrimary, "b", "m");
        log.fail_in_flight(Duration::from_millis(40));

        assert_eq!(log.steps()[0].status, StepStatus::Completed);
        assert_eq!(log.steps()[0].duration_ms, 3);
        assert_eq!(log.steps()[1].status, StepStatus::Failed);
        assert_eq!(log.steps()[1].duration_ms, 40);
    }

    #[test]
    fn cancel_in_flight_marks_cancelled() {
        let mut log = StepLog::new();
        log.begin(Stage::Synthesizing, "s", "m");
        log.cancel_in_flight(Duration::from_millis(1));
        assert_eq!(log.steps()[0].status, StepStatus::Cancelled);
    }

    #[test]
    fn empty_usage_has_no_confidence() {
        assert_eq!(StepLog::new().overall_confidence(), None);
    }

    #[test]
    fn mean_of_known_samples() {
        let usage = vec![
            record(ConfidenceSource::Measured(0.9)),
            record(ConfidenceSource::Assumed(0.85)),
            record(ConfidenceSource::Assumed(0.9)),
        ];
        let mean = mean_confidence(&usage).unwrap();
        assert!((mean - (0.9 + 0.85 + 0.9) / 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn mean_stays_in_unit_interval(samples in prop::collection::vec(-2.0f64..3.0, 1..20)) {
            let usage: Vec<_> = samples
                .iter()
                .map(|v| record(ConfidenceSource::Measured(*v)))
                .collect();
            let mean = mean_confidence(&usage).unwrap();
            prop_assert!((0.0..=1.0).contains(&mean));
        }

        #[test]
        fn mean_matches_arithmetic_mean_of_clamped(samples in prop::collection::vec(0.0f64..=1.0, 1..20)) {
            let usage: Vec<_> = samples
                .iter()
                .map(|v| record(ConfidenceSource::Assumed(*v)))
                .collect();
            let expected = samples.iter().sum::<f64>() / samples.len() as f64;
            prop_assert!((mean_confidence(&usage).unwrap() - expected).abs() < 1e-9);
        }
    }
}
