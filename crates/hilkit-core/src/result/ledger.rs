//! Bookkeeping shared by every result backend.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::test_id::{SubTest, TestError, TestId};

/// Start and stop instants of one test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestTiming {
    pub start: DateTime<Utc>,
    pub stop: Option<DateTime<Utc>>,
}

impl TestTiming {
    /// Seconds between start and stop, or until now while running.
    pub fn elapsed_secs(&self) -> f64 {
        let end = self.stop.unwrap_or_else(Utc::now);
        (end - self.start).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
    }
}

/// Outcome lists and run flags every result observer keeps.
#[derive(Debug, Default, Clone)]
pub struct ResultLedger {
    pub tests_run: usize,
    pub successes: Vec<TestId>,
    pub failures: Vec<(TestId, String)>,
    pub errors: Vec<(TestId, String)>,
    pub skipped: Vec<(TestId, String)>,
    pub expected_failures: Vec<(TestId, String)>,
    pub unexpected_successes: Vec<TestId>,
    pub should_stop: bool,
    pub failfast: bool,
    timings: HashMap<String, TestTiming>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_test(&mut self, test: &TestId) {
        self.tests_run += 1;
        self.timings.insert(
            test.id(),
            TestTiming {
                start: Utc::now(),
                stop: None,
            },
        );
    }

    pub fn stop_test(&mut self, test: &TestId) {
        if let Some(timing) = self.timings.get_mut(&test.id()) {
            timing.stop = Some(Utc::now());
        }
    }

    pub fn timing(&self, test: &TestId) -> Option<&TestTiming> {
        self.timings.get(&test.id())
    }

    /// Record timing explicitly (reports loaded from elsewhere, tests).
    pub fn set_timing(&mut self, test: &TestId, timing: TestTiming) {
        self.timings.insert(test.id(), timing);
    }

    pub fn add_success(&mut self, test: &TestId) {
        self.successes.push(test.clone());
    }

    pub fn add_failure(&mut self, test: &TestId, err: &TestError) {
        self.failures.push((test.clone(), err.to_string()));
        self.stop_if_failfast();
    }

    pub fn add_error(&mut self, test: &TestId, err: &TestError) {
        self.errors.push((test.clone(), err.to_string()));
        self.stop_if_failfast();
    }

    pub fn add_skip(&mut self, test: &TestId, reason: &str) {
        self.skipped.push((test.clone(), reason.to_string()));
    }

    pub fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
        self.expected_failures.push((test.clone(), err.to_string()));
    }

    pub fn add_unexpected_success(&mut self, test: &TestId) {
        self.unexpected_successes.push(test.clone());
        self.stop_if_failfast();
    }

    /// A sub test only counts when it failed.
    pub fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
        let Some(err) = err else {
            return;
        };
        let labelled = subtest.label(test);
        if err.is_failure() {
            self.failures.push((labelled, err.to_string()));
        } else {
            self.errors.push((labelled, err.to_string()));
        }
        self.stop_if_failfast();
    }

    pub fn stop(&mut self) {
        self.should_stop = true;
    }

    fn stop_if_failfast(&mut self) {
        if self.failfast {
            self.should_stop = true;
        }
    }

    pub fn was_successful(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty() && self.unexpected_successes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test() -> TestId {
        TestId::new("suite", "TestRelay", "test_on")
    }

    #[test]
    fn test_failfast_stops_on_failure() {
        let mut ledger = ResultLedger::new();
        ledger.add_failure(&test(), &TestError::assertion("boom"));
        assert!(!ledger.should_stop);

        ledger.failfast = true;
        ledger.add_error(&test(), &TestError::new("IOError", "gone"));
        assert!(ledger.should_stop);
        assert!(!ledger.was_successful());
    }

    #[test]
    fn test_passing_sub_test_is_ignored() {
        let mut ledger = ResultLedger::new();
        ledger.add_sub_test(&test(), &SubTest::new("port=1"), None);
        assert!(ledger.was_successful());

        ledger.add_sub_test(
            &test(),
            &SubTest::new("port=2"),
            Some(&TestError::assertion("off")),
        );
        assert_eq!(ledger.failures[0].0.method_name, "test_on [port=2]");
    }

    #[test]
    fn test_timing_recorded() {
        let mut ledger = ResultLedger::new();
        ledger.start_test(&test());
        ledger.stop_test(&test());
        let timing = ledger.timing(&test()).unwrap();
        assert!(timing.stop.is_some());
        assert!(timing.elapsed_secs() >= 0.0);
        assert_eq!(ledger.tests_run, 1);
    }
}
