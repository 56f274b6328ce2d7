//! Observer interface for test lifecycle events.

use std::path::PathBuf;

use thiserror::Error;

use super::banner::BannerTestResult;
use super::ledger::ResultLedger;
use super::test_id::{SubTest, TestError, TestId};
use crate::runner::RunnerContext;

/// Errors raised while building backends or writing reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("at least one result backend is required")]
    NoBackends,

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),

    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid timestamp {0}")]
    Timestamp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives test lifecycle events.
///
/// Every backend keeps a [`ResultLedger`]; the default handlers only update
/// it. Backends override the events they render.
pub trait TestResult {
    fn ledger(&self) -> &ResultLedger;
    fn ledger_mut(&mut self) -> &mut ResultLedger;

    fn start_test_run(&mut self) {}

    fn stop_test_run(&mut self) {}

    fn start_test(&mut self, test: &TestId) {
        self.ledger_mut().start_test(test);
    }

    fn stop_test(&mut self, test: &TestId) {
        self.ledger_mut().stop_test(test);
    }

    fn add_success(&mut self, test: &TestId) {
        self.ledger_mut().add_success(test);
    }

    fn add_failure(&mut self, test: &TestId, err: &TestError) {
        self.ledger_mut().add_failure(test, err);
    }

    fn add_error(&mut self, test: &TestId, err: &TestError) {
        self.ledger_mut().add_error(test, err);
    }

    fn add_skip(&mut self, test: &TestId, reason: &str) {
        self.ledger_mut().add_skip(test, reason);
    }

    fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
        self.ledger_mut().add_expected_failure(test, err);
    }

    fn add_unexpected_success(&mut self, test: &TestId) {
        self.ledger_mut().add_unexpected_success(test);
    }

    fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
        self.ledger_mut().add_sub_test(test, subtest, err);
    }

    fn stop(&mut self) {
        self.ledger_mut().stop();
    }

    /// First line of the test documentation, or the test itself.
    fn get_description(&self, test: &TestId) -> String {
        match test.doc.as_deref().and_then(|doc| doc.lines().next()) {
            Some(first) => format!("{test}\n{}", first.trim()),
            None => test.to_string(),
        }
    }

    fn print_errors(&mut self) {}

    fn print_error_list(&mut self, _flavour: &str, _errors: &[(TestId, String)]) {}

    /// Whether the running test failed. `None` when not tracked.
    fn error_occurred(&self) -> Option<bool> {
        None
    }

    /// Banner formatting capability.
    fn as_banner(&self) -> Option<&BannerTestResult> {
        None
    }

    /// Report generation capability.
    fn as_report_generator(&mut self) -> Option<&mut dyn ReportGenerator> {
        None
    }
}

/// Backends that write report files once the run is over.
pub trait ReportGenerator {
    /// Write reports and return the created files.
    fn generate_reports(&mut self, runner: &RunnerContext) -> Result<Vec<PathBuf>, ReportError>;
}
