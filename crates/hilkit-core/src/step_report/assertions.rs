//! Recording assertions.
//!
//! The `step_assert*` macros evaluate an assertion, record it through a
//! [`StepRecorder`] and hand back the outcome unchanged.

use thiserror::Error;
use tracing::debug;

use super::{StepRecord, StepReport};
use crate::result::{TestError, TestId};

/// A failed checked assertion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
}

impl AssertionError {
    /// `base`, followed by ` : msg` when a message was given.
    pub fn new(base: impl Into<String>, msg: Option<&str>) -> Self {
        let base = base.into();
        let message = match msg {
            Some(msg) => format!("{base} : {msg}"),
            None => base,
        };
        Self { message }
    }
}

impl From<AssertionError> for TestError {
    fn from(err: AssertionError) -> Self {
        TestError::assertion(err.message)
    }
}

/// What a macro knows about the assertion it just evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub var_name: String,
    pub expected: String,
    pub actual: String,
    pub message: Option<String>,
}

/// Source text of the checked expression, or its value when unavailable.
pub fn var_name(expr: &str, actual: &str) -> String {
    let expr = expr.trim();
    if expr.is_empty() {
        actual.to_string()
    } else {
        expr.to_string()
    }
}

/// Records the steps of one running test.
pub struct StepRecorder<'a> {
    report: &'a mut StepReport,
    test: &'a TestId,
}

impl<'a> StepRecorder<'a> {
    pub fn new(report: &'a mut StepReport, test: &'a TestId) -> Self {
        report.prepare(test);
        Self { report, test }
    }

    /// Message of the next step recorded without one.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.report.set_message(message);
    }

    /// Record `step` and return `outcome` as is.
    ///
    /// A step without its own message takes the pending one.
    pub fn record(
        &mut self,
        step: Step,
        outcome: Result<(), AssertionError>,
    ) -> Result<(), AssertionError> {
        let message = match step.message {
            Some(message) => message,
            None => self.report.take_message(),
        };
        let (succeed, failure_log) = match &outcome {
            Ok(()) => (true, String::new()),
            Err(err) => (false, format!("AssertionError: {err}")),
        };
        debug!(
            test = %self.test,
            var = %step.var_name,
            succeed,
            "Step recorded"
        );
        self.report.add_step(
            self.test,
            StepRecord {
                message,
                var_name: step.var_name,
                expected_result: step.expected,
                actual_result: step.actual,
                succeed,
                failure_log,
            },
        );
        outcome
    }

}

/// Check that a condition holds and record it.
///
/// ```ignore
/// step_assert!(recorder, hub.is_port_on(1)?, "port 1 powered")?;
/// ```
#[macro_export]
macro_rules! step_assert {
    ($recorder:expr, $cond:expr $(, $msg:expr)? $(,)?) => {{
        let actual: bool = $cond;
        let message: ::std::option::Option<::std::string::String> =
            ::std::option::Option::None $(.or(::std::option::Option::Some(::std::string::ToString::to_string(&$msg))))?;
        let actual_repr = ::std::format!("{:?}", actual);
        let outcome = if actual {
            ::std::result::Result::Ok(())
        } else {
            ::std::result::Result::Err($crate::step_report::AssertionError::new(
                ::std::format!("{} is not true", actual_repr),
                message.as_deref(),
            ))
        };
        $recorder.record(
            $crate::step_report::Step {
                var_name: $crate::step_report::var_name(::std::stringify!($cond), &actual_repr),
                expected: ::std::string::String::from("True"),
                actual: actual_repr,
                message,
            },
            outcome,
        )
    }};
}

/// Check that two values are equal and record it.
#[macro_export]
macro_rules! step_assert_eq {
    ($recorder:expr, $actual:expr, $expected:expr $(, $msg:expr)? $(,)?) => {{
        let actual = &$actual;
        let expected = &$expected;
        let message: ::std::option::Option<::std::string::String> =
            ::std::option::Option::None $(.or(::std::option::Option::Some(::std::string::ToString::to_string(&$msg))))?;
        let actual_repr = ::std::format!("{:?}", actual);
        let outcome = if *actual == *expected {
            ::std::result::Result::Ok(())
        } else {
            ::std::result::Result::Err($crate::step_report::AssertionError::new(
                ::std::format!("{} != {:?}", actual_repr, expected),
                message.as_deref(),
            ))
        };
        $recorder.record(
            $crate::step_report::Step {
                var_name: $crate::step_report::var_name(::std::stringify!($actual), &actual_repr),
                expected: ::std::format!("Equal to {:?}", expected),
                actual: actual_repr,
                message,
            },
            outcome,
        )
    }};
}

/// Check that two values differ and record it.
#[macro_export]
macro_rules! step_assert_ne {
    ($recorder:expr, $actual:expr, $expected:expr $(, $msg:expr)? $(,)?) => {{
        let actual = &$actual;
        let expected = &$expected;
        let message: ::std::option::Option<::std::string::String> =
            ::std::option::Option::None $(.or(::std::option::Option::Some(::std::string::ToString::to_string(&$msg))))?;
        let actual_repr = ::std::format!("{:?}", actual);
        let outcome = if *actual != *expected {
            ::std::result::Result::Ok(())
        } else {
            ::std::result::Result::Err($crate::step_report::AssertionError::new(
                ::std::format!("{} == {:?}", actual_repr, expected),
                message.as_deref(),
            ))
        };
        $recorder.record(
            $crate::step_report::Step {
                var_name: $crate::step_report::var_name(::std::stringify!($actual), &actual_repr),
                expected: ::std::format!("Not Equal to {:?}", expected),
                actual: actual_repr,
                message,
            },
            outcome,
        )
    }};
}

/// Check that two numbers are within `delta` of each other and record it.
#[macro_export]
macro_rules! step_assert_almost_eq {
    ($recorder:expr, $actual:expr, $expected:expr, $delta:expr $(, $msg:expr)? $(,)?) => {{
        let actual = ($actual) as f64;
        let expected = ($expected) as f64;
        let delta = ($delta) as f64;
        let message: ::std::option::Option<::std::string::String> =
            ::std::option::Option::None $(.or(::std::option::Option::Some(::std::string::ToString::to_string(&$msg))))?;
        let actual_repr = ::std::format!("{}", actual);
        let diff = (actual - expected).abs();
        let outcome = if diff <= delta {
            ::std::result::Result::Ok(())
        } else {
            ::std::result::Result::Err($crate::step_report::AssertionError::new(
                ::std::format!(
                    "{} != {} within {} delta ({} difference)",
                    actual, expected, delta, diff
                ),
                message.as_deref(),
            ))
        };
        $recorder.record(
            $crate::step_report::Step {
                var_name: $crate::step_report::var_name(::std::stringify!($actual), &actual_repr),
                expected: ::std::format!("Almost Equal to {}; with delta={}", expected, delta),
                actual: actual_repr,
                message,
            },
            outcome,
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test() -> TestId {
        TestId::new("suite", "TestCase", "test_assert")
    }

    #[test]
    fn test_success_recorded_without_message() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        let data_to_test = true;
        crate::step_assert!(recorder, data_to_test).unwrap();

        let step = &report.test("TestCase", "test_assert").unwrap().steps[0][0];
        assert_eq!(step.message, "");
        assert_eq!(step.var_name, "data_to_test");
        assert_eq!(step.expected_result, "True");
        assert_eq!(step.actual_result, "true");
        assert!(step.succeed);
        assert_eq!(step.failure_log, "");
    }

    #[test]
    fn test_pending_message_is_consumed() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        recorder.set_message("Dummy message");
        crate::step_assert!(recorder, 1 + 1 == 2).unwrap();
        crate::step_assert!(recorder, true).unwrap();

        let steps = &report.test("TestCase", "test_assert").unwrap().steps[0];
        assert_eq!(steps[0].message, "Dummy message");
        assert_eq!(steps[0].var_name, "1 + 1 == 2");
        assert_eq!(steps[1].message, "");
        assert_eq!(report.message(), "");
    }

    #[test]
    fn test_own_message_keeps_pending_one() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        recorder.set_message("Pending message");
        crate::step_assert!(recorder, true, "Own message").unwrap();
        crate::step_assert!(recorder, true).unwrap();

        let steps = &report.test("TestCase", "test_assert").unwrap().steps[0];
        assert_eq!(steps[0].message, "Own message");
        assert_eq!(steps[1].message, "Pending message");
        assert_eq!(report.message(), "");
    }

    #[test]
    fn test_failure_is_returned_and_recorded() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        let data_to_test = false;
        let err = crate::step_assert!(recorder, data_to_test, "Dummy message").unwrap_err();
        assert_eq!(err.message, "false is not true : Dummy message");

        let step = &report.test("TestCase", "test_assert").unwrap().steps[0][0];
        assert!(!step.succeed);
        assert_eq!(step.message, "Dummy message");
        assert_eq!(step.failure_log, "AssertionError: false is not true : Dummy message");
        assert!(!report.class("TestCase").unwrap().succeed);
    }

    #[test]
    fn test_almost_equal_description() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        let data_to_test = 4.5;
        let data_expected = 4.5;
        crate::step_assert_almost_eq!(recorder, data_to_test, data_expected, 1, "Test the step report")
            .unwrap();

        let step = &report.test("TestCase", "test_assert").unwrap().steps[0][0];
        assert_eq!(step.message, "Test the step report");
        assert_eq!(step.var_name, "data_to_test");
        assert_eq!(step.expected_result, "Almost Equal to 4.5; with delta=1");
        assert_eq!(step.actual_result, "4.5");
    }

    #[test]
    fn test_almost_equal_outside_delta() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);
        assert!(crate::step_assert_almost_eq!(recorder, 10, 4.5, 1).is_err());
    }

    #[test]
    fn test_equal_and_not_equal() {
        let mut report = StepReport::new();
        let id = test();
        let mut recorder = StepRecorder::new(&mut report, &id);

        let var = "Test";
        crate::step_assert_eq!(recorder, var, "Test", "not expected str").unwrap();
        let err = crate::step_assert_ne!(recorder, var, "Test").unwrap_err();
        assert_eq!(err.message, "\"Test\" == \"Test\"");

        let steps = &report.test("TestCase", "test_assert").unwrap().steps[0];
        assert_eq!(steps[0].expected_result, "Equal to \"Test\"");
        assert_eq!(steps[0].message, "not expected str");
        assert_eq!(steps[1].expected_result, "Not Equal to \"Test\"");
        assert!(!steps[1].succeed);
    }

    #[test]
    fn test_var_name_fallback() {
        assert_eq!(var_name("  port ", "1"), "port");
        assert_eq!(var_name("", "1"), "1");
    }

    #[test]
    fn test_assertion_error_into_test_error() {
        let err: TestError = AssertionError::new("off", None).into();
        assert!(err.is_failure());
        assert_eq!(err.message, "off");
    }
}
