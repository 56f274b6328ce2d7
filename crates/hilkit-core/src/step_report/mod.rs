//! Step report: every checked assertion of a run, per class and method.
//!
//! The store is created by the runner, filled by [`StepRecorder`] while
//! tests run, and rendered once to HTML by [`generate_step_report`].

mod assertions;
mod render;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::result::TestId;

pub use assertions::{AssertionError, Step, StepRecorder, var_name};
pub use render::{generate_step_report, parse_timestamp};

/// One checked assertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub message: String,
    pub var_name: String,
    pub expected_result: String,
    pub actual_result: String,
    pub succeed: bool,
    pub failure_log: String,
}

/// Recorded attempts of one test method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodReport {
    pub name: String,
    pub description: String,
    /// One list of steps per attempt.
    pub steps: Vec<Vec<StepRecord>>,
    /// One list of unexpected errors per attempt.
    pub unexpected_errors: Vec<Vec<String>>,
    pub max_try: Option<u32>,
    pub number_try: Option<u32>,
    pub succeed: bool,
}

impl MethodReport {
    fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            steps: vec![Vec::new()],
            unexpected_errors: vec![Vec::new()],
            max_try: None,
            number_try: None,
            succeed: true,
        }
    }

    /// Every step of every attempt passed and no unexpected error was seen.
    pub fn is_test_success(&self) -> bool {
        self.steps.iter().flatten().all(|step| step.succeed)
            && self.unexpected_errors.iter().all(|errors| errors.is_empty())
    }
}

/// Start, end and elapsed time of a class, already formatted.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TimeResult {
    #[serde(rename = "Start Time")]
    pub start_time: String,
    #[serde(rename = "End Time")]
    pub end_time: String,
    #[serde(rename = "Elapsed Time")]
    pub elapsed_time: String,
}

/// Everything recorded for one test class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub header: BTreeMap<String, String>,
    pub description: String,
    pub file_path: String,
    pub time_result: TimeResult,
    pub succeed: bool,
    pub test_list: Vec<MethodReport>,
}

impl ClassReport {
    pub fn test(&self, method: &str) -> Option<&MethodReport> {
        self.test_list.iter().find(|t| t.name == method)
    }
}

/// Owned store of all step records of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StepReport {
    classes: Vec<ClassReport>,
    #[serde(skip)]
    message: String,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far.
    pub fn reset(&mut self) {
        self.classes.clear();
        self.message.clear();
    }

    pub fn classes(&self) -> &[ClassReport] {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&ClassReport> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn test(&self, class: &str, method: &str) -> Option<&MethodReport> {
        self.class(class)?.test(method)
    }

    /// Message used by the next recorded step that has none.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn take_message(&mut self) -> String {
        std::mem::take(&mut self.message)
    }

    fn class_mut(&mut self, test: &TestId) -> &mut ClassReport {
        let pos = match self.classes.iter().position(|c| c.name == test.class_name) {
            Some(pos) => pos,
            None => {
                self.classes.push(ClassReport {
                    name: test.class_name.clone(),
                    header: BTreeMap::new(),
                    description: test.class_doc.clone().unwrap_or_default(),
                    file_path: test.file_path.clone().unwrap_or_default(),
                    time_result: TimeResult::default(),
                    succeed: true,
                    test_list: Vec::new(),
                });
                self.classes.len() - 1
            }
        };
        &mut self.classes[pos]
    }

    /// Entry of `test`, created on first use.
    pub fn prepare(&mut self, test: &TestId) -> &mut MethodReport {
        let class = self.class_mut(test);
        let pos = match class
            .test_list
            .iter()
            .position(|t| t.name == test.method_name)
        {
            Some(pos) => pos,
            None => {
                class.test_list.push(MethodReport::new(
                    &test.method_name,
                    test.doc.as_deref().unwrap_or_default(),
                ));
                class.test_list.len() - 1
            }
        };
        &mut class.test_list[pos]
    }

    /// Merge `header` into the class header, keeping existing keys.
    pub fn set_header(&mut self, test: &TestId, header: BTreeMap<String, String>) {
        let class = self.class_mut(test);
        for (key, value) in header {
            class.header.entry(key).or_insert(value);
        }
    }

    /// Append a step to the current attempt of `test`.
    pub fn add_step(&mut self, test: &TestId, step: StepRecord) {
        let succeed = step.succeed;
        let method = self.prepare(test);
        match method.steps.last_mut() {
            Some(attempt) => attempt.push(step),
            None => method.steps.push(vec![step]),
        }
        if !succeed {
            self.class_mut(test).succeed = false;
        }
    }

    /// Record an error raised outside of any checked step.
    pub fn add_unexpected_error(&mut self, test: &TestId, error: impl Into<String>) {
        let method = self.prepare(test);
        match method.unexpected_errors.last_mut() {
            Some(attempt) => attempt.push(error.into()),
            None => method.unexpected_errors.push(vec![error.into()]),
        }
        self.class_mut(test).succeed = false;
    }

    /// Close the current attempt of `test` and open a new one.
    ///
    /// `error` is the failure of the attempt being closed.
    pub fn add_retry_information(
        &mut self,
        test: &TestId,
        result: bool,
        retry_nb: u32,
        max_try: u32,
        error: Option<&str>,
    ) {
        let method = self.prepare(test);
        if let Some(error) = error {
            match method.unexpected_errors.last_mut() {
                Some(attempt) => attempt.push(error.to_string()),
                None => method.unexpected_errors.push(vec![error.to_string()]),
            }
        }
        method.steps.push(Vec::new());
        method.unexpected_errors.push(Vec::new());
        method.max_try = Some(max_try);
        method.number_try = Some(retry_nb + 1);
        self.class_mut(test).succeed = result;
    }

    /// Refresh every method's `succeed` flag from its records.
    pub(crate) fn refresh_success(&mut self) {
        for class in &mut self.classes {
            for method in &mut class.test_list {
                method.succeed = method.is_test_success();
            }
        }
    }

    pub(crate) fn class_by_name_mut(&mut self, name: &str) -> Option<&mut ClassReport> {
        self.classes.iter_mut().find(|c| c.name == name)
    }
}
