//! JUnit XML result.
//!
//! Shows the same banners as [`BannerTestResult`] and records one entry per
//! test. [`ReportGenerator::generate_reports`] writes one
//! `TEST-<module.Class>-<timestamp>.xml` file per test class.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::info;

use super::banner::BannerTestResult;
use super::ledger::ResultLedger;
use super::test_id::{SubTest, TestError, TestId};
use super::traits::{ReportError, ReportGenerator, TestResult};
use crate::runner::RunnerContext;

const JUNIT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="{{ suite.name }}" tests="{{ suite.tests }}" file="{{ suite.file }}" time="{{ suite.time }}" timestamp="{{ suite.timestamp }}" failures="{{ suite.failures }}" errors="{{ suite.errors }}" skipped="{{ suite.skipped }}">
{%- if properties %}
	<properties>
{%- for name, value in properties %}
		<property name="{{ name }}" value="{{ value }}"/>
{%- endfor %}
	</properties>
{%- endif %}
{%- for case in suite.cases %}
	<testcase classname="{{ case.classname }}" name="{{ case.name }}" time="{{ case.time }}" timestamp="{{ case.timestamp }}" file="{{ case.file }}" test_ids="{{ case.test_ids }}">
{%- if case.properties %}
		<properties>
{%- for name, value in case.properties %}
			<property name="{{ name }}" value="{{ value }}"/>
{%- endfor %}
		</properties>
{%- endif %}
{%- if case.outcome == "failure" %}
		<failure type="{{ case.kind }}" message="{{ case.message }}">{{ case.traceback }}</failure>
{%- elif case.outcome == "error" %}
		<error type="{{ case.kind }}" message="{{ case.message }}">{{ case.traceback }}</error>
{%- elif case.outcome == "skipped" %}
		<skipped type="skip" message="{{ case.message }}"/>
{%- endif %}
	</testcase>
{%- endfor %}
</testsuite>
"#;

/// Outcome of one recorded test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
    Skipped,
}

/// What the XML report keeps about one test.
#[derive(Debug, Clone, Serialize)]
pub struct TestInfo {
    pub test: TestId,
    pub outcome: Outcome,
    pub elapsed: f64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub traceback: String,
}

#[derive(Serialize)]
struct CaseView {
    classname: String,
    name: String,
    time: String,
    timestamp: String,
    file: String,
    test_ids: String,
    properties: BTreeMap<String, String>,
    outcome: Outcome,
    kind: String,
    message: String,
    traceback: String,
}

#[derive(Serialize)]
struct SuiteView {
    name: String,
    file: String,
    tests: usize,
    failures: usize,
    errors: usize,
    skipped: usize,
    time: String,
    timestamp: String,
    cases: Vec<CaseView>,
}

/// Test result recording JUnit entries next to the banners.
pub struct XmlTestResult {
    banner: BannerTestResult,
    infos: Vec<TestInfo>,
    output_dir: Option<PathBuf>,
    elapsed_times: bool,
    properties: BTreeMap<String, String>,
}

impl XmlTestResult {
    pub fn new(banner: BannerTestResult) -> Self {
        Self {
            banner,
            infos: Vec::new(),
            output_dir: None,
            elapsed_times: true,
            properties: BTreeMap::new(),
        }
    }

    /// Report directory; the runner's report directory otherwise.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Write `0.000` as every test duration when disabled.
    pub fn with_elapsed_times(mut self, elapsed_times: bool) -> Self {
        self.elapsed_times = elapsed_times;
        self
    }

    /// Test suite level properties.
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn infos(&self) -> &[TestInfo] {
        &self.infos
    }

    fn record(&mut self, test: &TestId, outcome: Outcome, err: Option<&TestError>, note: &str) {
        let elapsed = self
            .banner
            .ledger()
            .timing(test)
            .map(|t| t.elapsed_secs())
            .unwrap_or(0.0);
        let (kind, message, traceback) = match err {
            Some(err) => (err.kind.clone(), err.message.clone(), err.to_string()),
            None => (String::new(), note.to_string(), String::new()),
        };
        self.infos.push(TestInfo {
            test: test.clone(),
            outcome,
            elapsed,
            timestamp: Utc::now(),
            kind,
            message,
            traceback,
        });
    }

    fn render_suite(&self, class_path: &str, infos: &[&TestInfo]) -> Result<String, ReportError> {
        let time = |secs: f64| {
            if self.elapsed_times {
                format!("{secs:.3}")
            } else {
                "0.000".to_string()
            }
        };
        let count = |outcome: Outcome| infos.iter().filter(|i| i.outcome == outcome).count();
        let cases = infos
            .iter()
            .map(|info| -> Result<CaseView, ReportError> {
                Ok(CaseView {
                    classname: class_path.to_string(),
                    name: info.test.method_name.clone(),
                    time: time(info.elapsed),
                    timestamp: info.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    file: info.test.file_path.clone().unwrap_or_default(),
                    test_ids: serde_json::to_string(&info.test.test_ids)?,
                    properties: info.test.test_ids.clone(),
                    outcome: info.outcome,
                    kind: info.kind.clone(),
                    message: info.message.clone(),
                    traceback: info.traceback.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let suite = SuiteView {
            name: class_path.to_string(),
            file: infos
                .first()
                .and_then(|i| i.test.file_path.clone())
                .unwrap_or_default(),
            tests: infos.len(),
            failures: count(Outcome::Failure),
            errors: count(Outcome::Error),
            skipped: count(Outcome::Skipped),
            time: time(infos.iter().map(|i| i.elapsed).sum()),
            timestamp: infos
                .first()
                .map(|i| i.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
            cases,
        };

        let mut context = Context::new();
        context.insert("suite", &suite);
        context.insert("properties", &self.properties);
        Ok(Tera::one_off(JUNIT_TEMPLATE, &context, true)?)
    }
}

impl TestResult for XmlTestResult {
    fn ledger(&self) -> &ResultLedger {
        self.banner.ledger()
    }

    fn ledger_mut(&mut self) -> &mut ResultLedger {
        self.banner.ledger_mut()
    }

    fn start_test_run(&mut self) {
        self.banner.start_test_run();
    }

    fn stop_test_run(&mut self) {
        self.banner.stop_test_run();
    }

    fn start_test(&mut self, test: &TestId) {
        self.banner.start_test(test);
    }

    fn stop_test(&mut self, test: &TestId) {
        self.banner.stop_test(test);
    }

    fn add_success(&mut self, test: &TestId) {
        self.banner.add_success(test);
        self.record(test, Outcome::Success, None, "");
    }

    fn add_failure(&mut self, test: &TestId, err: &TestError) {
        self.banner.add_failure(test, err);
        self.record(test, Outcome::Failure, Some(err), "");
    }

    fn add_error(&mut self, test: &TestId, err: &TestError) {
        self.banner.add_error(test, err);
        self.record(test, Outcome::Error, Some(err), "");
    }

    fn add_skip(&mut self, test: &TestId, reason: &str) {
        self.banner.add_skip(test, reason);
        self.record(test, Outcome::Skipped, None, reason);
    }

    fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
        self.banner.add_expected_failure(test, err);
        self.record(test, Outcome::Skipped, None, "expected failure");
    }

    fn add_unexpected_success(&mut self, test: &TestId) {
        self.banner.add_unexpected_success(test);
        self.record(
            test,
            Outcome::Failure,
            Some(&TestError::new("UnexpectedSuccess", "Unexpected success")),
            "",
        );
    }

    fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
        self.banner.add_sub_test(test, subtest, err);
        if let Some(err) = err {
            let outcome = if err.is_failure() {
                Outcome::Failure
            } else {
                Outcome::Error
            };
            self.record(&subtest.label(test), outcome, Some(err), "");
        }
    }

    fn stop(&mut self) {
        self.banner.stop();
    }

    fn get_description(&self, test: &TestId) -> String {
        self.banner.get_description(test)
    }

    fn print_errors(&mut self) {
        self.banner.print_errors();
    }

    fn print_error_list(&mut self, flavour: &str, errors: &[(TestId, String)]) {
        self.banner.print_error_list(flavour, errors);
    }

    fn error_occurred(&self) -> Option<bool> {
        self.banner.error_occurred()
    }

    fn as_banner(&self) -> Option<&BannerTestResult> {
        Some(&self.banner)
    }

    fn as_report_generator(&mut self) -> Option<&mut dyn ReportGenerator> {
        Some(self)
    }
}

impl ReportGenerator for XmlTestResult {
    fn generate_reports(&mut self, runner: &RunnerContext) -> Result<Vec<PathBuf>, ReportError> {
        let dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| runner.report_dir.clone());
        std::fs::create_dir_all(&dir)?;

        let mut suites: Vec<(String, Vec<&TestInfo>)> = Vec::new();
        for info in &self.infos {
            let class_path = info.test.class_path();
            match suites.iter_mut().find(|(name, _)| *name == class_path) {
                Some((_, entries)) => entries.push(info),
                None => suites.push((class_path, vec![info])),
            }
        }

        let suffix = Utc::now().format("%Y%m%d%H%M%S");
        let mut written = Vec::with_capacity(suites.len());
        for (class_path, infos) in &suites {
            let path = dir.join(format!("TEST-{class_path}-{suffix}.xml"));
            std::fs::write(&path, self.render_suite(class_path, infos)?)?;
            info!(path = %path.display(), "JUnit report written");
            written.push(path);
        }
        Ok(written)
    }
}
