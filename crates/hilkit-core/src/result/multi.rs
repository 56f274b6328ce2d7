//! Fan-out of test lifecycle events to several result backends.
//!
//! Writes are broadcast in registration order, reads come from the first
//! backend. An optional [`LogFileStrategy`] rotates a per-test log file that
//! mirrors both the result stream and the tracing output.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use super::banner::BannerTestResult;
use super::ledger::ResultLedger;
use super::stream::{MultiFileSink, ResultStream};
use super::test_id::{SubTest, TestError, TestId};
use super::traits::{ReportError, TestResult};
use super::xml::XmlTestResult;
use crate::config::LogFileStrategy;
use crate::logging::{STRATEGY_LOG_HANDLER, parse_level};
use crate::runner::RunnerContext;

/// Arguments the runner passes when activating the results.
///
/// `None` fields fall back to stderr, descriptions on, verbosity 1.
#[derive(Clone, Default)]
pub struct ResultArgs {
    pub stream: Option<ResultStream>,
    pub descriptions: Option<bool>,
    pub verbosity: Option<u8>,
}

impl ResultArgs {
    fn stream(&self) -> ResultStream {
        self.stream.clone().unwrap_or_default()
    }

    fn descriptions(&self) -> bool {
        self.descriptions.unwrap_or(true)
    }

    fn verbosity(&self) -> u8 {
        self.verbosity.unwrap_or(1)
    }
}

/// Describes one backend to build at activation.
pub trait BackendConfig {
    fn build(&self, args: &ResultArgs) -> Box<dyn TestResult>;
}

/// [`BannerTestResult`] settings.
#[derive(Debug, Clone, Default)]
pub struct BannerConfig {
    /// Banner width; terminal width when unset.
    pub width: Option<usize>,
}

impl BannerConfig {
    fn build_banner(&self, args: &ResultArgs) -> BannerTestResult {
        let (stream, descriptions, verbosity) =
            (args.stream(), args.descriptions(), args.verbosity());
        match self.width {
            Some(width) => BannerTestResult::with_width(stream, descriptions, verbosity, width),
            None => BannerTestResult::new(stream, descriptions, verbosity),
        }
    }
}

impl BackendConfig for BannerConfig {
    fn build(&self, args: &ResultArgs) -> Box<dyn TestResult> {
        Box::new(self.build_banner(args))
    }
}

/// [`XmlTestResult`] settings.
#[derive(Debug, Clone)]
pub struct XmlConfig {
    pub output_dir: Option<PathBuf>,
    pub elapsed_times: bool,
    pub properties: BTreeMap<String, String>,
    pub width: Option<usize>,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            elapsed_times: true,
            properties: BTreeMap::new(),
            width: None,
        }
    }
}

impl BackendConfig for XmlConfig {
    fn build(&self, args: &ResultArgs) -> Box<dyn TestResult> {
        let banner = BannerConfig { width: self.width }.build_banner(args);
        let mut result = XmlTestResult::new(banner)
            .with_elapsed_times(self.elapsed_times)
            .with_properties(self.properties.clone());
        if let Some(dir) = &self.output_dir {
            result = result.with_output_dir(dir);
        }
        Box::new(result)
    }
}

/// Collects backend descriptors until the runner activates them.
#[derive(Default)]
pub struct MultiTestResultBuilder {
    backends: Vec<Box<dyn BackendConfig>>,
    log_file_strategy: Option<LogFileStrategy>,
}

impl MultiTestResultBuilder {
    pub fn backend(mut self, config: impl BackendConfig + 'static) -> Self {
        self.backends.push(Box::new(config));
        self
    }

    pub fn log_file_strategy(mut self, strategy: Option<LogFileStrategy>) -> Self {
        self.log_file_strategy = strategy;
        self
    }

    /// Build every backend with the runner's arguments.
    pub fn activate(
        self,
        args: ResultArgs,
        runner: &RunnerContext,
    ) -> Result<MultiTestResult, ReportError> {
        if self.backends.is_empty() {
            return Err(ReportError::NoBackends);
        }
        let results = self.backends.iter().map(|b| b.build(&args)).collect();
        debug!(backends = self.backends.len(), "Result backends activated");
        Ok(MultiTestResult {
            results,
            log_file_strategy: self.log_file_strategy,
            current_log_file: None,
            class_log_files: HashMap::new(),
            runner: runner.clone(),
        })
    }
}

/// Test result forwarding every event to its backends.
pub struct MultiTestResult {
    results: Vec<Box<dyn TestResult>>,
    log_file_strategy: Option<LogFileStrategy>,
    current_log_file: Option<PathBuf>,
    class_log_files: HashMap<String, PathBuf>,
    runner: RunnerContext,
}

impl MultiTestResult {
    pub fn builder() -> MultiTestResultBuilder {
        MultiTestResultBuilder::default()
    }

    pub fn backends(&self) -> &[Box<dyn TestResult>] {
        &self.results
    }

    pub fn log_file_strategy(&self) -> Option<LogFileStrategy> {
        self.log_file_strategy
    }

    /// Log file mirrored for the running test.
    pub fn current_log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }

    /// Ledger of the first backend.
    pub fn ledger(&self) -> &ResultLedger {
        self.results[0].ledger()
    }

    pub fn should_stop(&self) -> bool {
        self.ledger().should_stop
    }

    pub fn was_successful(&self) -> bool {
        self.ledger().was_successful()
    }

    pub fn stream(&self) -> &ResultStream {
        &self.runner.stream
    }

    pub fn set_failfast(&mut self, failfast: bool) {
        for result in &mut self.results {
            result.ledger_mut().failfast = failfast;
        }
    }

    /// Failure flag of the first backend tracking it.
    pub fn error_occurred(&self) -> Option<bool> {
        self.results.iter().find_map(|r| r.error_occurred())
    }

    fn formatter_index(&self) -> usize {
        self.results
            .iter()
            .position(|r| r.as_banner().is_some())
            .unwrap_or(0)
    }

    pub fn print_error_list(&mut self, flavour: &str, errors: &[(TestId, String)]) {
        let idx = self.formatter_index();
        self.results[idx].print_error_list(flavour, errors);
    }

    pub fn print_errors(&mut self) {
        let idx = self.formatter_index();
        self.results[idx].print_errors();
    }

    pub fn get_description(&self, test: &TestId) -> String {
        self.results[self.formatter_index()].get_description(test)
    }

    /// Write the reports of every backend able to.
    pub fn generate_reports(&mut self, runner: &RunnerContext) -> Result<Vec<PathBuf>, ReportError> {
        let mut written = Vec::new();
        for result in &mut self.results {
            if let Some(generator) = result.as_report_generator() {
                written.extend(generator.generate_reports(runner)?);
            }
        }
        Ok(written)
    }

    pub fn start_test_run(&mut self) {
        for result in &mut self.results {
            result.start_test_run();
        }
    }

    pub fn stop_test_run(&mut self) {
        for result in &mut self.results {
            result.stop_test_run();
        }
    }

    pub fn stop(&mut self) {
        for result in &mut self.results {
            result.stop();
        }
    }

    pub fn start_test(&mut self, test: &TestId) {
        if let Err(e) = self.handle_log_file_strategy(test) {
            warn!(test = %test, "Could not open the test log file: {}", e);
        }
        for result in &mut self.results {
            result.start_test(test);
        }
    }

    pub fn stop_test(&mut self, test: &TestId) {
        for result in &mut self.results {
            result.stop_test(test);
        }
        if self.log_file_strategy.is_some() {
            if let Some(path) = &self.current_log_file {
                self.runner.stream.remove_file(path);
            }
            self.runner.log_sinks.detach(STRATEGY_LOG_HANDLER);
        }
    }

    pub fn add_success(&mut self, test: &TestId) {
        for result in &mut self.results {
            result.add_success(test);
        }
    }

    pub fn add_failure(&mut self, test: &TestId, err: &TestError) {
        for result in &mut self.results {
            result.add_failure(test, err);
        }
    }

    pub fn add_error(&mut self, test: &TestId, err: &TestError) {
        for result in &mut self.results {
            result.add_error(test, err);
        }
    }

    pub fn add_skip(&mut self, test: &TestId, reason: &str) {
        for result in &mut self.results {
            result.add_skip(test, reason);
        }
    }

    pub fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
        for result in &mut self.results {
            result.add_expected_failure(test, err);
        }
    }

    pub fn add_unexpected_success(&mut self, test: &TestId) {
        for result in &mut self.results {
            result.add_unexpected_success(test);
        }
    }

    pub fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
        for result in &mut self.results {
            result.add_sub_test(test, subtest, err);
        }
    }

    /// Open, or reuse, the log file of `test` and plug it into the result
    /// stream and the tracing output.
    pub fn handle_log_file_strategy(&mut self, test: &TestId) -> std::io::Result<()> {
        let Some(strategy) = self.log_file_strategy else {
            return Ok(());
        };
        let class_path = test.class_path();

        let path = match strategy {
            LogFileStrategy::TestRun => self.new_log_file(&class_path, Some(&test.method_name))?,
            LogFileStrategy::TestCase => match self.class_log_files.get(&class_path) {
                Some(path) => path.clone(),
                None => {
                    let path = self.new_log_file(&class_path, None)?;
                    self.class_log_files.insert(class_path, path.clone());
                    path
                }
            },
        };
        self.current_log_file = Some(path.clone());

        self.runner.stream.add_file(&path)?;
        let level = parse_level(&self.runner.logging.log_level);
        if let Err(e) = self.runner.log_sinks.attach(STRATEGY_LOG_HANDLER, &path, level) {
            self.runner.stream.remove_file(&path);
            return Err(e);
        }
        debug!(path = %path.display(), "Test log file attached");
        Ok(())
    }

    fn new_log_file(&self, class_path: &str, method: Option<&str>) -> std::io::Result<PathBuf> {
        let dir = self.runner.logging.log_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(log_file_name(class_path, method)))
    }
}

/// `<class path>[_<method>]_<YYYYmmdd-HHMMSS-ffffff>.log`, with `.` and `-`
/// of the class path replaced by `_`.
pub fn log_file_name(class_path: &str, method: Option<&str>) -> String {
    let mut name = class_path.replace(['.', '-'], "_");
    if let Some(method) = method {
        name.push('_');
        name.push_str(method);
    }
    let stamp = Local::now().format("%Y%m%d-%H%M%S-%6f");
    format!("{name}_{stamp}.log")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::LoggingOptions;
    use crate::logging::LogSinks;
    use crate::result::stream::SharedBuffer;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        calls: CallLog,
        ledger: ResultLedger,
        error_flag: Option<bool>,
    }

    impl Recording {
        fn log(&self, event: String) {
            self.calls.lock().unwrap().push(format!("{}:{}", self.name, event));
        }
    }

    impl TestResult for Recording {
        fn ledger(&self) -> &ResultLedger {
            &self.ledger
        }

        fn ledger_mut(&mut self) -> &mut ResultLedger {
            &mut self.ledger
        }

        fn start_test_run(&mut self) {
            self.log("start_test_run".into());
        }

        fn stop_test_run(&mut self) {
            self.log("stop_test_run".into());
        }

        fn start_test(&mut self, test: &TestId) {
            self.log(format!("start_test({})", test.method_name));
        }

        fn stop_test(&mut self, test: &TestId) {
            self.log(format!("stop_test({})", test.method_name));
        }

        fn add_success(&mut self, test: &TestId) {
            self.log(format!("add_success({})", test.method_name));
            self.ledger.add_success(test);
        }

        fn add_failure(&mut self, test: &TestId, err: &TestError) {
            self.log(format!("add_failure({}, {})", test.method_name, err.message));
            self.ledger.add_failure(test, err);
        }

        fn add_error(&mut self, test: &TestId, err: &TestError) {
            self.log(format!("add_error({}, {})", test.method_name, err.message));
            self.ledger.add_error(test, err);
        }

        fn add_skip(&mut self, test: &TestId, reason: &str) {
            self.log(format!("add_skip({}, {reason})", test.method_name));
            self.ledger.add_skip(test, reason);
        }

        fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
            self.log(format!("add_expected_failure({}, {})", test.method_name, err.message));
            self.ledger.add_expected_failure(test, err);
        }

        fn add_unexpected_success(&mut self, test: &TestId) {
            self.log(format!("add_unexpected_success({})", test.method_name));
            self.ledger.add_unexpected_success(test);
        }

        fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
            let err = err.map_or("ok".to_string(), |e| e.message.clone());
            self.log(format!(
                "add_sub_test({}, {}, {err})",
                test.method_name, subtest.description
            ));
        }

        fn stop(&mut self) {
            self.log("stop".into());
        }

        fn print_errors(&mut self) {
            self.log("print_errors".into());
        }

        fn get_description(&self, _test: &TestId) -> String {
            self.name.to_string()
        }

        fn error_occurred(&self) -> Option<bool> {
            self.error_flag
        }
    }

    struct RecordingConfig {
        name: &'static str,
        calls: CallLog,
        error_flag: Option<bool>,
    }

    impl BackendConfig for RecordingConfig {
        fn build(&self, _args: &ResultArgs) -> Box<dyn TestResult> {
            Box::new(Recording {
                name: self.name,
                calls: Arc::clone(&self.calls),
                ledger: ResultLedger::new(),
                error_flag: self.error_flag,
            })
        }
    }

    fn recording(name: &'static str, calls: &CallLog, error_flag: Option<bool>) -> RecordingConfig {
        RecordingConfig {
            name,
            calls: Arc::clone(calls),
            error_flag,
        }
    }

    fn runner(buffer: &SharedBuffer) -> RunnerContext {
        RunnerContext::new(ResultStream::new(Box::new(buffer.clone())), LogSinks::new())
    }

    fn test(class: &str, method: &str) -> TestId {
        TestId::new("suite_io", class, method)
    }

    #[test]
    fn test_activate_requires_backend() {
        let buffer = SharedBuffer::new();
        let result = MultiTestResult::builder().activate(ResultArgs::default(), &runner(&buffer));
        assert!(matches!(result, Err(ReportError::NoBackends)));
    }

    #[test]
    fn test_add_failure_broadcast_once_each() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(recording("B", &calls, None))
            .activate(ResultArgs::default(), &runner(&buffer))
            .unwrap();

        multi.add_failure(&test("TestIo", "test_read"), &TestError::assertion("boom"));

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "A:add_failure(test_read, boom)".to_string(),
                "B:add_failure(test_read, boom)".to_string()
            ]
        );
        assert_eq!(multi.ledger().failures.len(), 1);
    }

    #[test]
    fn test_every_event_reaches_each_backend_in_order() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(recording("B", &calls, None))
            .activate(ResultArgs::default(), &runner(&buffer))
            .unwrap();

        let t = test("TestIo", "test_read");
        let boom = TestError::assertion("boom");
        let gone = TestError::new("IOError", "gone");
        multi.start_test_run();
        multi.start_test(&t);
        multi.add_success(&t);
        multi.add_failure(&t, &boom);
        multi.add_error(&t, &gone);
        multi.add_skip(&t, "no hub");
        multi.add_expected_failure(&t, &boom);
        multi.add_unexpected_success(&t);
        multi.add_sub_test(&t, &SubTest::new("port=1"), None);
        multi.add_sub_test(&t, &SubTest::new("port=2"), Some(&boom));
        multi.stop_test(&t);
        multi.stop();
        multi.stop_test_run();

        let expected = [
            "start_test_run",
            "start_test(test_read)",
            "add_success(test_read)",
            "add_failure(test_read, boom)",
            "add_error(test_read, gone)",
            "add_skip(test_read, no hub)",
            "add_expected_failure(test_read, boom)",
            "add_unexpected_success(test_read)",
            "add_sub_test(test_read, port=1, ok)",
            "add_sub_test(test_read, port=2, boom)",
            "stop_test(test_read)",
            "stop",
            "stop_test_run",
        ];
        let interleaved: Vec<String> = expected
            .iter()
            .flat_map(|event| [format!("A:{event}"), format!("B:{event}")])
            .collect();
        assert_eq!(*calls.lock().unwrap(), interleaved);

        for backend in multi.backends() {
            let ledger = backend.ledger();
            assert_eq!(ledger.successes.len(), 1);
            assert_eq!(ledger.failures.len(), 1);
            assert_eq!(ledger.errors.len(), 1);
            assert_eq!(ledger.skipped.len(), 1);
            assert_eq!(ledger.expected_failures.len(), 1);
            assert_eq!(ledger.unexpected_successes.len(), 1);
        }
    }

    #[test]
    fn test_set_failfast_reaches_all() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(recording("B", &calls, None))
            .activate(ResultArgs::default(), &runner(&buffer))
            .unwrap();

        multi.set_failfast(true);
        assert!(multi.backends().iter().all(|r| r.ledger().failfast));
        multi.stop();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_error_occurred_first_capable_backend() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(recording("B", &calls, Some(true)))
            .backend(recording("C", &calls, Some(false)))
            .activate(ResultArgs::default(), &runner(&buffer))
            .unwrap();
        assert_eq!(multi.error_occurred(), Some(true));
    }

    #[test]
    fn test_formatting_prefers_banner_backend() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(BannerConfig { width: Some(80) })
            .activate(
                ResultArgs {
                    stream: Some(ResultStream::new(Box::new(buffer.clone()))),
                    ..Default::default()
                },
                &runner(&buffer),
            )
            .unwrap();

        let doc_test = test("TestIo", "test_read").with_doc("Reads the port.");
        assert_eq!(multi.get_description(&doc_test), "\nReads the port.");
        multi.print_errors();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_formatting_falls_back_to_first_backend() {
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(recording("B", &calls, None))
            .activate(ResultArgs::default(), &runner(&buffer))
            .unwrap();

        assert_eq!(multi.get_description(&test("TestIo", "t")), "A");
        multi.print_errors();
        assert_eq!(*calls.lock().unwrap(), vec!["A:print_errors".to_string()]);
    }

    #[test]
    fn test_generate_reports_only_capable_backends() {
        let dir = tempfile::tempdir().unwrap();
        let calls = CallLog::default();
        let buffer = SharedBuffer::new();
        let runner = runner(&buffer).with_report_dir(dir.path());
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .backend(XmlConfig {
                width: Some(80),
                ..Default::default()
            })
            .activate(
                ResultArgs {
                    stream: Some(runner.stream.clone()),
                    ..Default::default()
                },
                &runner,
            )
            .unwrap();

        let t = test("TestIo", "test_read");
        multi.start_test(&t);
        multi.add_success(&t);
        multi.stop_test(&t);

        let files = multi.generate_reports(&runner).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].exists());
    }

    #[test]
    fn test_log_file_name() {
        let name = log_file_name("suite-io.TestIo", Some("test_read"));
        assert!(name.starts_with("suite_io_TestIo_test_read_"));
        assert!(name.ends_with(".log"));
        // YYYYmmdd-HHMMSS-ffffff
        let stamp = &name["suite_io_TestIo_test_read_".len()..name.len() - 4];
        assert_eq!(stamp.len(), 22);

        let name = log_file_name("suite.TestIo", None);
        assert!(name.starts_with("suite_TestIo_2"));
    }

    fn strategy_multi(
        strategy: LogFileStrategy,
        dir: &Path,
        buffer: &SharedBuffer,
    ) -> (MultiTestResult, RunnerContext) {
        let runner = runner(buffer).with_logging(LoggingOptions {
            log_path: Some(dir.to_path_buf()),
            log_level: "info".into(),
        });
        let calls = CallLog::default();
        let multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .log_file_strategy(Some(strategy))
            .activate(ResultArgs::default(), &runner)
            .unwrap();
        (multi, runner)
    }

    #[test]
    fn test_test_run_strategy_new_file_per_method() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = SharedBuffer::new();
        let (mut multi, runner) = strategy_multi(LogFileStrategy::TestRun, dir.path(), &buffer);

        multi.start_test(&test("TestIo", "test_read"));
        let first = multi.current_log_file().unwrap().to_path_buf();
        assert!(runner.log_sinks.contains(STRATEGY_LOG_HANDLER));
        assert_eq!(runner.stream.files(), vec![first.clone()]);
        multi.stop_test(&test("TestIo", "test_read"));
        assert!(!runner.log_sinks.contains(STRATEGY_LOG_HANDLER));
        assert!(runner.stream.files().is_empty());

        multi.start_test(&test("TestIo", "test_write"));
        let second = multi.current_log_file().unwrap().to_path_buf();
        multi.stop_test(&test("TestIo", "test_write"));

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().contains("test_read"));
        assert!(first.starts_with(dir.path()));
        assert!(first.exists());
    }

    #[test]
    fn test_test_case_strategy_reuses_class_file() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = SharedBuffer::new();
        let (mut multi, runner) = strategy_multi(LogFileStrategy::TestCase, dir.path(), &buffer);

        multi.start_test(&test("TestIo", "test_read"));
        let first = multi.current_log_file().unwrap().to_path_buf();
        multi.stop_test(&test("TestIo", "test_read"));

        multi.start_test(&test("TestIo", "test_write"));
        assert_eq!(multi.current_log_file(), Some(first.as_path()));
        assert!(runner.log_sinks.contains(STRATEGY_LOG_HANDLER));
        multi.stop_test(&test("TestIo", "test_write"));

        multi.start_test(&test("TestPower", "test_on"));
        assert_ne!(multi.current_log_file(), Some(first.as_path()));
        multi.stop_test(&test("TestPower", "test_on"));
        assert!(!runner.log_sinks.contains(STRATEGY_LOG_HANDLER));
    }

    #[test]
    fn test_no_strategy_touches_nothing() {
        let buffer = SharedBuffer::new();
        let calls = CallLog::default();
        let runner = runner(&buffer);
        let mut multi = MultiTestResult::builder()
            .backend(recording("A", &calls, None))
            .activate(ResultArgs::default(), &runner)
            .unwrap();

        multi.start_test(&test("TestIo", "t"));
        assert!(multi.current_log_file().is_none());
        assert!(runner.stream.files().is_empty());
        multi.stop_test(&test("TestIo", "t"));
    }
}
