//! Console result wrapping every test in `#` banners.

use tracing::debug;

use super::ledger::ResultLedger;
use super::stream::ResultStream;
use super::test_id::{SubTest, TestError, TestId};
use super::traits::TestResult;

/// Default console width on CI, used when the terminal size is unknown.
pub const FALLBACK_WIDTH: usize = 150;

/// Columns taken by the banner frame (`"# "` and `" #"`).
const BANNER_CHAR_WIDTH: usize = 4;

const SEPARATOR: &str =
    "======================================================================";

/// Banner width: terminal columns minus one, or the fallback.
pub fn terminal_width() -> usize {
    let columns = crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .ok()
        .filter(|cols| *cols > 0)
        .unwrap_or(FALLBACK_WIDTH);
    columns - 1
}

/// Greedy word wrap, one output line per `width` columns at most.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Frame `text` in a banner of `width` columns.
pub fn make_banner(text: &str, width: usize, sym: char) -> String {
    let bar: String = std::iter::repeat_n(sym, width).collect();
    let inner = width.saturating_sub(BANNER_CHAR_WIDTH);
    let body: Vec<String> = text
        .split('\n')
        .map(|line| format!("{sym} {line:<inner$} {sym}"))
        .collect();
    format!("{bar}\n{}\n{bar}\n", body.join("\n"))
}

/// Test result printing start and end banners.
pub struct BannerTestResult {
    ledger: ResultLedger,
    stream: ResultStream,
    descriptions: bool,
    verbosity: u8,
    width: usize,
    error_occurred: bool,
    subtest_failed: bool,
}

impl BannerTestResult {
    pub fn new(stream: ResultStream, descriptions: bool, verbosity: u8) -> Self {
        Self::with_width(stream, descriptions, verbosity, terminal_width())
    }

    pub fn with_width(stream: ResultStream, descriptions: bool, verbosity: u8, width: usize) -> Self {
        Self {
            ledger: ResultLedger::new(),
            stream,
            descriptions,
            verbosity,
            width,
            error_occurred: false,
            subtest_failed: false,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn descriptions(&self) -> bool {
        self.descriptions
    }

    fn banner(&self, text: &str) -> String {
        make_banner(text, self.width, '#')
    }

    fn show_all(&self) -> bool {
        self.verbosity > 1
    }

    fn dots(&self) -> bool {
        self.verbosity == 1
    }

    fn report_outcome(&self, long: &str, short: &str) {
        if self.show_all() {
            self.stream.writeln(long);
        } else if self.dots() {
            self.stream.write_str(short);
        }
        self.stream.flush();
    }
}

impl TestResult for BannerTestResult {
    fn ledger(&self) -> &ResultLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut ResultLedger {
        &mut self.ledger
    }

    /// Wrapped method documentation, one leading newline per doc line.
    fn get_description(&self, test: &TestId) -> String {
        let mut doc = String::new();
        let inner = self.width.saturating_sub(BANNER_CHAR_WIDTH);
        if let Some(text) = &test.doc {
            for line in text.lines() {
                doc.push('\n');
                doc.push_str(&wrap(line.trim(), inner).join("\n"));
            }
        }
        doc
    }

    fn start_test(&mut self, test: &TestId) {
        self.ledger.start_test(test);
        self.error_occurred = false;
        self.subtest_failed = false;

        let top = "RUNNING TEST: ";
        let mut test_name = test.to_string();
        let mut addendum = String::new();
        if test.module.len() + test_name.len() < self.width.saturating_sub(top.len()) {
            test_name = format!("{}.{}", test.module, test_name);
        } else {
            addendum = format!("\nmodule: {}", test.module);
        }
        let doc = self.get_description(test);

        self.stream
            .write_str(&self.banner(&format!("{top}{test_name}{addendum}{doc}")));
        self.stream.flush();
    }

    fn stop_test(&mut self, test: &TestId) {
        self.ledger.stop_test(test);
        let elapsed = self
            .ledger
            .timing(test)
            .map(|t| t.elapsed_secs())
            .unwrap_or(0.0);
        let result = if self.error_occurred || self.subtest_failed {
            "FAILED"
        } else {
            "PASSED"
        };

        let mut bottom = format!("END OF TEST: {test}");
        let result_str = format!("  ->  {result} in {elapsed:.3}s");
        if bottom.len() + result_str.len() < self.width.saturating_sub(BANNER_CHAR_WIDTH) {
            bottom.push_str(&result_str);
        } else {
            bottom.push('\n');
            bottom.push_str(&result_str);
        }
        self.stream.write_str(&(self.banner(&bottom) + "\n"));
        self.stream.flush();
        debug!(test = %test, result, "Test finished");
    }

    fn add_success(&mut self, test: &TestId) {
        self.ledger.add_success(test);
    }

    fn add_failure(&mut self, test: &TestId, err: &TestError) {
        self.ledger.add_failure(test, err);
        self.report_outcome("FAIL", "F");
        self.error_occurred = true;
    }

    fn add_error(&mut self, test: &TestId, err: &TestError) {
        self.ledger.add_error(test, err);
        self.report_outcome("ERROR", "E");
        self.error_occurred = true;
    }

    fn add_skip(&mut self, test: &TestId, reason: &str) {
        self.ledger.add_skip(test, reason);
        self.report_outcome(&format!("skipped {reason:?}"), "s");
    }

    fn add_expected_failure(&mut self, test: &TestId, err: &TestError) {
        self.ledger.add_expected_failure(test, err);
        self.report_outcome("expected failure", "x");
    }

    fn add_unexpected_success(&mut self, test: &TestId) {
        self.ledger.add_unexpected_success(test);
        self.report_outcome("unexpected success", "u");
    }

    fn add_sub_test(&mut self, test: &TestId, subtest: &SubTest, err: Option<&TestError>) {
        self.ledger.add_sub_test(test, subtest, err);
        if err.is_some() {
            self.subtest_failed = true;
        }
    }

    fn print_errors(&mut self) {
        if self.dots() || self.show_all() {
            self.stream.writeln("");
        }
        let errors = self.ledger.errors.clone();
        self.print_error_list("ERROR", &errors);
        let failures = self.ledger.failures.clone();
        self.print_error_list("FAIL", &failures);
        for test in &self.ledger.unexpected_successes {
            self.stream.writeln(SEPARATOR);
            self.stream.writeln(&format!("UNEXPECTED SUCCESS: {test}"));
        }
        self.stream.flush();
    }

    fn print_error_list(&mut self, flavour: &str, errors: &[(TestId, String)]) {
        for (test, err) in errors {
            self.stream.writeln(SEPARATOR);
            self.stream.writeln(&test.to_string());
            self.stream.writeln(&self.get_description(test));
            self.stream.writeln(&format!("{flavour}: {err}"));
        }
    }

    fn error_occurred(&self) -> Option<bool> {
        Some(self.error_occurred)
    }

    fn as_banner(&self) -> Option<&BannerTestResult> {
        Some(self)
    }
}
