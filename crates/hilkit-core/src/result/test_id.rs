//! Identity of a test method and of the failures reported against it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Identifies one test method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TestId {
    pub module: String,
    pub class_name: String,
    pub method_name: String,
    /// Method documentation, shown in banners and reports.
    pub doc: Option<String>,
    /// Class documentation.
    pub class_doc: Option<String>,
    /// Source file the test class lives in.
    pub file_path: Option<String>,
    /// Extra tags such as the Xray `test_key`.
    pub test_ids: BTreeMap<String, String>,
}

impl TestId {
    pub fn new(
        module: impl Into<String>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            class_name: class_name.into(),
            method_name: method_name.into(),
            doc: None,
            class_doc: None,
            file_path: None,
            test_ids: BTreeMap::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_class_doc(mut self, doc: impl Into<String>) -> Self {
        self.class_doc = Some(doc.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_test_id(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.test_ids.insert(key.into(), value.into());
        self
    }

    /// `module.Class`
    pub fn class_path(&self) -> String {
        format!("{}.{}", self.module, self.class_name)
    }

    /// `module.Class.method`
    pub fn id(&self) -> String {
        format!("{}.{}.{}", self.module, self.class_name, self.method_name)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}.{})",
            self.method_name, self.module, self.class_name
        )
    }
}

/// A failure or error raised by a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestError {
    /// Error type name, `AssertionError` for failed assertions.
    pub kind: String,
    pub message: String,
    pub traceback: String,
}

impl TestError {
    pub const ASSERTION: &'static str = "AssertionError";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            traceback: String::new(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(Self::ASSERTION, message)
    }

    /// Build from any error, walking its source chain into the traceback.
    pub fn from_error(kind: impl Into<String>, err: &dyn std::error::Error) -> Self {
        let mut traceback = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            traceback.push_str(&format!("\nCaused by: {cause}"));
            source = cause.source();
        }
        Self {
            kind: kind.into(),
            message: err.to_string(),
            traceback,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = traceback.into();
        self
    }

    /// Failed assertion, as opposed to an unexpected error.
    pub fn is_failure(&self) -> bool {
        self.kind == Self::ASSERTION
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.traceback.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{}\n{}: {}", self.traceback, self.kind, self.message)
        }
    }
}

/// A parameterized section of a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTest {
    pub description: String,
}

impl SubTest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// The parent test, relabelled with this sub test.
    pub fn label(&self, test: &TestId) -> TestId {
        let mut labelled = test.clone();
        labelled.method_name = format!("{} [{}]", test.method_name, self.description);
        labelled
    }
}
