//! Xray test execution payloads built from JUnit results.
//!
//! JUnit suites are turned into `{info, tests}` results, merged when they
//! describe the same execution, and reshaped so that parameterized tests
//! (several results under one test key) become a single Xray entry.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const XRAY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const UTC_SUFFIX: &str = "+0000";

#[derive(Error, Debug)]
pub enum XrayError {
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(String),

    #[error("test {0} should have failed or passed, not both")]
    AmbiguousOutcome(String),

    #[error("no test case carries a test key")]
    NoTestKey,
}

/// Test execution ticket fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayInfo {
    pub summary: String,
    pub description: String,
    pub start_date: String,
    pub finish_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Result of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayTest {
    /// `None` for a test case whose properties carry no `test_key`.
    pub test_key: Option<String>,
    pub comment: String,
    pub status: String,
}

/// One test execution import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrayResults {
    pub info: XrayInfo,
    pub tests: Vec<XrayTest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_execution_key: Option<String>,
}

/// A JUnit `<property>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunitProperty {
    pub name: String,
    pub value: String,
}

/// A JUnit `<testcase>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunitTestCase {
    pub name: String,
    /// Seconds.
    pub time: f64,
    pub timestamp: String,
    #[serde(default)]
    pub properties: Option<Vec<JunitProperty>>,
    /// Text of the `<failure>` element.
    #[serde(default)]
    pub failure: Option<String>,
    /// Text of the `<error>` element.
    #[serde(default)]
    pub error: Option<String>,
}

/// A JUnit `<testsuite>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunitTestSuite {
    pub errors: u32,
    pub failures: u32,
    /// Seconds.
    pub time: f64,
    pub timestamp: String,
    #[serde(default)]
    pub testcase: Vec<JunitTestCase>,
}

pub fn convert_test_status_to_xray_format(is_successful: bool) -> &'static str {
    if is_successful { "PASSED" } else { "FAILED" }
}

/// Append the UTC offset when missing.
pub fn convert_time_to_xray_format(original_time: &str) -> String {
    if original_time.contains(UTC_SUFFIX) {
        original_time.to_string()
    } else {
        format!("{original_time}{UTC_SUFFIX}")
    }
}

/// `start_time + duration`, truncated to the second, with a `+0000` offset.
pub fn compute_end_time(start_time: &str, duration: f64) -> Result<String, XrayError> {
    let naive = start_time.split('+').next().unwrap_or(start_time);
    let start = NaiveDateTime::parse_from_str(naive, XRAY_TIME_FORMAT)
        .map_err(|_| XrayError::InvalidTimestamp(start_time.to_string()))?;
    let end = start + Duration::microseconds((duration * 1_000_000.0) as i64);
    Ok(format!("{}{UTC_SUFFIX}", end.format(XRAY_TIME_FORMAT)))
}

/// Value of the `test_key` property.
pub fn get_test_key_from_property(properties: &[JunitProperty]) -> Option<&str> {
    properties
        .iter()
        .find(|p| p.name == "test_key")
        .map(|p| p.value.as_str())
}

/// Build the Xray payload from JUnit suites.
///
/// Only test cases carrying properties are kept, with a null key when none
/// of them is `test_key`. The project is the prefix of the last test key.
pub fn create_result_dictionary(
    test_suites: &[JunitTestSuite],
    test_execution_summary: Option<&str>,
) -> Result<XrayResults, XrayError> {
    let mut info = None;
    let mut tests = Vec::new();

    for suite in test_suites {
        let has_errors = suite.errors > 0;
        let has_failures = suite.failures > 0;
        let start_date = convert_time_to_xray_format(&suite.timestamp);
        let finish_date = compute_end_time(&start_date, suite.time)?;
        info = Some(XrayInfo {
            summary: test_execution_summary
                .unwrap_or("Xray test execution summary")
                .to_string(),
            description: "Xray test execution description".to_string(),
            start_date,
            finish_date,
            project: None,
        });

        for case in &suite.testcase {
            if case.name == "test_run" {
                continue;
            }
            let Some(properties) = &case.properties else {
                continue;
            };
            let test_key = get_test_key_from_property(properties);

            let is_failed = case.failure.is_some() && has_failures;
            let is_error = case.error.is_some() && has_errors;
            let comment = match (is_failed, is_error) {
                (true, _) => case.failure.clone().unwrap_or_default(),
                (false, true) => case.error.clone().unwrap_or_default(),
                _ if case.failure == case.error => "Successful execution".to_string(),
                _ => return Err(XrayError::AmbiguousOutcome(case.name.clone())),
            };

            tests.push(XrayTest {
                test_key: test_key.map(str::to_string),
                comment: format!("{}: {comment}", case.name),
                status: convert_test_status_to_xray_format(!is_failed && !is_error).to_string(),
            });
        }
    }

    let project = tests
        .iter()
        .rev()
        .find_map(|t| t.test_key.as_deref())
        .and_then(|key| key.split('-').next())
        .map(str::to_string)
        .ok_or(XrayError::NoTestKey)?;
    let mut info = info.ok_or(XrayError::NoTestKey)?;
    info.project = Some(project);
    Ok(XrayResults {
        info,
        tests,
        test_execution_key: None,
    })
}

/// Combine results sharing the same `info`, keeping first-seen order.
pub fn merge_results(test_results: Vec<XrayResults>) -> Vec<XrayResults> {
    let mut merged: Vec<XrayResults> = Vec::new();
    for result in test_results {
        match merged.iter_mut().find(|m| m.info == result.info) {
            Some(entry) => entry.tests.extend(result.tests),
            None => merged.push(result),
        }
    }
    merged
}

/// Several results share a test key.
pub fn is_parameterized_test(test_results: &XrayResults) -> bool {
    let mut keys: Vec<Option<&str>> = test_results
        .tests
        .iter()
        .map(|t| t.test_key.as_deref())
        .collect();
    let total = keys.len();
    keys.sort_unstable();
    keys.dedup();
    keys.len() != total
}

/// One entry per test key: comments joined by newlines in order, FAILED if
/// any contributing result failed.
pub fn merge_test_results_comments(test_results: &[XrayTest]) -> Vec<XrayTest> {
    let mut merged: Vec<XrayTest> = Vec::new();
    for test in test_results {
        let pos = match merged.iter().position(|m| m.test_key == test.test_key) {
            Some(pos) => pos,
            None => {
                merged.push(XrayTest {
                    test_key: test.test_key.clone(),
                    comment: String::new(),
                    status: "PASSED".to_string(),
                });
                merged.len() - 1
            }
        };
        let entry = &mut merged[pos];
        if !entry.comment.is_empty() {
            entry.comment.push('\n');
        }
        entry.comment.push_str(&test.comment);
        if test.status == "FAILED" {
            entry.status = "FAILED".to_string();
        }
    }
    merged
}

/// Merge parameterized results and attach the execution key, if any.
pub fn reformat_xml_results(
    mut test_results: XrayResults,
    test_execution_key: Option<&str>,
) -> Vec<XrayResults> {
    if is_parameterized_test(&test_results) {
        test_results.tests = merge_test_results_comments(&test_results.tests);
    }
    if let Some(key) = test_execution_key {
        test_results.test_execution_key = Some(key.to_string());
    }
    vec![test_results]
}
