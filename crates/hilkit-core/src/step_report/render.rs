use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tera::{Context, Tera};
use tracing::info;

use super::{StepReport, TimeResult};
use crate::result::{ReportError, ResultLedger, ResultStream, TestId};

const STEP_REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Step report</title>
<style>
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1em; }
th, td { border: 1px solid #999; padding: 4px 8px; text-align: left; vertical-align: top; }
th { background: #ddd; }
.passed { color: #1a7f37; font-weight: bold; }
.failed { color: #cf222e; font-weight: bold; }
pre { margin: 0; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>Step report</h1>
{% for class in ALL_STEP_REPORT %}
<section>
<h2 class="{% if class.succeed %}passed{% else %}failed{% endif %}">{{ class.name }}: {% if class.succeed %}PASSED{% else %}FAILED{% endif %}</h2>
{% if class.file_path %}<p>File: {{ class.file_path }}</p>{% endif %}
{% if class.description %}<p>{{ class.description }}</p>{% endif %}
<table>
{% for key, value in class.header %}<tr><th>{{ key }}</th><td>{{ value }}</td></tr>
{% endfor %}{% for key, value in class.time_result %}<tr><th>{{ key }}</th><td>{{ value }}</td></tr>
{% endfor %}</table>
{% for test in class.test_list %}
<h3 class="{% if test.succeed %}passed{% else %}failed{% endif %}">{{ test.name }}{% if test.number_try %} (try {{ test.number_try }}/{{ test.max_try }}){% endif %}</h3>
{% if test.description %}<p>{{ test.description }}</p>{% endif %}
{% for attempt in test.steps %}
{% set attempt_index = loop.index0 %}
{% if test.steps | length > 1 %}<h4>Attempt {{ loop.index }}</h4>{% endif %}
<table>
<tr><th>#</th><th>Description</th><th>Variable</th><th>Expected</th><th>Actual</th><th>Result</th></tr>
{% for step in attempt %}<tr>
<td>{{ loop.index }}</td>
<td>{{ step.message }}</td>
<td>{{ step.var_name }}</td>
<td>{{ step.expected_result }}</td>
<td>{{ step.actual_result }}</td>
<td class="{% if step.succeed %}passed{% else %}failed{% endif %}">{% if step.succeed %}PASSED{% else %}FAILED<pre>{{ step.failure_log }}</pre>{% endif %}</td>
</tr>
{% endfor %}</table>
{% for error in test.unexpected_errors[attempt_index] %}<pre class="failed">{{ error }}</pre>
{% endfor %}{% endfor %}
{% endfor %}
</section>
{% endfor %}
</body>
</html>
"#;

const TIME_FORMAT: &str = "%d/%m/%y %H:%M:%S";

/// Format a UNIX timestamp (seconds) as `dd/mm/yy HH:MM:SS`, UTC.
pub fn parse_timestamp(timestamp: f64) -> Result<String, ReportError> {
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .ok_or_else(|| ReportError::Timestamp(timestamp.to_string()))
}

fn to_timestamp(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_micros() as f64 / 1_000_000.0
}

/// Write the HTML step report to `output` and return its path.
///
/// Start, end and elapsed time of every class come from the ledger timings
/// of its finished tests.
pub fn generate_step_report(
    report: &mut StepReport,
    ledger: &ResultLedger,
    stream: &ResultStream,
    output: &Path,
) -> Result<PathBuf, ReportError> {
    stream.writeln("Generating HTML reports...");

    let finished: Vec<&TestId> = ledger
        .successes
        .iter()
        .chain(ledger.unexpected_successes.iter())
        .chain(ledger.expected_failures.iter().map(|(t, _)| t))
        .chain(ledger.failures.iter().map(|(t, _)| t))
        .chain(ledger.errors.iter().map(|(t, _)| t))
        .collect();

    let mut spans: HashMap<&str, (f64, f64)> = HashMap::new();
    for test in finished {
        let Some(timing) = ledger.timing(test) else {
            continue;
        };
        let start = to_timestamp(timing.start);
        let stop = to_timestamp(timing.stop.unwrap_or(timing.start));
        spans
            .entry(test.class_name.as_str())
            .and_modify(|(s, e)| {
                *s = s.min(start);
                *e = e.max(stop);
            })
            .or_insert((start, stop));
    }
    for (class_name, (start, stop)) in spans {
        if let Some(class) = report.class_by_name_mut(class_name) {
            class.time_result = TimeResult {
                start_time: parse_timestamp(start)?,
                end_time: parse_timestamp(stop)?,
                elapsed_time: format!("{:.3}s", stop - start),
            };
        }
    }
    report.refresh_success();

    let output = if output.is_absolute() {
        output.to_path_buf()
    } else {
        std::env::current_dir()?.join(output)
    };
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut context = Context::new();
    context.insert("ALL_STEP_REPORT", report.classes());
    let html = Tera::one_off(STEP_REPORT_TEMPLATE, &context, true)?;
    std::fs::write(&output, html)?;
    info!(path = %output.display(), "Step report written");
    Ok(output)
}
