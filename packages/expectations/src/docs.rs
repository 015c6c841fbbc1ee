//! Data-docs rendering: one static HTML page listing the stored suites and
//! the latest checkpoint run.

use std::fmt::Write as _;

use drift311_expectations_models::{
    CheckpointResult, ExpectationResult, ExpectationSuite, SuiteValidationResult,
};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const fn status(success: bool) -> &'static str {
    if success { "PASS" } else { "FAIL" }
}

/// One-line summary of what a rule observed.
fn observed(result: &ExpectationResult) -> String {
    if let Some(message) = &result.exception_message {
        return message.clone();
    }
    let payload = &result.result;
    if let Some(value) = &payload.observed_value {
        return value.to_string();
    }
    match (payload.unexpected_count, payload.unexpected_percent) {
        (Some(count), Some(percent)) => format!("{count} unexpected ({percent:.2}%)"),
        (Some(count), None) => format!("{count} unexpected"),
        _ => String::new(),
    }
}

fn render_validation(html: &mut String, validation: &SuiteValidationResult) {
    writeln!(
        html,
        "<h3>{} <small>({}, {} rows)</small>: {}</h3>",
        escape(&validation.expectation_suite_name),
        escape(&validation.data_asset_name),
        validation.element_count,
        status(validation.success)
    )
    .unwrap();
    html.push_str("<table>\n<tr><th>Expectation</th><th>Column</th><th>Status</th><th>Observed</th></tr>\n");
    for result in &validation.results {
        let config = &result.expectation_config;
        writeln!(
            html,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            status(result.success).to_lowercase(),
            config.expectation_type(),
            escape(config.column().unwrap_or("")),
            status(result.success),
            escape(&observed(result))
        )
        .unwrap();
    }
    html.push_str("</table>\n");
}

/// Renders the data-docs index page.
///
/// # Panics
///
/// Does not panic: formatting into a `String` is infallible.
#[must_use]
pub fn render_index(suites: &[ExpectationSuite], run: &CheckpointResult) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Data Docs</title>\n\
         <style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #ccc;padding:4px 8px}.fail{background:#fdd}</style>\n\
         </head>\n<body>\n",
    );

    html.push_str("<h1>Expectation Suites</h1>\n<ul>\n");
    for suite in suites {
        writeln!(
            html,
            "<li>{} ({} expectations)</li>",
            escape(&suite.expectation_suite_name),
            suite.expectations.len()
        )
        .unwrap();
    }
    html.push_str("</ul>\n");

    writeln!(
        html,
        "<h2>{} / {}: {}</h2>",
        escape(&run.checkpoint_name),
        escape(&run.run_name),
        status(run.success)
    )
    .unwrap();
    for validation in &run.validations {
        render_validation(&mut html, validation);
    }

    html.push_str("</body>\n</html>\n");
    html
}
