use super::types::{FeatureNode, RunReport, ScenarioNode, Status};
use crate::error::{HarnessError, HarnessResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// Generate a JUnit XML document: one testsuite per feature, one testcase per
/// scenario
pub fn generate_junit_xml(report: &RunReport) -> HarnessResult<String> {
    write_document(report).map_err(HarnessError::encode)
}

fn write_document(report: &RunReport) -> Result<String, Box<dyn std::error::Error>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let summary = &report.summary;
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "authprobe"));
    suites_start.push_attribute(("tests", summary.total_scenarios.to_string().as_str()));
    suites_start.push_attribute(("failures", summary.failed.to_string().as_str()));
    suites_start.push_attribute(("time", format!("{:.3}", summary.duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    for feature in &report.features {
        write_test_suite(&mut writer, feature, report)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_test_suite<W: std::io::Write>(
    writer: &mut Writer<W>,
    feature: &FeatureNode,
    report: &RunReport,
) -> quick_xml::Result<()> {
    let failures = feature
        .scenarios
        .iter()
        .filter(|s| s.status == Status::Failed)
        .count();

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", xml_safe(&feature.name).as_str()));
    suite_start.push_attribute(("tests", feature.scenarios.len().to_string().as_str()));
    suite_start.push_attribute(("failures", failures.to_string().as_str()));
    suite_start.push_attribute(("id", report.session_id.as_str()));
    suite_start.push_attribute(("time", format!("{:.3}", feature.duration).as_str()));
    suite_start.push_attribute(("timestamp", report.started_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for scenario in &feature.scenarios {
        write_test_case(writer, &feature.name, scenario)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    Ok(())
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    feature: &str,
    scenario: &ScenarioNode,
) -> quick_xml::Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", xml_safe(&scenario.name).as_str()));
    case_start.push_attribute(("classname", xml_safe(feature).as_str()));
    case_start.push_attribute(("time", format!("{:.3}", scenario.duration).as_str()));
    writer.write_event(Event::Start(case_start))?;

    if scenario.status == Status::Failed {
        let message = xml_safe(scenario.error().unwrap_or("Unknown error"));
        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message.as_str()));
        fail_start.push_attribute(("type", "AssertionError"));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(&message)))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    // Step outline, Gherkin style
    let steps: Vec<String> = scenario
        .steps
        .iter()
        .map(|s| format!("{} {} ... {}", s.keyword, xml_safe(&s.name), s.status.as_str()))
        .collect();
    writer.write_event(Event::Start(BytesStart::new("system-out")))?;
    writer.write_event(Event::Text(BytesText::new(&steps.join("\n"))))?;
    writer.write_event(Event::End(BytesEnd::new("system-out")))?;

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Replace characters XML 1.0 cannot carry (C0/C1 controls other than
/// tab, newline and carriage return)
fn xml_safe(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_control() && !matches!(c, '\n' | '\t' | '\r') {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}
