use super::types::{RunReport, Status};
use crate::load::stats::LoadReport;
use crate::runner::aggregate::AggregateStats;

const STYLE: &str = r#"
        :root {
            --bg-primary: #0a0f1d;
            --bg-secondary: #141b2d;
            --bg-tertiary: #1f2937;
            --border: #374151;
            --text-primary: #f9fafb;
            --text-secondary: #9ca3af;
            --green: #10b981;
            --red: #ef4444;
            --yellow: #f59e0b;
            --purple: #8b5cf6;
            --glass: rgba(255, 255, 255, 0.03);
        }

        * { margin: 0; padding: 0; box-sizing: border-box; }

        body {
            font-family: system-ui, -apple-system, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.5;
            padding: 3rem 1rem;
        }

        .container { max-width: 1100px; margin: 0 auto; }

        header {
            margin-bottom: 3rem;
            display: flex;
            justify-content: space-between;
            align-items: flex-end;
        }

        .eyebrow {
            font-size: 0.875rem;
            font-weight: 600;
            color: var(--purple);
            text-transform: uppercase;
            letter-spacing: 0.1em;
            margin-bottom: 0.5rem;
        }

        h1 { font-size: 2.25rem; font-weight: 800; letter-spacing: -0.025em; }
        h2 { font-size: 1.25rem; font-weight: 700; margin: 2.5rem 0 1rem; }

        .summary {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
            gap: 1.5rem;
            margin-bottom: 3rem;
        }

        .stat {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            padding: 1.5rem;
            border-radius: 1rem;
        }

        .stat-value { font-size: 2.25rem; font-weight: 800; margin-bottom: 0.25rem; }

        .stat-label {
            color: var(--text-secondary);
            font-size: 0.875rem;
            font-weight: 500;
            text-transform: uppercase;
            letter-spacing: 0.05em;
        }

        .stat.passed .stat-value { color: var(--green); }
        .stat.failed .stat-value { color: var(--red); }

        .feature, .panel {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-radius: 1.25rem;
            margin-bottom: 2rem;
            overflow: hidden;
        }

        .feature-header {
            padding: 1.5rem;
            background: var(--glass);
            display: flex;
            justify-content: space-between;
            align-items: center;
            border-bottom: 1px solid var(--border);
        }

        .feature-header h3 { font-size: 1.25rem; font-weight: 700; }

        .badge {
            padding: 0.25rem 0.75rem;
            border-radius: 9999px;
            font-size: 0.75rem;
            font-weight: 600;
            text-transform: uppercase;
            margin-left: 0.75rem;
        }

        .passed > .badge, .badge.passed { background: rgba(16, 185, 129, 0.1); color: var(--green); }
        .failed > .badge, .badge.failed { background: rgba(239, 68, 68, 0.1); color: var(--red); }

        .scenario { padding: 1rem 1.5rem; border-bottom: 1px solid var(--border); }
        .scenario:last-child { border-bottom: none; }
        .scenario-title { font-weight: 600; margin-bottom: 0.5rem; }

        .step {
            padding: 0.5rem 0.75rem;
            border-radius: 0.5rem;
            display: flex;
            gap: 0.75rem;
            align-items: flex-start;
        }

        .step-icon { width: 1.25rem; flex-shrink: 0; }
        .step.passed .step-icon { color: var(--green); }
        .step.failed .step-icon { color: var(--red); }
        .step.skipped { color: var(--text-secondary); }
        .step.skipped .step-icon { color: var(--yellow); }
        .step-content { flex: 1; }
        .keyword { color: var(--purple); font-weight: 600; }

        .duration { color: var(--text-secondary); font-size: 0.75rem; font-weight: 500; }

        .error-message {
            background: rgba(239, 68, 68, 0.1);
            border-radius: 0.5rem;
            padding: 0.75rem;
            margin-top: 0.5rem;
            color: #fca5a5;
            font-size: 0.8125rem;
            font-family: ui-monospace, monospace;
            white-space: pre-wrap;
            border: 1px solid rgba(239, 68, 68, 0.2);
        }

        table { width: 100%; border-collapse: collapse; font-size: 0.875rem; }
        th, td { padding: 0.6rem 1rem; text-align: left; border-bottom: 1px solid var(--border); }
        th { color: var(--text-secondary); font-weight: 600; background: var(--glass); }
        td.num, th.num { text-align: right; font-variant-numeric: tabular-nums; }
        .violation { color: #fca5a5; padding: 0.75rem 1.5rem; }

        .meta {
            margin-top: 4rem;
            padding-top: 2rem;
            border-top: 1px solid var(--border);
            color: var(--text-secondary);
            font-size: 0.875rem;
            text-align: center;
            display: flex;
            justify-content: center;
            gap: 2rem;
        }
"#;

/// Self-contained HTML page for a functional run
pub fn render_run(report: &RunReport) -> String {
    let summary = &report.summary;

    let mut features_html = String::new();
    for feature in &report.features {
        let mut scenarios_html = String::new();
        for scenario in &feature.scenarios {
            let mut steps_html = String::new();
            for step in &scenario.steps {
                let icon = match step.status {
                    Status::Passed => "✓",
                    Status::Failed => "✗",
                    Status::Skipped => "○",
                };
                let error_html = step
                    .error_message
                    .as_deref()
                    .map(|e| format!(r#"<div class="error-message">{}</div>"#, html_escape(e)))
                    .unwrap_or_default();

                steps_html.push_str(&format!(
                    r#"
                    <div class="step {status}">
                        <div class="step-icon">{icon}</div>
                        <div class="step-content">
                            <span class="keyword">{keyword}</span> {name}
                            <span class="duration">{duration}</span>
                            {error_html}
                        </div>
                    </div>"#,
                    status = step.status.as_str(),
                    icon = icon,
                    keyword = html_escape(&step.keyword),
                    name = html_escape(&step.name),
                    duration = format_duration(step.duration),
                    error_html = error_html,
                ));
            }

            scenarios_html.push_str(&format!(
                r#"
                <div class="scenario {status}">
                    <div class="scenario-title">Scenario: {name}<span class="badge {status}">{status}</span>
                        <span class="duration">{duration}</span></div>
                    {steps_html}
                </div>"#,
                status = scenario.status.as_str(),
                name = html_escape(&scenario.name),
                duration = format_duration(scenario.duration),
                steps_html = steps_html,
            ));
        }

        features_html.push_str(&format!(
            r#"
            <div class="feature {status}">
                <div class="feature-header">
                    <h3>Feature: {name}<span class="badge {status}">{status}</span></h3>
                    <span class="duration">{duration}</span>
                </div>
                {scenarios_html}
            </div>"#,
            status = feature.status.as_str(),
            name = html_escape(&feature.name),
            duration = format_duration(feature.duration),
            scenarios_html = scenarios_html,
        ));
    }

    let body = format!(
        r#"
        <header>
            <div>
                <div class="eyebrow">Functional Tests</div>
                <h1>Test Execution Report</h1>
            </div>
            <div style="text-align: right;">
                <div class="stat-label">Duration</div>
                <div style="font-size: 1.25rem; font-weight: 700;">{duration}</div>
            </div>
        </header>

        <div class="summary">
            <div class="stat">
                <div class="stat-value">{total}</div>
                <div class="stat-label">Total Scenarios</div>
            </div>
            <div class="stat passed">
                <div class="stat-value">{passed}</div>
                <div class="stat-label">Passed</div>
            </div>
            <div class="stat failed">
                <div class="stat-value">{failed}</div>
                <div class="stat-label">Failed</div>
            </div>
            <div class="stat">
                <div class="stat-value">{steps}</div>
                <div class="stat-label">Steps</div>
            </div>
        </div>

        {features_html}

        <div class="meta">
            <span>Session: {session}</span>
            <span>Started: {started}</span>
            <span>Finished: {finished}</span>
        </div>"#,
        duration = format_duration(summary.duration),
        total = summary.total_scenarios,
        passed = summary.passed,
        failed = summary.failed,
        steps = summary.total_steps,
        features_html = features_html,
        session = html_escape(&report.session_id),
        started = html_escape(&report.started_at),
        finished = html_escape(&report.finished_at),
    );

    page("Test Report", &body)
}

/// Self-contained HTML page for a load run
pub fn render_load(report: &LoadReport) -> String {
    let config = &report.configuration;

    let mut operations_html = String::new();
    for (operation, stats) in &report.operations {
        operations_html.push_str(&stats_row(operation.as_str(), stats, report));
    }

    let mut requests_html = String::new();
    for row in &report.requests {
        requests_html.push_str(&stats_row(&row.name, &row.stats, report));
    }
    requests_html.push_str(&stats_row("Aggregated", &report.aggregated, report));

    let failures_html = if report.failures.is_empty() {
        r#"<tr><td colspan="4">No failures</td></tr>"#.to_string()
    } else {
        report
            .failures
            .iter()
            .map(|f| {
                format!(
                    r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="num">{}</td></tr>"#,
                    html_escape(&f.method),
                    html_escape(&f.name),
                    html_escape(&f.error),
                    f.occurrences
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let violations_html = if report.violations.is_empty() {
        r#"<div class="scenario">All thresholds met</div>"#.to_string()
    } else {
        report
            .violations
            .iter()
            .map(|v| {
                format!(
                    r#"<div class="violation">{}: {}</div>"#,
                    v.operation.as_str(),
                    html_escape(&v.message)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let stats_head = r#"<tr><th>Name</th><th class="num">Requests</th><th class="num">Failures</th><th class="num">Median (ms)</th><th class="num">Average (ms)</th><th class="num">Min (ms)</th><th class="num">Max (ms)</th><th class="num">95% (ms)</th><th class="num">Success</th><th class="num">Req/s</th></tr>"#;

    let body = format!(
        r#"
        <header>
            <div>
                <div class="eyebrow">Load Test</div>
                <h1>Load Test Report</h1>
            </div>
            <div style="text-align: right;">
                <div class="stat-label">Duration</div>
                <div style="font-size: 1.25rem; font-weight: 700;">{duration}</div>
            </div>
        </header>

        <div class="summary">
            <div class="stat">
                <div class="stat-value">{users}</div>
                <div class="stat-label">Users</div>
            </div>
            <div class="stat">
                <div class="stat-value">{requests}</div>
                <div class="stat-label">Requests</div>
            </div>
            <div class="stat passed">
                <div class="stat-value">{successful}</div>
                <div class="stat-label">Successful</div>
            </div>
            <div class="stat failed">
                <div class="stat-value">{failed}</div>
                <div class="stat-label">Failed</div>
            </div>
        </div>

        <div class="panel">
            <table>
                <tr><th>Host</th><td>{host}</td></tr>
                <tr><th>Spawn rate</th><td>{spawn_rate} users/s</td></tr>
                <tr><th>Run time</th><td>{run_time}s{stopped}</td></tr>
                <tr><th>Wait time</th><td>{wait_min}s to {wait_max}s</td></tr>
            </table>
        </div>

        <h2>Operations</h2>
        <div class="panel"><table>{stats_head}{operations_html}</table></div>

        <h2>Requests</h2>
        <div class="panel"><table>{stats_head}{requests_html}</table></div>

        <h2>Failures</h2>
        <div class="panel"><table>
            <tr><th>Method</th><th>Name</th><th>Error</th><th class="num">Occurrences</th></tr>
            {failures_html}
        </table></div>

        <h2>Thresholds</h2>
        <div class="panel">{violations_html}</div>

        <div class="meta">
            <span>Started: {started}</span>
        </div>"#,
        duration = format_duration(report.elapsed),
        users = config.users,
        requests = report.aggregated.total(),
        successful = report.aggregated.successful,
        failed = report.aggregated.failed,
        host = html_escape(&config.host),
        spawn_rate = config.spawn_rate,
        run_time = config.run_time_seconds,
        stopped = if report.stopped_early {
            " (stopped early)"
        } else {
            ""
        },
        wait_min = config.wait_time_min,
        wait_max = config.wait_time_max,
        stats_head = stats_head,
        operations_html = operations_html,
        requests_html = requests_html,
        failures_html = failures_html,
        violations_html = violations_html,
        started = report.started_at.format("%Y-%m-%d %H:%M:%S"),
    );

    page("Load Test Report", &body)
}

fn stats_row(name: &str, stats: &AggregateStats, report: &LoadReport) -> String {
    let ms = |secs: Option<f64>| format!("{:.0}", secs.unwrap_or(0.0) * 1000.0);
    format!(
        r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{:.2}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{:.2}</td></tr>"#,
        html_escape(name),
        stats.total(),
        stats.failed,
        ms(stats.percentile(50.0)),
        stats.average * 1000.0,
        ms(stats.minimum()),
        ms(stats.maximum),
        ms(stats.percentile(95.0)),
        stats.success_rate(),
        report.requests_per_second(stats)
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">{body}
    </div>
</body>
</html>"#,
        title = html_escape(title),
        style = STYLE,
        body = body
    )
}

/// Escape markup characters and replace control characters other than
/// newline and tab
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' | '\t' => out.push(c),
            c if c.is_control() => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

fn format_duration(secs: f64) -> String {
    let millis = (secs * 1000.0).round();
    if millis < 1000.0 {
        format!("{:.0}ms", millis)
    } else if (secs * 10.0).round() < 600.0 {
        format!("{:.1}s", secs)
    } else {
        let total = secs.round() as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::{FeatureNode, RunSummary, ScenarioNode, StepNode};

    #[test]
    fn test_escape() {
        assert_eq!(
            html_escape(r#"<script>alert('x') & "y"</script>"#),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(html_escape("a\u{0}b\u{1b}[31m\nc"), "a\u{FFFD}b\u{FFFD}[31m\nc");
    }

    #[test]
    fn test_duration_format() {
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(2.345), "2.3s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(119.7), "2m 0s");
        assert_eq!(format_duration(59.96), "1m 0s");
        assert_eq!(format_duration(0.9996), "1.0s");
    }

    #[test]
    fn test_run_page_contains_tree() {
        let features = vec![FeatureNode {
            name: "Client <Login>".to_string(),
            tags: vec![],
            scenarios: vec![ScenarioNode {
                name: "Login with incorrect password".to_string(),
                tags: vec![],
                steps: vec![
                    StepNode {
                        keyword: "When".to_string(),
                        name: "I attempt to login".to_string(),
                        status: Status::Failed,
                        duration: 0.2,
                        error_message: Some("Unexpected token in error response".to_string()),
                    },
                    StepNode {
                        keyword: "Then".to_string(),
                        name: "I should receive an authentication error".to_string(),
                        status: Status::Skipped,
                        duration: 0.0,
                        error_message: None,
                    },
                ],
                status: Status::Failed,
                duration: 0.2,
            }],
            status: Status::Failed,
            duration: 0.2,
        }];
        let report = RunReport {
            session_id: "s".to_string(),
            started_at: "2024-01-01 10:00:00".to_string(),
            finished_at: "2024-01-01 10:00:01".to_string(),
            summary: RunSummary::from_features(&features, 1.0),
            features,
        };

        let html = render_run(&report);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Feature: Client &lt;Login&gt;"));
        assert!(!html.contains("<Login>"));
        assert!(html.contains("Unexpected token in error response"));
        assert!(html.contains(r#"<div class="step skipped">"#));
        assert!(html.contains("Total Scenarios"));
    }
}
