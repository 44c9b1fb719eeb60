//! HTML report rendered with Handlebars.

use handlebars::Handlebars;

use super::RunReport;

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>QA Cascade report {{runId}}</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #1f2328; }
.pass { color: #1a7f37; } .fail { color: #cf222e; }
table { border-collapse: collapse; margin: 0.5rem 0 1.5rem; }
td, th { border: 1px solid #d0d7de; padding: 0.25rem 0.6rem; text-align: left; }
.error { color: #cf222e; } .warning { color: #9a6700; } .info { color: #0969da; }
</style>
</head>
<body>
<h1>QA Cascade: {{#if success}}<span class="pass">PASSED</span>{{else}}<span class="fail">FAILED</span>{{/if}}</h1>
<p>Mode <b>{{mode}}</b>, {{summary.toolsRun}} tools in {{durationMs}} ms{{#if taskId}}, task <b>{{taskId}}</b>{{/if}}.</p>
<p>Context: {{context.type}} / {{context.scope}} (confidence {{context.confidence}}, risk {{context.risk}}){{#if context.branch}} on <code>{{context.branch}}</code>{{/if}}</p>
<p>{{summary.counts.errors}} errors, {{summary.counts.warnings}} warnings, {{summary.counts.infos}} info</p>
{{#each dimensions}}
<h2>{{dimension}} <small>[{{priority}}]</small>{{#if maxSeverity}} <span class="{{maxSeverity}}">{{maxSeverity}}</span>{{/if}}</h2>
{{#each tools}}
<h3>{{tool.name}} {{#if success}}<span class="pass">PASS</span>{{else}}<span class="fail">FAIL</span>{{/if}} <small>{{executionTimeMs}} ms</small></h3>
{{#if error}}<pre>{{error}}</pre>{{/if}}
{{#if files}}
<table>
<tr><th>File</th><th>Severity</th><th>Rule</th><th>Hits</th><th>Message</th></tr>
{{#each files}}{{#each rules}}
<tr><td>{{../file}}</td><td class="{{severity}}">{{severity}}</td><td>{{rule}}</td><td>{{occurrences}}</td><td>{{message}}</td></tr>
{{/each}}{{/each}}
</table>
{{/if}}
{{/each}}
{{/each}}
{{#if unavailable}}
<h2>Unavailable tools</h2>
<ul>{{#each unavailable}}<li>{{tool.name}}: {{reason}}</li>{{/each}}</ul>
{{/if}}
{{#if prerequisiteIssues}}
<h2>Missing prerequisites</h2>
<ul>{{#each prerequisiteIssues}}<li>{{tool.name}}: {{#each missing}}{{this}} {{/each}}</li>{{/each}}</ul>
{{/if}}
{{#if skipped}}
<h2>Skipped</h2>
<ul>{{#each skipped}}<li>{{tool.name}}: {{reason}}</li>{{/each}}</ul>
{{/if}}
</body>
</html>
"#;

pub struct HtmlRenderer<'a> {
    handlebars: Handlebars<'a>,
}

impl Default for HtmlRenderer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> HtmlRenderer<'a> {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    pub fn render(&self, report: &RunReport) -> Result<String, String> {
        self.handlebars
            .render_template(REPORT_TEMPLATE, report)
            .map_err(|e| format!("Render error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::fixtures::sample_report;

    #[test]
    fn test_html_escapes_and_orders() {
        let html = HtmlRenderer::new().render(&sample_report()).unwrap();
        assert!(html.contains("FAILED"));
        assert!(html.contains("secret &lt;found&gt;"));
        let security = html.find("<h2>security-audit").unwrap();
        let formatting = html.find("<h2>formatting").unwrap();
        assert!(security < formatting);
        assert!(html.contains("<td>src/auth/token.ts</td>"));
    }
}
