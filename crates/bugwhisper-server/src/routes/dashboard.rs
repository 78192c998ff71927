//! The HTML dashboard: a submit form plus the recent reports.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use bugwhisper_store::BugRecord;

use super::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// GET /
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let recent = state.store().list_recent(state.config.recent_limit)?;
    Ok(Html(render_page(&recent)))
}

const PAGE_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Bug Whisperer</title>
<style>
body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; }
textarea { width: 100%; min-height: 6rem; font-family: monospace; }
pre { white-space: pre-wrap; background: #f6f6f6; padding: .75rem; }
.report { border-left: 4px solid #ccc; padding-left: .75rem; margin-bottom: 1rem; }
</style>
</head>
<body>
<h1>Bug Whisperer</h1>
<form id="diagnose">
<textarea name="error" placeholder="Paste an error message"></textarea>
<button type="submit">Diagnose</button>
</form>
<pre id="result" hidden></pre>
"#;

const PAGE_TAIL: &str = r#"<script>
document.getElementById("diagnose").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const error = ev.target.error.value;
  const out = document.getElementById("result");
  const res = await fetch("/api/diagnose", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ error }),
  });
  const body = await res.json();
  out.textContent = res.ok ? body.message : body.error;
  out.hidden = false;
});
</script>
</body>
</html>
"#;

fn render_page(recent: &[BugRecord]) -> String {
    let mut html = String::from(PAGE_HEAD);
    html.push_str("<h2>Recent bug reports</h2>\n");
    if recent.is_empty() {
        html.push_str("<p>No reports yet.</p>\n");
    }
    for bug in recent {
        html.push_str(&format!(
            "<div class=\"report\" style=\"border-color: {color}\">\
             <strong style=\"color: {color}\">{severity}</strong> <code>{key}</code>\
             <pre>{error}</pre><pre>{suggestion}</pre></div>\n",
            color = bug.severity.color(),
            severity = bug.severity,
            key = escape(&bug.key),
            error = escape(&bug.error),
            suggestion = escape(&bug.suggestion),
        ));
    }
    html.push_str(PAGE_TAIL);
    html
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
