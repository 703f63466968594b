//! HTML templates and styling.
//!
//! This module contains the CSS, the workspace JavaScript and the HTML
//! generation functions for the login page and the keyword workspace.

use crate::models::{AcquisitionMode, WorkspaceSnapshot};

// ============================================================================
// CSS Styles
// ============================================================================

pub const STYLE: &str = r#"
:root {
    --base01: #586e75;
    --base00: #657b83;
    --base1: #93a1a1;
    --base2: #eee8d5;
    --base3: #fdf6e3;
    --red: #dc322f;
    --blue: #268bd2;
    --cyan: #2aa198;
    --green: #859900;

    --bg: var(--base3);
    --fg: var(--base00);
    --muted: var(--base1);
    --border: var(--base2);
    --link: var(--blue);
    --link-hover: var(--cyan);
    --accent: var(--base2);
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
    line-height: 1.6;
    color: var(--fg);
    background: var(--bg);
}

.container { max-width: 900px; margin: 0 auto; padding: 1rem; }

a { color: var(--link); text-decoration: none; }
a:hover { color: var(--link-hover); text-decoration: underline; }

h1, h2, h3 { font-weight: 600; margin-top: 1.2em; margin-bottom: 0.5em; }
h1 { font-size: 1.5rem; }

.nav-bar {
    position: sticky;
    top: 0;
    background: var(--bg);
    border-bottom: 1px solid var(--border);
    padding: 0.5rem 1rem;
    display: flex;
    gap: 1rem;
    align-items: center;
    z-index: 100;
}
.nav-bar .spacer { flex: 1; }

input[type=text], input[type=email], input[type=password], input[type=number], textarea {
    padding: 0.4rem 0.75rem;
    border: 1px solid var(--border);
    border-radius: 4px;
    background: #fff;
    color: var(--fg);
    font-size: 0.95rem;
    font-family: inherit;
}
textarea { width: 100%; min-height: 6rem; }

button {
    padding: 0.4rem 0.9rem;
    border: 1px solid var(--border);
    border-radius: 4px;
    background: var(--accent);
    color: var(--fg);
    cursor: pointer;
    font-size: 0.9rem;
}
button:disabled { opacity: 0.5; cursor: default; }

.login-form { max-width: 320px; margin: 4rem auto; display: flex; flex-direction: column; gap: 0.6rem; }
.login-form form { display: flex; flex-direction: column; gap: 0.6rem; }

.message { padding: 0.5rem 0.75rem; border-radius: 4px; margin: 0.5rem 0; }
.message.error { background: #fbe3e2; color: var(--red); }

.project-header { border-bottom: 1px solid var(--border); padding-bottom: 0.5rem; }
.project-header .meta { color: var(--muted); font-size: 0.85rem; }

.mode-toggle { display: flex; gap: 0.5rem; justify-content: flex-end; align-items: center; font-size: 0.9rem; }

.stats { display: grid; grid-template-columns: repeat(3, 1fr); gap: 0.75rem; margin: 1rem 0; }
.stat { border: 1px solid var(--border); border-radius: 6px; padding: 0.75rem; }
.stat .label { font-size: 0.75rem; color: var(--muted); }
.stat .value { font-size: 1.4rem; font-weight: 600; }

.chips { display: flex; flex-wrap: wrap; gap: 0.4rem; margin: 0.75rem 0; }
.chip { border: 1px solid var(--blue); border-radius: 999px; padding: 0.1rem 0.7rem; font-size: 0.9rem; }
.chip button { border: none; background: none; color: var(--muted); padding: 0 0 0 0.3rem; }
.chip button:hover { color: var(--red); }

.row { display: flex; gap: 0.5rem; margin-top: 0.5rem; }
.row input { flex: 1; }

.progress { background: var(--border); border-radius: 999px; height: 0.6rem; margin-top: 0.5rem; }
.progress .bar { background: var(--blue); height: 100%; border-radius: 999px; width: 0; }

.notice {
    position: fixed;
    bottom: 1.5rem;
    right: 1.5rem;
    background: var(--base01);
    color: #fff;
    padding: 0.6rem 1rem;
    border-radius: 6px;
    font-size: 0.9rem;
    display: none;
}
"#;

// ============================================================================
// Workspace Script
// ============================================================================

const WORKSPACE_JS: &str = r#"
const api = '/api/workspace/' + PROJECT_ID;
let mode = INITIAL_MODE;
let snapshot = null;
let pollTimer = null;

function $(id) { return document.getElementById(id); }

function showNotice(msg) {
    const box = $('notice');
    if (!msg) { box.style.display = 'none'; return; }
    box.textContent = msg;
    box.style.display = 'block';
}

function render(s) {
    snapshot = s;
    const busy = ['generating', 'saving', 'uploading'].includes(s.phase);

    $('mode-label').textContent = mode === 'local' ? 'Local model' : 'Gemini cloud';
    $('upload-section').style.display = mode === 'remote' ? 'block' : 'none';
    $('generate-btn').disabled = busy;
    $('generate-btn').textContent = s.phase === 'generating' ? 'Analyzing...' : 'Generate Keywords';

    const stat = (v) => (v === undefined || v === null) ? '-' : v;
    $('stat-total').textContent = stat(s.stats && s.stats.total_papers);
    $('stat-analyzed').textContent = stat(s.stats && s.stats.analyzed_papers);
    $('stat-unanalyzed').textContent = stat(s.stats && s.stats.unanalyzed_papers);
    $('stats-error').textContent = s.stats_error || '';

    const chips = $('chips');
    chips.innerHTML = '';
    if (s.keywords.length === 0) {
        chips.textContent = 'No keywords yet.';
    }
    s.keywords.forEach((word, i) => {
        const chip = document.createElement('span');
        chip.className = 'chip';
        chip.textContent = word;
        if (s.editable && !busy) {
            const x = document.createElement('button');
            x.textContent = '×';
            x.onclick = () => removeKeyword(i);
            chip.appendChild(x);
        }
        chips.appendChild(chip);
    });
    $('edit-controls').style.display = s.editable && !busy ? 'block' : 'none';
    $('save-btn').disabled = busy;
    $('save-btn').textContent = s.phase === 'saving' ? 'Saving...' : 'Save Keywords';

    const up = s.upload;
    const inFlight = up && !up.outcome;
    $('upload-progress').style.display = inFlight && up.has_file ? 'block' : 'none';
    $('upload-bar').style.width = (up ? up.percent : 0) + '%';
    $('upload-status').textContent = up ? up.status : '';

    showNotice(s.notice);

    if (busy && !pollTimer) {
        pollTimer = setInterval(refreshSnapshot, 500);
    } else if (!busy && pollTimer) {
        clearInterval(pollTimer);
        pollTimer = null;
    }
}

async function call(path, options) {
    try {
        const res = await fetch(api + path, options);
        const data = await res.json();
        if (data.snapshot) render(data.snapshot);
        if (data.error) showNotice(data.error);
    } catch (e) {
        showNotice('Request failed: ' + e.message);
    }
}

function jsonBody(body) {
    return { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body) };
}

function refreshSnapshot() { return call('', { method: 'GET' }); }

function toggleMode() {
    mode = mode === 'local' ? 'remote' : 'local';
    if (snapshot) render(snapshot);
}

function generateKeywords() {
    setTimeout(refreshSnapshot, 300);
    return call('/generate', jsonBody({ prompt: $('prompt').value, mode: mode }));
}

function addKeyword() {
    const input = $('new-keyword');
    const word = input.value;
    input.value = '';
    return call('/keywords', jsonBody({ word: word }));
}

function removeKeyword(i) {
    return call('/keywords/' + i, { method: 'DELETE' });
}

function saveKeywords() {
    return call('/save', jsonBody({ prompt: $('prompt').value }));
}

function uploadFile(input) {
    const file = input.files && input.files[0];
    if (!file) return;
    const form = new FormData();
    form.append('mode', mode);
    form.append('prompt', $('prompt').value);
    form.append('file', file);
    input.value = '';
    setTimeout(refreshSnapshot, 300);
    return call('/upload', { method: 'POST', body: form });
}

function reloadWorkspace() {
    return call('/refresh', { method: 'POST' });
}

refreshSnapshot();
"#;

// ============================================================================
// Helpers
// ============================================================================

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape a value for a single-quoted JavaScript string literal.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('<', "\\x3c")
}

// ============================================================================
// Base HTML Template
// ============================================================================

pub fn nav_bar(logged_in: bool) -> String {
    let auth_link = if logged_in {
        r#"<a href="/logout">Logout</a>"#
    } else {
        r#"<a href="/login">Login</a>"#
    };

    format!(
        r#"<nav class="nav-bar">
            <a href="/">i-SMART</a>
            <span class="spacer"></span>
            {}
        </nav>"#,
        auth_link
    )
}

pub fn base_html(title: &str, content: &str, logged_in: bool) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    {nav}
    <div class="container">
        {content}
    </div>
</body>
</html>"#,
        title = html_escape(title),
        nav = nav_bar(logged_in),
    )
}

// ============================================================================
// Pages
// ============================================================================

pub fn render_login(error: Option<&str>, email: &str) -> String {
    let error_html = error
        .map(|e| format!(r#"<div class="message error">{}</div>"#, html_escape(e)))
        .unwrap_or_default();

    let content = format!(
        r#"<div class="login-form">
            <h1>Sign in to i-SMART</h1>
            {error_html}
            <form method="POST" action="/login">
                <input type="email" name="email" placeholder="Email" value="{email}" autofocus required>
                <input type="password" name="password" placeholder="Password" required>
                <button type="submit">Login</button>
            </form>
        </div>"#,
        error_html = error_html,
        email = html_escape(email),
    );

    base_html("Login", &content, false)
}

/// Project hand-off form: the selected project is passed explicitly to
/// the workspace route.
pub fn render_index() -> String {
    let content = r#"<h1>Open a project workspace</h1>
        <form class="login-form" method="GET" action="/workspace">
            <input type="number" name="project_id" placeholder="Project ID" required>
            <input type="text" name="project_name" placeholder="Project name">
            <textarea name="raw_query" placeholder="Research prompt"></textarea>
            <button type="submit">Open workspace</button>
        </form>"#;

    base_html("i-SMART", content, true)
}

pub fn render_workspace(snapshot: &WorkspaceSnapshot, mode: AcquisitionMode) -> String {
    let (project_id, project_name, raw_query) = match snapshot.project {
        Some(ref p) => (
            p.project_id,
            p.display_name().to_string(),
            p.raw_query.clone().unwrap_or_default(),
        ),
        None => (0, "Untitled".to_string(), String::new()),
    };

    let content = format!(
        r#"<div class="mode-toggle">
            <span>Mode: <strong id="mode-label"></strong></span>
            <button onclick="toggleMode()">Switch mode</button>
        </div>

        <div class="project-header">
            <h1>{name}</h1>
            <span class="meta">Project ID: {id}</span>
        </div>

        <div class="stats">
            <div class="stat"><div class="label">Total Papers</div><div class="value" id="stat-total">…</div></div>
            <div class="stat"><div class="label">Analyzed Papers</div><div class="value" id="stat-analyzed">…</div></div>
            <div class="stat"><div class="label">Unanalyzed Papers</div><div class="value" id="stat-unanalyzed">…</div>
                <button onclick="reloadWorkspace()">Refresh</button></div>
        </div>
        <div class="message error" id="stats-error"></div>

        <h3>Research Prompt</h3>
        <textarea id="prompt">{prompt}</textarea>
        <div class="row"><button id="generate-btn" onclick="generateKeywords()">Generate Keywords</button></div>

        <div id="upload-section" style="display:none">
            <h3>Upload Research Document (PDF)</h3>
            <input type="file" accept="application/pdf" onchange="uploadFile(this)">
            <div class="progress" id="upload-progress" style="display:none"><div class="bar" id="upload-bar"></div></div>
            <p id="upload-status"></p>
        </div>

        <h3>Keywords</h3>
        <div class="chips" id="chips"></div>
        <div id="edit-controls" style="display:none">
            <div class="row">
                <input type="text" id="new-keyword" placeholder="Add new keyword"
                    onkeydown="if (event.key === 'Enter') addKeyword()">
                <button onclick="addKeyword()">Add</button>
            </div>
            <div class="row"><button id="save-btn" onclick="saveKeywords()">Save Keywords</button></div>
        </div>

        <div class="notice" id="notice"></div>
        <script>
        const PROJECT_ID = {id};
        const INITIAL_MODE = '{mode}';
        {js}
        </script>"#,
        name = html_escape(&project_name),
        id = project_id,
        prompt = html_escape(&raw_query),
        mode = js_escape(&mode.to_string()),
        js = WORKSPACE_JS,
    );

    base_html(&format!("{} - Keywords", project_name), &content, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, WorkspacePhase};

    fn snapshot(name: &str) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            project: Some(Project {
                project_id: 9,
                project_name: Some(name.to_string()),
                raw_query: Some("arsenic <uptake>".to_string()),
            }),
            keywords: vec![],
            editable: false,
            phase: WorkspacePhase::Idle,
            upload: None,
            stats: None,
            stats_error: None,
            notice: None,
        }
    }

    #[test]
    fn test_workspace_escapes_project_fields() {
        let html = render_workspace(&snapshot("<script>x</script>"), AcquisitionMode::Remote);
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("arsenic &lt;uptake&gt;"));
        assert!(html.contains("const PROJECT_ID = 9;"));
        assert!(html.contains("const INITIAL_MODE = 'remote';"));
    }

    #[test]
    fn test_login_shows_error() {
        let html = render_login(Some("Login failed"), "a@b.org");
        assert!(html.contains("Login failed"));
        assert!(html.contains(r#"value="a@b.org""#));
    }

    #[test]
    fn test_js_escape() {
        assert_eq!(js_escape("it's"), "it\\'s");
        assert_eq!(js_escape("</script>"), "\\x3c/script>");
    }
}
