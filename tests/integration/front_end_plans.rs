//! Rewrites of exports.js, register.js and Dashboard.jsx.
//!
//! Covers literal anchor pairs, a lazy regex span that re-adds its closing
//! text, several patches against one file, and re-running the whole plan.

use anchor_patch::config::{apply_plan, check_plan, load_from_str, PatchResult};
use anchor_patch::{FsStore, PatchError, WorkspaceGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EXPORTS_JS: &str = r#"import { t } from './i18n.js';

function renderExportHistory() {
  const historyList = document.getElementById("exportHistoryList");
  historyList.textContent = "legacy";
}

function formatTimestamp(value) {
  return new Date(value).toLocaleString();
}

function describeHistoryEntry(entry) {
  return { formatLabel: entry.format, langLabel: entry.exportLang };
}
"#;

const REGISTER_JS: &str = r#"function populateLanguageOptions() {
  languageSelect.innerHTML = '';
}

function persistRegionAndLanguage() {
  localStorage.setItem('lang', languageSelect.value);
}
"#;

const DASHBOARD_JSX: &str = r#"export default function Dashboard() {
  const hudSummary = "Keep going.";

  return (
    <section>{hudSummary}</section>
  );
}
"#;

const PLAN: &str = r#"
[meta]
name = "front-end"
description = "History dropdown, language picker, HUD copy"
workspace_relative = true

# Regex span through the following function header, which the payload re-adds.
[[patches]]
id = "export-history-list"
file = "js/exports.js"
payload = """
function renderExportHistory() {
  const historyList = document.getElementById("exportHistoryList");
  if (!historyList) return;
  historyList.innerHTML = "";
}

function formatTimestamp"""

[patches.span]
type = "pattern"
regex = 'function renderExportHistory\(\)[\s\S]*?\n\nfunction formatTimestamp'
policy = "only"

[[patches]]
id = "language-options"
file = "js/register.js"
strict = true
payload = """
function populateLanguageOptions() {
  if (!languageSelect) return;
  const labels = window.LUNA_LANGUAGE_LABELS || { en: 'English' };
  Object.keys(labels).forEach((code) => languageSelect.appendChild(option(code)));
}

"""

[patches.start]
type = "literal"
text = "function populateLanguageOptions() {"

[patches.end]
type = "literal"
text = "function persistRegionAndLanguage()"

[[patches]]
id = "hud-summary"
file = "luna/src/pages/Dashboard.jsx"
strict = true
payload = """
  const hudSummary =
    "You've reached a steady state.";

"""

[patches.start]
type = "literal"
text = "  const hudSummary"

[patches.end]
type = "pattern"
regex = '(?m)^  return \('
"#;

struct Workspace {
    _dir: TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for (path, content) in [
            ("js/exports.js", EXPORTS_JS),
            ("js/register.js", REGISTER_JS),
            ("luna/src/pages/Dashboard.jsx", DASHBOARD_JSX),
        ] {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        Self { _dir: dir, root }
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.root.join(path)).unwrap()
    }

    fn store(&self) -> FsStore {
        FsStore::guarded(WorkspaceGuard::new(&self.root).unwrap())
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

#[test]
fn test_plan_applies_every_patch() {
    let ws = Workspace::new();
    let config = load_from_str(PLAN).unwrap();
    let mut store = ws.store();

    let results = apply_plan(&config, ws.root(), &mut store);
    let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["export-history-list", "language-options", "hud-summary"]);
    for (id, result) in &results {
        assert!(
            matches!(result, Ok(PatchResult::Applied { .. })),
            "{id}: {result:?}"
        );
    }

    let exports = ws.read("js/exports.js");
    assert!(exports.contains("if (!historyList) return;"));
    assert!(!exports.contains("legacy"));
    assert!(exports.contains("\n\nfunction formatTimestamp(value) {\n"));
    assert!(exports.starts_with("import { t } from './i18n.js';\n\n"));
    assert!(exports.ends_with(
        "function describeHistoryEntry(entry) {\n  return { formatLabel: entry.format, langLabel: entry.exportLang };\n}\n"
    ));

    let register = ws.read("js/register.js");
    assert!(register.contains("LUNA_LANGUAGE_LABELS"));
    assert!(register.ends_with(
        "\n\nfunction persistRegionAndLanguage() {\n  localStorage.setItem('lang', languageSelect.value);\n}\n"
    ));

    assert_eq!(
        ws.read("luna/src/pages/Dashboard.jsx"),
        "export default function Dashboard() {\n  const hudSummary =\n    \"You've reached a steady state.\";\n\n  return (\n    <section>{hudSummary}</section>\n  );\n}\n"
    );
}

#[test]
fn test_rerun_is_already_applied_everywhere() {
    let ws = Workspace::new();
    let config = load_from_str(PLAN).unwrap();
    let mut store = ws.store();

    let _ = apply_plan(&config, ws.root(), &mut store);
    let snapshot: Vec<String> = ["js/exports.js", "js/register.js", "luna/src/pages/Dashboard.jsx"]
        .iter()
        .map(|p| ws.read(p))
        .collect();

    let results = apply_plan(&config, ws.root(), &mut store);
    for (id, result) in &results {
        assert!(
            matches!(result, Ok(PatchResult::AlreadyApplied { .. })),
            "{id}: {result:?}"
        );
    }

    let after: Vec<String> = ["js/exports.js", "js/register.js", "luna/src/pages/Dashboard.jsx"]
        .iter()
        .map(|p| ws.read(p))
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn test_check_before_and_after() {
    let ws = Workspace::new();
    let config = load_from_str(PLAN).unwrap();

    let store = ws.store();
    let pending = check_plan(&config, ws.root(), &store);
    assert!(pending
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::Applied { .. }))));
    assert_eq!(ws.read("js/exports.js"), EXPORTS_JS);

    let mut store = ws.store();
    let _ = apply_plan(&config, ws.root(), &mut store);

    let done = check_plan(&config, ws.root(), &store);
    assert!(done
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::AlreadyApplied { .. }))));
}

#[test]
fn test_one_broken_patch_does_not_block_the_rest() {
    let ws = Workspace::new();
    fs::write(
        ws.root().join("js/register.js"),
        format!("{REGISTER_JS}\n{REGISTER_JS}"),
    )
    .unwrap();

    let config = load_from_str(PLAN).unwrap();
    let mut store = ws.store();
    let results = apply_plan(&config, ws.root(), &mut store);

    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));
    assert!(matches!(
        results[1].1.as_ref().unwrap_err().patch_error(),
        Some(PatchError::AmbiguousAnchor { count: 2, .. })
    ));
    assert!(matches!(results[2].1, Ok(PatchResult::Applied { .. })));

    assert_eq!(
        ws.read("js/register.js"),
        format!("{REGISTER_JS}\n{REGISTER_JS}")
    );
}
