use anchor_patch::config::{
    apply_plan, discover_plan_files, load_from_path, resolve_file, ApplicationError,
    PatchConfig, PatchResult,
};
use anchor_patch::{
    logging, Anchor, AnchorSide, Document, DocumentStore, EndBoundary, FsStore, MatchPolicy,
    OverlayStore, PatchError, ReplacementPlan, WorkspaceGuard,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "anchor-patch")]
#[command(about = "Replace anchor-bounded text blocks in files", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply plan files to a workspace
    Apply {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long, env = "ANCHOR_PATCH_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Specific plan file to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a line diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report which patches are applied, pending or broken
    Status {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long, env = "ANCHOR_PATCH_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Specific plan file to check
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fail unless every patch is already applied
    Verify {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long, env = "ANCHOR_PATCH_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Specific plan file to verify
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// List patches and their targets
    List {
        /// Path to workspace root (defaults to the current directory)
        #[arg(short, long, env = "ANCHOR_PATCH_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Specific plan file to list
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// Replace one block in one file
    Replace {
        /// File to patch
        #[arg(short, long)]
        file: PathBuf,

        /// Start anchor (part of the replaced region)
        #[arg(long, requires = "end", required_unless_present = "span")]
        start: Option<String>,

        /// End anchor (kept unless --inclusive)
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Single anchor whose whole match is replaced
        #[arg(long, conflicts_with_all = ["start", "end", "inclusive"])]
        span: Option<String>,

        /// Treat anchors as regular expressions
        #[arg(long)]
        regex: bool,

        /// The start (or span) regex must match exactly once
        #[arg(long, requires = "regex")]
        only: bool,

        /// Replace the end anchor too
        #[arg(long)]
        inclusive: bool,

        /// Replacement text
        #[arg(long, conflicts_with = "payload_file", required_unless_present = "payload_file")]
        payload: Option<String>,

        /// Read replacement text from a file ("-" for stdin)
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Fail if the start anchor occurs more than once
        #[arg(long)]
        strict: bool,

        /// Dry run - show what would be changed without modifying the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a line diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Apply {
            workspace,
            plan,
            dry_run,
            diff,
            json,
        } => cmd_apply(workspace, plan, dry_run, diff, json),

        Commands::Status {
            workspace,
            plan,
            json,
        } => cmd_status(workspace, plan, json),

        Commands::Verify { workspace, plan } => cmd_verify(workspace, plan),

        Commands::List { workspace, plan } => cmd_list(workspace, plan),

        Commands::Replace {
            file,
            start,
            end,
            span,
            regex,
            only,
            inclusive,
            payload,
            payload_file,
            strict,
            dry_run,
            diff,
        } => {
            let payload = read_payload(payload, payload_file)?;
            let policy = if only {
                MatchPolicy::Only
            } else {
                MatchPolicy::First
            };
            let anchor = |text: String, policy: MatchPolicy| -> Result<Anchor> {
                if regex {
                    Anchor::pattern_with(&text, policy)
                        .with_context(|| format!("invalid regex anchor: {text}"))
                } else {
                    Ok(Anchor::literal(text))
                }
            };

            let boundary = if inclusive {
                EndBoundary::Inclusive
            } else {
                EndBoundary::Exclusive
            };
            // --only constrains where the region begins; the end anchor is
            // always the first match after the start.
            let plan = match (span, start, end) {
                (Some(span), _, _) => ReplacementPlan::span(anchor(span, policy)?),
                (None, Some(start), Some(end)) => ReplacementPlan::between(
                    anchor(start, policy)?,
                    anchor(end, MatchPolicy::First)?,
                )
                .end_boundary(boundary),
                _ => anyhow::bail!("either --span or both --start and --end are required"),
            };

            cmd_replace(&file, plan.payload(payload).strict(strict), dry_run, diff)
        }
    }
}

/// Resolve the workspace: explicit flag or environment, then the current directory.
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    let path = match cli_workspace {
        Some(path) => path,
        None => env::current_dir().context("cannot determine current directory")?,
    };
    path.canonicalize()
        .with_context(|| format!("workspace does not exist: {}", path.display()))
}

/// Plan files to use: the explicit one, else `<workspace>/patches`, else `./patches`.
fn plan_files(workspace: &Path, plan: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if let Some(path) = plan {
        return Ok(vec![path]);
    }

    let mut dirs = vec![workspace.join("patches")];
    if let Ok(cwd) = env::current_dir() {
        let cwd_patches = cwd.join("patches");
        if !dirs.contains(&cwd_patches) {
            dirs.push(cwd_patches);
        }
    }

    Ok(discover_plan_files(&dirs)?)
}

fn read_payload(payload: Option<String>, payload_file: Option<PathBuf>) -> Result<String> {
    match (payload, payload_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read payload from stdin")?;
            Ok(text)
        }
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read payload file {}", path.display())),
        (None, None) => anyhow::bail!("either --payload or --payload-file is required"),
    }
}

/// Current contents of every file `config` touches, as far as `store` can read them.
fn snapshot(
    config: &PatchConfig,
    workspace: &Path,
    store: &dyn DocumentStore,
) -> HashMap<PathBuf, String> {
    config
        .patches
        .iter()
        .map(|p| resolve_file(&config.meta, workspace, &p.file))
        .filter_map(|file| {
            let doc = store.read(&file).ok()?;
            Some((file, doc.into_string()))
        })
        .collect()
}

/// Show a line diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", line);
        if change.missing_newline() {
            println!();
        }
    }
}

/// Explain a failure in terms of what probably changed in the target file.
fn explain_failure(error: &ApplicationError) {
    let Some(patch_error) = error.patch_error() else {
        return;
    };

    match patch_error {
        PatchError::AnchorNotFound { which } => {
            eprintln!(
                "  {}",
                format!("CONFLICT: {which} anchor matched no location").red()
            );
            eprintln!("  Possible causes:");
            match which {
                AnchorSide::Start => {
                    eprintln!("    - The block was renamed, moved or removed");
                    eprintln!("    - The patch was applied with a payload that drops the anchor");
                }
                AnchorSide::End => {
                    eprintln!("    - The block following the region was renamed or removed");
                    eprintln!("    - The end anchor only occurs before the start anchor");
                }
            }
        }
        PatchError::AmbiguousAnchor { which, count } => {
            eprintln!(
                "  {}",
                format!("CONFLICT: {which} anchor matched {count} locations (expected 1)").red()
            );
            eprintln!("  Action: make the {which} anchor more specific");
        }
        PatchError::DegenerateRegion { .. } => {
            eprintln!(
                "  {}",
                "CONFLICT: end anchor does not come after the start anchor".red()
            );
            eprintln!("  Action: check that the end anchor is not a prefix of the start anchor");
        }
        PatchError::RegionMismatch { found, .. } => {
            eprintln!("  {}", "CONFLICT: region content drifted".red());
            eprintln!("  Found: {}", found.lines().next().unwrap_or("").dimmed());
        }
        PatchError::InvalidRegion { .. } | PatchError::Store(_) => {}
    }
}

#[derive(Serialize)]
struct ReportEntry {
    plan: PathBuf,
    id: String,
    #[serde(flatten)]
    outcome: ReportOutcome,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ReportOutcome {
    Ok(PatchResult),
    Failed { status: &'static str, error: String },
}

impl ReportEntry {
    fn new(plan: &Path, id: &str, result: &Result<PatchResult, ApplicationError>) -> Self {
        let outcome = match result {
            Ok(r) => ReportOutcome::Ok(r.clone()),
            Err(e) => ReportOutcome::Failed {
                status: "failed",
                error: e.to_string(),
            },
        };
        Self {
            plan: plan.to_path_buf(),
            id: id.to_string(),
            outcome,
        }
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    plan: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let plan_files = plan_files(&workspace, plan)?;
    let base = FsStore::guarded(WorkspaceGuard::new(&workspace)?);

    // One store for the whole run, so each plan file sees what earlier
    // ones did (simulated when dry-running).
    let mut disk = base.clone();
    let mut overlay = OverlayStore::new(&base);
    let store: &mut dyn DocumentStore = if dry_run { &mut overlay } else { &mut disk };

    if !json {
        println!("Workspace: {}", workspace.display());
        if dry_run {
            println!("{}", "[DRY RUN - no files will be modified]".cyan());
        }
        println!();
    }

    let mut report = Vec::new();
    let mut total_applied = 0;
    let mut total_already_applied = 0;
    let mut total_failed = 0;

    for plan_file in plan_files {
        let config = load_from_path(&plan_file)?;

        if !json {
            println!("Loading patches from {}...", plan_file.display());
        }

        let before = if show_diff {
            snapshot(&config, &workspace, &*store)
        } else {
            HashMap::new()
        };

        let results = apply_plan(&config, &workspace, &mut *store);

        let after = if show_diff {
            snapshot(&config, &workspace, &*store)
        } else {
            HashMap::new()
        };

        for (patch_id, result) in &results {
            if json {
                report.push(ReportEntry::new(&plan_file, patch_id, result));
            }
            match result {
                Ok(PatchResult::Applied { file }) => {
                    total_applied += 1;
                    if json {
                        continue;
                    }
                    let verb = if dry_run { "Would apply" } else { "Applied" };
                    println!(
                        "{} {}: {} to {}",
                        "✓".green(),
                        patch_id,
                        verb,
                        file.display()
                    );
                }
                Ok(PatchResult::AlreadyApplied { file }) => {
                    total_already_applied += 1;
                    if json {
                        continue;
                    }
                    println!(
                        "{} {}: Already applied to {}",
                        "⊙".yellow(),
                        patch_id,
                        file.display()
                    );
                }
                Err(e) => {
                    total_failed += 1;
                    if json {
                        continue;
                    }
                    eprintln!("{} {}: Error - {}", "✗".red(), patch_id, e);
                    explain_failure(e);
                }
            }
        }

        if show_diff && !json {
            let mut changed: Vec<_> = after
                .iter()
                .filter(|(file, text)| before.get(*file).is_some_and(|b| b != *text))
                .collect();
            changed.sort_by(|a, b| a.0.cmp(b.0));
            for (file, text) in changed {
                display_diff(file, &before[file], text);
            }
        }

        if !json {
            println!();
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "Summary:".bold());
        println!("  {} applied", format!("{}", total_applied).green());
        println!(
            "  {} already applied",
            format!("{}", total_already_applied).yellow()
        );
        println!("  {} failed", format!("{}", total_failed).red());
    }

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>, plan: Option<PathBuf>, json: bool) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let plan_files = plan_files(&workspace, plan)?;
    let base = FsStore::guarded(WorkspaceGuard::new(&workspace)?);

    let mut report = Vec::new();
    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut broken = Vec::new();

    // Read-only: every plan file runs against one in-memory overlay.
    let mut overlay = OverlayStore::new(&base);
    for plan_file in plan_files {
        let config = load_from_path(&plan_file)?;
        for (patch_id, result) in apply_plan(&config, &workspace, &mut overlay) {
            if json {
                report.push(ReportEntry::new(&plan_file, &patch_id, &result));
            }
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => applied.push(patch_id),
                Ok(PatchResult::Applied { file }) => pending.push((patch_id, file)),
                Err(e) => broken.push((patch_id, e.to_string())),
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !broken.is_empty() {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    if !applied.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} patches)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            pending.len()
        );
        for (id, file) in &pending {
            println!("  - {} ({})", id, file.display().to_string().dimmed());
        }
        println!();
    }

    if !broken.is_empty() {
        println!(
            "{} {} ({} patches)",
            "✗".red(),
            "FAILING".red().bold(),
            broken.len()
        );
        for (id, reason) in &broken {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_verify(workspace: Option<PathBuf>, plan: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let plan_files = plan_files(&workspace, plan)?;
    let base = FsStore::guarded(WorkspaceGuard::new(&workspace)?);
    let mut overlay = OverlayStore::new(&base);

    println!("{}", "Verifying patches...".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut verified = 0;
    let mut mismatch = 0;

    for plan_file in plan_files {
        let config = load_from_path(&plan_file)?;
        for (patch_id, result) in apply_plan(&config, &workspace, &mut overlay) {
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => {
                    println!("{} {}: Verified (already applied)", "✓".green(), patch_id);
                    verified += 1;
                }
                Ok(PatchResult::Applied { file }) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Expected: patch already applied");
                    eprintln!("  Found: patch not yet applied");
                    eprintln!("  Location: {}", file.display());
                    mismatch += 1;
                }
                Err(ref e) => {
                    eprintln!("{} {}: MISMATCH", "✗".red(), patch_id);
                    eprintln!("  Error: {}", e);
                    mismatch += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(workspace: Option<PathBuf>, plan: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;

    for plan_file in plan_files(&workspace, plan)? {
        let config = load_from_path(&plan_file)?;

        let title = if config.meta.name.is_empty() {
            plan_file.display().to_string()
        } else {
            format!("{} ({})", config.meta.name, plan_file.display())
        };
        println!("{}", title.bold());
        if let Some(description) = &config.meta.description {
            println!("  {}", description.dimmed());
        }

        for patch in &config.patches {
            let strict = if patch.strict { " [strict]" } else { "" };
            println!("  - {}{}", patch.id.cyan(), strict);
            println!("      file:   {}", patch.file);
            println!("      target: {}", patch.describe_target());
        }
        println!();
    }

    Ok(())
}

fn cmd_replace(file: &Path, plan: ReplacementPlan, dry_run: bool, show_diff: bool) -> Result<()> {
    let mut store = FsStore::new();
    let original: Document = store.read(file)?;

    let patched = match plan.apply(&original) {
        Ok(patched) => patched,
        Err(e)
            if e.is_missing_start()
                && !plan.payload_text().trim().is_empty()
                && original.as_str().contains(plan.payload_text()) =>
        {
            println!(
                "{} Already applied to {}",
                "⊙".yellow(),
                file.display()
            );
            return Ok(());
        }
        Err(e) => {
            eprintln!("{} {}: Error - {}", "✗".red(), file.display(), e);
            explain_failure(&ApplicationError::Patch {
                file: file.to_path_buf(),
                source: e,
            });
            std::process::exit(1);
        }
    };

    if patched == original {
        println!(
            "{} Already applied to {}",
            "⊙".yellow(),
            file.display()
        );
        return Ok(());
    }

    if !dry_run {
        store.write(file, &patched)?;
    }

    let verb = if dry_run { "Would apply" } else { "Applied" };
    println!("{} {} to {}", "✓".green(), verb, file.display());

    if show_diff {
        display_diff(file, original.as_str(), patched.as_str());
    }

    Ok(())
}
