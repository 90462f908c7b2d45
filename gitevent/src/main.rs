//! gitevent: repeatable branch/merge/tag workflow for a git repository, with
//! an auditable record of every run.
//!
//! State lives in `<git-dir>/gitevent/`: `config.toml`, the pending run draft
//! (`run_state.json`) and, by default, the event store (`events/`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use gitevent::core::names::NameSpec;
use gitevent::core::types::{EventDetails, RefKind, StepToggles};
use gitevent::error::{WorkflowError, workflow_error};
use gitevent::exit_codes;
use gitevent::history::{self, HistoryView};
use gitevent::io::config::{OnFailure, WorkflowConfig, load_config};
use gitevent::io::event_store::EventStore;
use gitevent::io::git::Git;
use gitevent::io::init::{InitOptions, StatePaths, init_state};
use gitevent::io::operator::Operator;
use gitevent::io::run_state::{load_run_state, write_run_state};
use gitevent::logging;
use gitevent::merge::MergeSelection;
use gitevent::refs::{RefCache, RefreshMode};
use gitevent::workflow::{PushRequest, RunReport, RunRequest, StepOutcome, Workflow};

#[derive(Parser)]
#[command(
    name = "gitevent",
    version,
    about = "Branch, merge and tag workflow with an event history"
)]
struct Cli {
    /// Repository to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,
    /// Event store root (overrides `storage_path` in config).
    #[arg(long, global = true)]
    storage: Option<PathBuf>,
    /// Skip fetching; tags created by `run` are not pushed.
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config into `<git-dir>/gitevent/config.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// List local branches, remote-only branches and tags.
    Refs,
    /// Print the collision-free name a new branch or tag would get.
    Name {
        #[arg(value_enum)]
        kind: KindArg,
        /// Preset prefix (defaults to the first configured prefix).
        #[arg(long)]
        prefix: Option<String>,
        /// Date token (defaults to today in the configured format).
        #[arg(long)]
        date: Option<String>,
        /// Appended as `_<suffix>` to preset names.
        #[arg(long)]
        suffix: Option<String>,
        /// Use this literal as the base name instead of a preset.
        #[arg(long, conflicts_with_all = ["prefix", "date", "suffix"])]
        custom: Option<String>,
    },
    /// Run the enabled steps: create branch, merge, create tag.
    Run(RunArgs),
    /// Push the current branch (with upstream) and/or a tag.
    Push {
        /// Push the current branch and set its upstream.
        #[arg(long)]
        branch: bool,
        /// Tag to push.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Save the last run as an event.
    Save {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Show saved events, newest first.
    History {
        /// Only events on this date (YYYY-MM-DD).
        #[arg(long, conflicts_with = "base_branch")]
        date: Option<NaiveDate>,
        /// Only events whose base branch is this branch.
        #[arg(long)]
        base_branch: Option<String>,
        /// Print full records including merge provenance.
        #[arg(long)]
        details: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Branch,
    Tag,
}

impl From<KindArg> for RefKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Branch => RefKind::Branch,
            KindArg::Tag => RefKind::Tag,
        }
    }
}

#[derive(clap::Args)]
struct RunArgs {
    /// Create a new branch from `--base`.
    #[arg(long)]
    create_branch: bool,
    /// Merge the selected `--merge-branch`/`--merge-tag` refs.
    #[arg(long)]
    merge: bool,
    /// Create a tag at the resulting tip (and push it unless offline).
    #[arg(long)]
    create_tag: bool,

    /// Ref the new branch starts from (defaults to the current branch).
    #[arg(long)]
    base: Option<String>,
    #[arg(long)]
    branch_prefix: Option<String>,
    #[arg(long)]
    branch_suffix: Option<String>,
    /// Literal branch name instead of a preset.
    #[arg(long, conflicts_with_all = ["branch_prefix", "branch_suffix"])]
    branch_name: Option<String>,

    #[arg(long)]
    tag_prefix: Option<String>,
    #[arg(long)]
    tag_suffix: Option<String>,
    /// Literal tag name instead of a preset.
    #[arg(long, conflicts_with_all = ["tag_prefix", "tag_suffix"])]
    tag_name: Option<String>,

    /// Date token for preset names (defaults to today).
    #[arg(long)]
    date: Option<String>,

    /// Branch to merge (repeatable, merged in the given order).
    #[arg(long = "merge-branch")]
    merge_branches: Vec<String>,
    /// Tag to merge (repeatable, merged after all branches).
    #[arg(long = "merge-tag")]
    merge_tags: Vec<String>,

    /// What to do when a merge fails (defaults to config).
    #[arg(long, value_enum)]
    on_failure: Option<OnFailure>,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match workflow_error(err) {
        Some(WorkflowError::NothingSelected | WorkflowError::NoOperationSelected) => {
            exit_codes::NOTHING_SELECTED
        }
        Some(WorkflowError::RemoteUnavailable { .. }) => exit_codes::REMOTE_UNAVAILABLE,
        _ => exit_codes::INVALID,
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let git = Git::new(&cli.repo);
    let paths = StatePaths::new(&git.git_dir().context("locate git directory")?);

    if let Command::Init { force } = cli.command {
        init_state(&paths, &InitOptions { force })?;
        println!("{}", paths.config_path.display());
        return Ok(exit_codes::OK);
    }

    let config = load_config(&paths.config_path)?;
    let mode = if cli.offline || !config.fetch {
        RefreshMode::LocalOnly
    } else {
        RefreshMode::Fetch
    };
    let storage = match &cli.storage {
        Some(path) => path.clone(),
        None => config.storage_root(&git.toplevel()?, &paths.state_dir),
    };
    let store = EventStore::new(storage);
    let draft = load_run_state(&paths.run_state_path)?;
    let mut workflow =
        Workflow::new(git, RefCache::new(config.remote.clone(), mode)).with_draft(draft);

    match cli.command {
        Command::Init { .. } => Ok(exit_codes::OK),
        Command::Refs => cmd_refs(&mut workflow),
        Command::Name {
            kind,
            prefix,
            date,
            suffix,
            custom,
        } => {
            let spec = name_spec(
                &config,
                kind.into(),
                custom.as_deref(),
                prefix.as_deref(),
                date.as_deref(),
                suffix.as_deref(),
            );
            println!("{}", workflow.final_name(&spec)?);
            Ok(exit_codes::OK)
        }
        Command::Run(args) => {
            let code = cmd_run(&mut workflow, &config, &args)?;
            write_run_state(&paths.run_state_path, workflow.draft())?;
            Ok(code)
        }
        Command::Push { branch, tag } => cmd_push(&mut workflow, PushRequest { branch, tag }),
        Command::Save {
            title,
            description,
            notes,
        } => {
            let details = EventDetails {
                title,
                description,
                notes,
            };
            let path = workflow.save_event(&store, &details, now())?;
            write_run_state(&paths.run_state_path, workflow.draft())?;
            println!("saved {}", path.display());
            Ok(exit_codes::OK)
        }
        Command::History {
            date,
            base_branch,
            details,
        } => {
            let view = match (date, base_branch) {
                (Some(date), _) => HistoryView::Date(date),
                (None, Some(branch)) => HistoryView::BaseBranch(branch),
                (None, None) => HistoryView::All,
            };
            cmd_history(&store, &view, details)
        }
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn name_spec(
    config: &WorkflowConfig,
    kind: RefKind,
    custom: Option<&str>,
    prefix: Option<&str>,
    date: Option<&str>,
    suffix: Option<&str>,
) -> NameSpec {
    if let Some(literal) = custom {
        return NameSpec::custom(kind, literal);
    }
    let prefix = prefix
        .or_else(|| config.branch_prefixes.first().map(String::as_str))
        .unwrap_or("feature");
    let date = date
        .map(str::to_string)
        .unwrap_or_else(|| Local::now().format(&config.date_format).to_string());
    let spec = NameSpec::preset(kind, prefix, &date);
    match suffix {
        Some(suffix) => spec.with_suffix(suffix),
        None => spec,
    }
}

fn cmd_refs(workflow: &mut Workflow<Git>) -> Result<i32> {
    let snapshot = workflow.refresh()?;
    println!("current: {}", snapshot.current_branch);
    for name in &snapshot.local_branches {
        println!("branch: {name}");
    }
    for name in &snapshot.remote_branches {
        println!("branch: {name} (remote)");
    }
    for name in &snapshot.tags {
        println!("tag: {name}");
    }
    Ok(exit_codes::OK)
}

fn cmd_run(workflow: &mut Workflow<Git>, config: &WorkflowConfig, args: &RunArgs) -> Result<i32> {
    let request = RunRequest {
        toggles: StepToggles {
            create_branch: args.create_branch,
            merge: args.merge,
            create_tag: args.create_tag,
        },
        branch: args.create_branch.then(|| {
            name_spec(
                config,
                RefKind::Branch,
                args.branch_name.as_deref(),
                args.branch_prefix.as_deref(),
                args.date.as_deref(),
                args.branch_suffix.as_deref(),
            )
        }),
        base_ref: args.base.clone(),
        selection: MergeSelection {
            branches: args.merge_branches.clone(),
            tags: args.merge_tags.clone(),
        },
        tag: args.create_tag.then(|| {
            name_spec(
                config,
                RefKind::Tag,
                args.tag_name.as_deref(),
                args.tag_prefix.as_deref(),
                args.date.as_deref(),
                args.tag_suffix.as_deref(),
            )
        }),
    };
    let handler = Operator::new(args.on_failure.unwrap_or(config.default_on_failure));
    let report = workflow.execute(&request, &handler, now())?;
    print_run_report(&report);
    Ok(if report.is_partial() {
        exit_codes::PARTIAL
    } else {
        exit_codes::OK
    })
}

fn print_run_report(report: &RunReport) {
    print_step("create branch", &report.branch, |name| format!("created {name}"));
    print_step("merge", &report.merge, |outcome| {
        let mut line = format!("merged {} item(s)", outcome.merged.len());
        if !outcome.failures.is_empty() {
            line.push_str(&format!(", {} failed", outcome.failures.len()));
        }
        if outcome.stopped {
            line.push_str(", stopped early");
        }
        line
    });
    if let Some(outcome) = report.merge.done() {
        if let Some(err) = &outcome.remote_unavailable {
            println!("  {err}; merged from local refs");
        }
        for item in &outcome.merged {
            println!(
                "  {} @ {}",
                history::item_label(item),
                item.short_commit_id
            );
        }
        for failure in &outcome.failures {
            println!("  failed: {failure}");
        }
    }
    print_step("create tag", &report.tag, |name| format!("created {name}"));
    if report.tag.is_failed() {
        if let Some(tag) = &report.draft.created_tag {
            println!("  tag {tag} exists locally; publish it with `gitevent push --tag {tag}`");
        }
    }
}

fn print_step<T>(label: &str, outcome: &StepOutcome<T>, describe: impl Fn(&T) -> String) {
    match outcome {
        StepOutcome::Disabled => {}
        StepOutcome::Done(value) => println!("{label}: {}", describe(value)),
        StepOutcome::Failed(err) => println!("{label}: FAILED: {err:#}"),
    }
}

fn cmd_push(workflow: &mut Workflow<Git>, request: PushRequest) -> Result<i32> {
    let report = workflow.push(&request)?;
    print_step("push branch", &report.branch, |name| format!("pushed {name}"));
    print_step("push tag", &report.tag, |name| format!("pushed {name}"));
    Ok(if report.is_partial() {
        exit_codes::PARTIAL
    } else {
        exit_codes::OK
    })
}

fn cmd_history(store: &EventStore, view: &HistoryView, details: bool) -> Result<i32> {
    let report = store.load_all()?;
    for problem in &report.errors {
        eprintln!("skipped: {problem}");
    }
    let events = history::select(&report.indexes, view);
    if events.is_empty() {
        println!("no events");
    }
    for event in events {
        if details {
            println!("{}", history::render_details(event));
        } else {
            println!("{}", history::render_summary(event));
        }
    }
    Ok(exit_codes::OK)
}
