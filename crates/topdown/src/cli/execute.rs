//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Mutating
//! commands change the store in memory first and save once at the end, so
//! a rejected edit never reaches disk.

use std::collections::BTreeMap;

use anyhow::Result;
use topdown_core::store::RowUpdate;
use topdown_core::{CommitPolicy, Outcome, Row, RowId, Store, ValidationReport};

use super::args::{
    AddArgs, BookmarkAction, BookmarkArgs, HistoryArgs, IndexArgs, InitArgs, ListArgs,
    PlayheadAction, PlayheadArgs, RowArgs, SetArgs, ValidateArgs,
};
use crate::app::App;
use crate::error::Error;
use crate::output::{self, HistoryLine, OutputConfig, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir, args.prefix.as_deref(), args.force).await?;

    if !args.quiet {
        println!("Initialized topdown in {}", result.topdown_dir.display());
        println!("  Store:     {}", result.store_file.display());
        println!("  Settings:  {}", result.settings_file.display());
        println!("  ID prefix: {}", result.id_prefix);
    }

    Ok(())
}

/// Print a mutation's result plus any findings the commit let through.
fn report_mutation(
    message: &str,
    payload: serde_json::Value,
    report: Option<&ValidationReport>,
    output_mode: OutputMode,
) -> Result<()> {
    match output_mode {
        OutputMode::Json => {
            let mut value = payload;
            if let (Some(report), Some(map)) = (report, value.as_object_mut()) {
                map.insert("validation".to_string(), serde_json::to_value(report)?);
            }
            output::print_json(&value)?;
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!("{}", output::success(message, &config));
            if let Some(report) = report.filter(|r| !r.is_clean()) {
                println!(
                    "{} {}",
                    output::warning("Warning:", &config),
                    report.summary()
                );
            }
        }
    }
    Ok(())
}

/// Save after an `Outcome`-returning operation, or report the no-op.
async fn finish_outcome(
    app: &App,
    action: &str,
    outcome: Outcome<usize>,
    output_mode: OutputMode,
) -> Result<()> {
    match outcome {
        Outcome::Applied(index) => {
            app.save().await?;
            report_mutation(
                &format!("{action}: now at entry #{index}"),
                serde_json::json!({ "action": action, "applied": true, "index": index }),
                None,
                output_mode,
            )
        }
        Outcome::NoOp(reason) => Ok(output::print_noop(action, &reason, output_mode)?),
    }
}

fn require_row<'a>(app: &'a App, id: &str) -> Result<&'a Row> {
    app.store()
        .row(id)
        .ok_or_else(|| Error::Core(topdown_core::Error::RowNotFound(RowId::new(id))).into())
}

/// Execute the add command
pub async fn execute_add(app: &mut App, args: &AddArgs, output_mode: OutputMode) -> Result<()> {
    let id = match &args.id {
        Some(id) => RowId::new(id),
        None => {
            let prefix = app.settings().id_prefix.clone();
            app.store().generate_row_id(&prefix, &args.name)?
        }
    };

    let mut row = Row::new(id.clone(), args.name.clone())
        .with_args(args.args.clone())
        .with_depends(args.depends.iter().map(|d| d.trim().to_string()).filter(|d| !d.is_empty()))
        .locked(args.locked);
    row.expr.clone_from(&args.expr);
    row.scope.clone_from(&args.scope);
    row.sources.clone_from(&args.sources);
    row.notes.clone_from(&args.notes);

    let policy = app.policy();
    let report = app.store_mut().add_row(row, &policy)?;
    app.save().await?;

    report_mutation(
        &format!("Added row: {id}"),
        serde_json::json!({ "added": id }),
        Some(&report),
        output_mode,
    )
}

/// Execute the get command
pub fn execute_get(app: &App, args: &RowArgs, output_mode: OutputMode) -> Result<()> {
    let row = require_row(app, &args.id)?;
    output::print_row(row, output_mode)?;
    Ok(())
}

/// Execute the list command
pub fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let rows: Vec<_> = app
        .store()
        .rows()
        .iter()
        .filter(|row| args.scope.is_none() || row.scope == args.scope)
        .filter(|row| !args.pinned || row.pinned)
        .filter(|row| !args.locked || row.locked)
        .cloned()
        .collect();

    output::print_rows(&rows, output_mode)?;
    Ok(())
}

/// Build the core update from `set` flags.
pub(crate) fn build_update(args: &SetArgs) -> RowUpdate {
    let lock = if args.lock {
        Some(true)
    } else if args.unlock {
        Some(false)
    } else {
        None
    };

    RowUpdate {
        name: args.name.clone(),
        args: args.args.clone(),
        expr: args.expr.clone(),
        scope: if args.clear_scope {
            Some(None)
        } else {
            args.scope.clone().map(Some)
        },
        depends: if args.clear_depends {
            Some(Vec::new())
        } else {
            args.depends
                .as_ref()
                .map(|ids| ids.iter().map(|d| RowId::new(d.trim())).collect())
        },
        sources: args.sources.clone(),
        locked: lock,
        notes: if args.clear_notes {
            Some(None)
        } else {
            args.notes.clone().map(Some)
        },
        ..RowUpdate::default()
    }
}

/// Execute the set command
pub async fn execute_set(app: &mut App, args: &SetArgs, output_mode: OutputMode) -> Result<()> {
    let update = build_update(args);
    if update.is_empty() {
        anyhow::bail!("No changes specified for row {}", args.id);
    }

    let policy = app.policy();
    let report = app.store_mut().update_row(&args.id, &update, &policy)?;
    app.save().await?;

    report_mutation(
        &format!("Updated row: {}", args.id),
        serde_json::json!({ "updated": args.id }),
        Some(&report),
        output_mode,
    )
}

/// Execute the delete command
pub async fn execute_delete(app: &mut App, args: &RowArgs, output_mode: OutputMode) -> Result<()> {
    let policy = app.policy();
    let report = app.store_mut().delete_row(&args.id, &policy)?;
    app.save().await?;

    report_mutation(
        &format!("Deleted row: {}", args.id),
        serde_json::json!({ "deleted": args.id }),
        Some(&report),
        output_mode,
    )
}

/// Execute the duplicate command
pub async fn execute_duplicate(app: &mut App, args: &RowArgs, output_mode: OutputMode) -> Result<()> {
    let new_id = app.store_mut().duplicate_as_variant(&args.id)?;
    app.save().await?;

    report_mutation(
        &format!("Duplicated {} as {new_id}", args.id),
        serde_json::json!({ "source": args.id, "created": new_id }),
        None,
        output_mode,
    )
}

/// Execute the pin and unpin commands
pub async fn execute_pin(
    app: &mut App,
    args: &RowArgs,
    pinned: bool,
    output_mode: OutputMode,
) -> Result<()> {
    let index = app.store_mut().set_pinned(&args.id, pinned)?;
    app.save().await?;

    let verb = if pinned { "Pinned" } else { "Unpinned" };
    report_mutation(
        &format!("{verb} row: {}", args.id),
        serde_json::json!({ "id": args.id, "pinned": pinned, "index": index }),
        None,
        output_mode,
    )
}

/// Execute the deps command
pub fn execute_deps(app: &App, args: &RowArgs, output_mode: OutputMode) -> Result<()> {
    let row = require_row(app, &args.id)?;
    let graph = app.store().graph();
    let transitive = graph.transitive_dependencies(&args.id);
    let missing: Vec<&RowId> = row.depends.iter().filter(|d| !graph.contains(d.as_str())).collect();

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "id": row.id,
            "direct": row.depends,
            "transitive": transitive,
            "missing": missing,
        }))?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let list = |ids: &[RowId]| {
                if ids.is_empty() {
                    "(none)".to_string()
                } else {
                    ids.iter().map(RowId::as_str).collect::<Vec<_>>().join(", ")
                }
            };
            println!("Dependencies of {}", output::info(row.id.as_str(), &config));
            println!("  Direct:     {}", list(&row.depends));
            println!("  Transitive: {}", list(&transitive));
            for id in missing {
                println!("  {} {id}", output::error("Missing:", &config));
            }
        }
    }
    Ok(())
}

/// Execute the impact command
pub fn execute_impact(app: &App, args: &RowArgs, output_mode: OutputMode) -> Result<()> {
    require_row(app, &args.id)?;
    let store = app.store();
    let levels = store.graph().impact_levels(&args.id);

    let grouped: Vec<BTreeMap<&str, Vec<&RowId>>> = levels
        .iter()
        .map(|level| {
            let mut by_scope: BTreeMap<&str, Vec<&RowId>> = BTreeMap::new();
            for id in level {
                let scope = store
                    .row(id.as_str())
                    .and_then(|r| r.scope.as_deref())
                    .unwrap_or("(none)");
                by_scope.entry(scope).or_default().push(id);
            }
            by_scope
        })
        .collect();
    let total: usize = levels.iter().map(Vec::len).sum();

    match output_mode {
        OutputMode::Json => {
            let levels_json: Vec<_> = levels
                .iter()
                .zip(&grouped)
                .enumerate()
                .map(|(i, (rows, by_scope))| {
                    serde_json::json!({ "depth": i + 1, "rows": rows, "byScope": by_scope })
                })
                .collect();
            output::print_json(&serde_json::json!({
                "id": args.id,
                "total": total,
                "levels": levels_json,
            }))?;
        }
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            if total == 0 {
                println!("No rows depend on {}", output::info(&args.id, &config));
                return Ok(());
            }
            println!(
                "Changing {} affects {total} row(s):",
                output::info(&args.id, &config)
            );
            for (depth, by_scope) in grouped.iter().enumerate() {
                println!("  Level {}:", depth + 1);
                for (scope, ids) in by_scope {
                    let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                    println!("    [{scope}] {}", ids.join(", "));
                }
            }
        }
    }
    Ok(())
}

/// Execute the order command
pub fn execute_order(app: &App, output_mode: OutputMode) -> Result<()> {
    let order = app.store().graph().topological_sort();

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "order": order.order,
            "hasCycle": order.has_cycle,
        }))?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            for (i, id) in order.order.iter().enumerate() {
                println!("{:>4}. {}", i + 1, output::info(id.as_str(), &config));
            }
            if order.has_cycle {
                let left_out = app.store().rows().len().saturating_sub(order.order.len());
                println!(
                    "{} {left_out} row(s) in or behind a cycle are not ordered",
                    output::error("Cycle:", &config)
                );
            }
        }
    }
    Ok(())
}

/// Execute the cycles command
pub fn execute_cycles(app: &App, output_mode: OutputMode) -> Result<()> {
    let graph = app.store().graph();
    let cycles = graph.detect_cycles();
    let members = graph.rows_in_cycles();

    match output_mode {
        OutputMode::Json => output::print_json(&serde_json::json!({
            "cycles": cycles,
            "rows": members,
        }))?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            if cycles.is_empty() {
                println!("{}", output::success("No cycles found.", &config));
                return Ok(());
            }
            println!("Found {} cycle(s):", cycles.len());
            for cycle in &cycles {
                let path: Vec<&str> = cycle.iter().map(RowId::as_str).collect();
                println!("  {}", output::error(&path.join(" → "), &config));
            }
        }
    }
    Ok(())
}

/// The policy `validate` checks against.
///
/// Any error fails: cycles, missing dependencies and argument errors.
/// Warnings fail under `--strict` or `fail-on-warnings` in settings.
pub(crate) fn validation_policy(base: CommitPolicy, args: &ValidateArgs) -> CommitPolicy {
    if args.strict {
        return CommitPolicy::strict().with_locks(base.enforce_locks);
    }
    CommitPolicy {
        fail_on_cycle: true,
        fail_on_missing_deps: true,
        fail_on_args_errors: true,
        ..base
    }
}

/// Locked rows that no other row depends on, in row order.
pub(crate) fn unused_locked_rows(store: &Store) -> Vec<RowId> {
    let graph = store.graph();
    store
        .rows()
        .iter()
        .filter(|row| row.locked)
        .filter(|row| {
            graph
                .node(row.id.as_str())
                .is_none_or(|node| node.dependents.is_empty())
        })
        .map(|row| row.id.clone())
        .collect()
}

/// Execute the validate command
///
/// Prints the report, then fails (exit code 1) on any error, or on any
/// warning when strict.
pub fn execute_validate(app: &App, args: &ValidateArgs, output_mode: OutputMode) -> Result<()> {
    let report = app.store().validate();
    let unused_locked = unused_locked_rows(app.store());
    output::print_report(&report, &unused_locked, output_mode)?;

    let policy = validation_policy(app.policy(), args);
    if report.blocks(&policy) || (policy.fail_on_warnings && !unused_locked.is_empty()) {
        let mut parts = Vec::new();
        if !report.is_clean() {
            parts.push(report.summary());
        }
        if !unused_locked.is_empty() {
            parts.push(format!("{} unused locked row(s)", unused_locked.len()));
        }
        anyhow::bail!("Validation failed: {}", parts.join(", "));
    }
    Ok(())
}

/// Execute the history command
pub fn execute_history(app: &App, args: &HistoryArgs, output_mode: OutputMode) -> Result<()> {
    let store = app.store();
    let mut matches = match &args.kind {
        Some(kind) => store.history_by_kind(kind),
        None => store.history().iter().enumerate().collect(),
    };
    if let Some(text) = &args.search {
        let hits: Vec<usize> = store.search_history(text).into_iter().map(|(i, _)| i).collect();
        matches.retain(|(i, _)| hits.contains(i));
    }
    if let Some(limit) = args.limit {
        let skip = matches.len().saturating_sub(limit);
        matches.drain(..skip);
    }

    let playhead = store.playhead();
    let lines: Vec<HistoryLine<'_>> = matches
        .into_iter()
        .map(|(i, entry)| HistoryLine::new(i, entry, playhead))
        .collect();
    output::print_history(&lines, output_mode)?;
    Ok(())
}

/// Execute the playhead command
pub async fn execute_playhead(
    app: &mut App,
    args: &PlayheadArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let Some(action) = &args.action else {
        let playhead = app.store().playhead();
        let at_latest = app.store().is_at_latest();
        match output_mode {
            OutputMode::Json => output::print_json(&serde_json::json!({
                "playhead": playhead,
                "atLatest": at_latest,
            }))?,
            OutputMode::Text => match playhead {
                Some(index) if at_latest => println!("Playhead at #{index} (latest)"),
                Some(index) => println!("Playhead at #{index}"),
                None => println!("History is empty."),
            },
        }
        return Ok(());
    };

    let store = app.store_mut();
    let outcome = match action {
        PlayheadAction::Set { index } => store.set_playhead(*index),
        PlayheadAction::Clear => store.clear_playhead(),
        PlayheadAction::Prev => store.prev_entry(),
        PlayheadAction::Next => store.next_entry(),
    };

    match outcome {
        Outcome::Applied(index) => {
            app.save().await?;
            match output_mode {
                OutputMode::Json => output::print_json(&serde_json::json!({
                    "playhead": index,
                    "atLatest": app.store().is_at_latest(),
                }))?,
                OutputMode::Text => println!("Playhead at #{index}"),
            }
            Ok(())
        }
        Outcome::NoOp(reason) => Ok(output::print_noop("playhead", &reason, output_mode)?),
    }
}

/// Execute the restore command
pub async fn execute_restore(app: &mut App, args: &IndexArgs, output_mode: OutputMode) -> Result<()> {
    let outcome = app.store_mut().restore_to_index(args.index);
    finish_outcome(app, &format!("Restored entry #{}", args.index), outcome, output_mode).await
}

/// Execute the undo command
pub async fn execute_undo(app: &mut App, output_mode: OutputMode) -> Result<()> {
    let outcome = app.store_mut().undo();
    finish_outcome(app, "Undo", outcome, output_mode).await
}

/// Execute the diff command
pub fn execute_diff(app: &App, args: &IndexArgs, output_mode: OutputMode) -> Result<()> {
    match app.store().diff(args.index) {
        Outcome::Applied(diff) => output::print_diff(args.index, &diff, output_mode)?,
        Outcome::NoOp(reason) => output::print_noop("diff", &reason, output_mode)?,
    }
    Ok(())
}

/// Execute the bookmark command
pub async fn execute_bookmark(
    app: &mut App,
    args: &BookmarkArgs,
    output_mode: OutputMode,
) -> Result<()> {
    match &args.action {
        BookmarkAction::Add { name } => {
            let bookmark = app.store_mut().add_bookmark(name.clone())?;
            app.save().await?;
            report_mutation(
                &format!("Bookmarked {} rows as {} ({})", bookmark.rows_snapshot.len(), bookmark.id, bookmark.name),
                serde_json::json!({ "id": bookmark.id, "name": bookmark.name }),
                None,
                output_mode,
            )
        }
        BookmarkAction::List => Ok(output::print_bookmarks(app.store().bookmarks(), output_mode)?),
        BookmarkAction::Restore { id } => {
            let outcome = app.store_mut().restore_bookmark(id);
            finish_outcome(app, &format!("Restored bookmark {id}"), outcome, output_mode).await
        }
        BookmarkAction::Delete { id } => match app.store_mut().delete_bookmark(id) {
            Outcome::Applied(removed) => {
                app.save().await?;
                report_mutation(
                    &format!("Deleted bookmark {} ({})", removed.id, removed.name),
                    serde_json::json!({ "deleted": removed.id }),
                    None,
                    output_mode,
                )
            }
            Outcome::NoOp(reason) => Ok(output::print_noop("bookmark delete", &reason, output_mode)?),
        },
    }
}
