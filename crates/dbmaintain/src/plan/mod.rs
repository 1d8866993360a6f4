//! Reconciliation of repository scripts against the executed-script registry.
//!
//! [`Reconciler::plan`] diffs the eligible repository scripts against the
//! registry and produces an [`ExecutionPlan`]: one EXECUTE, SKIP or ERROR entry
//! per script, in execution order, plus the registry records that no longer
//! match any repository script.
//!
//! Conflicts are never downgraded here. Changed or out-of-order history is an
//! ERROR entry unless configuration explicitly opts into re-execution or
//! out-of-sequence patches; whether ERROR entries abort the run is the caller's
//! decision.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ModifiedScriptPolicy;
use crate::core::{Qualifier, QualifierEvaluator, Script, ScriptIndexes, ScriptKey, ScriptKind};
use crate::error::MaintainError;
use crate::state::ExecutedScript;

/// What happens to a script in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Execute,
    Skip,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Execute => f.write_str("EXECUTE"),
            Action::Skip => f.write_str("SKIP"),
            Action::Error => f.write_str("ERROR"),
        }
    }
}

/// Why a script got its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Reason {
    /// Never executed before.
    New,
    /// Repeatable script whose content changed.
    Changed,
    /// Repeatable script whose last run did not succeed.
    RetryFailed,
    /// Post-processing script, run on every update.
    PostProcessing,
    /// Changed incremental script re-run under the `reexecute` policy.
    Reexecute { recorded_checksum: String },
    /// Lower-indexed patch allowed to run after a higher index.
    OutOfSequencePatch { executed: String },
    AlreadyExecuted,
    Unchanged,
    BelowBaseline,
    ModifiedScript { recorded_checksum: String },
    OutOfOrder { executed: String },
    PreviousFailure,
}

impl Reason {
    pub fn action(&self) -> Action {
        match self {
            Reason::New
            | Reason::Changed
            | Reason::RetryFailed
            | Reason::PostProcessing
            | Reason::Reexecute { .. }
            | Reason::OutOfSequencePatch { .. } => Action::Execute,
            Reason::AlreadyExecuted
            | Reason::Unchanged
            | Reason::BelowBaseline => Action::Skip,
            Reason::ModifiedScript { .. }
            | Reason::OutOfOrder { .. }
            | Reason::PreviousFailure => Action::Error,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::New => f.write_str("new script"),
            Reason::Changed => f.write_str("repeatable script changed"),
            Reason::RetryFailed => f.write_str("previous run failed"),
            Reason::PostProcessing => f.write_str("post-processing"),
            Reason::Reexecute { .. } => f.write_str("modified, re-executing"),
            Reason::OutOfSequencePatch { executed } => {
                write!(f, "out-of-sequence patch (after {})", executed)
            }
            Reason::AlreadyExecuted => f.write_str("already executed"),
            Reason::Unchanged => f.write_str("unchanged"),
            Reason::BelowBaseline => f.write_str("below baseline revision"),
            Reason::ModifiedScript { .. } => f.write_str("modified since execution"),
            Reason::OutOfOrder { executed } => {
                write!(f, "lower index than executed script {}", executed)
            }
            Reason::PreviousFailure => f.write_str("failed in a previous run"),
        }
    }
}

/// One planned script.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub script: Script,
    pub action: Action,
    #[serde(flatten)]
    pub reason: Reason,
}

impl PlanEntry {
    fn new(script: Script, reason: Reason) -> Self {
        Self {
            action: reason.action(),
            script,
            reason,
        }
    }

    /// The conflict behind an ERROR entry.
    pub fn conflict(&self) -> Option<MaintainError> {
        let script = self.script.file_name.clone();
        match &self.reason {
            Reason::ModifiedScript { recorded_checksum } => Some(MaintainError::ModifiedScript {
                script,
                recorded: recorded_checksum.clone(),
                current: self.script.checksum.clone(),
            }),
            Reason::OutOfOrder { executed } => Some(MaintainError::OutOfOrder {
                script,
                executed: executed.clone(),
            }),
            Reason::PreviousFailure => Some(MaintainError::PreviousFailure(script)),
            _ => None,
        }
    }
}

/// Ordered plan for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPlan {
    pub entries: Vec<PlanEntry>,
    /// Registry records with no matching repository script. Reported only.
    pub orphans: Vec<ExecutedScript>,
}

impl ExecutionPlan {
    pub fn executions(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.action == Action::Execute)
    }

    pub fn errors(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.action == Action::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Nothing but the post-processing scripts would run.
    pub fn is_up_to_date(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.action == Action::Skip || e.reason == Reason::PostProcessing)
    }

    /// Modified or out-of-order history, the conflicts a from-scratch
    /// update resolves by rebuilding the database.
    pub fn has_history_conflicts(&self) -> bool {
        self.errors().any(|e| {
            matches!(
                e.reason,
                Reason::ModifiedScript { .. } | Reason::OutOfOrder { .. }
            )
        })
    }

    /// All ERROR entries folded into one error, if any.
    pub fn conflicts_error(&self) -> Option<MaintainError> {
        let details: Vec<String> = self
            .errors()
            .filter_map(PlanEntry::conflict)
            .map(|e| format!("  - {}", e))
            .collect();
        if details.is_empty() {
            return None;
        }
        Some(MaintainError::ConflictsDetected {
            count: details.len(),
            details: details.join("\n"),
        })
    }
}

/// Reconciliation settings for one run.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub evaluator: QualifierEvaluator,
    pub patch_qualifiers: BTreeSet<Qualifier>,
    pub allow_out_of_sequence_patches: bool,
    pub modified_scripts: ModifiedScriptPolicy,
    pub baseline: Option<ScriptIndexes>,
    /// Logical database name; scripts targeting another database are ignored.
    pub database_name: String,
    pub postprocessing_dir: String,
}

impl Reconciler {
    /// Plain settings: every script eligible, no overrides.
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            evaluator: QualifierEvaluator::accept_all(),
            patch_qualifiers: BTreeSet::from([Qualifier::named("patch")]),
            allow_out_of_sequence_patches: false,
            modified_scripts: ModifiedScriptPolicy::Error,
            baseline: None,
            database_name: database_name.into(),
            postprocessing_dir: "postprocessing".to_string(),
        }
    }

    fn targets_this_database(&self, target: Option<&str>) -> bool {
        target.map_or(true, |t| t.eq_ignore_ascii_case(&self.database_name))
    }

    fn below_baseline(&self, indexes: &ScriptIndexes) -> bool {
        self.baseline.as_ref().is_some_and(|b| indexes < b)
    }

    /// Whether an unmatched record came from an incremental script.
    fn record_is_incremental(&self, record: &ExecutedScript) -> bool {
        let in_postprocessing = record
            .file_name
            .split('/')
            .rev()
            .skip(1)
            .any(|d| d.eq_ignore_ascii_case(&self.postprocessing_dir));
        record.indexes.is_indexed() && !in_postprocessing
    }

    /// Diff `scripts` against `records`.
    pub fn plan(&self, scripts: Vec<Script>, records: Vec<ExecutedScript>) -> ExecutionPlan {
        let repository: HashSet<ScriptKey> = scripts.iter().map(Script::key).collect();
        let kinds: HashMap<ScriptKey, ScriptKind> =
            scripts.iter().map(|s| (s.key(), s.kind)).collect();

        let mut eligible: Vec<Script> = scripts
            .into_iter()
            .filter(|s| self.targets_this_database(s.target_database.as_deref()))
            .filter(|s| {
                let ok = self.evaluator.evaluate(&s.qualifiers);
                if !ok {
                    debug!("Skipping {}: excluded by qualifiers", s.file_name);
                }
                ok
            })
            .collect();
        eligible.sort_by(|a, b| {
            (a.kind == ScriptKind::PostProcessing, &a.indexes, &a.file_name).cmp(&(
                b.kind == ScriptKind::PostProcessing,
                &b.indexes,
                &b.file_name,
            ))
        });

        let records: Vec<ExecutedScript> = records
            .into_iter()
            .filter(|r| self.targets_this_database(r.target_database.as_deref()))
            .collect();

        // Highest successful incremental record above the baseline.
        let highest = records
            .iter()
            .filter(|r| r.succeeded && !self.below_baseline(&r.indexes))
            .filter(|r| match kinds.get(&r.key()) {
                Some(kind) => *kind == ScriptKind::Incremental,
                None => self.record_is_incremental(r),
            })
            .max_by(|a, b| a.indexes.cmp(&b.indexes));

        let by_key: HashMap<ScriptKey, &ExecutedScript> =
            records.iter().map(|r| (r.key(), r)).collect();

        let mut entries = Vec::with_capacity(eligible.len());
        let mut post_processing = Vec::new();

        for script in eligible {
            let record = by_key.get(&script.key()).copied();
            match script.kind {
                ScriptKind::Incremental => {
                    let reason = self.plan_incremental(&script, record, highest);
                    entries.push(PlanEntry::new(script, reason));
                }
                ScriptKind::Repeatable => {
                    let reason = plan_repeatable(&script, record);
                    entries.push(PlanEntry::new(script, reason));
                }
                ScriptKind::PostProcessing => post_processing.push(script),
            }
        }

        entries.extend(
            post_processing
                .into_iter()
                .map(|script| PlanEntry::new(script, Reason::PostProcessing)),
        );

        let orphans: Vec<ExecutedScript> = records
            .into_iter()
            .filter(|r| !repository.contains(&r.key()))
            .collect();
        for orphan in &orphans {
            info!(
                "Executed script {} is no longer in the repository",
                orphan.file_name
            );
        }

        ExecutionPlan { entries, orphans }
    }

    fn plan_incremental(
        &self,
        script: &Script,
        record: Option<&ExecutedScript>,
        highest: Option<&ExecutedScript>,
    ) -> Reason {
        if self.below_baseline(&script.indexes) {
            return Reason::BelowBaseline;
        }

        match record {
            Some(record) if !record.succeeded => Reason::PreviousFailure,
            Some(record) if record.checksum != script.checksum => match self.modified_scripts {
                ModifiedScriptPolicy::Error => Reason::ModifiedScript {
                    recorded_checksum: record.checksum.clone(),
                },
                ModifiedScriptPolicy::Reexecute => {
                    warn!(
                        "Script {} was modified after execution and will be executed again",
                        script.file_name
                    );
                    Reason::Reexecute {
                        recorded_checksum: record.checksum.clone(),
                    }
                }
            },
            Some(_) => Reason::AlreadyExecuted,
            None => match highest {
                Some(executed) if script.indexes < executed.indexes => {
                    if self.allow_out_of_sequence_patches
                        && script.is_patch(&self.patch_qualifiers)
                    {
                        warn!(
                            "Patch script {} runs out of sequence after {}",
                            script.file_name, executed.file_name
                        );
                        Reason::OutOfSequencePatch {
                            executed: executed.file_name.clone(),
                        }
                    } else {
                        Reason::OutOfOrder {
                            executed: executed.file_name.clone(),
                        }
                    }
                }
                _ => Reason::New,
            },
        }
    }
}

fn plan_repeatable(script: &Script, record: Option<&ExecutedScript>) -> Reason {
    match record {
        None => Reason::New,
        Some(record) if !record.succeeded => Reason::RetryFailed,
        Some(record) if record.checksum != script.checksum => Reason::Changed,
        Some(_) => Reason::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(file_name: &str, indexes: &[u64], content: &str) -> Script {
        script_with(file_name, ScriptIndexes::of(indexes), &[], content)
    }

    fn script_with(
        file_name: &str,
        indexes: ScriptIndexes,
        qualifiers: &[&str],
        content: &str,
    ) -> Script {
        let kind = if file_name.starts_with("postprocessing/") {
            ScriptKind::PostProcessing
        } else if indexes.is_indexed() {
            ScriptKind::Incremental
        } else {
            ScriptKind::Repeatable
        };
        Script::new(
            file_name,
            indexes,
            qualifiers.iter().map(|q| Qualifier::named(q)).collect(),
            None,
            "",
            kind,
            content,
        )
    }

    fn done(script: &Script) -> ExecutedScript {
        ExecutedScript::succeeded(script)
    }

    fn actions(plan: &ExecutionPlan) -> Vec<(&str, Action)> {
        plan.entries
            .iter()
            .map(|e| (e.script.file_name.as_str(), e.action))
            .collect()
    }

    #[test]
    fn test_empty_registry_executes_in_order() {
        let plan = Reconciler::new("default").plan(
            vec![script("2_b.sql", &[2], "B"), script("1_a.sql", &[1], "A")],
            vec![],
        );
        assert_eq!(
            actions(&plan),
            vec![("1_a.sql", Action::Execute), ("2_b.sql", Action::Execute)]
        );
        assert!(plan.entries.iter().all(|e| e.reason == Reason::New));
    }

    #[test]
    fn test_unchanged_history_is_skipped() {
        let a = script("1_a.sql", &[1], "A");
        let plan = Reconciler::new("default").plan(vec![a.clone()], vec![done(&a)]);
        assert_eq!(plan.entries[0].reason, Reason::AlreadyExecuted);
        assert!(plan.is_up_to_date());
    }

    #[test]
    fn test_modified_script_is_error() {
        let executed = script("1_a.sql", &[1], "H1");
        let current = script("1_a.sql", &[1], "H2");
        let plan = Reconciler::new("default").plan(vec![current], vec![done(&executed)]);

        assert_eq!(plan.entries[0].action, Action::Error);
        assert!(matches!(
            plan.entries[0].conflict(),
            Some(MaintainError::ModifiedScript { .. })
        ));
        assert!(plan.has_history_conflicts());
    }

    #[test]
    fn test_modified_script_reexecute_policy() {
        let executed = script("1_a.sql", &[1], "H1");
        let current = script("1_a.sql", &[1], "H2");
        let mut reconciler = Reconciler::new("default");
        reconciler.modified_scripts = ModifiedScriptPolicy::Reexecute;
        let plan = reconciler.plan(vec![current], vec![done(&executed)]);
        assert_eq!(plan.entries[0].action, Action::Execute);
        assert!(matches!(plan.entries[0].reason, Reason::Reexecute { .. }));
    }

    #[test]
    fn test_lower_index_after_higher_is_out_of_order() {
        let b = script("2_b.sql", &[2], "B");
        let a = script("1_a.sql", &[1], "A");
        let plan = Reconciler::new("default").plan(vec![a, b.clone()], vec![done(&b)]);

        assert_eq!(
            actions(&plan),
            vec![("1_a.sql", Action::Error), ("2_b.sql", Action::Skip)]
        );
        assert_eq!(
            plan.entries[0].reason,
            Reason::OutOfOrder {
                executed: "2_b.sql".to_string()
            }
        );
        let err = plan.conflicts_error().unwrap();
        assert!(matches!(err, MaintainError::ConflictsDetected { count: 1, .. }));
    }

    #[test]
    fn test_out_of_sequence_patch_allowed_when_configured() {
        let b = script("2_b.sql", &[2], "B");
        let fix = script_with("1_#patch_fix.sql", ScriptIndexes::of(&[1]), &["patch"], "F");
        let mut reconciler = Reconciler::new("default");

        let plan = reconciler.plan(vec![fix.clone(), b.clone()], vec![done(&b)]);
        assert_eq!(plan.entries[0].action, Action::Error);

        reconciler.allow_out_of_sequence_patches = true;
        let plan = reconciler.plan(vec![fix, b.clone()], vec![done(&b)]);
        assert_eq!(plan.entries[0].action, Action::Execute);
        assert!(!plan.has_errors());
    }

    #[test]
    fn test_previous_failure_is_error_until_resolved() {
        let a = script("1_a.sql", &[1], "A");
        let plan =
            Reconciler::new("default").plan(vec![a.clone()], vec![ExecutedScript::pending(&a)]);
        assert_eq!(plan.entries[0].reason, Reason::PreviousFailure);
        assert!(!plan.has_history_conflicts());
    }

    #[test]
    fn test_baseline_skips_older_scripts() {
        let old = script("1_old.sql", &[1], "O");
        let new = script("3_new.sql", &[3], "N");
        let mut reconciler = Reconciler::new("default");
        reconciler.baseline = Some(ScriptIndexes::of(&[2]));
        let plan = reconciler.plan(vec![old, new], vec![]);
        assert_eq!(plan.entries[0].reason, Reason::BelowBaseline);
        assert_eq!(plan.entries[1].reason, Reason::New);
    }

    #[test]
    fn test_repeatable_scripts_rerun_on_change() {
        let v1 = script_with("views.sql", ScriptIndexes::new(vec![None]), &[], "V1");
        let v2 = script_with("views.sql", ScriptIndexes::new(vec![None]), &[], "V2");
        let reconciler = Reconciler::new("default");

        let plan = reconciler.plan(vec![v1.clone()], vec![done(&v1)]);
        assert_eq!(plan.entries[0].reason, Reason::Unchanged);

        let plan = reconciler.plan(vec![v2], vec![done(&v1)]);
        assert_eq!(plan.entries[0].reason, Reason::Changed);
    }

    #[test]
    fn test_repeatable_does_not_trigger_out_of_order() {
        let views = script_with("1_x/views.sql", ScriptIndexes::new(vec![Some(1), None]), &[], "V");
        let next = script("2_next.sql", &[2], "N");
        let plan = Reconciler::new("default").plan(vec![next.clone(), views.clone()], vec![done(&views)]);
        assert_eq!(plan.entries[1].reason, Reason::New);
        assert!(!plan.has_errors());
    }

    #[test]
    fn test_post_processing_runs_last_on_every_update() {
        let a = script("1_a.sql", &[1], "A");
        let grants = script_with(
            "postprocessing/grants.sql",
            ScriptIndexes::new(vec![None, None]),
            &[],
            "G",
        );
        let reconciler = Reconciler::new("default");

        let plan = reconciler.plan(vec![grants.clone(), a.clone()], vec![]);
        assert_eq!(
            actions(&plan),
            vec![
                ("1_a.sql", Action::Execute),
                ("postprocessing/grants.sql", Action::Execute)
            ]
        );

        let plan = reconciler.plan(vec![grants.clone(), a.clone()], vec![done(&a), done(&grants)]);
        assert_eq!(
            actions(&plan),
            vec![
                ("1_a.sql", Action::Skip),
                ("postprocessing/grants.sql", Action::Execute)
            ]
        );
        assert_eq!(plan.entries[1].reason, Reason::PostProcessing);
        assert!(plan.is_up_to_date());
    }

    #[test]
    fn test_post_processing_records_do_not_count_as_highest() {
        let pp = script_with(
            "postprocessing/01_grants.sql",
            ScriptIndexes::new(vec![None, Some(1)]),
            &[],
            "G",
        );
        let a = script("1_a.sql", &[1], "A");
        let plan = Reconciler::new("default").plan(vec![a], vec![done(&pp)]);
        assert_eq!(plan.entries[0].reason, Reason::New);
        assert_eq!(plan.orphans.len(), 1);
    }

    #[test]
    fn test_qualifier_filter_and_target_database() {
        let registered = BTreeSet::from([Qualifier::named("slow")]);
        let mut reconciler = Reconciler::new("main");
        reconciler.evaluator =
            QualifierEvaluator::new(&registered, vec![], vec![Qualifier::named("slow")]).unwrap();

        let slow = script_with("1_#slow_load.sql", ScriptIndexes::of(&[1]), &["slow"], "S");
        let mut other_db = script("2_other.sql", &[2], "O");
        other_db.target_database = Some("reporting".to_string());
        let plain = script("3_plain.sql", &[3], "P");

        let plan = reconciler.plan(vec![slow, other_db.clone(), plain], vec![done(&other_db)]);
        assert_eq!(actions(&plan), vec![("3_plain.sql", Action::Execute)]);
        // records of other databases are not orphans
        assert!(plan.orphans.is_empty());
    }

    #[test]
    fn test_orphaned_history_is_reported_not_acted_on() {
        let gone = script("1_gone.sql", &[1], "G");
        let b = script("2_b.sql", &[2], "B");
        let plan = Reconciler::new("default").plan(vec![b], vec![done(&gone)]);
        assert_eq!(plan.orphans.len(), 1);
        assert_eq!(plan.orphans[0].file_name, "1_gone.sql");
        assert_eq!(plan.entries[0].action, Action::Execute);
    }
}
