//! Maintenance orchestrator - the operations exposed to callers.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RunnerKind};
use crate::core::identifier::parse_schema_name;
use crate::core::{DbItemIdentifier, DialectCatalog, PreserveSet, Script};
use crate::dialect::ScriptDialect;
use crate::drivers::postgres::{self, PostgresCatalog, PostgresScriptRunner};
use crate::drivers::{CliScriptRunner, DatabaseCatalog, ScriptRunner};
use crate::error::{MaintainError, Result};
use crate::parser::StatementParser;
use crate::plan::{ExecutionPlan, PlanEntry};
use crate::reset::{ConstraintsDisabler, DbCleaner, DbClearer};
use crate::source::{FileSystemScriptSource, ScriptSource};
use crate::state::{ExecutedScript, ExecutedScriptInfoSource, PostgresExecutedScriptInfoSource};

/// Schema maintainer.
///
/// Owns the configuration and a handle to every collaborator. Operations run
/// one at a time; nothing here locks the database against other maintainers.
pub struct DbMaintainer {
    config: Config,
    dialect: ScriptDialect,
    source: Arc<dyn ScriptSource>,
    registry: Arc<dyn ExecutedScriptInfoSource>,
    catalog: Arc<dyn DatabaseCatalog>,
    constraints: Arc<dyn ConstraintsDisabler>,
    runner: Arc<dyn ScriptRunner>,
}

/// Switches for [`DbMaintainer::update_database`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Plan and parse, but execute nothing.
    pub dry_run: bool,
    /// Log and skip ERROR entries instead of aborting.
    pub force: bool,
}

/// One script run (or, in a dry run, one that would run).
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRun {
    pub file_name: String,
    pub reason: String,
    pub statements: usize,
}

/// Result of an update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub dry_run: bool,
    /// The database was cleared and rebuilt because of history conflicts.
    pub rebuilt_from_scratch: bool,
    pub scripts: Vec<ScriptRun>,
    pub skipped: usize,
    /// ERROR entries skipped under `force`.
    pub forced_conflicts: Vec<String>,
    /// Registry records without a repository script.
    pub orphans: Vec<String>,
}

impl UpdateReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a clear, clean or constraint-disabling run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    pub schemas: Vec<String>,
    pub constraints_disabled: usize,
    /// Dropped objects (clear) or emptied tables (clean).
    pub items: Vec<DbItemIdentifier>,
    pub registry_cleared: bool,
}

impl DbMaintainer {
    /// Assemble a maintainer from explicit collaborators.
    pub fn new(
        config: Config,
        source: Arc<dyn ScriptSource>,
        registry: Arc<dyn ExecutedScriptInfoSource>,
        catalog: Arc<dyn DatabaseCatalog>,
        constraints: Arc<dyn ConstraintsDisabler>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Result<Self> {
        let dialect = *DialectCatalog::with_builtins().require(&config.database.dialect)?;
        Ok(Self {
            config,
            dialect,
            source,
            registry,
            catalog,
            constraints,
            runner,
        })
    }

    /// Connect to the configured PostgreSQL database.
    ///
    /// Script locations are resolved against `base_dir`. The registry table is
    /// created when missing and `executed_scripts.auto_create` is set.
    pub async fn connect(config: Config, base_dir: &Path) -> Result<Self> {
        let dialect = *DialectCatalog::with_builtins().require(&config.database.dialect)?;
        if dialect.name != "postgres" {
            return Err(MaintainError::Config(format!(
                "no live driver for dialect '{}'; only postgres can be connected to",
                dialect.name
            )));
        }

        let pool = postgres::connect(&config.database).await?;
        let registry_object = config.registry_object();

        let registry = PostgresExecutedScriptInfoSource::new(
            pool.clone(),
            registry_object.schema.clone(),
            registry_object.name.clone(),
            config.executed_scripts.auto_create,
        );
        registry.init_schema().await?;

        let catalog = Arc::new(PostgresCatalog::new(pool.clone(), registry_object));
        let runner: Arc<dyn ScriptRunner> = match config.scripts.runner {
            RunnerKind::Direct => Arc::new(PostgresScriptRunner::new(pool)),
            RunnerKind::Cli => Arc::new(CliScriptRunner::new(
                &config.scripts.cli_command,
                &config.database,
            )?),
        };
        let source = FileSystemScriptSource::new(&config.scripts, config.registered_qualifiers())
            .with_base_dir(base_dir);

        info!(
            "Using {} scripts, {} registry, {} runner",
            source.describe(),
            registry.backend_type(),
            runner.runner_type()
        );

        Self::new(
            config,
            Arc::new(source),
            Arc::new(registry),
            catalog.clone(),
            catalog,
            runner,
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan, filter and reconcile.
    pub async fn plan(&self) -> Result<ExecutionPlan> {
        let scripts = self.source.load_scripts()?;
        let records = self.registry.get_executed_scripts().await?;
        info!(
            "Reconciling {} script(s) against {} executed record(s)",
            scripts.len(),
            records.len()
        );
        Ok(self.config.reconciler()?.plan(scripts, records))
    }

    /// Bring the database up to date.
    ///
    /// Every script to execute is parsed before the first one runs. Each script
    /// is registered as not successful, run, then updated with its outcome.
    /// The first failing statement stops the update.
    pub async fn update_database(&self, options: UpdateOptions) -> Result<UpdateReport> {
        let started_at = Utc::now();
        info!("Updating database {}", self.config.database.name);
        debug!("Config hash: {}", self.config.hash());

        let mut plan = self.plan().await?;
        let mut rebuilt_from_scratch = false;
        if self.config.scripts.from_scratch && plan.has_history_conflicts() {
            if options.dry_run {
                info!("Dry run: history conflicts would trigger a from-scratch rebuild");
                let scripts = self.source.load_scripts()?;
                plan = self.config.reconciler()?.plan(scripts, Vec::new());
            } else {
                warn!("History conflicts found, rebuilding the database from scratch");
                self.clear_database().await?;
                plan = self.plan().await?;
            }
            rebuilt_from_scratch = true;
        }

        let mut forced_conflicts = Vec::new();
        if let Some(conflicts) = plan.conflicts_error() {
            if !options.force {
                return Err(conflicts);
            }
            for entry in plan.errors() {
                warn!(
                    "Skipping {} despite conflict: {}",
                    entry.script.file_name, entry.reason
                );
                forced_conflicts.push(entry.script.file_name.clone());
            }
        }

        let parser = StatementParser::new(&self.dialect);
        let mut batches: Vec<(&PlanEntry, Vec<String>)> = Vec::new();
        for entry in plan.executions() {
            let statements = parser.parse(&entry.script.file_name, &entry.script.content)?;
            batches.push((entry, statements));
        }

        let mut scripts = Vec::with_capacity(batches.len());
        for (entry, statements) in &batches {
            if options.dry_run {
                info!("Would execute {} ({})", entry.script.file_name, entry.reason);
            } else {
                self.execute_script(&entry.script, statements).await?;
            }
            scripts.push(ScriptRun {
                file_name: entry.script.file_name.clone(),
                reason: entry.reason.to_string(),
                statements: statements.len(),
            });
        }

        let completed_at = Utc::now();
        let report = UpdateReport {
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            dry_run: options.dry_run,
            rebuilt_from_scratch,
            skipped: plan.entries.len() - scripts.len() - forced_conflicts.len(),
            scripts,
            forced_conflicts,
            orphans: plan.orphans.iter().map(|o| o.file_name.clone()).collect(),
        };

        if report.scripts.is_empty() {
            info!("Database is up to date");
        } else {
            info!(
                "{} {} script(s) in {:.1}s",
                if options.dry_run { "Planned" } else { "Executed" },
                report.scripts.len(),
                report.duration_seconds
            );
        }
        Ok(report)
    }

    async fn execute_script(&self, script: &Script, statements: &[String]) -> Result<()> {
        let mut record = ExecutedScript::pending(script);
        self.registry.register_executed_script(&record).await?;
        info!(
            "Executing {} ({} statement(s))",
            script.file_name,
            statements.len()
        );

        let outcomes = self.runner.run_script(script, statements).await?;
        if let Some(failed) = outcomes.iter().find(|o| !o.is_success()) {
            record.finish(false);
            self.registry.update_executed_script(&record).await?;
            let message = failed.error.clone().unwrap_or_default();
            error!("Script {} failed: {}", script.file_name, message);
            return Err(MaintainError::execution(
                &script.file_name,
                &failed.statement,
                message,
            ));
        }

        record.finish(true);
        self.registry.update_executed_script(&record).await?;
        Ok(())
    }

    /// Register every eligible script as executed without running anything.
    ///
    /// Existing records are replaced.
    pub async fn mark_database_as_up_to_date(&self) -> Result<usize> {
        let scripts = self.source.load_scripts()?;
        let plan = self.config.reconciler()?.plan(scripts, Vec::new());

        self.registry.clear_all_executed_scripts().await?;
        for entry in &plan.entries {
            self.registry
                .register_executed_script(&ExecutedScript::succeeded(&entry.script))
                .await?;
        }
        info!(
            "Marked {} script(s) as executed without running them",
            plan.entries.len()
        );
        Ok(plan.entries.len())
    }

    fn preserve_set(&self) -> Result<PreserveSet> {
        PreserveSet::from_config(
            &self.config.preserve,
            self.config.default_schema(),
            self.dialect.identifier_case,
            self.registry.registry_object(),
        )
    }

    /// Configured schemas, in catalog case, that are not preserved wholesale.
    fn schemas(&self, preserve: &PreserveSet) -> Result<Vec<String>> {
        let mut schemas = Vec::new();
        for entry in &self.config.database.schemas {
            let schema = parse_schema_name(entry, self.dialect.identifier_case)?;
            if !preserve.is_schema_preserved(&schema) {
                schemas.push(schema);
            }
        }
        Ok(schemas)
    }

    async fn disable_referential(&self, schemas: &[String]) -> Result<usize> {
        let mut disabled = 0;
        for schema in schemas {
            disabled += self
                .constraints
                .disable_referential_constraints(schema)
                .await?;
        }
        Ok(disabled)
    }

    /// Drop every unpreserved object and forget all executed scripts.
    pub async fn clear_database(&self) -> Result<ResetReport> {
        let preserve = self.preserve_set()?;
        let schemas = self.schemas(&preserve)?;
        let constraints_disabled = self.disable_referential(&schemas).await?;

        let clearer = DbClearer::new(self.catalog.as_ref(), &preserve);
        let mut items = Vec::new();
        for schema in &schemas {
            items.extend(clearer.clear_schema(schema).await?);
        }
        self.registry.clear_all_executed_scripts().await?;
        info!(
            "Cleared database: {} object(s) dropped, executed scripts forgotten",
            items.len()
        );

        Ok(ResetReport {
            schemas,
            constraints_disabled,
            items,
            registry_cleared: true,
        })
    }

    /// Delete the rows of every unpreserved table.
    pub async fn clean_database(&self) -> Result<ResetReport> {
        let preserve = self.preserve_set()?;
        let schemas = self.schemas(&preserve)?;
        let constraints_disabled = self.disable_referential(&schemas).await?;

        let cleaner = DbCleaner::new(self.catalog.as_ref(), &preserve);
        let mut items = Vec::new();
        for schema in &schemas {
            items.extend(cleaner.clean_schema(schema).await?);
        }

        Ok(ResetReport {
            schemas,
            constraints_disabled,
            items,
            registry_cleared: false,
        })
    }

    /// Disable referential and value constraints in every schema.
    pub async fn disable_constraints(&self) -> Result<ResetReport> {
        let preserve = self.preserve_set()?;
        let schemas = self.schemas(&preserve)?;
        let mut disabled = self.disable_referential(&schemas).await?;
        for schema in &schemas {
            disabled += self.constraints.disable_value_constraints(schema).await?;
        }
        Ok(ResetReport {
            schemas,
            constraints_disabled: disabled,
            ..Default::default()
        })
    }

    pub async fn mark_error_scripts_as_successful(&self) -> Result<usize> {
        let count = self.registry.mark_failed_scripts_as_successful().await?;
        info!("Marked {} failed script(s) as successful", count);
        Ok(count)
    }

    /// Forget failed executions so the scripts run again on the next update.
    pub async fn remove_error_scripts(&self) -> Result<usize> {
        let count = self.registry.remove_failed_scripts().await?;
        info!("Removed {} failed script record(s)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DbItemType, ScriptKind};
    use crate::drivers::InMemoryDatabase;
    use crate::plan::Reason;
    use crate::source::{InMemoryScriptSource, ScriptNameParser};
    use crate::state::InMemoryExecutedScriptInfoSource;

    const CONFIG: &str = r#"
database:
  host: localhost
  database: app
  user: app
scripts:
  qualifiers: [slow]
"#;

    struct Fixture {
        config: Config,
        registry: Arc<InMemoryExecutedScriptInfoSource>,
        db: Arc<InMemoryDatabase>,
    }

    impl Fixture {
        fn new(yaml: &str) -> Self {
            Self {
                config: Config::from_yaml(yaml).unwrap(),
                registry: Arc::new(InMemoryExecutedScriptInfoSource::default()),
                db: Arc::new(InMemoryDatabase::default()),
            }
        }

        fn maintainer(&self, files: &[(&str, &str)]) -> DbMaintainer {
            let parser = ScriptNameParser::new(
                &self.config.scripts,
                self.config.registered_qualifiers(),
            );
            let scripts = files
                .iter()
                .map(|(name, content)| parser.parse(name, content.to_string()).unwrap())
                .collect();
            DbMaintainer::new(
                self.config.clone(),
                Arc::new(InMemoryScriptSource::new(scripts)),
                self.registry.clone(),
                self.db.clone(),
                self.db.clone(),
                self.db.clone(),
            )
            .unwrap()
        }

        async fn records(&self) -> Vec<ExecutedScript> {
            self.registry.get_executed_scripts().await.unwrap()
        }
    }

    const V1: &[(&str, &str)] = &[
        ("01_person.sql", "create table person (id int);\ninsert into person values (1);"),
        ("02_orders.sql", "create table orders (id int);"),
        ("views.sql", "create view v_person as select * from person;"),
        ("postprocessing/01_grants.sql", "grant select on person to reporting;"),
    ];

    #[tokio::test]
    async fn test_first_update_executes_everything_in_order() {
        let fx = Fixture::new(CONFIG);
        let report = fx
            .maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let names: Vec<_> = report.scripts.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["01_person.sql", "02_orders.sql", "views.sql", "postprocessing/01_grants.sql"]
        );
        assert_eq!(report.scripts[0].statements, 2);
        assert_eq!(fx.db.executed_statements().unwrap().len(), 5);
        assert!(fx.records().await.iter().all(|r| r.succeeded));
        assert_eq!(fx.records().await.len(), 4);
    }

    #[tokio::test]
    async fn test_second_update_runs_only_post_processing() {
        let fx = Fixture::new(CONFIG);
        let maintainer = fx.maintainer(V1);
        maintainer.update_database(UpdateOptions::default()).await.unwrap();

        let report = maintainer.update_database(UpdateOptions::default()).await.unwrap();
        let names: Vec<_> = report.scripts.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["postprocessing/01_grants.sql"]);
        assert_eq!(report.skipped, 3);
        assert_eq!(fx.db.executed_statements().unwrap().len(), 6);
        assert_eq!(fx.records().await.len(), 4);
        assert!(maintainer.plan().await.unwrap().is_up_to_date());
    }

    #[tokio::test]
    async fn test_new_script_runs_with_post_processing() {
        let fx = Fixture::new(CONFIG);
        fx.maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let mut v2 = V1.to_vec();
        v2.push(("03_invoices.sql", "create table invoices (id int);"));
        let report = fx
            .maintainer(&v2)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let names: Vec<_> = report.scripts.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["03_invoices.sql", "postprocessing/01_grants.sql"]);
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let fx = Fixture::new(CONFIG);
        let report = fx
            .maintainer(V1)
            .update_database(UpdateOptions {
                dry_run: true,
                force: false,
            })
            .await
            .unwrap();

        assert_eq!(report.scripts.len(), 4);
        assert!(fx.db.executed_statements().unwrap().is_empty());
        assert!(fx.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_aborts_before_anything_runs() {
        let fx = Fixture::new(CONFIG);
        let files = [
            ("01_ok.sql", "create table ok (id int);"),
            ("02_broken.sql", "insert into ok values ('unterminated);"),
        ];
        let err = fx
            .maintainer(&files)
            .update_database(UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, MaintainError::Parse { .. }));
        assert!(fx.db.executed_statements().unwrap().is_empty());
        assert!(fx.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_blocks_until_removed() {
        let fx = Fixture::new(CONFIG);
        fx.db.fail_on("orders").unwrap();
        let err = fx
            .maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MaintainError::Execution { .. }));

        let records = fx.records().await;
        assert_eq!(records.len(), 2);
        let failed: Vec<_> = records.iter().filter(|r| !r.succeeded).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_name, "02_orders.sql");

        let maintainer = fx.maintainer(V1);
        let err = maintainer
            .update_database(UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MaintainError::ConflictsDetected { count: 1, .. }));

        assert_eq!(maintainer.remove_error_scripts().await.unwrap(), 1);
        let plan = maintainer.plan().await.unwrap();
        let orders = plan
            .entries
            .iter()
            .find(|e| e.script.file_name == "02_orders.sql")
            .unwrap();
        assert_eq!(orders.reason, Reason::New);
    }

    #[tokio::test]
    async fn test_mark_error_scripts_as_successful() {
        let fx = Fixture::new(CONFIG);
        fx.db.fail_on("orders").unwrap();
        let maintainer = fx.maintainer(V1);
        assert!(maintainer.update_database(UpdateOptions::default()).await.is_err());

        assert_eq!(maintainer.mark_error_scripts_as_successful().await.unwrap(), 1);
        assert!(fx.records().await.iter().all(|r| r.succeeded));
    }

    #[tokio::test]
    async fn test_modified_script_conflict_and_force() {
        let fx = Fixture::new(CONFIG);
        fx.maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let mut v2 = V1.to_vec();
        v2[0].1 = "create table person (id bigint);";
        v2.push(("03_invoices.sql", "create table invoices (id int);"));

        let err = fx
            .maintainer(&v2)
            .update_database(UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.exit_code(), 4);

        let report = fx
            .maintainer(&v2)
            .update_database(UpdateOptions {
                dry_run: false,
                force: true,
            })
            .await
            .unwrap();
        assert_eq!(report.forced_conflicts, vec!["01_person.sql"]);
        assert!(report
            .scripts
            .iter()
            .any(|s| s.file_name == "03_invoices.sql"));
    }

    #[tokio::test]
    async fn test_from_scratch_rebuilds_on_modified_history() {
        let yaml = format!("{}  from_scratch: true\n", CONFIG);
        let fx = Fixture::new(&yaml);
        fx.maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let mut v2 = V1.to_vec();
        v2[1].1 = "create table orders (id bigint);";
        let report = fx
            .maintainer(&v2)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        assert!(report.rebuilt_from_scratch);
        assert_eq!(report.scripts.len(), 4);
        let orders = fx
            .records()
            .await
            .into_iter()
            .find(|r| r.file_name == "02_orders.sql")
            .unwrap();
        assert_eq!(orders.checksum, crate::core::checksum(v2[1].1));
    }

    #[tokio::test]
    async fn test_mark_database_as_up_to_date() {
        let fx = Fixture::new(CONFIG);
        let maintainer = fx.maintainer(V1);
        assert_eq!(maintainer.mark_database_as_up_to_date().await.unwrap(), 4);

        assert!(fx.db.executed_statements().unwrap().is_empty());
        assert!(maintainer.plan().await.unwrap().is_up_to_date());
    }

    #[tokio::test]
    async fn test_excluded_qualifier_is_not_marked() {
        let yaml = format!("{}  exclude_qualifiers: [slow]\n", CONFIG);
        let fx = Fixture::new(&yaml);
        let mut files = V1.to_vec();
        files.push(("03_#slow_backfill.sql", "update person set id = id;"));

        let maintainer = fx.maintainer(&files);
        assert_eq!(maintainer.mark_database_as_up_to_date().await.unwrap(), 4);
        assert!(fx
            .records()
            .await
            .iter()
            .all(|r| r.file_name != "03_#slow_backfill.sql"));
    }

    #[tokio::test]
    async fn test_clear_database_keeps_registry_and_preserved_tables() {
        let yaml = format!("{}preserve:\n  tables: [orders]\n", CONFIG);
        let fx = Fixture::new(&yaml);
        fx.db.add_table("public", "dbmaintain_scripts", 4).unwrap();
        let maintainer = fx.maintainer(V1);
        maintainer.update_database(UpdateOptions::default()).await.unwrap();

        let report = maintainer.clear_database().await.unwrap();
        assert!(report.registry_cleared);
        assert_eq!(report.schemas, vec!["public"]);

        let remaining: Vec<_> = fx.db.items().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(remaining, vec!["dbmaintain_scripts", "orders"]);
        assert!(fx.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_database_matches_schemas_in_catalog_case() {
        let yaml = "database:\n  host: localhost\n  database: app\n  user: app\n  dialect: oracle\n  schemas: [app, stage]\npreserve:\n  schemas: [app]\n";
        let fx = Fixture::new(yaml);
        fx.db.add_table("APP", "ACCOUNTS", 1).unwrap();
        fx.db.add_table("STAGE", "IMPORTS", 1).unwrap();

        let report = fx.maintainer(&[]).clear_database().await.unwrap();
        assert_eq!(report.schemas, vec!["STAGE"]);
        assert_eq!(report.items.len(), 1);

        let remaining: Vec<_> = fx.db.items().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(remaining, vec!["ACCOUNTS"]);
    }

    #[tokio::test]
    async fn test_clean_database_disables_foreign_keys_first() {
        let fx = Fixture::new(CONFIG);
        fx.db.add_table("public", "parent", 2).unwrap();
        fx.db.add_table("public", "child", 2).unwrap();
        fx.db.add_foreign_key("public", "child", "parent").unwrap();

        let report = fx.maintainer(&[]).clean_database().await.unwrap();
        assert_eq!(report.constraints_disabled, 1);
        assert_eq!(report.items.len(), 2);
        assert!(report.items.iter().all(|i| i.item_type == DbItemType::Table));
        assert_eq!(fx.db.row_count("public", "parent").unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_disable_constraints_counts_both_kinds() {
        let fx = Fixture::new(CONFIG);
        fx.db.add_table("public", "parent", 0).unwrap();
        fx.db.add_table("public", "child", 0).unwrap();
        fx.db.add_foreign_key("public", "child", "parent").unwrap();
        fx.db.add_value_constraints("public", 2).unwrap();

        let report = fx.maintainer(&[]).disable_constraints().await.unwrap();
        assert_eq!(report.constraints_disabled, 3);
        assert_eq!(fx.db.foreign_key_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_plan_reports_orphans() {
        let fx = Fixture::new(CONFIG);
        fx.maintainer(V1)
            .update_database(UpdateOptions::default())
            .await
            .unwrap();

        let plan = fx.maintainer(&V1[..3]).plan().await.unwrap();
        assert_eq!(plan.orphans.len(), 1);
        assert_eq!(plan.orphans[0].file_name, "postprocessing/01_grants.sql");
        assert!(plan
            .entries
            .iter()
            .all(|e| e.script.kind != ScriptKind::PostProcessing));
    }
}
