//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeSet;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::{
    DbItemIdentifier, DbItemType, IdentifierCase, PreserveSet, Qualifier, QualifierEvaluator,
    ScriptIndexes,
};
use crate::error::Result;
use crate::plan::Reconciler;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, logged with each run.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Registered qualifier vocabulary. Patch qualifiers register themselves.
    pub fn registered_qualifiers(&self) -> BTreeSet<Qualifier> {
        self.scripts
            .qualifiers
            .iter()
            .chain(&self.scripts.patch_qualifiers)
            .map(|q| Qualifier::named(q))
            .collect()
    }

    pub fn patch_qualifiers(&self) -> BTreeSet<Qualifier> {
        self.scripts
            .patch_qualifiers
            .iter()
            .map(|q| Qualifier::named(q))
            .collect()
    }

    /// Evaluator for the include/exclude lists; unregistered names are errors.
    pub fn qualifier_evaluator(&self) -> Result<QualifierEvaluator> {
        QualifierEvaluator::new(
            &self.registered_qualifiers(),
            self.scripts
                .include_qualifiers
                .iter()
                .map(|q| Qualifier::from_config(q)),
            self.scripts
                .exclude_qualifiers
                .iter()
                .map(|q| Qualifier::from_config(q)),
        )
    }

    pub fn baseline(&self) -> Result<Option<ScriptIndexes>> {
        self.scripts
            .baseline_revision
            .as_deref()
            .map(str::parse::<ScriptIndexes>)
            .transpose()
    }

    /// Reconciliation settings for this configuration.
    pub fn reconciler(&self) -> Result<Reconciler> {
        Ok(Reconciler {
            evaluator: self.qualifier_evaluator()?,
            patch_qualifiers: self.patch_qualifiers(),
            allow_out_of_sequence_patches: self.scripts.allow_out_of_sequence_patches,
            modified_scripts: self.scripts.modified_scripts,
            baseline: self.baseline()?,
            database_name: self.database.name.clone(),
            postprocessing_dir: self.scripts.postprocessing_dir.clone(),
        })
    }

    /// Table holding the executed-script registry.
    pub fn registry_object(&self) -> DbItemIdentifier {
        let schema = self
            .executed_scripts
            .schema
            .clone()
            .unwrap_or_else(|| self.default_schema().to_string());
        DbItemIdentifier::new(DbItemType::Table, schema, self.executed_scripts.table.clone())
    }

    pub fn preserve_set(&self, case: IdentifierCase) -> Result<PreserveSet> {
        PreserveSet::from_config(
            &self.preserve,
            self.default_schema(),
            case,
            self.registry_object(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
database:
  host: localhost
  database: app
  user: app
"#;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.dialect, "postgres");
        assert_eq!(config.default_schema(), "public");
        assert_eq!(config.scripts.extensions, vec!["sql", "ddl"]);
        assert_eq!(config.scripts.modified_scripts, ModifiedScriptPolicy::Error);
        assert_eq!(
            config.registry_object(),
            DbItemIdentifier::new(DbItemType::Table, "public", "dbmaintain_scripts")
        );
        assert!(config.registered_qualifiers().contains(&Qualifier::named("patch")));
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
database:
  name: main
  dialect: postgres
  host: db.internal
  port: 6432
  database: app
  user: deploy
  password: secret
  schemas: [app, audit]
scripts:
  locations: [db/scripts]
  qualifiers: [slow, mysql]
  exclude_qualifiers: [slow]
  include_qualifiers: ["<unqualified>", patch]
  baseline_revision: "1.5"
  allow_out_of_sequence_patches: true
  modified_scripts: reexecute
  runner: cli
executed_scripts:
  table: schema_history
  schema: meta
preserve:
  tables: [countries]
  data_only_schemas: [reference]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.default_schema(), "app");
        assert_eq!(config.scripts.runner, RunnerKind::Cli);
        assert_eq!(config.baseline().unwrap(), Some(ScriptIndexes::of(&[1, 5])));

        let reconciler = config.reconciler().unwrap();
        assert!(reconciler.allow_out_of_sequence_patches);
        assert_eq!(reconciler.database_name, "main");
        assert!(!reconciler
            .evaluator
            .evaluate(&BTreeSet::from([Qualifier::named("slow")])));

        let preserve = config.preserve_set(IdentifierCase::Lower).unwrap();
        assert!(preserve.contains(&DbItemIdentifier::new(DbItemType::Table, "app", "countries")));
        assert!(preserve.contains(&DbItemIdentifier::new(
            DbItemType::Table,
            "meta",
            "schema_history"
        )));
    }

    #[test]
    fn test_hash_is_stable() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.hash(), config.clone().hash());
        assert_eq!(config.hash().len(), 64);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dbmaintain.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        assert_eq!(Config::load(&path).unwrap().database.database, "app");
        assert!(Config::load(dir.path().join("missing.yaml")).is_err());
    }
}
