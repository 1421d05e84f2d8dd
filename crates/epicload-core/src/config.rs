use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::availability::MissingDueDate;
use crate::error::EngineError;
use crate::hierarchy::DuplicatePolicy;
use crate::workload::NameMatching;

/// Relative location of the project config under the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".epicload/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub columns: ColumnConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
}

/// Header names of the WorkItems table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_hierarchy_column")]
    pub hierarchy: String,
    #[serde(default = "default_title_column")]
    pub title: String,
    #[serde(default = "default_parent_column")]
    pub parent: String,
    #[serde(default = "default_assignee_column")]
    pub assignee: String,
    #[serde(default = "default_start_date_column")]
    pub start_date: String,
    #[serde(default = "default_due_date_column")]
    pub due_date: String,
    /// Optional identifier columns, first present one wins.
    #[serde(default = "default_key_columns")]
    pub keys: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            hierarchy: default_hierarchy_column(),
            title: default_title_column(),
            parent: default_parent_column(),
            assignee: default_assignee_column(),
            start_date: default_start_date_column(),
            due_date: default_due_date_column(),
            keys: default_key_columns(),
        }
    }
}

impl ColumnConfig {
    /// Required headers in the order they are reported when missing.
    #[must_use]
    pub fn required(&self) -> [&str; 6] {
        [
            &self.hierarchy,
            &self.title,
            &self.parent,
            &self.assignee,
            &self.start_date,
            &self.due_date,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default = "default_name_column")]
    pub name: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            name: default_name_column(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default = "default_epic_level")]
    pub epic_level: String,
    #[serde(default)]
    pub duplicate_titles: DuplicatePolicy,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            epic_level: default_epic_level(),
            duplicate_titles: DuplicatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub names: NameMatching,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    #[serde(default)]
    pub missing_due_date: MissingDueDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_CONFIG_PATH);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&path, &content)
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("epicload/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&path, &content)
}

fn parse_config<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    toml::from_str::<T>(content).map_err(|err| {
        EngineError::ConfigParse {
            path: path.to_path_buf(),
            reason: err.message().to_string(),
        }
        .into()
    })
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_hierarchy_column() -> String {
    "Hierarchy".to_string()
}

fn default_title_column() -> String {
    "Title".to_string()
}

fn default_parent_column() -> String {
    "Parent".to_string()
}

fn default_assignee_column() -> String {
    "Assignee".to_string()
}

fn default_start_date_column() -> String {
    "StartDate".to_string()
}

fn default_due_date_column() -> String {
    "DueDate".to_string()
}

fn default_key_columns() -> Vec<String> {
    vec!["Work item key".to_string(), "Key".to_string()]
}

fn default_name_column() -> String {
    "Name".to_string()
}

fn default_epic_level() -> String {
    "Epic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project_config(root: &Path, content: &str) {
        let dir = root.join(".epicload");
        std::fs::create_dir_all(&dir).expect("create .epicload");
        std::fs::write(dir.join("config.toml"), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = TempDir::new().expect("tempdir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.columns.title, "Title");
        assert_eq!(cfg.columns.due_date, "DueDate");
        assert_eq!(cfg.team.name, "Name");
        assert_eq!(cfg.hierarchy.epic_level, "Epic");
        assert_eq!(cfg.hierarchy.duplicate_titles, DuplicatePolicy::Reject);
        assert_eq!(cfg.matching.names, NameMatching::Exact);
        assert_eq!(cfg.availability.missing_due_date, MissingDueDate::Ignore);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let root = TempDir::new().expect("tempdir");
        write_project_config(
            root.path(),
            r#"
[columns]
start_date = "Project Actual Start Date"
due_date = "Due date"

[hierarchy]
duplicate_titles = "first-wins"

[matching]
names = "normalized"
"#,
        );

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.columns.start_date, "Project Actual Start Date");
        assert_eq!(cfg.columns.due_date, "Due date");
        assert_eq!(cfg.columns.parent, "Parent");
        assert_eq!(cfg.hierarchy.duplicate_titles, DuplicatePolicy::FirstWins);
        assert_eq!(cfg.hierarchy.epic_level, "Epic");
        assert_eq!(cfg.matching.names, NameMatching::Normalized);
    }

    #[test]
    fn malformed_config_reports_engine_error() {
        let root = TempDir::new().expect("tempdir");
        write_project_config(root.path(), "[hierarchy]\nduplicate_titles = \"coin-flip\"\n");

        let err = load_project_config(root.path()).expect_err("should fail");
        let engine = err
            .downcast_ref::<EngineError>()
            .expect("engine error must be preserved");
        assert_eq!(engine.error_code(), crate::error::ErrorCode::ConfigParseError);
    }

    #[test]
    fn required_columns_follow_configured_names() {
        let mut columns = ColumnConfig::default();
        columns.due_date = "Due date".to_string();
        assert_eq!(
            columns.required(),
            ["Hierarchy", "Title", "Parent", "Assignee", "StartDate", "Due date"]
        );
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn env_format_overrides_user_config() {
        let output = resolve_output(false, Some("json".to_string()), Some("TEXT".to_string()));
        assert_eq!(output, "text");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()));
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("human".to_string()), Some("table".to_string()));
        assert_eq!(text, "text");
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\n").expect("parse");
        assert_eq!(cfg.output, Some("json".to_string()));
    }
}
