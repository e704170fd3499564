use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::store::DEFAULT_BUSY_TIMEOUT;

pub const DEFAULT_STORE_FILE_NAME: &str = "sheetql.sqlite";
pub const BACKUP_EXTENSION_SUFFIX: &str = ".backup";
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 500;
pub const DEFAULT_SAMPLE_ROWS: usize = 3;
pub const DEFAULT_SQL_ROW_CAP: usize = 1_000;
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: PathBuf,
    pub backup: PathBuf,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// Store at `database` with its backup alongside as `<file name>.backup`.
    #[must_use]
    pub fn at(database: PathBuf) -> Self {
        let backup = backup_path_for(&database);
        Self {
            database,
            backup,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub report_path: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrospectionConfig {
    pub sample_rows: usize,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    /// Read from `api_key_env`; a missing key only fails once a request is made.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            temperature: 0.0,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionConfig {
    /// Rows beyond the cap are dropped and the result is flagged truncated.
    pub row_cap: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub paths: RuntimePaths,
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub introspection: IntrospectionConfig,
    pub completion: CompletionConfig,
    pub execution: ExecutionConfig,
}

/// Settings taken from the command line; `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub sample_rows: Option<usize>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<Duration>,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    out_dir_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let out_dir = match out_dir_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => home_dir.join(".sheetql").join("output"),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        out_dir: normalize_lexical(&out_dir),
    })
}

/// Builds the full configuration; `api_key` is the value already read from
/// the environment variable the overrides name.
pub fn resolve_app_config(
    paths: RuntimePaths,
    overrides: &ConfigOverrides,
    api_key: Option<String>,
) -> Result<AppConfig> {
    let database = match &overrides.database {
        Some(path) => resolve_user_path(path, &paths.home_dir, &paths.cwd)?,
        None => paths.out_dir.join(DEFAULT_STORE_FILE_NAME),
    };

    let sample_rows = overrides.sample_rows.unwrap_or(DEFAULT_SAMPLE_ROWS);
    let defaults = CompletionConfig::default();
    let completion = CompletionConfig {
        endpoint: overrides.endpoint.clone().unwrap_or(defaults.endpoint),
        model: overrides.model.clone().unwrap_or(defaults.model),
        api_key_env: overrides.api_key_env.clone().unwrap_or(defaults.api_key_env),
        api_key: api_key.filter(|key| !key.trim().is_empty()),
        temperature: defaults.temperature,
        timeout: overrides.timeout.unwrap_or(defaults.timeout),
    };

    Ok(AppConfig {
        store: StoreConfig::at(database),
        ingest: IngestConfig {
            report_path: ingest_report_path(&paths.out_dir),
            batch_size: DEFAULT_INSERT_BATCH_SIZE,
        },
        introspection: IntrospectionConfig { sample_rows },
        completion,
        execution: ExecutionConfig::default(),
        paths,
    })
}

/// Resolves a user-supplied path (`~`, relative) against the runtime paths.
pub fn resolve_input_path(path: &Path, paths: &RuntimePaths) -> Result<PathBuf> {
    resolve_user_path(path, &paths.home_dir, &paths.cwd)
}

#[must_use]
pub fn ingest_report_path(out_dir: &Path) -> PathBuf {
    out_dir.join("ingest").join("report.json")
}

#[must_use]
pub fn backup_path_for(database: &Path) -> PathBuf {
    let mut file_name = database
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| DEFAULT_STORE_FILE_NAME.into());
    file_name.push(BACKUP_EXTENSION_SUFFIX);
    database.with_file_name(file_name)
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigOverrides, DEFAULT_COMPLETION_MODEL, DEFAULT_SAMPLE_ROWS, backup_path_for,
        resolve_app_config, resolve_runtime_paths,
    };
    use std::path::Path;

    #[test]
    fn defaults_out_dir_under_sheetql_output() {
        let paths = resolve_runtime_paths(Path::new("/home/tester"), Path::new("/work/repo"), None)
            .expect("paths should resolve");

        assert_eq!(paths.home_dir, Path::new("/home/tester"));
        assert_eq!(paths.cwd, Path::new("/work/repo"));
        assert_eq!(paths.out_dir, Path::new("/home/tester/.sheetql/output"));
    }

    #[test]
    fn expands_tilde_override_against_home_dir() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("~/custom/output")),
        )
        .expect("tilde override should resolve");

        assert_eq!(paths.out_dir, Path::new("/home/tester/custom/output"));
    }

    #[test]
    fn resolves_relative_override_against_cwd() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("./artifacts/../artifacts/runs")),
        )
        .expect("relative override should resolve");

        assert_eq!(paths.out_dir, Path::new("/work/repo/artifacts/runs"));
    }

    #[test]
    fn rejects_non_absolute_home_dir() {
        let err = resolve_runtime_paths(Path::new("home/tester"), Path::new("/work/repo"), None)
            .expect_err("relative home dir must fail");

        assert!(
            err.to_string().contains("home_dir must be absolute"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_tilde_username_syntax() {
        let err = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("~someone/out")),
        )
        .expect_err("~username syntax must fail");

        assert!(
            err.to_string()
                .contains("unsupported home expansion syntax"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn app_config_places_store_backup_and_report_under_out_dir() {
        let paths = resolve_runtime_paths(Path::new("/home/tester"), Path::new("/work/repo"), None)
            .expect("paths should resolve");
        let config = resolve_app_config(paths, &ConfigOverrides::default(), None)
            .expect("config should resolve");

        assert_eq!(
            config.store.database,
            Path::new("/home/tester/.sheetql/output/sheetql.sqlite")
        );
        assert_eq!(
            config.store.backup,
            Path::new("/home/tester/.sheetql/output/sheetql.sqlite.backup")
        );
        assert_eq!(
            config.ingest.report_path,
            Path::new("/home/tester/.sheetql/output/ingest/report.json")
        );
        assert_eq!(config.introspection.sample_rows, DEFAULT_SAMPLE_ROWS);
        assert_eq!(config.completion.model, DEFAULT_COMPLETION_MODEL);
        assert_eq!(config.completion.api_key, None);
        assert_eq!(config.execution.row_cap, None);
    }

    #[test]
    fn database_override_resolves_against_cwd_and_blank_keys_are_dropped() {
        let paths = resolve_runtime_paths(Path::new("/home/tester"), Path::new("/work/repo"), None)
            .expect("paths should resolve");
        let overrides = ConfigOverrides {
            database: Some("data/cameras.db".into()),
            ..ConfigOverrides::default()
        };
        let config = resolve_app_config(paths, &overrides, Some("   ".to_string()))
            .expect("config should resolve");

        assert_eq!(config.store.database, Path::new("/work/repo/data/cameras.db"));
        assert_eq!(config.store.backup, Path::new("/work/repo/data/cameras.db.backup"));
        assert_eq!(config.completion.api_key, None);
    }

    #[test]
    fn backup_sits_next_to_the_store() {
        assert_eq!(
            backup_path_for(Path::new("/srv/camera_data.db")),
            Path::new("/srv/camera_data.db.backup")
        );
    }
}
