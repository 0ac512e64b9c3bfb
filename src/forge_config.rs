//! The feedstock configuration file (`conda-forge.yml`).
//!
//! Only the settings that influence the job matrix are read, every other key
//! of the file is ignored. Missing settings take their defaults.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use feedstock_ci_matrix::{DEFAULT_FALLBACK_DOCKER_IMAGE, MatrixContext, MatrixError};
use miette::Diagnostic;
use rattler_conda_types::Platform;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// The name of the configuration file in the feedstock root.
pub const FORGE_CONFIG_FILE: &str = "conda-forge.yml";

/// Errors while loading the feedstock configuration
#[derive(Debug, Error, Diagnostic)]
pub enum ForgeConfigError {
    #[error("Could not find config file {}", .0.display())]
    #[diagnostic(help(
        "Either you are not running inside the feedstock root, or there is no `conda-forge.yml` in it. Add an empty `conda-forge.yml` to the feedstock root if it's the latter."
    ))]
    NotFound(PathBuf),

    #[error("Could not read config file {}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Could not parse config file {}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Setting docker image in conda-forge.yml is removed now")]
    #[diagnostic(help("Use conda_build_config.yaml instead"))]
    DockerImageRemoved,

    #[error("Setting channels in conda-forge.yml is removed now")]
    #[diagnostic(help("Use conda_build_config.yaml instead"))]
    ChannelsRemoved,

    #[error("Cannot generate with matrix in conda-forge.yml")]
    #[diagnostic(help("Migrate the matrix to conda_build_config.yaml and try again"))]
    MatrixRemoved,

    #[error("Unknown noarch platform {platform}. Expected one of: {}", expected.join(", "))]
    UnknownNoarchPlatform {
        platform: String,
        expected: Vec<String>,
    },

    #[error("{0} is not a known platform")]
    #[diagnostic(help("platforms are written as `<os>_<arch>`, e.g. `linux_64`"))]
    InvalidPlatform(String),
}

/// `docker` settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// The image of linux jobs that do not pin `docker_image`
    pub fallback_image: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            fallback_image: DEFAULT_FALLBACK_DOCKER_IMAGE.to_string(),
        }
    }
}

/// `github_actions` settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GithubActionsConfig {
    pub self_hosted: bool,
    pub upload_packages: bool,
}

impl Default for GithubActionsConfig {
    fn default() -> Self {
        Self {
            self_hosted: false,
            upload_packages: true,
        }
    }
}

/// The matrix related settings of a feedstock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// The recipe directory, relative to the feedstock root
    pub recipe_dir: PathBuf,

    pub docker: DockerConfig,

    pub github_actions: GithubActionsConfig,

    /// Target platform to build platform, both as `<os>_<arch>`. Entries of
    /// the file are added to the defaults.
    #[serde(deserialize_with = "extend_default_build_platforms")]
    pub build_platform: BTreeMap<String, String>,

    /// The platforms that build noarch outputs
    #[serde(deserialize_with = "one_or_many")]
    pub noarch_platforms: Vec<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            recipe_dir: PathBuf::from("recipe"),
            docker: DockerConfig::default(),
            github_actions: GithubActionsConfig::default(),
            build_platform: default_build_platforms(),
            noarch_platforms: vec!["linux_64".to_string()],
        }
    }
}

fn default_build_platforms() -> BTreeMap<String, String> {
    [
        "linux_64",
        "linux_aarch64",
        "linux_ppc64le",
        "linux_s390x",
        "linux_armv7l",
        "win_64",
        "osx_64",
    ]
    .into_iter()
    .map(|platform| (platform.to_string(), platform.to_string()))
    .collect()
}

fn extend_default_build_platforms<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut platforms = default_build_platforms();
    if let Some(configured) = Option::<BTreeMap<String, String>>::deserialize(deserializer)? {
        platforms.extend(configured);
    }
    Ok(platforms)
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(platform) => vec![platform],
        OneOrMany::Many(platforms) => platforms,
    })
}

/// `linux_64` -> `linux-64`
fn parse_platform_key(key: &str) -> Option<Platform> {
    Platform::from_str(&key.replace('_', "-")).ok()
}

/// `linux-64` -> `linux_64`
fn platform_key(platform: Platform) -> String {
    platform.to_string().replace('-', "_")
}

impl ForgeConfig {
    /// Load the configuration of the feedstock at `feedstock_dir`, from
    /// `config_file` or `conda-forge.yml` in the feedstock root.
    pub fn load(
        feedstock_dir: &Path,
        config_file: Option<&Path>,
    ) -> Result<Self, ForgeConfigError> {
        let path = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| feedstock_dir.join(FORGE_CONFIG_FILE));
        if !path.is_file() {
            return Err(ForgeConfigError::NotFound(path));
        }

        let content = fs_err::read_to_string(&path)
            .map_err(|e| ForgeConfigError::IoError(path.clone(), e))?;
        let raw: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|source| ForgeConfigError::ParseError {
                path: path.clone(),
                source,
            })?;

        let config = Self::from_value(raw.clone()).map_err(|error| match error {
            ForgeConfigError::ParseError { source, .. } => ForgeConfigError::ParseError {
                path: path.clone(),
                source,
            },
            other => other,
        })?;

        if is_set(raw.get("matrix"))
            && !feedstock_dir
                .join(&config.recipe_dir)
                .join("conda_build_config.yaml")
                .exists()
        {
            return Err(ForgeConfigError::MatrixRemoved);
        }

        Ok(config)
    }

    /// Parse and validate the content of a configuration file.
    pub fn from_yaml_str(content: &str) -> Result<Self, ForgeConfigError> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|source| ForgeConfigError::ParseError {
                path: PathBuf::from(FORGE_CONFIG_FILE),
                source,
            })?;
        Self::from_value(raw)
    }

    fn from_value(raw: serde_yaml::Value) -> Result<Self, ForgeConfigError> {
        if is_set(raw.get("docker").and_then(|docker| docker.get("image"))) {
            return Err(ForgeConfigError::DockerImageRemoved);
        }
        if is_set(raw.get("channels")) {
            return Err(ForgeConfigError::ChannelsRemoved);
        }

        // an empty file is an empty configuration
        let config = if raw.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value::<Self>(raw).map_err(|source| ForgeConfigError::ParseError {
                path: PathBuf::from(FORGE_CONFIG_FILE),
                source,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ForgeConfigError> {
        for (target, build) in &self.build_platform {
            for key in [target, build] {
                if parse_platform_key(key).is_none() {
                    return Err(ForgeConfigError::InvalidPlatform(key.clone()));
                }
            }
        }

        for platform in &self.noarch_platforms {
            if !self.build_platform.contains_key(platform) {
                return Err(ForgeConfigError::UnknownNoarchPlatform {
                    platform: platform.clone(),
                    expected: self.build_platform.keys().cloned().collect(),
                });
            }
        }
        Ok(())
    }

    /// Every configured target platform, sorted by name.
    pub fn target_platforms(&self) -> Vec<Platform> {
        self.build_platform
            .keys()
            .filter_map(|key| parse_platform_key(key))
            .collect()
    }

    /// The context to expand the matrix of `target_platform` with.
    pub fn matrix_context(&self, target_platform: Platform) -> Result<MatrixContext, MatrixError> {
        let key = platform_key(target_platform);
        let build_platform = self
            .build_platform
            .get(&key)
            .and_then(|build| parse_platform_key(build))
            .ok_or_else(|| MatrixError::MissingBuildPlatform(target_platform.to_string()))?;

        Ok(MatrixContext {
            target_platform,
            build_platform,
            self_hosted: self.github_actions.self_hosted,
            fallback_docker_image: self.docker.fallback_image.clone(),
            upload: self.github_actions.upload_packages,
            keep_noarch: self.noarch_platforms.contains(&key),
        })
    }
}

/// Whether a setting is present with a non-empty value.
fn is_set(value: Option<&serde_yaml::Value>) -> bool {
    match value {
        None | Some(serde_yaml::Value::Null) => false,
        Some(serde_yaml::Value::Bool(b)) => *b,
        Some(serde_yaml::Value::String(s)) => !s.is_empty(),
        Some(serde_yaml::Value::Sequence(s)) => !s.is_empty(),
        Some(serde_yaml::Value::Mapping(m)) => !m.is_empty(),
        Some(_) => true,
    }
}
