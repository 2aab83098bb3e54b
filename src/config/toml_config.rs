use crate::utils::error::{BlingError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder in `runtime.entrypoint` replaced by the listening port.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Two-stage image recipe, normally read from `image.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub image: ImageSection,
    pub build: BuildStageConfig,
    pub runtime: RuntimeStageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSection {
    pub name: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStageConfig {
    pub base: String,
    pub workdir: Option<String>,
    pub requirements: Option<String>,
    /// Toolchain setup; only meaningful inside a container build.
    #[serde(default)]
    pub install: Vec<String>,
    /// Data-preparation commands; every one must exit 0.
    pub steps: Vec<String>,
    /// The single file that crosses into the runtime stage.
    pub artifact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStageConfig {
    pub base: String,
    pub requirements: Option<String>,
    #[serde(default)]
    pub install: Vec<String>,
    /// Application paths copied from the build context.
    pub copy: Vec<String>,
    pub entrypoint: Vec<String>,
    #[serde(default = "default_port_env")]
    pub port_env: String,
    #[serde(default = "default_port")]
    pub default_port: u16,
}

fn default_port_env() -> String {
    "PORT".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ImageConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${BASE_IMAGE})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            BlingError::ConfigError {
                message: format!("Invalid substitution pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn tag(&self) -> &str {
        self.image.tag.as_deref().unwrap_or("latest")
    }

    /// `name:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image.name, self.tag())
    }

    /// `name-tag`, used for the local image directory and archive.
    pub fn bundle_name(&self) -> String {
        format!("{}-{}", self.image.name, self.tag())
    }

    pub fn build_workdir(&self) -> &str {
        self.build.workdir.as_deref().unwrap_or("/app")
    }

    /// Entrypoint with the placeholder replaced by `port`.
    pub fn entrypoint_for(&self, port: &str) -> Vec<String> {
        self.runtime
            .entrypoint
            .iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, port))
            .collect()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("image.name", &self.image.name)?;
        validation::validate_non_empty_string("build.base", &self.build.base)?;
        validation::validate_non_empty_string("runtime.base", &self.runtime.base)?;
        validation::validate_relative_path("build.artifact", &self.build.artifact)?;

        if self.build.steps.is_empty() {
            return Err(BlingError::MissingConfigError {
                field: "build.steps".to_string(),
            });
        }
        if self.runtime.entrypoint.is_empty() {
            return Err(BlingError::MissingConfigError {
                field: "runtime.entrypoint".to_string(),
            });
        }
        for path in &self.runtime.copy {
            validation::validate_relative_path("runtime.copy", path)?;
        }

        let env_ok = self
            .runtime
            .port_env
            .chars()
            .enumerate()
            .all(|(i, c)| c == '_' || c.is_ascii_uppercase() || (i > 0 && c.is_ascii_digit()));
        if self.runtime.port_env.is_empty() || !env_ok {
            return Err(BlingError::InvalidConfigValueError {
                field: "runtime.port_env".to_string(),
                value: self.runtime.port_env.clone(),
                reason: "Must be an upper-case environment variable name".to_string(),
            });
        }
        validation::validate_port("runtime.default_port", self.runtime.default_port)?;

        Ok(())
    }
}

impl Validate for ImageConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
