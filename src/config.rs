use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

/// 每个外部提供方一次尝试，最多两个
pub const MAX_EXTERNAL_PROVIDERS: usize = 2;

/// 主模型最多尝试次数
pub const PRIMARY_MODEL_ATTEMPTS: u32 = 3;

/// 备用模型最多尝试次数
pub const FALLBACK_MODEL_ATTEMPTS: u32 = 2;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 身份 ---
    pub email: String,
    pub secret: String,
    /// 启动时要解答的第一道题
    pub initial_url: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    /// OpenAI 兼容的备用提供方
    pub external_providers: Vec<ProviderConfig>,
    /// 是否启用启发式兜底
    pub enable_heuristic_fallback: bool,
    /// 调用模型前是否获取题目引用的网页、API 或文件
    pub enable_context_enrichment: bool,
    /// 退避基础延迟（毫秒），每次翻倍
    pub retry_base_delay_ms: u64,
    /// 单次模型调用超时（秒）
    pub model_timeout_secs: u64,
    // --- 预算 ---
    pub max_attempts: u32,
    pub timeout_secs: u64,
    // --- 浏览器 ---
    /// 页面渲染超时（毫秒）
    pub render_timeout_ms: u64,
    /// 导航完成后等待脚本执行的时间（毫秒）
    pub render_settle_ms: u64,
    /// 设置后连接到已运行的浏览器，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<String>,
    // --- 日志 ---
    pub verbose_logging: bool,
    /// 运行结果报告文件
    pub output_log_file: String,
}

/// 外部提供方配置
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderConfig {
    pub fn is_usable(&self) -> bool {
        !self.api_base_url.is_empty() && !self.api_key.is_empty() && !self.model.is_empty()
    }
}

/// 指数退避策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// 第 `attempt` 次失败（从 0 开始）之后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(800),
        }
    }
}

/// AnswerResolver 构造时需要的全部配置
#[derive(Clone, Debug, PartialEq)]
pub struct ResolverConfig {
    pub primary_model: String,
    pub fallback_model: String,
    pub external_providers: Vec<ProviderConfig>,
    pub enable_heuristic_fallback: bool,
    pub primary_attempts: u32,
    pub fallback_attempts: u32,
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-3.5-turbo".to_string(),
            external_providers: Vec::new(),
            enable_heuristic_fallback: true,
            primary_attempts: PRIMARY_MODEL_ATTEMPTS,
            fallback_attempts: FALLBACK_MODEL_ATTEMPTS,
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            email: String::new(),
            secret: String::new(),
            initial_url: String::new(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            primary_model: resolver.primary_model,
            fallback_model: resolver.fallback_model,
            external_providers: Vec::new(),
            enable_heuristic_fallback: true,
            enable_context_enrichment: true,
            retry_base_delay_ms: 800,
            model_timeout_secs: 60,
            max_attempts: 10,
            timeout_secs: 180,
            render_timeout_ms: 30_000,
            render_settle_ms: 2_000,
            browser_debug_port: None,
            chrome_executable: None,
            verbose_logging: false,
            output_log_file: "quiz_runs.log".to_string(),
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// 默认值 → `QUIZ_CONFIG_FILE` 指向的 TOML 文件 → 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("QUIZ_CONFIG_FILE") {
            Ok(path) if !path.is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::TomlParseFailed { message, .. } => ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseFailed {
            path: String::new(),
            message: e.to_string(),
        })
    }

    /// 用环境变量覆盖当前值
    pub fn apply_env(&mut self) {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            var(name).and_then(|v| v.parse().ok())
        }

        if let Some(v) = var("EMAIL") {
            self.email = v;
        }
        if let Some(v) = var("SECRET_KEY") {
            self.secret = v;
        }
        if let Some(v) = var("QUIZ_URL") {
            self.initial_url = v;
        }
        if let Some(v) = var("LLM_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.llm_api_key = v;
        }
        if let Some(v) = var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = var("PRIMARY_MODEL") {
            self.primary_model = v;
        }
        if let Some(v) = var("FALLBACK_MODEL") {
            self.fallback_model = v;
        }
        self.enable_heuristic_fallback =
            parsed("ENABLE_HEURISTIC_FALLBACK").unwrap_or(self.enable_heuristic_fallback);
        self.enable_context_enrichment =
            parsed("ENABLE_CONTEXT_ENRICHMENT").unwrap_or(self.enable_context_enrichment);
        self.retry_base_delay_ms = parsed("RETRY_BASE_DELAY_MS").unwrap_or(self.retry_base_delay_ms);
        self.model_timeout_secs = parsed("MODEL_TIMEOUT_SECS").unwrap_or(self.model_timeout_secs);
        self.max_attempts = parsed("MAX_ATTEMPTS").unwrap_or(self.max_attempts);
        self.timeout_secs = parsed("SUBMISSION_TIMEOUT_SECS").unwrap_or(self.timeout_secs);
        self.render_timeout_ms = parsed("BROWSER_TIMEOUT_MS").unwrap_or(self.render_timeout_ms);
        self.render_settle_ms = parsed("RENDER_SETTLE_MS").unwrap_or(self.render_settle_ms);
        if let Some(port) = parsed("BROWSER_DEBUG_PORT") {
            self.browser_debug_port = Some(port);
        }
        if let Some(v) = var("CHROME_EXECUTABLE") {
            self.chrome_executable = Some(v);
        }
        self.verbose_logging = parsed("VERBOSE_LOGGING").unwrap_or(self.verbose_logging);
        if let Some(v) = var("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }

        // 环境变量里声明的提供方整体替换文件中的列表
        let env_providers: Vec<ProviderConfig> = ["A", "B"]
            .iter()
            .filter_map(|slot| {
                let provider = ProviderConfig {
                    name: var(&format!("EXTERNAL_PROVIDER_{slot}_NAME"))
                        .unwrap_or_else(|| format!("provider-{}", slot.to_lowercase())),
                    api_base_url: var(&format!("EXTERNAL_PROVIDER_{slot}_BASE_URL"))?,
                    api_key: var(&format!("EXTERNAL_PROVIDER_{slot}_API_KEY"))?,
                    model: var(&format!("EXTERNAL_PROVIDER_{slot}_MODEL"))?,
                };
                Some(provider)
            })
            .collect();
        if !env_providers.is_empty() {
            self.external_providers = env_providers;
        }
    }

    /// 检查配置，缺少凭据只告警，预算不可用则报错
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，主模型和备用模型将不可用");
        }
        if self.secret.is_empty() {
            warn!("⚠️ 未设置 SECRET_KEY，提交可能被拒绝");
        }
        if self.email.is_empty() {
            warn!("⚠️ 未设置 EMAIL，提交可能被拒绝");
        }
        if self.external_providers.len() > MAX_EXTERNAL_PROVIDERS {
            warn!(
                "⚠️ 配置了 {} 个外部提供方，只会使用前 {} 个",
                self.external_providers.len(),
                MAX_EXTERNAL_PROVIDERS
            );
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 导出 AnswerResolver 使用的配置
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            primary_model: self.primary_model.clone(),
            fallback_model: self.fallback_model.clone(),
            external_providers: self
                .external_providers
                .iter()
                .filter(|p| p.is_usable())
                .take(MAX_EXTERNAL_PROVIDERS)
                .cloned()
                .collect(),
            enable_heuristic_fallback: self.enable_heuristic_fallback,
            primary_attempts: PRIMARY_MODEL_ATTEMPTS,
            fallback_attempts: FALLBACK_MODEL_ATTEMPTS,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn timeout_budget(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_budget() {
        let config = Config::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.timeout_budget(), Duration::from_secs(180));
        assert_eq!(config.render_timeout(), Duration::from_secs(30));
        assert!(config.enable_heuristic_fallback);
    }

    #[test]
    fn test_retry_policy_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(800));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(3200));
    }

    #[test]
    fn test_toml_overrides_and_defaults() {
        let config = Config::from_toml_str(
            r#"
            email = "me@example.com"
            primary_model = "gpt-4o"
            enable_heuristic_fallback = false

            [[external_providers]]
            name = "aipipe"
            api_base_url = "https://aipipe.example/v1"
            api_key = "k"
            model = "gpt-4.1-nano"
            "#,
        )
        .unwrap();
        assert_eq!(config.email, "me@example.com");
        assert_eq!(config.primary_model, "gpt-4o");
        assert_eq!(config.fallback_model, "gpt-3.5-turbo");
        assert!(!config.enable_heuristic_fallback);
        assert!(config.enable_context_enrichment);
        assert_eq!(config.external_providers.len(), 1);
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let err = Config::from_toml_str("max_attempts = \"ten\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }

    #[test]
    fn test_resolver_config_caps_providers() {
        let provider = |name: &str| ProviderConfig {
            name: name.to_string(),
            api_base_url: "https://p/v1".to_string(),
            api_key: "k".to_string(),
            model: "m".to_string(),
        };
        let config = Config {
            external_providers: vec![
                provider("a"),
                ProviderConfig::default(),
                provider("b"),
                provider("c"),
            ],
            ..Config::default()
        };
        let resolver = config.resolver_config();
        let names: Vec<_> = resolver
            .external_providers
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
