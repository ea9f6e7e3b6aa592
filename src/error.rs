use std::fmt;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动无头浏览器失败
    #[error("启动无头浏览器失败: {message}")]
    LaunchFailed { message: String },
}

/// 页面提取错误（可恢复，调用方会退化为空上下文）
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 渲染超时
    #[error("渲染 {url} 超时 ({timeout_ms}ms)")]
    RenderTimeout { url: String, timeout_ms: u128 },
    /// 渲染失败
    #[error("渲染 {url} 失败: {message}")]
    RenderFailed { url: String, message: String },
}

/// 关联内容获取失败（只记录日志，不影响答题）
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// 渲染关联页面失败
    #[error(transparent)]
    Render(#[from] ExtractionError),
    /// HTTP 请求失败
    #[error("请求 {url} 失败: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 下载的内容不是 UTF-8 文本
    #[error("{url} 的内容不是文本")]
    NotText { url: String },
}

/// 序列致命错误：连退化的上下文都无法构造
#[derive(Debug, Error)]
pub enum SequenceFatalError {
    /// URL 无法解析
    #[error("无效的题目 URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// 模型错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelErrorKind {
    /// 模型不存在
    ModelNotFound,
    /// 请求频率或额度限制
    RateLimited,
    /// 临时性错误（网络、超时、服务端过载）
    Transient,
    /// 其他错误
    Other,
}

impl ModelErrorKind {
    /// 是否值得在同一层级内重试
    pub fn is_retryable(self) -> bool {
        matches!(self, ModelErrorKind::Transient | ModelErrorKind::RateLimited)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelErrorKind::ModelNotFound => "model_not_found",
            ModelErrorKind::RateLimited => "rate_limited",
            ModelErrorKind::Transient => "transient",
            ModelErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次模型调用失败
#[derive(Debug, Clone, Error)]
#[error("[{kind}] 模型 {model}: {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub model: String,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            message: message.into(),
        }
    }
}

/// 答案提交错误（最终都会被转换为失败的 verdict）
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 网络请求失败
    #[error("请求 {url} 失败: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 读取响应体失败
    #[error("读取 {url} 的响应失败: {source}")]
    ReadBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {message}")]
    TomlParseFailed { path: String, message: String },
    /// 配置值不可用
    #[error("配置项 {key} 无效: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(port: u16, source: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed { port, source })
    }

    /// 创建文件错误
    pub fn file_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
