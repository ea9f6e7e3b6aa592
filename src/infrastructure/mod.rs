//! 基础设施层
//!
//! 持有稀缺资源（浏览器、HTTP 客户端），只暴露能力

pub mod model_client;
pub mod renderer;

pub use model_client::{ModelClient, ModelRequest, ModelResponse, OpenAiModelClient};
pub use renderer::{ChromeRenderer, PageRenderer, RenderedPage};
