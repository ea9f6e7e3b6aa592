/// 题目上下文
///
/// 由 PageExtractor 生成后不再修改，交给 AnswerResolver 消费
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionContext {
    /// 题干文本
    pub question_text: String,
    /// 页面原始文本（包含解码后的脚本载荷）
    pub raw_page_content: String,
    /// 题目页面 URL
    pub source_url: String,
    /// 答案提交 URL
    pub submission_url: String,
}

impl QuestionContext {
    /// 渲染失败时的退化上下文：题干为空，提交地址回退到页面 URL
    pub fn degraded(url: &str) -> Self {
        Self {
            question_text: String::new(),
            raw_page_content: String::new(),
            source_url: url.to_string(),
            submission_url: url.to_string(),
        }
    }

    /// 是否为退化上下文
    pub fn is_degraded(&self) -> bool {
        self.question_text.is_empty() && self.raw_page_content.is_empty()
    }
}

/// 题目类型（仅用于提示词与日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    /// 需要下载并处理文件
    FileProcessing,
    /// 需要抓取网页
    WebScraping,
    /// 需要调用 API
    ApiCall,
    /// 需要出图
    Visualization,
    /// 数据分析
    DataAnalysis,
    /// 其他
    Other,
}

impl QuestionKind {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionKind::FileProcessing => "file_processing",
            QuestionKind::WebScraping => "web_scraping",
            QuestionKind::ApiCall => "api_call",
            QuestionKind::Visualization => "visualization",
            QuestionKind::DataAnalysis => "data_analysis",
            QuestionKind::Other => "other",
        }
    }

    /// 按关键词粗略判断题目类型
    pub fn classify(question: &str) -> Self {
        let lower = question.to_lowercase();
        let has_word = |word: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == word)
        };

        if lower.contains("download") || has_word("file") || has_word("pdf") || has_word("csv") {
            return QuestionKind::FileProcessing;
        }
        if lower.contains("scrape") || lower.contains("website") {
            return QuestionKind::WebScraping;
        }
        if has_word("api") || lower.contains("endpoint") {
            return QuestionKind::ApiCall;
        }
        if lower.contains("chart") || lower.contains("plot") || lower.contains("visuali") {
            return QuestionKind::Visualization;
        }
        if ["sum", "count", "average", "mean", "median", "total", "data"]
            .iter()
            .any(|word| has_word(word))
        {
            return QuestionKind::DataAnalysis;
        }

        QuestionKind::Other
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
