//! 中英文混合分词
//!
//! 知识检索与战术关键词匹配共用：含 CJK 字符时走 jieba 搜索引擎模式，
//! 纯英文按空白切分；统一小写并过滤停用词。

use std::collections::HashSet;
use std::sync::OnceLock;

use jieba_rs::Jieba;

static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn jieba() -> &'static Jieba {
    JIEBA.get_or_init(Jieba::new)
}

/// 高频虚词，对意图/检索匹配没有区分度
const STOPWORDS: &[&str] = &[
    "的", "了", "在", "和", "与", "对", "并", "进行", "执行", "一个", "请", "把",
    "the", "a", "an", "at", "to", "of", "and", "with", "for", "on", "in",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |
        '\u{3400}'..='\u{4DBF}' |
        '\u{F900}'..='\u{FAFF}'
    )
}

/// 文本是否包含 CJK 字符
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 分词：CJK 用 jieba（细粒度），否则按空白与标点切分
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let raw: Vec<String> = if contains_cjk(text) {
        jieba()
            .cut_for_search(text, true)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect()
    } else {
        text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|s| s.to_lowercase())
            .collect()
    };

    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| s.chars().count() > 1 || s.chars().next().map(is_cjk).unwrap_or(false))
        .filter(|s| !is_stopword(s))
        .collect()
}

/// 分词为集合（相似度计算用）
pub fn tokenize_to_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard 相似度，值域 [0,1]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    inter / union
}
