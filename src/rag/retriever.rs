//! 战术知识检索器
//!
//! 索引构建（一次性）：扫描知识目录下的 *.md / *.txt / *.json，按文件名关键词
//! 推断文档类别，按分隔符感知的策略分块，预计算每块的词集合。
//! 检索（纯函数）：查询分词 -> 与各块做 Jaccard 相似度 -> 降序 + 稳定并列序。
//! 可按意图域做类别偏置；类别未知或命中为空时优雅回退为全库检索。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::RagSection;
use crate::core::AgentError;

use super::tokenizer;

/// 文档类别：索引期由文件名关键词推断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocCategory {
    Tactics,
    RadarManual,
    EwManual,
    WeaponManual,
    CommManual,
    HistoricalCase,
    FlightManual,
    General,
}

impl DocCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocCategory::Tactics => "tactics",
            DocCategory::RadarManual => "radar_manual",
            DocCategory::EwManual => "ew_manual",
            DocCategory::WeaponManual => "weapon_manual",
            DocCategory::CommManual => "comm_manual",
            DocCategory::HistoricalCase => "historical_case",
            DocCategory::FlightManual => "flight_manual",
            DocCategory::General => "general",
        }
    }

    /// 按文件名关键词归类，决定检索时的类别偏置
    pub fn from_filename(filename: &str) -> Self {
        let name = filename.to_lowercase();
        let rules: &[(DocCategory, &[&str])] = &[
            (DocCategory::Tactics, &["tactic", "战术", "条令", "战法"]),
            (DocCategory::RadarManual, &["radar", "雷达"]),
            (DocCategory::EwManual, &["jam", "干扰", "电子战", "ecm"]),
            (DocCategory::WeaponManual, &["weapon", "武器", "弹药", "导弹"]),
            (DocCategory::CommManual, &["comm", "通信", "数据链"]),
            (DocCategory::HistoricalCase, &["case", "案例", "历史"]),
            (DocCategory::FlightManual, &["flight", "飞行", "航路", "空域"]),
        ];
        for (cat, keywords) in rules {
            if keywords.iter().any(|kw| name.contains(kw)) {
                return *cat;
            }
        }
        DocCategory::General
    }
}

/// 检索结果段落，relevance 值域 [0,1]
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub text: String,
    pub source_id: String,
    pub category: DocCategory,
    pub score: f32,
}

/// 索引中的一个文档块
struct Chunk {
    source_id: String,
    index: usize,
    category: DocCategory,
    text: String,
    tokens: std::collections::HashSet<String>,
}

/// 战术知识检索器：持有一次性构建的块索引，检索无副作用
pub struct KnowledgeRetriever {
    knowledge_dir: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    default_top_k: usize,
    chunks: Vec<Chunk>,
}

impl KnowledgeRetriever {
    /// 从知识目录构建索引；目录不存在或为空时索引为空（检索返回空结果）
    pub fn load(cfg: &RagSection) -> Result<Self, AgentError> {
        let mut retriever = Self {
            knowledge_dir: cfg.knowledge_dir.clone(),
            chunk_size: cfg.chunk_size,
            chunk_overlap: cfg.chunk_overlap,
            default_top_k: cfg.top_k,
            chunks: Vec::new(),
        };
        retriever.rebuild()?;
        Ok(retriever)
    }

    /// 重建索引（带外管理操作，不在决策周期内调用）
    pub fn rebuild(&mut self) -> Result<(), AgentError> {
        self.chunks.clear();
        if !self.knowledge_dir.exists() {
            tracing::warn!(dir = %self.knowledge_dir.display(), "[RAG] 知识库目录不存在，索引为空");
            return Ok(());
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&self.knowledge_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        // 稳定索引顺序
        entries.sort();

        for path in entries {
            match path.extension().and_then(|e| e.to_str()) {
                Some("md") | Some("txt") => self.index_text_file(&path),
                Some("json") => self.index_json_file(&path),
                _ => {}
            }
        }
        tracing::info!(chunks = self.chunks.len(), "[RAG] 索引构建完成");
        Ok(())
    }

    fn index_text_file(&mut self, path: &Path) {
        let Ok(content) = fs::read_to_string(path) else {
            tracing::warn!(file = %path.display(), "[RAG] 文档读取失败，跳过");
            return;
        };
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let category = DocCategory::from_filename(&source);
        self.push_chunks(&source, category, &content);
    }

    /// JSON 知识文件：数组元素带 content / category 字段
    fn index_json_file(&mut self, path: &Path) {
        let Ok(content) = fs::read_to_string(path) else {
            return;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
            tracing::warn!(file = %path.display(), "[RAG] JSON 解析失败，跳过");
            return;
        };
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(items) = value.as_array() {
            for item in items {
                let text = item
                    .get("content")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string());
                let category = item
                    .get("category")
                    .and_then(serde_json::Value::as_str)
                    .map(DocCategory::from_filename)
                    .unwrap_or(DocCategory::General);
                self.push_chunks(&source, category, &text);
            }
        }
    }

    fn push_chunks(&mut self, source: &str, category: DocCategory, text: &str) {
        let base_index = self
            .chunks
            .iter()
            .filter(|c| c.source_id == source)
            .count();
        for (i, piece) in split_chunks(text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let tokens = tokenizer::tokenize_to_set(&piece);
            self.chunks.push(Chunk {
                source_id: source.to_string(),
                index: base_index + i,
                category,
                text: piece,
                tokens,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// 检索：类别偏置命中为空时回退为全库检索
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        category: Option<DocCategory>,
    ) -> Vec<Passage> {
        let query_tokens = tokenizer::tokenize_to_set(query);
        if query_tokens.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }

        let ranked = self.rank(&query_tokens, top_k, category);
        if !ranked.is_empty() || category.is_none() {
            return ranked;
        }
        // 优雅降级：类别内无命中 -> 全库
        tracing::debug!(category = ?category, "[RAG] 类别内无命中，回退全库检索");
        self.rank(&query_tokens, top_k, None)
    }

    fn rank(
        &self,
        query_tokens: &std::collections::HashSet<String>,
        top_k: usize,
        category: Option<DocCategory>,
    ) -> Vec<Passage> {
        let mut scored: Vec<(&Chunk, f32)> = self
            .chunks
            .iter()
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .map(|c| (c, tokenizer::jaccard(query_tokens, &c.tokens)))
            .filter(|(_, s)| *s > 0.0)
            .collect();

        // 分数降序；并列时按 (source_id, 块序号) 保证确定性
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.source_id.cmp(&b.0.source_id))
                .then_with(|| a.0.index.cmp(&b.0.index))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(c, score)| Passage {
                text: c.text.clone(),
                source_id: c.source_id.clone(),
                category: c.category,
                score,
            })
            .collect()
    }
}

/// 分隔符感知分块：优先在段落/句界断开，带重叠
fn split_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    const SEPARATORS: &[&str] = &["\n## ", "\n### ", "\n\n", "\n", "。", "；"];
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut out = Vec::new();
    if total == 0 {
        return out;
    }

    let mut start = 0usize;
    while start < total {
        let target_end = (start + chunk_size.max(1)).min(total);
        let mut end = target_end;

        if target_end < total {
            let window: String = chars[start..target_end].iter().collect();
            for sep in SEPARATORS {
                if let Some(pos) = window.rfind(sep) {
                    let cut = window[..pos].chars().count() + sep.chars().count();
                    if cut > 0 {
                        end = start + cut;
                        break;
                    }
                }
            }
        }
        if end <= start {
            end = (start + 1).min(total);
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }

        if end >= total {
            break;
        }
        let step_back = overlap.min(end - start);
        let next = end.saturating_sub(step_back);
        start = if next > start { next } else { end };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_doc(dir: &Path, name: &str, content: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn retriever_with(dir: &Path) -> KnowledgeRetriever {
        let cfg = RagSection {
            knowledge_dir: dir.to_path_buf(),
            top_k: 3,
            chunk_size: 200,
            chunk_overlap: 20,
        };
        KnowledgeRetriever::load(&cfg).unwrap()
    }

    #[test]
    fn test_categorize_by_filename() {
        assert_eq!(DocCategory::from_filename("雷达使用手册.md"), DocCategory::RadarManual);
        assert_eq!(DocCategory::from_filename("bvr_tactics.md"), DocCategory::Tactics);
        assert_eq!(DocCategory::from_filename("历史案例集.md"), DocCategory::HistoricalCase);
        assert_eq!(DocCategory::from_filename("notes.md"), DocCategory::General);
    }

    #[test]
    fn test_retrieve_deterministic_and_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), "雷达手册.md", "雷达开机后进入搜索模式。\n\n雷达关机可实现电磁静默。");
        write_doc(tmp.path(), "战术条令.md", "超视距攻击应先雷达锁定再发射导弹。");
        let r = retriever_with(tmp.path());
        assert!(!r.is_empty());

        let a = r.retrieve("雷达 搜索", 3, None);
        let b = r.retrieve("雷达 搜索", 3, None);
        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].source_id, b[0].source_id);
        for p in &a {
            assert!(p.score > 0.0 && p.score <= 1.0);
        }
    }

    #[test]
    fn test_category_bias_and_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), "雷达手册.md", "雷达开机后进入搜索模式。");
        write_doc(tmp.path(), "武器手册.md", "导弹发射前必须完成锁定。");
        let r = retriever_with(tmp.path());

        // 偏置命中
        let hits = r.retrieve("雷达 搜索", 3, Some(DocCategory::RadarManual));
        assert!(hits.iter().all(|p| p.category == DocCategory::RadarManual));

        // 类别内无命中 -> 回退全库
        let fallback = r.retrieve("导弹 锁定", 3, Some(DocCategory::CommManual));
        assert!(!fallback.is_empty());
    }

    #[test]
    fn test_missing_dir_yields_empty_index() {
        let r = retriever_with(Path::new("/nonexistent/knowledge"));
        assert!(r.is_empty());
        assert!(r.retrieve("雷达", 3, None).is_empty());
    }

    #[test]
    fn test_split_chunks_overlap() {
        let text = "第一段内容。第二段内容。第三段内容。";
        let chunks = split_chunks(text, 8, 2);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }
}
