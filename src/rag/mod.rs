//! 战术知识检索
//!
//! 给定自然语言态势摘要，从本地文档库返回按相关性排序的知识段落。
//! 纯函数语义：固定索引 + 固定查询 -> 确定性结果，无副作用。
//! 索引重建是带外管理操作，不在决策周期内发生。

pub mod retriever;
pub mod tokenizer;

pub use retriever::{DocCategory, KnowledgeRetriever, Passage};
