//! HTTP 网关实现
//!
//! 与仿真引擎 AiHttpService 通信。响应为 JSON，带 result/error 判别字段；
//! 非 2xx 或 error 字段映射为类型化 GatewayError。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::GatewayError;

use super::{call_with_retry, EntityRef, Gateway, RetryPolicy, WorldSnapshot};

/// 仿真引擎 HTTP 客户端
pub struct HttpGateway {
    base_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpGateway {
    /// 构建失败（TLS 后端初始化等）直接上抛，绝不降级为无超时客户端
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP 客户端构建失败: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            retry,
        })
    }

    /// 引擎可达性探测（启动期使用）
    pub async fn health_check(&self) -> bool {
        matches!(self.get("/api/health").await, Ok(v) if v.get("status").and_then(Value::as_str) == Some("ok"))
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let (attempts, result) = call_with_retry(&self.retry, path, || async {
            let resp = self.http.get(&url).send().await.map_err(classify_reqwest)?;
            decode_response(resp).await
        })
        .await;
        tracing::debug!(path, attempts, ok = result.is_ok(), "[Gateway] GET");
        result
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let (attempts, result) = call_with_retry(&self.retry, path, || async {
            let resp = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(classify_reqwest)?;
            decode_response(resp).await
        })
        .await;
        tracing::debug!(path, attempts, ok = result.is_ok(), "[Gateway] POST");
        result
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn world_state(&self) -> Result<WorldSnapshot, GatewayError> {
        let value = self.get("/api/world_state").await?;
        serde_json::from_value(value)
            .map_err(|e| GatewayError::Rejected(format!("world_state decode: {e}")))
    }

    async fn query(&self, unit: &str, entity: &EntityRef) -> Result<Value, GatewayError> {
        match entity {
            EntityRef::Platform => self.get(&format!("/api/unit/{unit}/state")).await,
            EntityRef::Equipment(name) => {
                self.get(&format!("/api/unit/{unit}/equipment/{name}/query"))
                    .await
            }
        }
    }

    async fn control(
        &self,
        unit: &str,
        entity: &EntityRef,
        command: &str,
        params: &Value,
    ) -> Result<Value, GatewayError> {
        let path = match entity {
            // 平台飞行指令：move_to_pos / move_to_dir / patrol / return_land / formation
            EntityRef::Platform => format!("/api/unit/{unit}/platform/{command}"),
            // 装备指令：control（开关机/参数）/ lock / launch / abort
            EntityRef::Equipment(name) => format!("/api/unit/{unit}/equipment/{name}/{command}"),
        };
        self.post(&path, params).await
    }

    async fn alter(&self, unit: &str, params: &Value) -> Result<Value, GatewayError> {
        self.post(&format!("/api/unit/{unit}/alter"), params).await
    }
}

/// reqwest 错误分类：超时 -> Timeout，其余连接层问题 -> Transport
fn classify_reqwest(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// 解码响应：非 2xx 与 error 字段映射为类型化错误
async fn decode_response(resp: reqwest::Response) -> Result<Value, GatewayError> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);

    if status == reqwest::StatusCode::NOT_FOUND {
        let msg = error_message(&body).unwrap_or_else(|| "unknown unit or entity".to_string());
        return Err(GatewayError::NotFound(msg));
    }
    if !status.is_success() {
        let msg = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
        return Err(GatewayError::Rejected(msg));
    }
    if let Some(msg) = error_message(&body) {
        // 2xx 但引擎逻辑失败
        if msg.contains("not found") || msg.contains("未找到") {
            return Err(GatewayError::NotFound(msg));
        }
        return Err(GatewayError::Rejected(msg));
    }
    Ok(body)
}

fn error_message(body: &Value) -> Option<String> {
    if let Some(err) = body.get("error").and_then(Value::as_str) {
        return Some(err.to_string());
    }
    if body.get("result").and_then(Value::as_str) == Some("error") {
        return Some("engine reported error".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_discriminator() {
        assert_eq!(
            error_message(&json!({"error": "unit 红方01 not found"})),
            Some("unit 红方01 not found".to_string())
        );
        assert!(error_message(&json!({"result": "success"})).is_none());
        assert!(error_message(&json!({"result": "error"})).is_some());
    }
}
