use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use super::error::ApiError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 与下载服务通信的HTTP客户端
///
/// 负责发请求、拆包响应体，并把所有失败归一成一条可读的错误信息。
/// 重试、鉴权等都不在这一层做。
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)?;
        let inner = ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self { inner, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // 拼接完整请求地址
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let resp = self.inner.get(url).send().await?;
        Self::handle_response(resp).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let resp = self.inner.get(url).query(query).send().await?;
        Self::handle_response(resp).await
    }

    // 获取原始文本内容（比如字幕文件），不做任何解析
    pub async fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);
        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let raw = resp.bytes().await?;
            return Err(ApiError::Server(Self::error_detail(status, &raw)));
        }
        Ok(resp.text().await?)
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let resp = self.inner.post(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    // cancel/retry这类动作接口没有请求体
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);
        let resp = self.inner.post(url).send().await?;
        Self::handle_response(resp).await
    }

    pub async fn delete<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        debug!("DELETE {}", url);
        let resp = self.inner.delete(url).query(query).send().await?;
        Self::handle_response(resp).await
    }

    // 处理响应：成功时拆出数据部分，失败时归一错误信息
    async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let raw = resp.bytes().await?;

        if !status.is_success() {
            let detail = Self::error_detail(status, &raw);
            error!("请求失败: {} {}", status, detail);
            return Err(ApiError::Server(detail));
        }

        serde_json::from_slice::<T>(&raw).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "解析响应失败: {}. 原始响应: {}",
                e,
                String::from_utf8_lossy(&raw)
            ))
        })
    }

    // 错误信息优先级：服务端detail字段 > HTTP状态描述 > 固定文案
    fn error_detail(status: StatusCode, raw: &[u8]) -> String {
        if let Ok(value) = serde_json::from_slice::<Value>(raw) {
            if let Some(detail) = value.get("detail").and_then(|v| v.as_str()) {
                return detail.to_string();
            }
        }
        match status.canonical_reason() {
            Some(reason) => format!("请求失败: {} {}", status.as_u16(), reason),
            None => "请求失败".to_string(),
        }
    }
}
