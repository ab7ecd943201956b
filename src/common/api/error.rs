use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    // 服务端返回的detail信息，原样透传给上层
    #[error("{0}")]
    Server(String),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("无效的URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
