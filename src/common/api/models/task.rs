use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 任务状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    // 服务端新增的状态值兜底，不参与状态视图分类
    #[serde(other)]
    Unknown,
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("未知的任务状态: {}", s)),
        }
    }
}

/// 一个下载任务，task_id在任务整个生命周期内不变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub video_title: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<i64>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub files: Vec<TaskFile>,
    // 服务端新增字段原样透传
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 任务的产物文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub file_type: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 任务的一条处理日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 创建下载任务的请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// 视频URL
    pub url: String,
    /// 开始时间 (HH:MM:SS, MM:SS 或秒数)
    pub start_time: String,
    /// 结束时间
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// 字幕语言代码，逗号分隔
    pub subtitle_langs: String,
    pub download_video: bool,
    pub download_audio: bool,
    pub download_subtitles: bool,
    pub burn_subtitles: bool,
    pub video_quality: String,
    pub audio_quality: String,
    pub max_retries: u32,
}

impl CreateTaskRequest {
    pub fn new(url: impl Into<String>, start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            ..Self::default()
        }
    }
}

impl Default for CreateTaskRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            proxy: None,
            subtitle_langs: "zh,en".to_string(),
            download_video: true,
            download_audio: true,
            download_subtitles: true,
            burn_subtitles: true,
            video_quality: "bestvideo[height<=480]+bestaudio/best[height<=480]".to_string(),
            audio_quality: "192K".to_string(),
            max_retries: 3,
        }
    }
}

/// 任务列表的查询条件
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListTasksParams {
    /// 按状态过滤
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// 返回数量上限
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListTasksParams {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            limit: None,
        }
    }
}
