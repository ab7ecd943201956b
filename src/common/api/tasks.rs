use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::client::ApiClient;
use super::error::ApiError;
use super::models::common::{CreateTaskResponse, ServiceHealth, ServiceStats};
use super::models::task::{CreateTaskRequest, ListTasksParams, Task, TaskFile, TaskLogEntry};

/// 任务操作到HTTP调用的映射
///
/// 抽成trait是为了让存储层在测试里可以换成内存实现。
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn list_tasks(&self, params: &ListTasksParams) -> Result<Vec<Task>, ApiError>;

    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError>;

    async fn create_task(&self, req: &CreateTaskRequest) -> Result<CreateTaskResponse, ApiError>;

    async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError>;

    async fn retry_task(&self, task_id: &str) -> Result<(), ApiError>;

    async fn delete_task(&self, task_id: &str, delete_files: bool) -> Result<(), ApiError>;
}

/// 任务API网关
#[derive(Debug, Clone)]
pub struct TasksApi {
    client: ApiClient,
}

impl TasksApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// 获取任务日志
    pub async fn get_task_logs(&self, task_id: &str, limit: u32) -> Result<Vec<TaskLogEntry>, ApiError> {
        self.client
            .get_with_query(&format!("/api/tasks/{}/logs", task_id), &[("limit", limit)])
            .await
    }

    /// 获取任务产物文件列表
    pub async fn get_task_files(&self, task_id: &str) -> Result<Vec<TaskFile>, ApiError> {
        self.client.get(&format!("/api/tasks/{}/files", task_id)).await
    }

    /// 拼出文件的下载地址，不发请求
    pub fn file_download_url(&self, task_id: &str, file_type: &str) -> String {
        format!(
            "{}api/tasks/{}/files/{}",
            self.client.base_url(),
            task_id,
            file_type
        )
    }

    /// 获取文件原始内容（用于字幕文件），内容不做解析
    pub async fn get_file_content(&self, task_id: &str, file_type: &str) -> Result<String, ApiError> {
        self.client
            .get_text(&format!("/api/tasks/{}/files/{}", task_id, file_type))
            .await
    }

    /// 重新下载单个文件
    pub async fn retry_file_download(&self, task_id: &str, file_type: &str) -> Result<(), ApiError> {
        self.client
            .post_empty::<Value>(&format!("/api/tasks/{}/files/{}/retry", task_id, file_type))
            .await?;
        Ok(())
    }

    /// 获取服务端统计信息
    pub async fn get_stats(&self) -> Result<ServiceStats, ApiError> {
        self.client.get("/api/stats").await
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<ServiceHealth, ApiError> {
        self.client.get("/api/health").await
    }
}

#[async_trait]
impl TaskGateway for TasksApi {
    async fn list_tasks(&self, params: &ListTasksParams) -> Result<Vec<Task>, ApiError> {
        let value: Value = self.client.get_with_query("/api/tasks", params).await?;
        // 响应不是数组时按空列表处理，保证状态视图的过滤不会翻车
        match value {
            Value::Array(_) => Ok(serde_json::from_value(value)?),
            other => {
                warn!("任务列表响应不是数组: {}", other);
                Ok(Vec::new())
            }
        }
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        self.client.get(&format!("/api/tasks/{}", task_id)).await
    }

    async fn create_task(&self, req: &CreateTaskRequest) -> Result<CreateTaskResponse, ApiError> {
        self.client.post_json("/api/download", req).await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError> {
        self.client
            .post_empty::<Value>(&format!("/api/tasks/{}/cancel", task_id))
            .await?;
        Ok(())
    }

    async fn retry_task(&self, task_id: &str) -> Result<(), ApiError> {
        self.client
            .post_empty::<Value>(&format!("/api/tasks/{}/retry", task_id))
            .await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str, delete_files: bool) -> Result<(), ApiError> {
        self.client
            .delete::<Value, _>(
                &format!("/api/tasks/{}", task_id),
                &[("delete_files", delete_files)],
            )
            .await?;
        Ok(())
    }
}
