use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::common::api::error::ApiError;
use crate::common::api::models::common::CreateTaskResponse;
use crate::common::api::models::task::{CreateTaskRequest, ListTasksParams, Task};
use crate::common::api::tasks::TaskGateway;

pub mod state;

pub use state::StoreState;

/// 任务状态存储，客户端侧任务状态的唯一事实来源
///
/// 所有变更都经过网关发出，结果再回写到本地聚合状态。进程启动时创建一次，
/// 用 `Arc<TaskStore>` 注入给各处消费方，之后不再销毁。
///
/// 锁只在字段更新的瞬间持有，不跨越任何await点。并发发起的操作会在
/// loading/error/tasks/current_task上互相竞争，最终状态以后完成的响应为准，
/// 这里不做操作排队。
pub struct TaskStore {
    gateway: Arc<dyn TaskGateway>,
    state: RwLock<StoreState>,
}

impl TaskStore {
    pub fn new(gateway: Arc<dyn TaskGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// 拉取任务列表，整表替换本地tasks
    ///
    /// 失败时清空tasks并记录错误，避免旧列表和错误信息同时展示。
    pub async fn list_tasks(&self, params: &ListTasksParams) -> Result<Vec<Task>, ApiError> {
        self.begin_op();
        debug!("拉取任务列表");
        match self.gateway.list_tasks(params).await {
            Ok(tasks) => {
                let mut state = self.state.write().unwrap();
                state.tasks = tasks.clone();
                state.loading = false;
                Ok(tasks)
            }
            Err(err) => {
                warn!("任务列表拉取失败: {}", err);
                let mut state = self.state.write().unwrap();
                state.error = Some(err.to_string());
                state.tasks.clear();
                state.loading = false;
                Err(err)
            }
        }
    }

    /// 拉取单个任务，设为当前任务，并就地更新列表中的同id条目
    ///
    /// 拉取失败时保留之前选中的任务。
    pub async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        self.begin_op();
        debug!("拉取任务详情: {}", task_id);
        match self.gateway.get_task(task_id).await {
            Ok(task) => {
                let mut state = self.state.write().unwrap();
                state.current_task = Some(task.clone());
                if let Some(entry) = state.tasks.iter_mut().find(|t| t.task_id == task_id) {
                    *entry = task.clone();
                }
                state.loading = false;
                Ok(task)
            }
            Err(err) => {
                warn!("任务详情拉取失败: {}", err);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// 提交新任务
    ///
    /// 创建成功后整表刷新，task_id和初始状态以服务端为准，不做本地乐观插入。
    pub async fn create_task(&self, req: &CreateTaskRequest) -> Result<CreateTaskResponse, ApiError> {
        self.begin_op();
        debug!("创建下载任务: {}", req.url);
        let created = match self.gateway.create_task(req).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!("任务创建失败: {}", err);
                self.fail(&err);
                return Err(err);
            }
        };
        self.list_tasks(&ListTasksParams::default()).await?;
        Ok(created)
    }

    /// 请求取消任务，成功后只回刷该任务自身
    ///
    /// 轻量的旁路操作，不碰全局loading标志。
    pub async fn cancel_task(&self, task_id: &str) -> Result<(), ApiError> {
        debug!("取消任务: {}", task_id);
        if let Err(err) = self.gateway.cancel_task(task_id).await {
            warn!("任务取消失败: {}", err);
            self.record_error(&err);
            return Err(err);
        }
        self.get_task(task_id).await?;
        Ok(())
    }

    /// 请求重试任务，成功后整表刷新
    ///
    /// 重试会改变任务相对其他任务的队列位置，所以不能只刷新单个任务。
    pub async fn retry_task(&self, task_id: &str) -> Result<(), ApiError> {
        self.begin_op();
        debug!("重试任务: {}", task_id);
        if let Err(err) = self.gateway.retry_task(task_id).await {
            warn!("任务重试失败: {}", err);
            self.fail(&err);
            return Err(err);
        }
        self.list_tasks(&ListTasksParams::default()).await?;
        Ok(())
    }

    /// 删除任务，成功后从列表移除，选中的任务若是它则一并清掉
    pub async fn delete_task(&self, task_id: &str, delete_files: bool) -> Result<(), ApiError> {
        debug!("删除任务: {} (delete_files={})", task_id, delete_files);
        if let Err(err) = self.gateway.delete_task(task_id, delete_files).await {
            warn!("任务删除失败: {}", err);
            self.record_error(&err);
            return Err(err);
        }
        let mut state = self.state.write().unwrap();
        state.tasks.retain(|t| t.task_id != task_id);
        if state
            .current_task
            .as_ref()
            .is_some_and(|t| t.task_id == task_id)
        {
            state.current_task = None;
        }
        Ok(())
    }

    pub fn clear_current_task(&self) {
        self.state.write().unwrap().current_task = None;
    }

    pub fn clear_error(&self) {
        self.state.write().unwrap().error = None;
    }

    /// 当前状态的一份快照，供展示层轮询
    pub fn snapshot(&self) -> StoreState {
        self.state.read().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().unwrap().tasks.clone()
    }

    pub fn current_task(&self) -> Option<Task> {
        self.state.read().unwrap().current_task.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.read().unwrap().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().unwrap().error.clone()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.state.read().unwrap().pending_tasks()
    }

    pub fn processing_tasks(&self) -> Vec<Task> {
        self.state.read().unwrap().processing_tasks()
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        self.state.read().unwrap().completed_tasks()
    }

    pub fn failed_tasks(&self) -> Vec<Task> {
        self.state.read().unwrap().failed_tasks()
    }

    // 操作入口：挂起loading，清掉上一次的错误
    fn begin_op(&self) {
        let mut state = self.state.write().unwrap();
        state.loading = true;
        state.error = None;
    }

    // 失败收尾：记录错误并放下loading
    fn fail(&self, err: &ApiError) {
        let mut state = self.state.write().unwrap();
        state.error = Some(err.to_string());
        state.loading = false;
    }

    // 只记录错误，不碰loading（cancel/delete这类旁路操作用）
    fn record_error(&self, err: &ApiError) {
        self.state.write().unwrap().error = Some(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::common::api::models::task::TaskStatus;

    // 内存版网关，按队列预置每个操作的响应
    #[derive(Default)]
    struct FakeGateway {
        list_results: Mutex<VecDeque<Result<Vec<Task>, String>>>,
        get_results: Mutex<VecDeque<Result<Task, String>>>,
        create_results: Mutex<VecDeque<Result<CreateTaskResponse, String>>>,
        cancel_results: Mutex<VecDeque<Result<(), String>>>,
        retry_results: Mutex<VecDeque<Result<(), String>>>,
        delete_results: Mutex<VecDeque<Result<(), String>>>,
    }

    impl FakeGateway {
        fn push_list(&self, result: Result<Vec<Task>, &str>) {
            self.list_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }

        fn push_get(&self, result: Result<Task, &str>) {
            self.get_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }

        fn push_create(&self, result: Result<CreateTaskResponse, &str>) {
            self.create_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }

        fn push_cancel(&self, result: Result<(), &str>) {
            self.cancel_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }

        fn push_retry(&self, result: Result<(), &str>) {
            self.retry_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }

        fn push_delete(&self, result: Result<(), &str>) {
            self.delete_results
                .lock()
                .unwrap()
                .push_back(result.map_err(str::to_string));
        }
    }

    fn take<T>(queue: &Mutex<VecDeque<Result<T, String>>>, op: &str) -> Result<T, ApiError> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("{} 没有预置响应", op))
            .map_err(ApiError::Server)
    }

    #[async_trait]
    impl TaskGateway for FakeGateway {
        async fn list_tasks(&self, _params: &ListTasksParams) -> Result<Vec<Task>, ApiError> {
            take(&self.list_results, "list_tasks")
        }

        async fn get_task(&self, _task_id: &str) -> Result<Task, ApiError> {
            take(&self.get_results, "get_task")
        }

        async fn create_task(&self, _req: &CreateTaskRequest) -> Result<CreateTaskResponse, ApiError> {
            take(&self.create_results, "create_task")
        }

        async fn cancel_task(&self, _task_id: &str) -> Result<(), ApiError> {
            take(&self.cancel_results, "cancel_task")
        }

        async fn retry_task(&self, _task_id: &str) -> Result<(), ApiError> {
            take(&self.retry_results, "retry_task")
        }

        async fn delete_task(&self, _task_id: &str, _delete_files: bool) -> Result<(), ApiError> {
            take(&self.delete_results, "delete_task")
        }
    }

    fn make_task(id: &str, status: &str) -> Task {
        serde_json::from_value(json!({ "task_id": id, "status": status })).unwrap()
    }

    fn make_store() -> (Arc<FakeGateway>, TaskStore) {
        let gateway = Arc::new(FakeGateway::default());
        let store = TaskStore::new(gateway.clone());
        (gateway, store)
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    #[tokio::test]
    async fn status_views_partition_known_statuses() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "pending"),
            make_task("b", "processing"),
            make_task("c", "completed"),
            make_task("d", "failed"),
            make_task("e", "cancelled"),
            make_task("f", "archived"),
        ]));

        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        assert_eq!(ids(&store.pending_tasks()), ["a"]);
        assert_eq!(ids(&store.processing_tasks()), ["b"]);
        assert_eq!(ids(&store.completed_tasks()), ["c"]);
        assert_eq!(ids(&store.failed_tasks()), ["d"]);

        // cancelled和未识别的状态不进任何视图
        let classified = store.pending_tasks().len()
            + store.processing_tasks().len()
            + store.completed_tasks().len()
            + store.failed_tasks().len();
        assert_eq!(classified, 4);
        assert_eq!(store.tasks().len(), 6);
    }

    #[tokio::test]
    async fn list_failure_clears_tasks_and_sets_error() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        assert_eq!(store.tasks().len(), 1);

        gateway.push_list(Err("服务暂时不可用"));
        let result = store.list_tasks(&ListTasksParams::default()).await;

        assert!(result.is_err());
        assert!(store.tasks().is_empty());
        assert_eq!(store.error().as_deref(), Some("服务暂时不可用"));
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn get_task_reconciles_entry_in_place() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "pending"),
            make_task("b", "pending"),
        ]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        let fetched = make_task("b", "processing");
        gateway.push_get(Ok(fetched.clone()));
        store.get_task("b").await.unwrap();

        let tasks = store.tasks();
        assert_eq!(ids(&tasks), ["a", "b"]);
        assert_eq!(tasks[1], fetched);
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(store.current_task(), Some(fetched));
    }

    #[tokio::test]
    async fn get_task_absent_id_leaves_list_untouched() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        let fetched = make_task("x", "completed");
        gateway.push_get(Ok(fetched.clone()));
        store.get_task("x").await.unwrap();

        assert_eq!(ids(&store.tasks()), ["a"]);
        assert_eq!(store.current_task(), Some(fetched));
    }

    #[tokio::test]
    async fn get_task_failure_keeps_previous_selection() {
        let (gateway, store) = make_store();
        let selected = make_task("a", "processing");
        gateway.push_get(Ok(selected.clone()));
        store.get_task("a").await.unwrap();

        gateway.push_get(Err("任务不存在"));
        let result = store.get_task("missing").await;

        assert!(result.is_err());
        assert_eq!(store.current_task(), Some(selected));
        assert_eq!(store.error().as_deref(), Some("任务不存在"));
    }

    #[tokio::test]
    async fn create_success_triggers_full_refresh() {
        let (gateway, store) = make_store();
        gateway.push_create(Ok(CreateTaskResponse {
            task_id: "n".to_string(),
            status: TaskStatus::Pending,
            message: None,
            created_at: None,
        }));
        gateway.push_list(Ok(vec![
            make_task("a", "completed"),
            make_task("n", "pending"),
        ]));

        let created = store
            .create_task(&CreateTaskRequest::new("https://example.com/v", "00:00", "00:10"))
            .await
            .unwrap();

        assert_eq!(created.task_id, "n");
        assert_eq!(ids(&store.tasks()), ["a", "n"]);
        assert!(!store.loading());
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn create_failure_leaves_tasks_and_propagates() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        gateway.push_create(Err("quota exceeded"));
        let result = store
            .create_task(&CreateTaskRequest::new("https://example.com/v", "0", "10"))
            .await;

        assert!(result.is_err());
        assert_eq!(ids(&store.tasks()), ["a"]);
        assert_eq!(store.error().as_deref(), Some("quota exceeded"));
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn cancel_success_refetches_single_task() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "processing"),
            make_task("b", "pending"),
        ]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        gateway.push_cancel(Ok(()));
        let cancelled = make_task("a", "cancelled");
        gateway.push_get(Ok(cancelled.clone()));
        store.cancel_task("a").await.unwrap();

        let tasks = store.tasks();
        assert_eq!(tasks[0], cancelled);
        assert_eq!(ids(&tasks), ["a", "b"]);
        assert_eq!(store.current_task(), Some(cancelled));
    }

    #[tokio::test]
    async fn cancel_failure_sets_error_without_loading() {
        let (gateway, store) = make_store();
        gateway.push_cancel(Err("任务已完成，无法取消"));

        let result = store.cancel_task("a").await;

        assert!(result.is_err());
        assert_eq!(store.error().as_deref(), Some("任务已完成，无法取消"));
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn retry_success_refreshes_whole_list() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "pending"),
            make_task("b", "completed"),
        ]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        assert_eq!(ids(&store.pending_tasks()), ["a"]);
        assert_eq!(ids(&store.completed_tasks()), ["b"]);

        gateway.push_retry(Ok(()));
        gateway.push_list(Ok(vec![
            make_task("a", "pending"),
            make_task("b", "pending"),
        ]));
        store.retry_task("b").await.unwrap();

        assert_eq!(ids(&store.pending_tasks()), ["a", "b"]);
        assert!(store.completed_tasks().is_empty());
    }

    #[tokio::test]
    async fn retry_failure_skips_refresh() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("b", "failed")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        gateway.push_retry(Err("重试次数已用尽"));
        let result = store.retry_task("b").await;

        assert!(result.is_err());
        assert_eq!(ids(&store.tasks()), ["b"]);
        assert_eq!(store.error().as_deref(), Some("重试次数已用尽"));
    }

    #[tokio::test]
    async fn delete_removes_entry_and_clears_matching_current() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "completed"),
            make_task("b", "pending"),
        ]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        gateway.push_get(Ok(make_task("a", "completed")));
        store.get_task("a").await.unwrap();

        gateway.push_delete(Ok(()));
        store.delete_task("a", true).await.unwrap();

        assert_eq!(ids(&store.tasks()), ["b"]);
        assert_eq!(store.current_task(), None);
    }

    #[tokio::test]
    async fn delete_keeps_unrelated_current() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![
            make_task("a", "completed"),
            make_task("b", "pending"),
        ]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        let selected = make_task("b", "pending");
        gateway.push_get(Ok(selected.clone()));
        store.get_task("b").await.unwrap();

        gateway.push_delete(Ok(()));
        store.delete_task("a", false).await.unwrap();

        assert_eq!(ids(&store.tasks()), ["b"]);
        assert_eq!(store.current_task(), Some(selected));
    }

    #[tokio::test]
    async fn delete_failure_leaves_collection_unchanged() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "completed")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        gateway.push_delete(Err("任务不存在"));
        let result = store.delete_task("a", true).await;

        assert!(result.is_err());
        assert_eq!(ids(&store.tasks()), ["a"]);
        assert_eq!(store.error().as_deref(), Some("任务不存在"));
    }

    #[tokio::test]
    async fn clear_error_has_no_other_effect() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        gateway.push_get(Err("出错了"));
        let _ = store.get_task("a").await;
        assert!(store.error().is_some());

        store.clear_error();

        assert_eq!(store.error(), None);
        assert_eq!(ids(&store.tasks()), ["a"]);
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn clear_current_task_only_drops_selection() {
        let (gateway, store) = make_store();
        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();
        gateway.push_get(Ok(make_task("a", "pending")));
        store.get_task("a").await.unwrap();
        assert!(store.current_task().is_some());

        store.clear_current_task();

        assert_eq!(store.current_task(), None);
        assert_eq!(ids(&store.tasks()), ["a"]);
    }

    #[tokio::test]
    async fn operation_entry_clears_previous_error() {
        let (gateway, store) = make_store();
        gateway.push_list(Err("第一次失败"));
        let _ = store.list_tasks(&ListTasksParams::default()).await;
        assert!(store.error().is_some());

        gateway.push_list(Ok(vec![make_task("a", "pending")]));
        store.list_tasks(&ListTasksParams::default()).await.unwrap();

        assert_eq!(store.error(), None);
        assert_eq!(ids(&store.tasks()), ["a"]);
    }
}
