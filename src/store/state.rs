use crate::common::api::models::task::{Task, TaskStatus};

/// 存储层的聚合状态
///
/// 读取方通过 [`crate::store::TaskStore::snapshot`] 拿到一份克隆来观察，
/// 状态视图永远基于当前tasks现算，不单独缓存。
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// 任务列表，保持服务端返回的顺序，task_id不重复
    pub tasks: Vec<Task>,
    /// 当前选中的任务，与tasks的成员关系相互独立
    pub current_task: Option<Task>,
    /// 是否有请求在途
    pub loading: bool,
    /// 最近一次操作的失败信息
    pub error: Option<String>,
}

impl StoreState {
    fn tasks_with_status(&self, status: TaskStatus) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.tasks_with_status(TaskStatus::Pending)
    }

    pub fn processing_tasks(&self) -> Vec<Task> {
        self.tasks_with_status(TaskStatus::Processing)
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        self.tasks_with_status(TaskStatus::Completed)
    }

    pub fn failed_tasks(&self) -> Vec<Task> {
        self.tasks_with_status(TaskStatus::Failed)
    }
}
