use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::{ColoredString, Colorize};
use tracing::info;

use ytclip_tasks::common::api::client::ApiClient;
use ytclip_tasks::common::api::models::task::{
    CreateTaskRequest, ListTasksParams, Task, TaskStatus,
};
use ytclip_tasks::common::api::tasks::TasksApi;
use ytclip_tasks::common::logger::PrettyLogger;
use ytclip_tasks::store::TaskStore;
use ytclip_tasks::{log_info, log_success, log_warning};

mod cli;

/// 状态对应的彩色标签
fn status_label(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Pending => "等待中".yellow(),
        TaskStatus::Processing => "处理中".cyan(),
        TaskStatus::Completed => "已完成".green(),
        TaskStatus::Failed => "失败".red(),
        TaskStatus::Cancelled => "已取消".bright_black(),
        TaskStatus::Unknown => "未知".magenta(),
    }
}

/// 服务端时间戳转成本地可读格式，解析不了就原样显示
fn format_time(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "-".to_string();
    };
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(raw) {
        return t.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    if let Ok(t) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return t.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    raw.to_string()
}

fn format_size(size: Option<i64>) -> String {
    match size {
        None => "-".to_string(),
        Some(n) if n >= 1024 * 1024 => format!("{:.1} MB", n as f64 / 1024.0 / 1024.0),
        Some(n) if n >= 1024 => format!("{:.1} KB", n as f64 / 1024.0),
        Some(n) => format!("{} B", n),
    }
}

fn print_task_row(task: &Task) {
    let title = task
        .video_title
        .as_deref()
        .or(task.url.as_deref())
        .unwrap_or("-");
    let progress = task
        .progress_percentage
        .map(|p| format!("{}%", p))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  [{}] {}  {}  {}",
        status_label(task.status),
        task.task_id,
        progress,
        title
    );
}

fn print_task_detail(task: &Task) {
    PrettyLogger::separator();
    PrettyLogger::field("任务ID", &task.task_id);
    println!("  {}: {}", "状态".bold(), status_label(task.status));
    if let Some(title) = &task.video_title {
        PrettyLogger::field("标题", title);
    }
    if let Some(url) = &task.url {
        PrettyLogger::field("链接", url);
    }
    if let Some(step) = &task.current_step {
        PrettyLogger::field("当前步骤", step);
    }
    if let Some(progress) = &task.progress {
        PrettyLogger::field("进度", progress);
    }
    if let Some(percentage) = task.progress_percentage {
        PrettyLogger::field("进度百分比", format!("{}%", percentage));
    }
    PrettyLogger::field("创建时间", format_time(task.created_at.as_deref()));
    PrettyLogger::field("更新时间", format_time(task.updated_at.as_deref()));
    if let Some(message) = &task.error_message {
        PrettyLogger::field("错误信息", message.red().to_string());
    }
    if !task.files.is_empty() {
        PrettyLogger::field("产物文件", format!("{} 个", task.files.len()));
    }
    PrettyLogger::separator();
}

/// 按状态视图汇总展示当前列表
fn print_overview(store: &TaskStore) {
    PrettyLogger::title("任务列表");
    let state = store.snapshot();
    if state.tasks.is_empty() {
        log_info!("暂无任务");
        return;
    }
    for task in &state.tasks {
        print_task_row(task);
    }
    PrettyLogger::separator();
    println!(
        "  {}: {}  {}: {}  {}: {}  {}: {}",
        "等待中".yellow(),
        state.pending_tasks().len(),
        "处理中".cyan(),
        state.processing_tasks().len(),
        "已完成".green(),
        state.completed_tasks().len(),
        "失败".red(),
        state.failed_tasks().len(),
    );
}

fn parse_status(raw: Option<String>) -> Result<Option<TaskStatus>> {
    raw.map(|s| s.parse::<TaskStatus>().map_err(|e| anyhow!(e)))
        .transpose()
}

async fn run(args: cli::Cli) -> Result<()> {
    let client = ApiClient::with_timeout(&args.server, Duration::from_secs(args.timeout))
        .context("创建HTTP客户端失败")?;
    let api = TasksApi::new(client);
    // 进程级单例，所有命令共用同一个存储
    let store = TaskStore::new(Arc::new(api.clone()));

    match args.command {
        cli::Command::List { status, limit } => {
            let params = ListTasksParams {
                status: parse_status(status)?,
                limit,
            };
            store.list_tasks(&params).await?;
            print_overview(&store);
        }

        cli::Command::Show { task_id } => {
            let task = store.get_task(&task_id).await?;
            print_task_detail(&task);
        }

        cli::Command::Create {
            url,
            start,
            end,
            proxy,
            subtitle_langs,
            no_video,
            no_audio,
            no_subtitles,
            no_burn,
        } => {
            let req = CreateTaskRequest {
                proxy,
                subtitle_langs,
                download_video: !no_video,
                download_audio: !no_audio,
                download_subtitles: !no_subtitles,
                burn_subtitles: !no_burn,
                ..CreateTaskRequest::new(url, start, end)
            };
            let created = store.create_task(&req).await?;
            log_success!("任务已创建: {}", created.task_id);
            print_overview(&store);
        }

        cli::Command::Cancel { task_id } => {
            store.cancel_task(&task_id).await?;
            log_success!("已请求取消: {}", task_id);
            if let Some(task) = store.current_task() {
                print_task_detail(&task);
            }
        }

        cli::Command::Retry { task_id } => {
            store.retry_task(&task_id).await?;
            log_success!("已请求重试: {}", task_id);
            print_overview(&store);
        }

        cli::Command::Delete { task_id, keep_files } => {
            store.delete_task(&task_id, !keep_files).await?;
            log_success!("任务已删除: {}", task_id);
        }

        cli::Command::Logs { task_id, limit } => {
            let logs = api.get_task_logs(&task_id, limit).await?;
            if logs.is_empty() {
                log_info!("暂无日志");
            }
            for entry in logs {
                let level = match entry.level.as_str() {
                    "error" => entry.level.red(),
                    "warning" => entry.level.yellow(),
                    _ => entry.level.normal(),
                };
                println!(
                    "  {} [{}] {}",
                    format_time(entry.created_at.as_deref()).bright_black(),
                    level,
                    entry.message
                );
            }
        }

        cli::Command::Files { task_id } => {
            let files = api.get_task_files(&task_id).await?;
            if files.is_empty() {
                log_info!("暂无产物文件");
            }
            for file in files {
                println!(
                    "  [{}] {}  {}",
                    file.file_type.cyan(),
                    file.file_name,
                    format_size(file.file_size).bright_black()
                );
                println!("    {}", api.file_download_url(&task_id, &file.file_type));
            }
        }

        cli::Command::Stats => {
            let stats = api.get_stats().await?;
            PrettyLogger::title("任务统计");
            PrettyLogger::field("总数", stats.total.to_string());
            PrettyLogger::field("等待中", stats.pending.to_string());
            PrettyLogger::field("处理中", stats.processing.to_string());
            PrettyLogger::field("已完成", stats.completed.to_string());
            PrettyLogger::field("失败", stats.failed.to_string());
            PrettyLogger::field("已取消", stats.cancelled.to_string());
        }

        cli::Command::Health => {
            let health = api.health_check().await?;
            if health.status == "healthy" {
                log_success!("服务正常: {}", health.status);
            } else {
                log_warning!("服务状态异常: {}", health.status);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = cli::Cli::parse();
    info!("连接服务端: {}", args.server);

    run(args).await
}
