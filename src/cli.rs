use clap::{Parser, Subcommand};

fn default_server() -> String {
    std::env::var("YTCLIP_SERVER").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// YouTube剪辑下载服务的任务管理工具
#[derive(Parser, Debug)]
#[command(name = "ytclipctl")]
#[command(version = "0.1.0")]
#[command(about = "管理剪辑下载服务上的下载任务", long_about = None)]
pub struct Cli {
    /// 服务端地址，未指定时读取YTCLIP_SERVER环境变量
    #[arg(long, value_name = "URL")]
    #[arg(default_value_t = default_server())]
    pub server: String,

    /// 请求超时时间（秒）
    #[arg(long, value_name = "SECONDS")]
    #[arg(default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 列出任务，并按状态汇总
    List {
        /// 过滤状态: pending, processing, completed, failed, cancelled
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,

        /// 返回数量上限
        #[arg(long, value_name = "N")]
        limit: Option<u32>,
    },

    /// 查看单个任务详情
    Show {
        /// 任务ID
        task_id: String,
    },

    /// 创建下载任务
    Create {
        /// 视频链接
        #[arg(long, value_name = "URL")]
        url: String,

        /// 开始时间 (HH:MM:SS, MM:SS 或秒数)
        #[arg(long, value_name = "TIME")]
        start: String,

        /// 结束时间
        #[arg(long, value_name = "TIME")]
        end: String,

        /// 代理服务器地址
        #[arg(long, value_name = "PROXY")]
        proxy: Option<String>,

        /// 字幕语言代码，逗号分隔
        #[arg(long, value_name = "LANGS")]
        #[arg(default_value = "zh,en")]
        subtitle_langs: String,

        /// 跳过视频下载
        #[arg(long)]
        no_video: bool,

        /// 跳过音频下载
        #[arg(long)]
        no_audio: bool,

        /// 跳过字幕下载
        #[arg(long)]
        no_subtitles: bool,

        /// 不把字幕烧录进视频
        #[arg(long)]
        no_burn: bool,
    },

    /// 取消任务
    Cancel {
        /// 任务ID
        task_id: String,
    },

    /// 重试失败的任务
    Retry {
        /// 任务ID
        task_id: String,
    },

    /// 删除任务
    Delete {
        /// 任务ID
        task_id: String,

        /// 保留已下载的文件
        #[arg(long)]
        keep_files: bool,
    },

    /// 查看任务日志
    Logs {
        /// 任务ID
        task_id: String,

        /// 日志条数上限
        #[arg(long, value_name = "N")]
        #[arg(default_value_t = 100)]
        limit: u32,
    },

    /// 查看任务的产物文件
    Files {
        /// 任务ID
        task_id: String,
    },

    /// 查看服务端统计信息
    Stats,

    /// 服务健康检查
    Health,
}
