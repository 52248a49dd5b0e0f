// src/logging/runtime_logger.rs

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;

use crate::logging::action_log::ActionRecord;
use crate::model::actions::ActionEvent;

const RETENTION_HOURS: u64 = 72;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// 日志行写入的目标文件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalStream {
    Actions,
    Failures,
}

impl JournalStream {
    const ALL: [JournalStream; 2] = [JournalStream::Actions, JournalStream::Failures];

    fn file_name(&self, prefix: &str) -> String {
        match self {
            JournalStream::Actions => format!("{}_actions.json", prefix),
            JournalStream::Failures => format!("{}_failures.json", prefix),
        }
    }
}

struct JournalEntry {
    stream: JournalStream,
    content: String,
}

/// 广告行为日志（ActionJournal）
/// 所有记录写入 `<prefix>_actions.json`，失败记录额外写入 `<prefix>_failures.json`。
/// 文件按小时滚动，保留 72 小时。
pub struct ActionJournal {
    sender: Sender<JournalEntry>,
    lifetime: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ActionJournal {
    /// 创建一个新的 ActionJournal
    ///
    /// - `log_dir`: 日志文件存放目录
    /// - `file_prefix`: 文件前缀，例如 "ads"（最终文件名形如 ads_actions.json）
    /// - `buffer_size`: mpsc 通道缓冲区大小
    /// - `batch_size`: 每个文件批量写入的日志条数
    /// - `flush_interval`: 定时刷新日志的时间间隔（毫秒）
    pub fn new(
        log_dir: &str,
        file_prefix: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let log_files: HashMap<JournalStream, Arc<RollingFileAppender>> = JournalStream::ALL
            .iter()
            .map(|stream| (*stream, Arc::new(rolling::hourly(log_dir, stream.file_name(file_prefix)))))
            .collect();

        let lifetime = CancellationToken::new();
        let writer = tokio::spawn(Self::background_log_writer(
            log_files,
            receiver,
            batch_size.max(1),
            flush_interval.max(1),
            lifetime.clone(),
        ));

        {
            let log_dir = log_dir.to_string();
            let lifetime = lifetime.clone();
            tokio::spawn(async move {
                loop {
                    Self::cleanup_old_logs(&log_dir, RETENTION_HOURS).await;
                    tokio::select! {
                        _ = time::sleep(CLEANUP_INTERVAL) => {}
                        _ = lifetime.cancelled() => break,
                    }
                }
            });
        }

        Arc::new(Self {
            sender,
            lifetime,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub async fn record(&self, record: &ActionRecord) {
        let content = match serde_json::to_string(record) {
            Ok(content) => content,
            Err(e) => {
                error!(error = %e, "failed to serialize action record");
                return;
            }
        };
        if record.is_failure() {
            self.send(JournalStream::Failures, content.clone()).await;
        }
        self.send(JournalStream::Actions, content).await;
    }

    async fn send(&self, stream: JournalStream, content: String) {
        if self.sender.send(JournalEntry { stream, content }).await.is_err() {
            warn!(?stream, "action journal is closed, record dropped");
        }
    }

    /// 订阅广告行为流，直到日志关闭
    pub fn attach(self: &Arc<Self>, mut actions: broadcast::Receiver<ActionEvent>) -> JoinHandle<()> {
        let journal = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = journal.lifetime.cancelled() => break,
                    received = actions.recv() => match received {
                        Ok(event) => journal.record(&ActionRecord::from_event(&event)).await,
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "action journal lagged behind"),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    async fn background_log_writer(
        log_files: HashMap<JournalStream, Arc<RollingFileAppender>>,
        mut receiver: Receiver<JournalEntry>,
        batch_size: usize,
        flush_interval: u64,
        lifetime: CancellationToken,
    ) {
        let mut buffers: HashMap<JournalStream, Vec<String>> = HashMap::new();
        let mut interval = time::interval(Duration::from_millis(flush_interval));
        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(entry) => {
                        let buffer = buffers.entry(entry.stream).or_default();
                        buffer.push(entry.content);
                        if buffer.len() >= batch_size {
                            let lines = std::mem::take(buffer);
                            Self::write_logs_to_disk(&log_files, entry.stream, lines).await;
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    Self::flush_all(&log_files, &mut buffers).await;
                }
                _ = lifetime.cancelled() => {
                    // 写完已经入队的日志
                    while let Ok(entry) = receiver.try_recv() {
                        buffers.entry(entry.stream).or_default().push(entry.content);
                    }
                    break;
                }
            }
        }
        Self::flush_all(&log_files, &mut buffers).await;
        debug!("action journal writer stopped");
    }

    async fn flush_all(
        log_files: &HashMap<JournalStream, Arc<RollingFileAppender>>,
        buffers: &mut HashMap<JournalStream, Vec<String>>,
    ) {
        for (stream, buffer) in buffers.iter_mut() {
            if !buffer.is_empty() {
                Self::write_logs_to_disk(log_files, *stream, std::mem::take(buffer)).await;
            }
        }
    }

    async fn write_logs_to_disk(
        log_files: &HashMap<JournalStream, Arc<RollingFileAppender>>,
        stream: JournalStream,
        lines: Vec<String>,
    ) {
        let Some(file) = log_files.get(&stream).cloned() else {
            return;
        };
        let content = lines.join("\n") + "\n";
        let written = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(?stream, error = %e, "failed to write action journal"),
            Err(e) => error!(?stream, error = %e, "action journal write task failed"),
        }
    }

    async fn cleanup_old_logs(log_dir: &str, retention_hours: u64) {
        let retention = Duration::from_secs(retention_hours * 3600);
        let now = SystemTime::now();
        let mut dir = match tokio::fs::read_dir(log_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(log_dir, error = %e, "failed to read log directory");
                return;
            }
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            if now.duration_since(modified).unwrap_or_default() > retention {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(?path, "deleted old log file"),
                    Err(e) => warn!(?path, error = %e, "failed to delete old log file"),
                }
            }
        }
    }

    /// 刷新缓冲区并停止后台任务
    pub async fn shutdown(&self) {
        self.lifetime.cancel();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                error!(error = %e, "action journal writer panicked");
            }
        }
    }
}
