//! 恢复引擎（RecoveryEngine）
//!
//! 统一编排注册表的两类周期批次：
//! - 陈旧回收：将停留过久的 Processing/Resubmitted 记录置为 Failed；
//! - 失败重投：按重投策略认领 Failed 记录并交给消费者；
//! - 每个批次可选地先获取 `PassLock`，未获取到则跳过本轮；
//! - 提供关闭与等待的 `EngineHandle`。
//!
//! 批次出错只记录日志，不会终止周期任务。
//!
use crate::consumer::PublicationConsumer;
use crate::lock::PassLock;
use crate::registry::EventPublicationRegistry;
use bon::Builder;
use publication_domain::error::DomainResult as Result;
use publication_domain::policy::ResubmissionPolicy;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub const STALE_SWEEP_PASS: &str = "event-publication.stale-sweep";
pub const RESUBMISSION_PASS: &str = "event-publication.resubmission";

#[derive(Builder)]
pub struct RecoveryEngine {
    registry: Arc<EventPublicationRegistry>,
    consumer: Arc<dyn PublicationConsumer>,
    lock: Option<Arc<dyn PassLock>>,
    #[builder(default)]
    resubmission: ResubmissionPolicy,
    #[builder(default)]
    config: RecoveryEngineConfig,
}

impl RecoveryEngine {
    /// 启动恢复引擎，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(2);

        // stale sweep worker（周期任务）
        {
            let engine = self.clone();
            tasks.push(Self::spawn_periodic(
                token.clone(),
                self.config.stale_sweep_interval,
                move || {
                    let engine = engine.clone();
                    async move {
                        if let Err(err) = engine.run_stale_sweep().await {
                            error!(error = %err, "stale publication sweep failed");
                        }
                    }
                },
            ));
        }

        // resubmission worker（周期任务）
        {
            let engine = self.clone();
            tasks.push(Self::spawn_periodic(
                token.clone(),
                self.config.resubmission_interval,
                move || {
                    let engine = engine.clone();
                    async move {
                        if let Err(err) = engine.run_resubmission().await {
                            error!(error = %err, "failed publication resubmission failed");
                        }
                    }
                },
            ));
        }

        EngineHandle { token, tasks }
    }

    /// 执行一次陈旧回收，返回被置为 Failed 的条数；未获取到锁时返回 0
    pub async fn run_stale_sweep(&self) -> Result<usize> {
        self.guarded(STALE_SWEEP_PASS, || self.registry.mark_stale_publications_failed())
            .await
    }

    /// 执行一次失败重投，返回交付给消费者的条数；未获取到锁时返回 0
    pub async fn run_resubmission(&self) -> Result<usize> {
        self.guarded(RESUBMISSION_PASS, || {
            self.registry
                .process_failed_publications(&self.resubmission, self.consumer.as_ref())
        })
        .await
    }

    async fn guarded<F, Fut>(&self, pass: &str, f: F) -> Result<usize>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<usize>>,
    {
        let Some(lock) = &self.lock else {
            return f().await;
        };

        if !lock.try_lock(pass).await? {
            debug!(pass, "pass lock held elsewhere, skipping");
            return Ok(0);
        }

        let result = f().await;

        if let Err(err) = lock.unlock(pass).await {
            warn!(pass, error = %err, "failed to release pass lock");
        }

        result
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            // tokio 的 interval 不接受零周期
            let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }
}

/// 恢复引擎配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryEngineConfig {
    /// 陈旧回收间隔
    pub stale_sweep_interval: Duration,
    /// 失败重投间隔
    pub resubmission_interval: Duration,
}

impl Default for RecoveryEngineConfig {
    fn default() -> Self {
        Self {
            stale_sweep_interval: Duration::from_secs(60),
            resubmission_interval: Duration::from_secs(30),
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
