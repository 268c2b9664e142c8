/// 事件发布注册表（内存版）示例
/// 展示 发布扇出 -> 派发回调 -> 失败 -> RecoveryEngine 重投 -> 完成 的闭环
use anyhow::{Result as AnyResult, anyhow};
use publication_domain::persist::{EventPublicationRepository, InMemoryEventPublicationRepository};
use publication_domain::policy::{ResubmissionPolicy, StalenessPolicy};
use publication_domain::publication::{
    EventPublication, PublicationStatus, PublishedEvent, TargetIdentifier,
};
use publication_registry::{
    EventPublicationRegistry, InMemoryPassLock, PublicationConsumer, RecoveryEngine,
    RecoveryEngineConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// 示例监听器：mail 第一次调用失败
// ============================================================================

#[derive(Default)]
struct Listeners {
    mail_calls: AtomicUsize,
}

impl Listeners {
    fn invoke(&self, target: &TargetIdentifier, event: &PublishedEvent) -> AnyResult<()> {
        if target.value() == "mail" && self.mail_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(anyhow!("smtp relay unavailable"));
        }
        println!(
            "listener={} type={} payload={}",
            target,
            event.event_type(),
            event.payload()
        );
        Ok(())
    }
}

/// 派发一条记录，并把结果回写到注册表
async fn dispatch(
    registry: &EventPublicationRegistry,
    listeners: &Listeners,
    event: &PublishedEvent,
    target: &TargetIdentifier,
) -> AnyResult<()> {
    registry.mark_processing(event, target).await?;
    match listeners.invoke(target, event) {
        Ok(()) => registry.mark_completed(event, target).await?,
        Err(err) => {
            println!("❌ listener={} failed: {}", target, err);
            registry.mark_failed(event, target).await?;
        }
    }
    Ok(())
}

// ============================================================================
// 重投消费者：重新走一遍派发
// ============================================================================

struct Redispatcher {
    registry: Arc<EventPublicationRegistry>,
    listeners: Arc<Listeners>,
}

#[async_trait::async_trait]
impl PublicationConsumer for Redispatcher {
    async fn resubmit(&self, publication: EventPublication) -> AnyResult<()> {
        println!(
            "🔁 resubmit id={} target={} attempts={}",
            publication.identifier(),
            publication.target_identifier(),
            publication.completion_attempts()
        );
        dispatch(
            &self.registry,
            &self.listeners,
            publication.event(),
            publication.target_identifier(),
        )
        .await
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    println!("=== 事件发布注册表（内存版）示例 ===\n");

    let repository = Arc::new(InMemoryEventPublicationRepository::new());
    let registry = Arc::new(
        EventPublicationRegistry::builder()
            .repository(repository.clone())
            .staleness(
                StalenessPolicy::disabled()
                    .with_processing(Duration::from_secs(5))
                    .with_resubmitted(Duration::from_secs(5)),
            )
            .build(),
    );
    let listeners = Arc::new(Listeners::default());

    // 发布：一个事件扇出到两个目标
    let event = PublishedEvent::new("OrderPlaced", json!({"order_id": "o-42", "amount": 99}));
    let targets = [TargetIdentifier::from("inventory"), TargetIdentifier::from("mail")];
    registry.store(event.clone(), targets.clone()).await?;
    println!("✅ 已登记 {} 条发布记录", targets.len());

    for target in &targets {
        dispatch(&registry, &listeners, &event, target).await?;
    }
    println!(
        "失败记录数: {}",
        repository.count_by_status(PublicationStatus::Failed).await?
    );

    // Engine
    let engine = Arc::new(
        RecoveryEngine::builder()
            .registry(registry.clone())
            .consumer(Arc::new(Redispatcher {
                registry: registry.clone(),
                listeners: listeners.clone(),
            }))
            .lock(Arc::new(InMemoryPassLock::new()))
            .resubmission(ResubmissionPolicy::defaults().with_max_in_flight(10)?)
            .config(RecoveryEngineConfig {
                stale_sweep_interval: Duration::from_millis(500),
                resubmission_interval: Duration::from_millis(200),
            })
            .build(),
    );

    let handle = engine.start();
    println!("✅ 引擎已启动");

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown();
    handle.join().await;

    let outstanding = registry.shutdown().await?;
    println!(
        "\n✅ 优雅关闭完成，已完成 {} 条，未完成 {} 条",
        registry.find_completed_publications().await?.len(),
        outstanding.len()
    );
    Ok(())
}
