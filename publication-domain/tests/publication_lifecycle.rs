use anyhow::Result as AnyResult;
use chrono::{TimeDelta, Utc};
use publication_domain::persist::{
    EventPublicationRepository, EventPublicationRepositoryExt, FailedCriteria,
    InMemoryEventPublicationRepository,
};
use publication_domain::publication::{
    EventPublication, PublicationStatus, PublishedEvent, TargetIdentifier,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: String,
    amount: u64,
}

fn repository() -> Arc<dyn EventPublicationRepository> {
    Arc::new(InMemoryEventPublicationRepository::new())
}

#[tokio::test]
async fn full_lifecycle_through_trait_object() -> AnyResult<()> {
    let repo = repository();
    let t0 = Utc::now();
    let event = PublishedEvent::from_event(
        "OrderPlaced",
        &OrderPlaced {
            order_id: "o-1".into(),
            amount: 10,
        },
    )?;
    let created = repo
        .create(EventPublication::new(event.clone(), "billing".into(), t0))
        .await?;
    let id = created.identifier();

    repo.mark_processing(id).await?;
    repo.mark_failed(id).await?;
    assert_eq!(repo.count_by_status(PublicationStatus::Failed).await?, 1);

    assert!(repo.mark_resubmitted(id, t0 + TimeDelta::seconds(5)).await?);
    repo.mark_processing(id).await?;
    repo.mark_completed(id, t0 + TimeDelta::seconds(6)).await?;

    let completed = repo.find_completed_publications().await?;
    assert_eq!(completed.len(), 1);
    let record = &completed[0];
    assert_eq!(record.status(), PublicationStatus::Completed);
    assert_eq!(record.completion_attempts(), 3);
    assert_eq!(
        record.last_resubmission_date(),
        Some(t0 + TimeDelta::seconds(5))
    );
    assert_eq!(record.completion_date(), Some(t0 + TimeDelta::seconds(6)));
    assert_eq!(
        record.event().to_event::<OrderPlaced>()?,
        OrderPlaced {
            order_id: "o-1".into(),
            amount: 10
        }
    );

    // 已完成的记录不可再认领
    assert!(!repo.mark_resubmitted(id, Utc::now()).await?);
    assert!(repo.find_incomplete_publications().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn value_lookup_finds_oldest_incomplete_publication() -> AnyResult<()> {
    let repo = repository();
    let t0 = Utc::now();
    let event = PublishedEvent::new("OrderPlaced", json!({"order_id": "o-2"}));
    let target = TargetIdentifier::from("mail");

    let first = repo
        .create(EventPublication::new(event.clone(), target.clone(), t0))
        .await?;
    let second = repo
        .create(EventPublication::new(
            event.clone(),
            target.clone(),
            t0 + TimeDelta::seconds(1),
        ))
        .await?;

    // 按值重建的事件与原实例身份不同，但仍能命中
    let rebuilt = PublishedEvent::new("OrderPlaced", json!({"order_id": "o-2"}));
    assert!(!rebuilt.same_instance(&event));

    let found = repo
        .find_incomplete_publication_by_event_and_target(&rebuilt, &target)
        .await?
        .expect("incomplete publication");
    assert_eq!(found.identifier(), first.identifier());

    repo.mark_completed(first.identifier(), Utc::now()).await?;
    let found = repo
        .find_incomplete_publication_by_event_and_target(&rebuilt, &target)
        .await?
        .expect("incomplete publication");
    assert_eq!(found.identifier(), second.identifier());

    let other = PublishedEvent::new("OrderPlaced", json!({"order_id": "o-3"}));
    assert!(
        repo.find_incomplete_publication_by_event_and_target(&other, &target)
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn failed_criteria_batch_is_oldest_first() -> AnyResult<()> {
    let repo = repository();
    let t0 = Utc::now();
    let mut ids = Vec::new();
    for n in 0..5 {
        let publication = EventPublication::new(
            PublishedEvent::new("OrderPlaced", json!({ "n": n })),
            "billing".into(),
            t0 + TimeDelta::seconds(n),
        );
        let id = repo.create(publication).await?.identifier();
        repo.mark_failed(id).await?;
        ids.push(id);
    }

    let batch = repo
        .find_failed_publications(FailedCriteria::new(None, 2))
        .await?;
    let batch_ids: Vec<_> = batch.iter().map(|p| p.identifier()).collect();
    assert_eq!(batch_ids, ids[..2]);

    let aged = repo
        .find_failed_publications(FailedCriteria::new(Some(t0 + TimeDelta::seconds(3)), 10))
        .await?;
    assert_eq!(aged.len(), 3);
    Ok(())
}

#[test]
fn publication_serializes_with_status_names() -> AnyResult<()> {
    let publication = EventPublication::new(
        PublishedEvent::new("OrderPlaced", json!({"order_id": "o-4"})),
        "inventory".into(),
        Utc::now(),
    );

    let value = serde_json::to_value(&publication)?;
    assert_eq!(value["status"], json!("PUBLISHED"));
    assert_eq!(value["target_identifier"], json!("inventory"));
    assert_eq!(value["event"]["event_type"], json!("OrderPlaced"));

    let restored: EventPublication = serde_json::from_value(value)?;
    assert_eq!(restored.identifier(), publication.identifier());
    assert!(restored.event().same_value(publication.event()));
    assert!(!restored.event().same_instance(publication.event()));
    Ok(())
}
