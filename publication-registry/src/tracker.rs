//! 在途跟踪器（InFlightTracker）
//!
//! 进程内并发映射：`(事件实例标识, 投递目标) → 当前跟踪的发布记录`。
//! 键中的事件部分按实例标识比较而非按值比较：派发路径持有原始事件实例，
//! 借此无需序列化往返即可找回自己的记录；值相等但实例不同的事件不会被去重。
//!
//! 跟踪器只是加速手段，持久化存储才是事实来源；查不到时应回退到仓储。
//!
use dashmap::DashMap;
use publication_domain::publication::{
    EventIdentity, EventPublication, PublicationId, PublishedEvent, TargetIdentifier,
};

type TrackerKey = (EventIdentity, TargetIdentifier);

#[derive(Debug, Default)]
pub struct InFlightTracker {
    // 被跟踪的记录持有事件实例，保证键中的实例地址在跟踪期间不会被复用
    publications: DashMap<TrackerKey, EventPublication>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(event: &PublishedEvent, target: &TargetIdentifier) -> TrackerKey {
        (event.identity(), target.clone())
    }

    /// 登记（或替换）一条在途记录，返回被替换的旧记录
    pub fn register(&self, publication: EventPublication) -> Option<EventPublication> {
        let key = Self::key(publication.event(), publication.target_identifier());
        self.publications.insert(key, publication)
    }

    pub fn lookup(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Option<EventPublication> {
        self.publications
            .get(&Self::key(event, target))
            .map(|entry| entry.value().clone())
    }

    /// 在条目锁内修改在途记录；条目不存在时返回 None
    pub fn update<F>(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
        f: F,
    ) -> Option<EventPublication>
    where
        F: FnOnce(&mut EventPublication),
    {
        self.publications
            .get_mut(&Self::key(event, target))
            .map(|mut entry| {
                f(entry.value_mut());
                entry.value().clone()
            })
    }

    pub fn unregister(
        &self,
        event: &PublishedEvent,
        target: &TargetIdentifier,
    ) -> Option<EventPublication> {
        self.publications
            .remove(&Self::key(event, target))
            .map(|(_, publication)| publication)
    }

    /// 按记录标识移除。
    ///
    /// 从仓储重建的记录持有的是新的事件实例，因此先按键尝试，再按标识扫描。
    pub fn unregister_publication(&self, publication: &EventPublication) -> Option<EventPublication> {
        let id = publication.identifier();
        let key = Self::key(publication.event(), publication.target_identifier());

        if let Some((_, removed)) = self
            .publications
            .remove_if(&key, |_, tracked| tracked.identifier() == id)
        {
            return Some(removed);
        }

        self.unregister_by_id(id)
    }

    pub fn unregister_by_id(&self, id: PublicationId) -> Option<EventPublication> {
        let key = self
            .publications
            .iter()
            .find(|entry| entry.value().identifier() == id)
            .map(|entry| entry.key().clone())?;

        self.publications
            .remove_if(&key, |_, tracked| tracked.identifier() == id)
            .map(|(_, publication)| publication)
    }

    pub fn contains(&self, id: PublicationId) -> bool {
        self.publications
            .iter()
            .any(|entry| entry.value().identifier() == id)
    }

    /// 当前在途记录快照
    pub fn publications(&self) -> Vec<EventPublication> {
        self.publications
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.publications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    pub fn clear(&self) {
        self.publications.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use publication_domain::publication::PublicationStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn publication(event: &PublishedEvent, target: &str) -> EventPublication {
        EventPublication::new(event.clone(), TargetIdentifier::new(target), Utc::now())
    }

    #[test]
    fn lookup_is_by_instance_not_by_value() {
        let tracker = InFlightTracker::new();
        let event = PublishedEvent::new("OrderPlaced", json!({"order_id": "o-1"}));
        let p = publication(&event, "inventory");
        tracker.register(p.clone());

        let found = tracker.lookup(&event, &"inventory".into()).unwrap();
        assert_eq!(found.identifier(), p.identifier());

        // 值相等但实例不同
        let twin = event.detached();
        assert!(tracker.lookup(&twin, &"inventory".into()).is_none());
        assert!(tracker.lookup(&event, &"billing".into()).is_none());
    }

    #[test]
    fn register_replaces_existing_entry() {
        let tracker = InFlightTracker::new();
        let event = PublishedEvent::new("OrderPlaced", json!({}));
        let first = publication(&event, "inventory");
        let second = publication(&event, "inventory");

        assert!(tracker.register(first.clone()).is_none());
        let replaced = tracker.register(second.clone()).unwrap();

        assert_eq!(replaced.identifier(), first.identifier());
        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker
                .lookup(&event, &"inventory".into())
                .unwrap()
                .identifier(),
            second.identifier()
        );
    }

    #[test]
    fn update_mutates_in_place() {
        let tracker = InFlightTracker::new();
        let event = PublishedEvent::new("OrderPlaced", json!({}));
        tracker.register(publication(&event, "inventory"));

        let updated = tracker
            .update(&event, &"inventory".into(), |p| {
                p.mark_processing();
            })
            .unwrap();
        assert_eq!(updated.status(), PublicationStatus::Processing);
        assert!(
            tracker
                .update(&event, &"billing".into(), |p| {
                    p.mark_processing();
                })
                .is_none()
        );
    }

    #[test]
    fn unregister_publication_falls_back_to_identifier() {
        let tracker = InFlightTracker::new();
        let event = PublishedEvent::new("OrderPlaced", json!({}));
        let p = publication(&event, "inventory");
        tracker.register(p.clone());

        // 从存储重建的副本：同一标识，不同事件实例
        let rebuilt = p.detached();
        let removed = tracker.unregister_publication(&rebuilt).unwrap();
        assert_eq!(removed.identifier(), p.identifier());
        assert!(tracker.is_empty());
        assert!(tracker.unregister_publication(&rebuilt).is_none());
    }

    #[test]
    fn concurrent_register_and_unregister() {
        let tracker = Arc::new(InFlightTracker::new());
        let events: Vec<_> = (0..64)
            .map(|n| PublishedEvent::new("Tick", json!({ "n": n })))
            .collect();

        std::thread::scope(|scope| {
            for chunk in events.chunks(16) {
                let tracker = tracker.clone();
                scope.spawn(move || {
                    for event in chunk {
                        tracker.register(publication(event, "a"));
                        tracker.register(publication(event, "b"));
                        tracker.unregister(event, &"a".into());
                    }
                });
            }
        });

        assert_eq!(tracker.len(), 64);
        assert!(
            tracker
                .publications()
                .iter()
                .all(|p| p.target_identifier().value() == "b")
        );
    }
}
