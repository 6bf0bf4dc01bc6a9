//! Subscription matching and paging
//!
//! Selects, for every subscription, the changed entities within its scope
//! that satisfy all of its conditions, then splits the selection into pages
//! of at most `entity_limit` entities. Input entities are expected in
//! ascending primary key order and that order is kept in every page, so the
//! same batch always yields the same partition.

use ampere_persistence::{ChangedEntity, ConditionData, SubscriptionData};

/// The pages produced for one subscription
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionMatch {
    pub subscription: SubscriptionData,
    /// Non-empty pages, each holding between 1 and `entity_limit` entities
    pub pages: Vec<Vec<ChangedEntity>>,
}

/// Inclusive bound check. An entity without the attribute never matches.
pub fn condition_matches(condition: &ConditionData, entity: &ChangedEntity) -> bool {
    let Some(value) = entity.attribute(condition.attribute) else {
        return false;
    };
    condition.lower_threshold.is_none_or(|lower| value >= lower)
        && condition.upper_threshold.is_none_or(|upper| value <= upper)
}

/// Whether `entity` falls under the subscription's aggregator and optional site scope
pub fn in_scope(subscription: &SubscriptionData, entity: &ChangedEntity) -> bool {
    entity.resource_kind() == subscription.resource_kind
        && entity.aggregator_id == subscription.aggregator_id
        && subscription
            .scoped_site_id
            .is_none_or(|site_id| site_id == entity.site_id)
}

/// Entities selected by one subscription, in input order
pub fn select_entities(
    subscription: &SubscriptionData,
    entities: &[ChangedEntity],
) -> Vec<ChangedEntity> {
    entities
        .iter()
        .filter(|entity| in_scope(subscription, entity))
        .filter(|entity| {
            subscription
                .conditions
                .iter()
                .all(|condition| condition_matches(condition, entity))
        })
        .cloned()
        .collect()
}

/// Split into consecutive pages of at most `limit` entities
pub fn paginate(entities: Vec<ChangedEntity>, limit: usize) -> Vec<Vec<ChangedEntity>> {
    let limit = limit.max(1);
    entities.chunks(limit).map(<[ChangedEntity]>::to_vec).collect()
}

/// Match every subscription against the batch.
///
/// Subscriptions selecting nothing are left out of the result.
pub fn match_subscriptions(
    subscriptions: &[SubscriptionData],
    entities: &[ChangedEntity],
) -> Vec<SubscriptionMatch> {
    subscriptions
        .iter()
        .filter_map(|subscription| {
            let selected = select_entities(subscription, entities);
            if selected.is_empty() {
                return None;
            }
            Some(SubscriptionMatch {
                subscription: subscription.clone(),
                pages: paginate(selected, subscription.entity_limit),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampere_common::{ConditionAttribute, ResourceKind};
    use ampere_persistence::{EntityPayload, ReadingData};
    use chrono::{TimeZone, Utc};

    fn reading(id: i64, aggregator_id: i64, site_id: i64, value: i64) -> ChangedEntity {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ChangedEntity {
            primary_key: id,
            aggregator_id,
            site_id,
            changed_time: t,
            deleted_time: None,
            payload: EntityPayload::Reading(ReadingData {
                site_reading_id: id,
                site_reading_type_id: 1,
                site_id,
                local_id: None,
                quality_flags: 0,
                time_period_start: t,
                time_period_seconds: 300,
                value,
            }),
        }
    }

    fn subscription(id: i64, limit: usize) -> SubscriptionData {
        SubscriptionData {
            subscription_id: id,
            aggregator_id: 1,
            resource_kind: ResourceKind::Reading,
            scoped_site_id: None,
            notification_uri: format!("http://localhost/{}", id),
            entity_limit: limit,
            conditions: vec![],
        }
    }

    fn keys(page: &[ChangedEntity]) -> Vec<i64> {
        page.iter().map(|e| e.primary_key).collect()
    }

    fn condition(lower: Option<f64>, upper: Option<f64>) -> ConditionData {
        ConditionData {
            attribute: ConditionAttribute::ReadingValue,
            lower_threshold: lower,
            upper_threshold: upper,
        }
    }

    #[test]
    fn test_condition_bounds_are_inclusive() {
        let entity = reading(1, 1, 1, 10);
        assert!(condition_matches(&condition(Some(10.0), Some(10.0)), &entity));
        assert!(condition_matches(&condition(Some(5.0), None), &entity));
        assert!(!condition_matches(&condition(Some(11.0), None), &entity));
        assert!(condition_matches(&condition(None, Some(10.0)), &entity));
        assert!(!condition_matches(&condition(None, Some(9.0)), &entity));
        assert!(condition_matches(&condition(None, None), &entity));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let entity = reading(1, 1, 1, 10);
        let price = ConditionData {
            attribute: ConditionAttribute::ImportActivePrice,
            lower_threshold: None,
            upper_threshold: None,
        };
        assert!(!condition_matches(&price, &entity));

        let mut sub = subscription(1, 10);
        sub.conditions.push(price);
        assert!(match_subscriptions(&[sub], &[entity]).is_empty());
    }

    #[test]
    fn test_scope_filters_aggregator_and_site() {
        let entities = vec![
            reading(1, 1, 100, 0),
            reading(2, 1, 200, 0),
            reading(3, 2, 100, 0),
        ];

        let global = subscription(1, 10);
        assert_eq!(keys(&select_entities(&global, &entities)), vec![1, 2]);

        let mut scoped = subscription(2, 10);
        scoped.scoped_site_id = Some(200);
        assert_eq!(keys(&select_entities(&scoped, &entities)), vec![2]);

        let mut other_kind = subscription(3, 10);
        other_kind.resource_kind = ResourceKind::Site;
        assert!(select_entities(&other_kind, &entities).is_empty());
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let entities: Vec<_> = (1..=5).map(|i| reading(i, 1, 1, i * 10)).collect();
        let mut sub = subscription(1, 10);
        sub.conditions.push(condition(Some(20.0), None));
        sub.conditions.push(condition(None, Some(40.0)));

        assert_eq!(keys(&select_entities(&sub, &entities)), vec![2, 3, 4]);
    }

    #[test]
    fn test_paging_covers_every_entity_once_in_order() {
        let entities: Vec<_> = (1..=7).map(|i| reading(i, 1, 1, 0)).collect();
        let matches = match_subscriptions(&[subscription(1, 3)], &entities);

        assert_eq!(matches.len(), 1);
        let pages: Vec<Vec<i64>> = matches[0].pages.iter().map(|p| keys(p)).collect();
        assert_eq!(pages, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        assert_eq!(matches[0].pages.iter().map(Vec::len).sum::<usize>(), 7);
    }

    #[test]
    fn test_exact_multiple_of_limit() {
        let entities: Vec<_> = (1..=4).map(|i| reading(i, 1, 1, 0)).collect();
        assert_eq!(paginate(entities, 2).len(), 2);
    }

    #[test]
    fn test_empty_subscriptions_are_dropped() {
        let entities = vec![reading(1, 1, 1, 0)];
        let mut foreign = subscription(1, 10);
        foreign.aggregator_id = 9;
        let matches = match_subscriptions(&[foreign, subscription(2, 10)], &entities);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].subscription.subscription_id, 2);
    }
}
