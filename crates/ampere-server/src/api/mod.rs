//! Internal HTTP surface

use std::sync::Arc;

use actix_web::web;
use ampere_notify::DispatchEngine;
use ampere_persistence::PersistenceService;
use metrics_exporter_prometheus::PrometheusHandle;

pub mod health;
pub mod notify;

/// Shared state handed to every handler
pub struct AppState {
    pub persistence: Arc<dyn PersistenceService>,
    pub dispatch: Arc<DispatchEngine>,
    pub prometheus: Option<PrometheusHandle>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(health::metrics)
        .service(notify::notify_resource_changed);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use ampere_common::{AmpereError, ResourceKind};
    use ampere_notify::{DispatchEngine, InMemoryTaskQueue};
    use ampere_persistence::{
        ChangePersistence, ChangedEntity, EntityPayload, PersistenceService, SiteData,
        SubscriptionData, SubscriptionPersistence,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::AppState;

    /// Three changed sites and one global subscription with a page size of 2
    pub struct StubPersistence {
        pub healthy: bool,
        pub failing: bool,
    }

    #[async_trait]
    impl ChangePersistence for StubPersistence {
        async fn locate_change_batch(
            &self,
            _kind: ResourceKind,
            _timestamp: DateTime<Utc>,
        ) -> anyhow::Result<BTreeSet<i64>> {
            if self.failing {
                return Err(AmpereError::Database("connection reset".to_string()).into());
            }
            Ok(BTreeSet::from([1, 2, 3]))
        }

        async fn fetch_changed_entities(
            &self,
            _kind: ResourceKind,
            keys: &BTreeSet<i64>,
        ) -> anyhow::Result<Vec<ChangedEntity>> {
            Ok(keys
                .iter()
                .map(|&id| ChangedEntity {
                    primary_key: id,
                    aggregator_id: 1,
                    site_id: id,
                    changed_time: Utc::now(),
                    deleted_time: None,
                    payload: EntityPayload::Site(SiteData {
                        site_id: id,
                        nmi: None,
                        lfdi: format!("lfdi-{}", id),
                        sfdi: id,
                        device_category: 0,
                        timezone_id: "UTC".to_string(),
                    }),
                })
                .collect())
        }
    }

    #[async_trait]
    impl SubscriptionPersistence for StubPersistence {
        async fn list_active_subscriptions(
            &self,
            kind: ResourceKind,
        ) -> anyhow::Result<Vec<SubscriptionData>> {
            if kind != ResourceKind::Site {
                return Ok(Vec::new());
            }
            Ok(vec![SubscriptionData {
                subscription_id: 1,
                aggregator_id: 1,
                resource_kind: kind,
                scoped_site_id: None,
                notification_uri: "http://localhost/cb".to_string(),
                entity_limit: 2,
                conditions: vec![],
            }])
        }
    }

    #[async_trait]
    impl PersistenceService for StubPersistence {
        async fn health_check(&self) -> anyhow::Result<()> {
            if self.healthy {
                Ok(())
            } else {
                anyhow::bail!("database unreachable")
            }
        }
    }

    pub fn app_state(healthy: bool, failing: bool) -> Arc<AppState> {
        app_state_with_capacity(healthy, failing, 16)
    }

    pub fn app_state_with_capacity(healthy: bool, failing: bool, capacity: usize) -> Arc<AppState> {
        let persistence = Arc::new(StubPersistence { healthy, failing });
        let queue = Arc::new(InMemoryTaskQueue::new(capacity));
        Arc::new(AppState {
            persistence: persistence.clone(),
            dispatch: Arc::new(DispatchEngine::new(persistence, queue)),
            prometheus: None,
        })
    }
}
