use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::health::{
    health_check_response::ServingStatus, health_server::Health, HealthCheckRequest,
    HealthCheckResponse,
};
use crate::store::ItemStore;

pub struct HealthServiceImpl {
    store: Arc<dyn ItemStore>,
}

impl HealthServiceImpl {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl Health for HealthServiceImpl {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let status = match self.store.ping().await {
            Ok(()) => ServingStatus::Serving,
            Err(e) => {
                tracing::warn!("Health check failed (backend={}): {}", self.store.backend(), e);
                ServingStatus::NotServing
            }
        };

        Ok(Response::new(HealthCheckResponse {
            status: status.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::filter::{Page, Predicate};
    use crate::models::{ItemPatch, MarketplaceItem, NewItem};
    use crate::store::MemoryItemStore;

    struct UnreachableStore;

    #[tonic::async_trait]
    impl ItemStore for UnreachableStore {
        async fn insert(&self, _item: NewItem) -> AppResult<MarketplaceItem> {
            Err(AppError::Internal("unreachable".into()))
        }
        async fn get(&self, _id: i32) -> AppResult<Option<MarketplaceItem>> {
            Err(AppError::Internal("unreachable".into()))
        }
        async fn find(
            &self,
            _predicates: &[Predicate],
            _window: Option<Page>,
        ) -> AppResult<Vec<MarketplaceItem>> {
            Err(AppError::Internal("unreachable".into()))
        }
        async fn update(&self, _id: i32, _patch: ItemPatch) -> AppResult<Option<MarketplaceItem>> {
            Err(AppError::Internal("unreachable".into()))
        }
        async fn ping(&self) -> AppResult<()> {
            Err(AppError::Internal("unreachable".into()))
        }
        fn backend(&self) -> &str {
            "unreachable"
        }
    }

    #[tokio::test]
    async fn test_serving_when_store_answers() {
        let svc = HealthServiceImpl::new(Arc::new(MemoryItemStore::new()));
        let res = svc
            .check(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(res.status, ServingStatus::Serving as i32);
        assert!(chrono::DateTime::parse_from_rfc3339(&res.timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_not_serving_when_store_is_down() {
        let svc = HealthServiceImpl::new(Arc::new(UnreachableStore));
        let res = svc
            .check(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(res.status, ServingStatus::NotServing as i32);
    }
}
