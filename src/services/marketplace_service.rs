use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::filter::Predicate;
use crate::models::MarketplaceItem;
use crate::proto::items::marketplace_service_server::MarketplaceService;
use crate::proto::items::{
    CreateItemRequest, CreateItemResponse, GetItemRequest, GetItemResponse, Item,
    ListAvailableItemsRequest, ListItemsResponse, SearchItemsRequest, UpdateItemRequest,
    UpdateItemResponse,
};
use crate::store::ItemStore;
use crate::validation::{CreateItemInput, SearchItemsInput, UpdateItemInput};

pub struct MarketplaceServiceImpl {
    store: Arc<dyn ItemStore>,
}

impl MarketplaceServiceImpl {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    fn model_to_proto(model: &MarketplaceItem) -> Item {
        model.to_proto()
    }
}

#[tonic::async_trait]
impl MarketplaceService for MarketplaceServiceImpl {
    /// 出品作成
    async fn create_item(
        &self,
        request: Request<CreateItemRequest>,
    ) -> Result<Response<CreateItemResponse>, Status> {
        let input = CreateItemInput::from_proto(request.into_inner())?;
        tracing::info!(
            "CreateItem called: title={:?}, category={}, condition={}, price={}",
            input.title,
            input.category.as_str(),
            input.condition.as_str(),
            input.price
        );

        let created = self.store.insert(input.into_new_item()).await.map_err(|e| {
            tracing::error!("Failed to create item: {}", e);
            e
        })?;

        Ok(Response::new(CreateItemResponse {
            item: Some(Self::model_to_proto(&created)),
        }))
    }

    async fn get_item(
        &self,
        request: Request<GetItemRequest>,
    ) -> Result<Response<GetItemResponse>, Status> {
        let id = request.into_inner().id;
        tracing::info!("GetItem called: id={}", id);

        let item = self.store.get(id).await?;
        if item.is_none() {
            tracing::debug!("GetItem: id={} not found", id);
        }

        Ok(Response::new(GetItemResponse {
            item: item.as_ref().map(Self::model_to_proto),
        }))
    }

    async fn list_available_items(
        &self,
        _request: Request<ListAvailableItemsRequest>,
    ) -> Result<Response<ListItemsResponse>, Status> {
        tracing::info!("ListAvailableItems called (backend={})", self.store.backend());

        let items = self.store.find(&[Predicate::Available], None).await?;

        Ok(Response::new(ListItemsResponse {
            items: items.iter().map(Self::model_to_proto).collect(),
        }))
    }

    /// 条件検索 (AND結合, posted_at降順, limit/offset)
    async fn search_items(
        &self,
        request: Request<SearchItemsRequest>,
    ) -> Result<Response<ListItemsResponse>, Status> {
        let filter = SearchItemsInput::from_proto(request.into_inner())?.into_filter()?;
        let predicates = filter.predicates();
        tracing::info!(
            "SearchItems called: predicates={}, limit={}, offset={}",
            predicates.len(),
            filter.page.limit(),
            filter.page.offset()
        );

        let items = self.store.find(&predicates, Some(filter.page)).await?;
        tracing::debug!("SearchItems matched {} items", items.len());

        Ok(Response::new(ListItemsResponse {
            items: items.iter().map(Self::model_to_proto).collect(),
        }))
    }

    async fn update_item(
        &self,
        request: Request<UpdateItemRequest>,
    ) -> Result<Response<UpdateItemResponse>, Status> {
        let (id, patch) = UpdateItemInput::from_proto(request.into_inner())?.into_patch();
        tracing::info!("UpdateItem called: id={}, patch={:?}", id, patch);
        if patch.is_empty() {
            tracing::debug!(
                "UpdateItem: id={} has no fields to change, refreshing updated_at only",
                id
            );
        }

        let updated = self.store.update(id, patch).await.map_err(|e| {
            tracing::error!("Failed to update item {}: {}", id, e);
            e
        })?;
        if updated.is_none() {
            tracing::debug!("UpdateItem: id={} not found", id);
        }

        Ok(Response::new(UpdateItemResponse {
            item: updated.as_ref().map(Self::model_to_proto),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::items::{self as pb, ImageList};
    use crate::store::MemoryItemStore;
    use tonic::Code;

    fn service() -> MarketplaceServiceImpl {
        MarketplaceServiceImpl::new(Arc::new(MemoryItemStore::new()))
    }

    fn create_request(title: &str, category: pb::Category, price: &str) -> CreateItemRequest {
        CreateItemRequest {
            title: title.to_string(),
            description: "Well kept, works perfectly".to_string(),
            price: price.to_string(),
            category: category as i32,
            condition: pb::Condition::Good as i32,
            location: "Seattle".to_string(),
            images: vec!["https://example.com/photo.jpg".to_string()],
        }
    }

    async fn create(svc: &MarketplaceServiceImpl, title: &str, category: pb::Category, price: &str) -> Item {
        svc.create_item(Request::new(create_request(title, category, price)))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap()
    }

    async fn search(svc: &MarketplaceServiceImpl, req: SearchItemsRequest) -> Vec<Item> {
        svc.search_items(Request::new(req))
            .await
            .unwrap()
            .into_inner()
            .items
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips_price() {
        let svc = service();
        let created = create(&svc, "Gaming Laptop", pb::Category::Laptops, "999.99").await;
        assert!(created.is_available);
        assert_eq!(created.price, "999.99");

        let fetched = svc
            .get_item(Request::new(GetItemRequest { id: created.id }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.price, "999.99");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request() {
        let svc = service();
        let mut req = create_request("Bike", pb::Category::Bikes, "100");
        req.price = "0".to_string();

        let status = svc.create_item(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let all = svc
            .list_available_items(Request::new(ListAvailableItemsRequest {}))
            .await
            .unwrap()
            .into_inner()
            .items;
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let svc = service();

        let got = svc
            .get_item(Request::new(GetItemRequest { id: 404 }))
            .await
            .unwrap()
            .into_inner();
        assert!(got.item.is_none());

        let updated = svc
            .update_item(Request::new(UpdateItemRequest {
                id: 404,
                price: Some("10".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(updated.item.is_none());
    }

    #[tokio::test]
    async fn test_search_query_is_case_insensitive_title_match() {
        let svc = service();
        create(&svc, "Gaming Laptop", pb::Category::Laptops, "800").await;
        create(&svc, "iPhone 15", pb::Category::Phones, "600").await;

        for query in ["laptop", "LAPTOP"] {
            let found = search(&svc, SearchItemsRequest {
                query: Some(query.to_string()),
                ..Default::default()
            })
            .await;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].title, "Gaming Laptop");
        }
    }

    #[tokio::test]
    async fn test_query_does_not_search_description() {
        let svc = service();
        let mut req = create_request("Office Chair", pb::Category::Other, "50");
        req.description = "Pairs nicely with a laptop stand".to_string();
        svc.create_item(Request::new(req)).await.unwrap();

        let found = search(&svc, SearchItemsRequest {
            query: Some("laptop".to_string()),
            ..Default::default()
        })
        .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_conjunctive_search_over_wire() {
        let svc = service();
        let a = create(&svc, "Road Bike", pb::Category::Bikes, "800").await;
        let _b = create(&svc, "Pixel", pb::Category::Phones, "600").await;
        let c = create(&svc, "Chronograph", pb::Category::Watches, "2500").await;

        let ids = |items: Vec<Item>| items.into_iter().map(|i| i.id).collect::<Vec<_>>();

        let bikes = search(&svc, SearchItemsRequest {
            category: Some(pb::Category::Bikes as i32),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(bikes), vec![a.id]);

        let over_700 = search(&svc, SearchItemsRequest {
            min_price: Some("700".to_string()),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(over_700), vec![c.id, a.id]);

        let both = search(&svc, SearchItemsRequest {
            category: Some(pb::Category::Bikes as i32),
            min_price: Some("700".to_string()),
            ..Default::default()
        })
        .await;
        assert_eq!(ids(both), vec![a.id]);

        let inverted = search(&svc, SearchItemsRequest {
            min_price: Some("900".to_string()),
            max_price: Some("100".to_string()),
            ..Default::default()
        })
        .await;
        assert!(inverted.is_empty());
    }

    #[tokio::test]
    async fn test_empty_search_equals_explicit_available_only() {
        let svc = service();
        create(&svc, "One", pb::Category::Other, "1").await;
        let two = create(&svc, "Two", pb::Category::Other, "2").await;
        svc.update_item(Request::new(UpdateItemRequest {
            id: two.id,
            is_available: Some(false),
            ..Default::default()
        }))
        .await
        .unwrap();

        let implicit = search(&svc, SearchItemsRequest::default()).await;
        let explicit = search(&svc, SearchItemsRequest {
            available_only: Some(true),
            ..Default::default()
        })
        .await;
        assert_eq!(implicit, explicit);
        assert_eq!(implicit.len(), 1);
        assert_eq!(implicit[0].title, "One");

        let listed = svc
            .list_available_items(Request::new(ListAvailableItemsRequest {}))
            .await
            .unwrap()
            .into_inner()
            .items;
        assert_eq!(listed, implicit);
    }

    #[tokio::test]
    async fn test_search_by_location_and_condition() {
        let svc = service();
        let mut mint_ny = create_request("Rolex", pb::Category::Watches, "5000");
        mint_ny.condition = pb::Condition::Mint as i32;
        mint_ny.location = "New York".to_string();
        let mut fair_ny = create_request("Casio", pb::Category::Watches, "40");
        fair_ny.condition = pb::Condition::Fair as i32;
        fair_ny.location = "New York".to_string();
        let mut mint_sea = create_request("Omega", pb::Category::Watches, "3000");
        mint_sea.condition = pb::Condition::Mint as i32;
        mint_sea.location = "Seattle".to_string();

        let mut expected = None;
        for req in [mint_ny, fair_ny, mint_sea] {
            let item = svc
                .create_item(Request::new(req))
                .await
                .unwrap()
                .into_inner()
                .item
                .unwrap();
            if item.title == "Rolex" {
                expected = Some(item.id);
            }
        }

        let found = search(&svc, SearchItemsRequest {
            location: Some("YORK".to_string()),
            condition: Some(pb::Condition::Mint as i32),
            ..Default::default()
        })
        .await;
        assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![expected.unwrap()]);
        assert_eq!(found[0].location, "New York");
        assert_eq!(found[0].condition, pb::Condition::Mint as i32);
    }

    #[tokio::test]
    async fn test_search_rejects_limit_over_100() {
        let svc = service();
        let status = svc
            .search_items(Request::new(SearchItemsRequest {
                limit: Some(101),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_partial_update_preserves_untouched_fields() {
        let svc = service();
        let before = create(&svc, "Gaming Laptop", pb::Category::Laptops, "999.99").await;

        let after = svc
            .update_item(Request::new(UpdateItemRequest {
                id: before.id,
                price: Some("850".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();

        assert_eq!(after.price, "850.00");
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert_eq!(after.category, before.category);
        assert_eq!(after.condition, before.condition);
        assert_eq!(after.location, before.location);
        assert_eq!(after.images, before.images);
        assert_eq!(after.is_available, before.is_available);
        assert_eq!(after.posted_at, before.posted_at);

        let before_updated = chrono::DateTime::parse_from_rfc3339(&before.updated_at).unwrap();
        let after_updated = chrono::DateTime::parse_from_rfc3339(&after.updated_at).unwrap();
        assert!(after_updated > before_updated);
    }

    #[tokio::test]
    async fn test_update_can_clear_images() {
        let svc = service();
        let item = create(&svc, "Ring", pb::Category::Jewelry, "300").await;

        let untouched = svc
            .update_item(Request::new(UpdateItemRequest {
                id: item.id,
                title: Some("Gold Ring".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();
        assert_eq!(untouched.images, item.images);

        let cleared = svc
            .update_item(Request::new(UpdateItemRequest {
                id: item.id,
                images: Some(ImageList { urls: vec![] }),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();
        assert!(cleared.images.is_empty());
        assert_eq!(cleared.title, "Gold Ring");
    }

    #[tokio::test]
    async fn test_empty_update_only_refreshes_timestamp() {
        let svc = service();
        let before = create(&svc, "Lamp", pb::Category::Other, "25").await;

        let after = svc
            .update_item(Request::new(UpdateItemRequest {
                id: before.id,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.title, before.title);
        assert_eq!(after.price, before.price);
        assert_eq!(after.images, before.images);
        assert_eq!(after.posted_at, before.posted_at);
        assert_ne!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_updates_are_last_write_wins() {
        let svc = service();
        let item = create(&svc, "Watch", pb::Category::Watches, "500").await;

        let first = UpdateItemRequest {
            id: item.id,
            price: Some("450".to_string()),
            location: Some("Boston".to_string()),
            ..Default::default()
        };
        let second = UpdateItemRequest {
            id: item.id,
            price: Some("400".to_string()),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            svc.update_item(Request::new(first)),
            svc.update_item(Request::new(second))
        );
        a.unwrap();
        b.unwrap();

        let stored = svc
            .get_item(Request::new(GetItemRequest { id: item.id }))
            .await
            .unwrap()
            .into_inner()
            .item
            .unwrap();
        // join! polls the first update first, so the second writer owns price;
        // location is untouched by the second writer and keeps the first value.
        assert_eq!(stored.price, "400.00");
        assert_eq!(stored.location, "Boston");
    }
}
