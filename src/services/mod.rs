pub mod health_service;
pub mod marketplace_service;

pub use health_service::HealthServiceImpl;
pub use marketplace_service::MarketplaceServiceImpl;
