// Generated by build.rs (tonic-build) into this directory

pub mod items {
    include!("market.items.rs");
}

pub mod health {
    include!("market.health.rs");
}
