pub mod marketplace_item;

pub use marketplace_item::*;
