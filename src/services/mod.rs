// src/services/mod.rs
pub mod awards;
pub mod cache;
pub mod dashboard;
pub mod fallback;
pub mod fiscal;
pub mod markets;
pub mod mock;
pub mod offices;
pub mod overview;
pub mod selection;
pub mod timeline;
pub mod usaspending;
