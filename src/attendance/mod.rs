pub mod aggregation;
pub mod engine;
pub mod service;
pub mod view;
