// CV generation jobs: model, store, per-user limits, background pipeline, HTTP handlers.

pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod store;
