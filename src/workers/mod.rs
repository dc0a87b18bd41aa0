pub mod dispatcher;
pub mod reconciler;
pub mod status_consumer;
