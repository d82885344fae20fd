pub mod lock;
pub mod pubsub;
