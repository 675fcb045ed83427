pub mod backoff;
pub mod consumer;
pub mod dispatcher;
pub mod model;
pub mod poller;
pub mod repo;
pub mod status_map;
pub mod store;

pub use consumer::IngestionConsumer;
pub use dispatcher::Dispatcher;
pub use model::{
    ExecutionStatus, JobExecution, NewJobExecution, ResourceType, ResultClassification,
    TargetType,
};
pub use poller::Poller;
pub use repo::ExecutionsRepo;
pub use store::ExecutionStore;
