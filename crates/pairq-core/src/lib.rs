pub mod config;
pub mod engine;
pub mod errors;
pub mod index;
pub mod model;
pub mod queue;
pub mod status;
pub mod storage;
pub mod task_id;

pub use queue::TaskQueue;
