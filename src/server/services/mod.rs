pub mod streaming_service;
pub mod task_service;
