pub mod streaming_service_test;
pub mod task_service_test;
