pub mod server_integration_test;
