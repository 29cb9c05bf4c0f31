pub mod jsonrpc_handler_test;
