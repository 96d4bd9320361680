// Adapters implementing the application ports
pub mod http_client;
