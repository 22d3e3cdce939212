pub use shared_types::GatewayError;
