pub mod credentials;
pub mod mock_gateway;
pub mod public_api_client;
