pub mod okx_client;
pub mod okx_response;

pub use okx_client::OkxClient;
