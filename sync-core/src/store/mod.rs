pub mod gateway;
pub mod rows;
pub mod traits;

pub use gateway::{create_pool_with_retries, sanitize_connection_url, StoreGateway};
pub use traits::Store;
