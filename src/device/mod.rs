mod memory_backend;
mod postgres_backend;
mod registry;
mod types;

pub use memory_backend::MemoryDeviceTokenRegistry;
pub use postgres_backend::PostgresDeviceTokenRegistry;
pub use registry::DeviceTokenRegistry;
pub use types::{DeviceToken, DeviceType, TokenRegistration, MAX_BROWSER_INFO_LEN, MAX_TOKEN_LEN};
