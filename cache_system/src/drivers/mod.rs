//! Concrete cache drivers, in probing priority order

pub mod redis;
pub mod shared_memory;
pub mod relational;
pub mod ephemeral;
pub mod null;

pub use self::redis::RedisDriver;
pub use ephemeral::EphemeralDriver;
pub use null::NullDriver;
pub use relational::RelationalDriver;
pub use shared_memory::{ObjectCache, SharedMemoryDriver};
