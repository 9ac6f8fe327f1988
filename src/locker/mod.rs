pub mod factory;
pub mod registry;

pub use factory::{DisguiseFactory, LookFactory};
pub use registry::{Locker, LockerError};
