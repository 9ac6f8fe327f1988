pub mod interceptor;
pub mod packet;
pub mod protocol;
