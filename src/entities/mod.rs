pub mod look;
pub mod outfit;
