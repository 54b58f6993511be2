pub mod common;
pub mod competitor;
pub mod timing;
