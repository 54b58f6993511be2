pub mod competitor;
