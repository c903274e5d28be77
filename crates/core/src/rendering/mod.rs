pub mod jpeg;
pub mod overlay;
