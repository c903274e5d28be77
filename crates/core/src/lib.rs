pub mod capture;
pub mod detection;
pub mod emotion;
pub mod rendering;
pub mod shared;
pub mod stream;
