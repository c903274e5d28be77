pub mod config;
pub mod constants;
pub mod emotion;
pub mod face_rect;
pub mod frame;
pub mod model_resolver;
pub mod observation;
