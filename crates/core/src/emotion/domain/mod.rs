pub mod emotion_inferencer;
pub mod emotion_model;
pub mod face_crop;
pub mod temporal_smoother;
