pub mod capture_loop;
pub mod domain;
pub mod infrastructure;
pub mod stream_error;
pub mod stream_handle;
pub mod stream_key;
pub mod stream_registry;
pub mod stream_state;
