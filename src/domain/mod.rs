pub mod device_list;
pub mod error;
pub mod framing;
pub mod models;
pub mod settings;
