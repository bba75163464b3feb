pub mod console;
pub mod devices;
