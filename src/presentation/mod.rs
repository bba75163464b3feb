pub mod app;
pub mod components;
pub mod console_state;
pub mod pipeline;
pub mod screen;
pub mod tabs;
pub mod theme;
pub mod worker;
