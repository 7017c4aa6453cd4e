pub mod app;

pub const APP_TITLE: &str = "picalog";
