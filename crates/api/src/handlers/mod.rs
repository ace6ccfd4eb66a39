pub mod data;
pub mod devices;
pub mod settings;
