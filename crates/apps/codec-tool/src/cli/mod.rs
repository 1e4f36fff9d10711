pub mod app;
pub mod commands_check;
pub mod commands_wire;
pub mod json;
pub mod output;
