mod admin;
mod commands;

pub use admin::{InitArgs, run_admin_init};
pub use commands::AdminCommands;
