pub mod commands;
pub mod handlers;

pub use commands::{CliArgs, Commands, RunArgs, SelectArgs, StepsArgs};
pub use handlers::{exit_code, handle_run, handle_select, handle_steps};
