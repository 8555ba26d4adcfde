//! Subcommand implementations

mod projects;
mod watch;

pub use projects::{
    run_create, run_import, run_list, run_ports, run_remove, run_removed, run_restore,
};
pub use watch::{run_open, run_status, run_up, run_watch};
