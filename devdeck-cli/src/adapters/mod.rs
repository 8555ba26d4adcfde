//! Local implementations of the launcher's collaborator contracts

mod browser;
mod process;
mod scaffold;

pub use browser::SystemBrowser;
pub use process::LocalProcessHost;
