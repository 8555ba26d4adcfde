pub mod config;
pub mod model;
pub mod storage;

// Registry + port allocation
pub mod ports;
pub mod registry;

// Health polling
pub mod monitor;

// Collaborator contracts (process host, browser)
pub mod host;

// Create/import/remove/restore orchestration
pub mod lifecycle;
