//! Process supervisor for the inference gateway workspace.
//!
//! Orchestrates configuration validation, backend-credential generation,
//! the backend subprocess, the health pinger, the gateway listener, and
//! signal-driven shutdown/reload. Nothing outside this crate opens the
//! external listeners; `gateway_proxy` and `gateway_auth` only provide
//! the building blocks.

pub mod backend;
pub mod boot_log;
pub mod credential;
pub mod error;
pub mod gateway_listener;
pub mod health_poller;
pub mod rate_limit_gc;
pub mod signals;
pub mod supervisor;

pub use backend::BackendProcess;
pub use credential::BackendCredential;
pub use error::{ Result, SupervisorError };
pub use signals::SupervisorSignal;
pub use supervisor::run;
