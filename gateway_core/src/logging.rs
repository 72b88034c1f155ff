//! Structured logging setup.
//!
//! One subscriber is installed once, at supervisor startup, before any
//! child task or process is spawned. This module only builds the
//! subscriber; access-log lines go through [`crate::access_log`] instead,
//! since they are an application record, not a diagnostic trace.

mod private
{
  use crate::config::LogFormat;
  use tracing_subscriber::EnvFilter;

  /// Install the global `tracing` subscriber for the process.
  ///
  /// Safe to call exactly once; a second call is a programmer error and
  /// panics rather than silently doing nothing.
  pub fn init( format : LogFormat )
  {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else( | _ | EnvFilter::new( "info" ) );

    match format
    {
      LogFormat::Json =>
      {
        tracing_subscriber::fmt()
          .with_env_filter( filter )
          .json()
          .init();
      }
      LogFormat::Text =>
      {
        tracing_subscriber::fmt()
          .with_env_filter( filter )
          .init();
      }
    }
  }
}

pub use private::init;
