//! Supervisor-layer error type.

mod private
{
  /// Failure classes the supervisor itself can produce, distinct from
  /// [`gateway_core::GatewayError`] (configuration) and
  /// [`gateway_proxy::ProxyError`] (per-request).
  #[ derive( Debug, thiserror::Error ) ]
  #[ non_exhaustive ]
  pub enum SupervisorError
  {
    /// Configuration failed to load or validate.
    #[ error( "configuration error: {0}" ) ]
    Config( #[ from ] gateway_core::GatewayError ),

    /// The backend credential could not be generated or persisted.
    #[ error( "credential error on {path}: {source}" ) ]
    Credential
    {
      /// File path involved.
      path : String,
      /// Underlying I/O error.
      #[ source ]
      source : std::io::Error,
    },

    /// The backend process could not be spawned.
    #[ error( "failed to launch backend: {0}" ) ]
    BackendLaunch( std::io::Error ),

    /// The backend bound to a non-loopback address, a security
    /// violation the supervisor refuses to tolerate.
    #[ error( "backend bound to non-loopback address {0}" ) ]
    BackendNotLoopback( String ),

    /// The backend did not become ready within the configured timeout.
    /// Non-fatal: logged, startup proceeds anyway.
    #[ error( "backend readiness timed out after {0:?}" ) ]
    BackendReadinessTimeout( core::time::Duration ),

    /// A supervised child process exited unexpectedly.
    #[ error( "child `{name}` exited with status {status}" ) ]
    ChildExited
    {
      /// Which child: `"backend"`, `"gateway"`, or `"health_pinger"`.
      name : &'static str,
      /// The child's exit status, rendered for logging.
      status : String,
    },

    /// Installing a signal handler failed.
    #[ error( "failed to install signal handler: {0}" ) ]
    SignalInstall( std::io::Error ),
  }

  impl SupervisorError
  {
    /// Construct a [`SupervisorError::Credential`] with path context.
    #[ must_use ]
    pub fn credential( path : impl Into< String >, source : std::io::Error ) -> Self
    {
      Self::Credential { path : path.into(), source }
    }
  }

  /// Convenience alias used throughout the supervisor crate.
  pub type Result< T > = core::result::Result< T, SupervisorError >;
}

pub use private::{ Result, SupervisorError };
