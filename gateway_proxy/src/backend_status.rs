//! Cached backend health status: `/health` reads this instead of probing
//! the backend synchronously, so the gateway's own health endpoint stays
//! reachable independent of backend liveness.

mod private
{
  use core::sync::atomic::{ AtomicBool, Ordering };
  use std::sync::Arc;

  /// The most recently observed backend reachability, refreshed by a
  /// background poller (owned by the supervisor) on a `HealthPollTimeout`
  /// cadence.
  #[ derive( Debug ) ]
  pub struct BackendStatus
  {
    healthy : AtomicBool,
  }

  impl BackendStatus
  {
    /// Construct with an initial value, typically the result of the
    /// supervisor's startup readiness wait.
    #[ must_use ]
    pub fn new( initially_healthy : bool ) -> Arc< Self >
    {
      Arc::new( Self { healthy : AtomicBool::new( initially_healthy ) } )
    }

    /// Record the latest poll result.
    pub fn set( &self, healthy : bool )
    {
      self.healthy.store( healthy, Ordering::Relaxed );
    }

    /// The cached reachability.
    #[ must_use ]
    pub fn is_healthy( &self ) -> bool
    {
      self.healthy.load( Ordering::Relaxed )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn reflects_most_recent_set()
    {
      let status = BackendStatus::new( true );
      assert!( status.is_healthy() );
      status.set( false );
      assert!( !status.is_healthy() );
    }
  }
}

pub use private::BackendStatus;
