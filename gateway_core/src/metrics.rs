//! Process-wide metrics registry.
//!
//! Counters are monotone for the process lifetime; gauges reflect
//! point-in-time state. Every field is a bare atomic — there is no
//! single-writer lock here because every caller only ever increments or
//! stores its own field, matching the "single writer per counter"
//! invariant in the data model.

mod private
{
  use core::sync::atomic::{ AtomicI64, AtomicU64, Ordering };
  use std::time::Instant;
  use serde::Serialize;

  const ORD : Ordering = Ordering::Relaxed;

  /// Process-wide counters and gauges.
  ///
  /// Cheap to clone (it is `Arc`-wrapped by callers); every method takes
  /// `&self` because the atomics provide interior mutability.
  #[ derive( Debug ) ]
  pub struct MetricsRegistry
  {
    requests_total : AtomicU64,
    requests_success : AtomicU64,
    requests_error : AtomicU64,
    requests_authenticated : AtomicU64,
    requests_unauthorized : AtomicU64,
    bytes_sent : AtomicU64,
    queue_rejections : AtomicU64,
    queue_wait_seconds_total_millis : AtomicU64,

    requests_active : AtomicI64,
    queue_depth : AtomicI64,

    started_at : Instant,
  }

  impl Default for MetricsRegistry
  {
    #[ inline ]
    fn default() -> Self
    {
      Self::new()
    }
  }

  impl MetricsRegistry
  {
    /// Construct a fresh, zeroed registry. The process uptime gauge is
    /// measured from this call.
    #[ inline ]
    #[ must_use ]
    pub fn new() -> Self
    {
      Self
      {
        requests_total : AtomicU64::new( 0 ),
        requests_success : AtomicU64::new( 0 ),
        requests_error : AtomicU64::new( 0 ),
        requests_authenticated : AtomicU64::new( 0 ),
        requests_unauthorized : AtomicU64::new( 0 ),
        bytes_sent : AtomicU64::new( 0 ),
        queue_rejections : AtomicU64::new( 0 ),
        queue_wait_seconds_total_millis : AtomicU64::new( 0 ),
        requests_active : AtomicI64::new( 0 ),
        queue_depth : AtomicI64::new( 0 ),
        started_at : Instant::now(),
      }
    }

    /// Record the arrival of a request, before routing or auth.
    #[ inline ]
    pub fn inc_requests_total( &self )
    {
      self.requests_total.fetch_add( 1, ORD );
    }

    /// Record a request that completed with a 2xx/3xx backend response.
    #[ inline ]
    pub fn inc_requests_success( &self )
    {
      self.requests_success.fetch_add( 1, ORD );
    }

    /// Record a request that failed for a server- or backend-side reason.
    #[ inline ]
    pub fn inc_requests_error( &self )
    {
      self.requests_error.fetch_add( 1, ORD );
    }

    /// Record a request whose API key was successfully authenticated.
    #[ inline ]
    pub fn inc_requests_authenticated( &self )
    {
      self.requests_authenticated.fetch_add( 1, ORD );
    }

    /// Record a request rejected at the authentication step.
    #[ inline ]
    pub fn inc_requests_unauthorized( &self )
    {
      self.requests_unauthorized.fetch_add( 1, ORD );
    }

    /// Add to the running total of response bytes streamed to clients.
    #[ inline ]
    pub fn add_bytes_sent( &self, n : u64 )
    {
      self.bytes_sent.fetch_add( n, ORD );
    }

    /// Record a request rejected because the admission queue was full.
    #[ inline ]
    pub fn inc_queue_rejections( &self )
    {
      self.queue_rejections.fetch_add( 1, ORD );
    }

    /// Add a queue-wait duration to the running total.
    #[ inline ]
    pub fn add_queue_wait( &self, wait : core::time::Duration )
    {
      #[ allow( clippy::cast_possible_truncation ) ]
      let millis = wait.as_millis().min( u128::from( u64::MAX ) ) as u64;
      self.queue_wait_seconds_total_millis.fetch_add( millis, ORD );
    }

    /// Increment the in-flight-proxied-requests gauge.
    #[ inline ]
    pub fn inc_requests_active( &self )
    {
      self.requests_active.fetch_add( 1, ORD );
    }

    /// Decrement the in-flight-proxied-requests gauge.
    #[ inline ]
    pub fn dec_requests_active( &self )
    {
      self.requests_active.fetch_sub( 1, ORD );
    }

    /// Increment the admission-queue-depth gauge.
    #[ inline ]
    pub fn inc_queue_depth( &self )
    {
      self.queue_depth.fetch_add( 1, ORD );
    }

    /// Decrement the admission-queue-depth gauge.
    #[ inline ]
    pub fn dec_queue_depth( &self )
    {
      self.queue_depth.fetch_sub( 1, ORD );
    }

    /// Take a point-in-time snapshot suitable for `/metrics` and `/health`.
    #[ inline ]
    #[ must_use ]
    pub fn snapshot( &self ) -> MetricsSnapshot
    {
      MetricsSnapshot
      {
        requests_total : self.requests_total.load( ORD ),
        requests_success : self.requests_success.load( ORD ),
        requests_error : self.requests_error.load( ORD ),
        requests_authenticated : self.requests_authenticated.load( ORD ),
        requests_unauthorized : self.requests_unauthorized.load( ORD ),
        bytes_sent : self.bytes_sent.load( ORD ),
        queue_rejections : self.queue_rejections.load( ORD ),
        queue_wait_seconds_total : self.queue_wait_seconds_total_millis.load( ORD ) as f64 / 1000.0,
        requests_active : self.requests_active.load( ORD ).max( 0 ),
        queue_depth : self.queue_depth.load( ORD ).max( 0 ),
        uptime_seconds : self.started_at.elapsed().as_secs_f64(),
      }
    }
  }

  /// A consistent-enough point-in-time read of every counter and gauge.
  /// Cross-counter consistency is not guaranteed: two fields can reflect
  /// slightly different instants under concurrent updates.
  #[ derive( Debug, Clone, Serialize ) ]
  pub struct MetricsSnapshot
  {
    /// Total requests that reached the pipeline.
    pub requests_total : u64,
    /// Requests that completed successfully.
    pub requests_success : u64,
    /// Requests that failed for a server/backend reason.
    pub requests_error : u64,
    /// Requests that authenticated successfully.
    pub requests_authenticated : u64,
    /// Requests rejected at authentication.
    pub requests_unauthorized : u64,
    /// Total bytes streamed to clients.
    pub bytes_sent : u64,
    /// Requests rejected because the admission queue was full.
    pub queue_rejections : u64,
    /// Cumulative time requests spent waiting in the admission queue.
    pub queue_wait_seconds_total : f64,
    /// Requests currently being proxied.
    pub requests_active : i64,
    /// Requests currently queued for admission.
    pub queue_depth : i64,
    /// Seconds since the registry (== process) started.
    pub uptime_seconds : f64,
  }

  impl MetricsSnapshot
  {
    /// Render as Prometheus / OpenMetrics text exposition.
    #[ must_use ]
    pub fn to_text_exposition( &self ) -> String
    {
      use core::fmt::Write as _;
      let mut out = String::with_capacity( 1024 );

      macro_rules! counter
      {
        ( $name:literal, $help:literal, $value:expr ) =>
        {
          let _ = writeln!( out, "# HELP {} {}", $name, $help );
          let _ = writeln!( out, "# TYPE {} counter", $name );
          let _ = writeln!( out, "{} {}", $name, $value );
        };
      }
      macro_rules! gauge
      {
        ( $name:literal, $help:literal, $value:expr ) =>
        {
          let _ = writeln!( out, "# HELP {} {}", $name, $help );
          let _ = writeln!( out, "# TYPE {} gauge", $name );
          let _ = writeln!( out, "{} {}", $name, $value );
        };
      }

      counter!( "requests_total", "Total requests received.", self.requests_total );
      counter!( "requests_success", "Requests completed successfully.", self.requests_success );
      counter!( "requests_error", "Requests failed for a server or backend reason.", self.requests_error );
      counter!( "requests_authenticated", "Requests that authenticated successfully.", self.requests_authenticated );
      counter!( "requests_unauthorized", "Requests rejected at authentication.", self.requests_unauthorized );
      counter!( "bytes_sent", "Total response bytes streamed to clients.", self.bytes_sent );
      counter!( "queue_rejections", "Requests rejected because the admission queue was full.", self.queue_rejections );
      counter!( "queue_wait_seconds_total", "Cumulative seconds requests spent waiting for admission.", self.queue_wait_seconds_total );
      gauge!( "requests_active", "Requests currently being proxied.", self.requests_active );
      gauge!( "queue_depth", "Requests currently queued for admission.", self.queue_depth );
      gauge!( "uptime_seconds", "Seconds since process start.", self.uptime_seconds );

      out
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn counters_are_monotone()
    {
      let metrics = MetricsRegistry::new();
      metrics.inc_requests_total();
      metrics.inc_requests_total();
      metrics.inc_requests_success();
      let snap = metrics.snapshot();
      assert_eq!( snap.requests_total, 2 );
      assert_eq!( snap.requests_success, 1 );
    }

    #[ test ]
    fn gauges_track_up_and_down()
    {
      let metrics = MetricsRegistry::new();
      metrics.inc_queue_depth();
      metrics.inc_queue_depth();
      metrics.dec_queue_depth();
      assert_eq!( metrics.snapshot().queue_depth, 1 );
    }

    #[ test ]
    fn text_exposition_contains_all_series()
    {
      let metrics = MetricsRegistry::new();
      let text = metrics.snapshot().to_text_exposition();
      assert!( text.contains( "requests_total 0" ) );
      assert!( text.contains( "# TYPE queue_depth gauge" ) );
    }
  }
}

pub use private::{ MetricsRegistry, MetricsSnapshot };
