//! Sliding-window rate limiter.

mod private
{
  use parking_lot::Mutex;
  use std::{ collections::{ HashMap, VecDeque }, time::{ Duration, Instant } };

  const WINDOW : Duration = Duration::from_secs( 60 );

  /// Per-identity sliding window of request instants within the active
  /// 60-second window.
  ///
  /// A single coarse mutex protects the whole map. That's fine as long
  /// as cross-identity requests don't serialize for long; bucket
  /// operations here are O(window size) pruning plus O(1) append/check,
  /// so lock hold time stays short even under contention.
  #[ derive( Debug ) ]
  pub struct RateLimiter
  {
    buckets : Mutex< HashMap< String, VecDeque< Instant > > >,
  }

  impl Default for RateLimiter
  {
    #[ inline ]
    fn default() -> Self
    {
      Self::new()
    }
  }

  impl RateLimiter
  {
    /// Construct an empty limiter.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { buckets : Mutex::new( HashMap::new() ) }
    }

    /// Check-and-record for `key_id` against `limit` requests per 60s,
    /// atomically: prune, count, decide, and (if allowed) append, all
    /// under one lock acquisition so the decision is linearizable per
    /// identity.
    #[ must_use ]
    pub fn check_and_record( &self, key_id : &str, limit : u32 ) -> bool
    {
      self.check_and_record_at( key_id, limit, Instant::now() )
    }

    /// Same as [`Self::check_and_record`] but with an injectable clock,
    /// so tests can drive the sliding window deterministically with
    /// `tokio::time::advance` without needing real sleeps.
    #[ must_use ]
    pub fn check_and_record_at( &self, key_id : &str, limit : u32, now : Instant ) -> bool
    {
      let mut buckets = self.buckets.lock();
      let bucket = buckets.entry( key_id.to_string() ).or_default();
      prune( bucket, now );

      if bucket.len() >= limit as usize
      {
        return false;
      }

      bucket.push_back( now );
      true
    }

    /// Drop any bucket whose most recent timestamp has aged out of the
    /// active window; an idle identity yields no observable state.
    pub fn gc( &self )
    {
      self.gc_at( Instant::now() );
    }

    /// Same as [`Self::gc`] with an injectable clock.
    pub fn gc_at( &self, now : Instant )
    {
      let mut buckets = self.buckets.lock();
      buckets.retain( | _, bucket |
      {
        bucket.back().is_some_and( | newest | now.duration_since( *newest ) < WINDOW )
      } );
    }

    /// Current bucket count, for diagnostics/tests.
    #[ must_use ]
    pub fn bucket_count( &self ) -> usize
    {
      self.buckets.lock().len()
    }
  }

  fn prune( bucket : &mut VecDeque< Instant >, now : Instant )
  {
    while let Some( front ) = bucket.front()
    {
      if now.duration_since( *front ) >= WINDOW
      {
        bucket.pop_front();
      }
      else
      {
        break;
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn allows_up_to_limit_then_denies()
    {
      let limiter = RateLimiter::new();
      let now = Instant::now();
      assert!( limiter.check_and_record_at( "k1", 2, now ) );
      assert!( limiter.check_and_record_at( "k1", 2, now ) );
      assert!( !limiter.check_and_record_at( "k1", 2, now ) );
    }

    #[ test ]
    fn window_slides()
    {
      let limiter = RateLimiter::new();
      let t0 = Instant::now();
      assert!( limiter.check_and_record_at( "k1", 1, t0 ) );
      assert!( !limiter.check_and_record_at( "k1", 1, t0 ) );

      let t1 = t0 + Duration::from_secs( 61 );
      assert!( limiter.check_and_record_at( "k1", 1, t1 ), "old timestamp should have aged out" );
    }

    #[ test ]
    fn distinct_identities_do_not_share_buckets()
    {
      let limiter = RateLimiter::new();
      let now = Instant::now();
      assert!( limiter.check_and_record_at( "a", 1, now ) );
      assert!( limiter.check_and_record_at( "b", 1, now ) );
    }

    #[ test ]
    fn gc_drops_idle_buckets_only()
    {
      let limiter = RateLimiter::new();
      let t0 = Instant::now();
      limiter.check_and_record_at( "stale", 5, t0 );
      limiter.check_and_record_at( "fresh", 5, t0 );

      let t1 = t0 + Duration::from_secs( 61 );
      limiter.check_and_record_at( "fresh", 5, t1 );

      limiter.gc_at( t1 );
      assert_eq!( limiter.bucket_count(), 1, "stale bucket should be collected, fresh retained" );
    }
  }
}

pub use private::RateLimiter;
