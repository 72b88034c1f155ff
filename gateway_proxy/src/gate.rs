//! Admission control: a bounded-seat, FIFO-queued concurrency gate that
//! sits in front of the proxy engine.
//!
//! Built on a [`tokio::sync::Semaphore`] permit pool, generalized here to
//! a two-tier admit-or-queue-or-reject policy instead of a single wait
//! queue.

mod private
{
  use crate::error::ProxyError;
  use gateway_core::MetricsRegistry;
  use std::sync::Arc;
  use std::sync::atomic::{ AtomicUsize, Ordering };
  use tokio::sync::{ Semaphore, SemaphorePermit };

  /// Bounded admission gate: `seats` requests run concurrently, up to
  /// `max_queue` additional requests wait their turn FIFO, and anything
  /// beyond that is rejected immediately with [`ProxyError::QueueFull`].
  ///
  /// `max_queue == 0` means unbounded queuing: no request is ever
  /// rejected for queue depth, only seats gate admission.
  pub struct ConcurrencyGate
  {
    seats : Semaphore,
    max_queue : usize,
    queued : AtomicUsize,
    metrics : Arc< MetricsRegistry >,
  }

  /// A held seat; releases automatically on drop.
  pub struct Admission< 'a >
  {
    _permit : SemaphorePermit< 'a >,
  }

  impl ConcurrencyGate
  {
    /// Build a gate with `seats` concurrent slots and a FIFO wait queue
    /// bounded at `max_queue` (`0` for unbounded). `metrics` backs the
    /// `/metrics` queue-depth gauge.
    #[ must_use ]
    pub fn new( seats : usize, max_queue : usize, metrics : Arc< MetricsRegistry > ) -> Arc< Self >
    {
      Arc::new( Self { seats : Semaphore::new( seats ), max_queue, queued : AtomicUsize::new( 0 ), metrics } )
    }

    /// Reserve a seat, queuing FIFO if none are free.
    ///
    /// # Errors
    /// Returns [`ProxyError::QueueFull`] immediately, without ever
    /// joining the wait queue, if the queue is already at `max_queue`.
    pub async fn admit( &self ) -> Result< Admission< '_ >, ProxyError >
    {
      if self.seats.available_permits() == 0
      {
        let queued = self.queued.fetch_add( 1, Ordering::SeqCst ) + 1;
        self.metrics.inc_queue_depth();
        if self.max_queue > 0 && queued > self.max_queue
        {
          self.queued.fetch_sub( 1, Ordering::SeqCst );
          self.metrics.dec_queue_depth();
          return Err( ProxyError::QueueFull );
        }
        let permit = self.seats.acquire().await.map_err( | _ | ProxyError::Internal )?;
        self.queued.fetch_sub( 1, Ordering::SeqCst );
        self.metrics.dec_queue_depth();
        return Ok( Admission { _permit : permit } );
      }

      let permit = self.seats.acquire().await.map_err( | _ | ProxyError::Internal )?;
      Ok( Admission { _permit : permit } )
    }

    /// Current queue depth, for `/metrics` and `/health`.
    #[ must_use ]
    pub fn queue_depth( &self ) -> usize
    {
      self.queued.load( Ordering::SeqCst )
    }

    /// Seats currently in use.
    #[ must_use ]
    pub fn seats_in_use( &self, total_seats : usize ) -> usize
    {
      total_seats.saturating_sub( self.seats.available_permits() )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn test_metrics() -> Arc< MetricsRegistry >
    {
      Arc::new( MetricsRegistry::new() )
    }

    #[ tokio::test ]
    async fn admits_up_to_seat_count_without_queuing()
    {
      let gate = ConcurrencyGate::new( 2, 0, test_metrics() );
      let a = gate.admit().await.unwrap();
      let b = gate.admit().await.unwrap();
      assert_eq!( gate.seats_in_use( 2 ), 2 );
      drop( a );
      drop( b );
    }

    #[ tokio::test ]
    async fn rejects_when_queue_bound_exceeded()
    {
      let gate = ConcurrencyGate::new( 1, 1, test_metrics() );
      let _held = gate.admit().await.unwrap();

      let gate_clone = gate.clone();
      let waiter = tokio::spawn( async move { gate_clone.admit().await } );
      tokio::task::yield_now().await;

      let err = gate.admit().await.unwrap_err();
      assert!( matches!( err, ProxyError::QueueFull ) );

      waiter.abort();
    }

    #[ tokio::test ]
    async fn zero_max_queue_is_unbounded_but_still_counted()
    {
      let gate = ConcurrencyGate::new( 1, 0, test_metrics() );
      let _held = gate.admit().await.unwrap();

      let gate_clone = gate.clone();
      let waiter = tokio::spawn( async move { gate_clone.admit().await } );
      tokio::task::yield_now().await;
      assert_eq!( gate.queue_depth(), 1, "unbounded queuing must still be observable on /health" );
      waiter.abort();
    }
  }
}

pub use private::{ Admission, ConcurrencyGate };
