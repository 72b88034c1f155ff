//! Signal routing, treated as messages on an internal channel. Unix
//! signal handlers are never consulted inline; they publish a
//! [`SupervisorSignal`] onto a channel the main select loop reads
//! alongside child-exit and timer events.

mod private
{
  use crate::error::{ Result, SupervisorError };
  use tokio::signal::unix::{ signal, SignalKind };
  use tokio::sync::mpsc;

  /// A signal the supervisor cares about, decoupled from the OS-specific
  /// `SignalKind` so the select loop stays platform-agnostic.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum SupervisorSignal
  {
    /// `INT` or `TERM`: begin graceful shutdown.
    Shutdown,
    /// `HUP`: reload the key file without interrupting service.
    Reload,
  }

  /// Install handlers for `SIGINT`, `SIGTERM`, and `SIGHUP`, and spawn a
  /// task that forwards each occurrence onto the returned channel.
  ///
  /// # Errors
  /// Returns [`SupervisorError::SignalInstall`] if any handler fails to
  /// register (e.g. the process lacks permission, vanishingly rare but
  /// possible under some sandboxes).
  pub fn install() -> Result< mpsc::Receiver< SupervisorSignal > >
  {
    let mut sigint = signal( SignalKind::interrupt() ).map_err( SupervisorError::SignalInstall )?;
    let mut sigterm = signal( SignalKind::terminate() ).map_err( SupervisorError::SignalInstall )?;
    let mut sighup = signal( SignalKind::hangup() ).map_err( SupervisorError::SignalInstall )?;

    let ( sender, receiver ) = mpsc::channel( 8 );

    tokio::spawn( async move
    {
      loop
      {
        let signal = tokio::select!
        {
          _ = sigint.recv() => SupervisorSignal::Shutdown,
          _ = sigterm.recv() => SupervisorSignal::Shutdown,
          _ = sighup.recv() => SupervisorSignal::Reload,
        };
        if sender.send( signal ).await.is_err()
        {
          break;
        }
      }
    } );

    Ok( receiver )
  }
}

pub use private::{ install, SupervisorSignal };
