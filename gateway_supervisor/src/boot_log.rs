//! Boot transcript capture: every startup log line is teed to a
//! timestamped file under `<data>/logs/_boot/` in addition to the normal
//! `tracing` subscriber, so a container that dies during startup still
//! leaves a record on the mounted volume.

mod private
{
  use crate::error::{ Result, SupervisorError };
  use std::path::{ Path, PathBuf };
  use tokio::io::AsyncWriteExt;

  /// An open boot transcript file. Lines are appended as the supervisor
  /// progresses through startup; the handle is dropped once the gateway
  /// is up and running.
  #[ derive( Debug ) ]
  pub struct BootTranscript
  {
    file : tokio::fs::File,
    path : PathBuf,
  }

  impl BootTranscript
  {
    /// Create `<boot_log_dir>/YYYYMMDD_HHMMSS_boot.log` (parents created
    /// as needed) and open it for appending.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Credential`]-shaped I/O errors (reused
    /// here since both are "we couldn't write our own bookkeeping file"
    /// failures) if the directory or file cannot be created.
    pub async fn open( boot_log_dir : &Path, timestamp : &str ) -> Result< Self >
    {
      tokio::fs::create_dir_all( boot_log_dir ).await
        .map_err( | e | SupervisorError::credential( boot_log_dir.display().to_string(), e ) )?;

      let path = boot_log_dir.join( format!( "{timestamp}_boot.log" ) );
      let file = tokio::fs::OpenOptions::new()
        .create( true )
        .append( true )
        .open( &path )
        .await
        .map_err( | e | SupervisorError::credential( path.display().to_string(), e ) )?;

      Ok( Self { file, path } )
    }

    /// Append one line, flushing immediately: boot transcripts are low
    /// volume and must survive a crash moments later.
    pub async fn line( &mut self, message : &str )
    {
      let formatted = format!( "{message}\n" );
      if let Err( e ) = self.file.write_all( formatted.as_bytes() ).await
      {
        tracing::warn!( path = %self.path.display(), error = %e, "failed to write boot transcript line" );
        return;
      }
      let _ = self.file.flush().await;
    }
  }
}

pub use private::BootTranscript;
