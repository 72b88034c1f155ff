//! Append-only access log writer.
//!
//! A single background task owns the file handle; request tasks hand it
//! lines through a bounded channel so a slow disk never blocks a request
//! in flight.

mod private
{
  use crate::error::{ GatewayError, Result };
  use serde::Serialize;
  use std::path::{ Path, PathBuf };
  use tokio::
  {
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::mpsc,
  };

  const CHANNEL_CAPACITY : usize = 1024;

  /// One completed request, ready to be formatted and appended.
  #[ derive( Debug, Clone ) ]
  pub struct AccessLogEntry
  {
    /// RFC 3339 timestamp of request completion.
    pub timestamp : String,
    /// `key_id`, or `"-"` for unauthenticated/public requests.
    pub key_id : String,
    /// HTTP method.
    pub method : String,
    /// Request path (including query string), case preserved.
    pub path : String,
    /// Final HTTP status code.
    pub status : u16,
  }

  #[ derive( Serialize ) ]
  struct JsonLine< 'a >
  {
    timestamp : &'a str,
    key_id : &'a str,
    method : &'a str,
    path : &'a str,
    status : u16,
  }

  fn sanitize( field : &str ) -> String
  {
    field.chars().map( | c | match c
    {
      '\n' | '\r' | '\t' | '|' => '_',
      other => other,
    } ).collect()
  }

  impl AccessLogEntry
  {
    fn to_text_line( &self ) -> String
    {
      format!(
        "{} | {} | {} {} | {}",
        sanitize( &self.timestamp ),
        sanitize( &self.key_id ),
        sanitize( &self.method ),
        sanitize( &self.path ),
        self.status,
      )
    }

    fn to_json_line( &self ) -> String
    {
      let line = JsonLine
      {
        timestamp : &self.timestamp,
        key_id : &self.key_id,
        method : &self.method,
        path : &self.path,
        status : self.status,
      };
      serde_json::to_string( &line ).unwrap_or_default()
    }
  }

  /// Handle used by request tasks to submit a completed entry. Cloning is
  /// cheap; every clone shares the same background writer.
  #[ derive( Debug, Clone ) ]
  pub struct AccessLogHandle
  {
    sender : mpsc::Sender< AccessLogEntry >,
  }

  impl AccessLogHandle
  {
    /// Submit an entry for writing. Never blocks the caller on disk I/O;
    /// if the channel is momentarily full the entry is dropped rather
    /// than stalling the request path, since access-log completeness is
    /// best-effort relative to serving traffic.
    pub fn record( &self, entry : AccessLogEntry )
    {
      if let Err( e ) = self.sender.try_send( entry )
      {
        tracing::warn!( error = %e, "dropping access log entry, writer backlogged" );
      }
    }
  }

  /// Spawn the background writer task, opening (and creating parent
  /// directories for) `path` once for the process lifetime.
  ///
  /// # Errors
  /// Returns [`GatewayError::Io`] if the log file cannot be opened.
  pub async fn spawn( path : &Path, json : bool ) -> Result< AccessLogHandle >
  {
    if let Some( parent ) = path.parent()
    {
      tokio::fs::create_dir_all( parent ).await
        .map_err( | e | GatewayError::io( parent.display().to_string(), e ) )?;
    }

    let mut file = OpenOptions::new()
      .create( true )
      .append( true )
      .open( path )
      .await
      .map_err( | e | GatewayError::io( path.display().to_string(), e ) )?;

    let ( sender, mut receiver ) = mpsc::channel::< AccessLogEntry >( CHANNEL_CAPACITY );
    let path_owned : PathBuf = path.to_path_buf();

    tokio::spawn( async move
    {
      while let Some( entry ) = receiver.recv().await
      {
        let line = if json { entry.to_json_line() } else { entry.to_text_line() };
        if let Err( e ) = file.write_all( format!( "{line}\n" ).as_bytes() ).await
        {
          tracing::error!( path = %path_owned.display(), error = %e, "failed to write access log line" );
        }
      }
    } );

    Ok( AccessLogHandle { sender } )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn sanitize_strips_control_characters()
    {
      assert_eq!( sanitize( "a\nb\rc\td|e" ), "a_b_c_d_e" );
    }

    #[ test ]
    fn text_line_format()
    {
      let entry = AccessLogEntry
      {
        timestamp : "2026-07-26T00:00:00Z".to_string(),
        key_id : "-".to_string(),
        method : "GET".to_string(),
        path : "/ping".to_string(),
        status : 200,
      };
      assert_eq!( entry.to_text_line(), "2026-07-26T00:00:00Z | - | GET /ping | 200" );
    }

    #[ tokio::test ]
    async fn spawn_writes_entries_to_file()
    {
      let dir = tempfile_dir();
      let path = dir.join( "api_access.log" );
      let handle = spawn( &path, false ).await.expect( "spawn should succeed" );

      handle.record( AccessLogEntry
      {
        timestamp : "2026-07-26T00:00:00Z".to_string(),
        key_id : "k1".to_string(),
        method : "POST".to_string(),
        path : "/v1/chat/completions".to_string(),
        status : 200,
      } );

      // Give the background task a chance to flush.
      tokio::time::sleep( core::time::Duration::from_millis( 50 ) ).await;

      let contents = tokio::fs::read_to_string( &path ).await.expect( "file should exist" );
      assert!( contents.contains( "k1 | POST /v1/chat/completions | 200" ) );

      let _ = tokio::fs::remove_dir_all( dir ).await;
    }

    fn tempfile_dir() -> PathBuf
    {
      let mut dir = std::env::temp_dir();
      dir.push( format!( "gateway_access_log_test_{}", std::process::id() ) );
      dir
    }
  }
}

pub use private::{ AccessLogEntry, AccessLogHandle, spawn };
