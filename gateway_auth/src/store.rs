//! The reloadable key store.

mod private
{
  use crate::{ constant_time, key::{ self, ApiKey, ParseOutcome } };
  use parking_lot::RwLock;
  use std::{ path::Path, sync::Arc };

  struct Data
  {
    keys : Vec< Arc< ApiKey > >,
  }

  /// Process-wide, hot-reloadable map of accepted API keys.
  ///
  /// Readers take a snapshot `Arc` under a brief read lock and then walk
  /// it lock-free; the writer (reload) builds a whole new [`Data`] and
  /// swaps it in under a brief write lock. A request either sees the
  /// entirely-old or entirely-new store, never a mix.
  #[ derive( Debug ) ]
  pub struct KeyStore
  {
    data : RwLock< Arc< Data > >,
  }

  impl std::fmt::Debug for Data
  {
    fn fmt( &self, f : &mut std::fmt::Formatter< '_ > ) -> std::fmt::Result
    {
      f.debug_struct( "Data" ).field( "key_count", &self.keys.len() ).finish()
    }
  }

  impl KeyStore
  {
    /// Load the initial store from `path`. A missing, empty, or
    /// unreadable file yields an empty store (fail-closed if auth is
    /// enabled); a malformed or duplicate-containing file also yields an
    /// empty store, since there is no prior store to retain yet.
    #[ must_use ]
    pub fn load( path : &Path ) -> Self
    {
      let keys = match read_and_parse( path )
      {
        ParseOutcome::Keys( keys ) => keys,
        ParseOutcome::Invalid( reason ) =>
        {
          tracing::warn!( path = %path.display(), reason, "initial key file invalid, starting with no keys" );
          Vec::new()
        }
      };

      Self
      {
        data : RwLock::new( Arc::new( Data { keys : keys.into_iter().map( Arc::new ).collect() } ) ),
      }
    }

    /// Re-read `path` and, if it parses cleanly, atomically replace the
    /// live store. On any parse failure the previous store is retained
    /// and the reason is returned as `Err`.
    ///
    /// # Errors
    /// Returns the rejection reason when the file fails to parse.
    pub fn reload( &self, path : &Path ) -> core::result::Result< usize, String >
    {
      match read_and_parse( path )
      {
        ParseOutcome::Keys( keys ) =>
        {
          let count = keys.len();
          let new_data = Arc::new( Data { keys : keys.into_iter().map( Arc::new ).collect() } );
          *self.data.write() = new_data;
          Ok( count )
        }
        ParseOutcome::Invalid( reason ) => Err( reason ),
      }
    }

    /// Number of keys currently loaded.
    #[ must_use ]
    pub fn len( &self ) -> usize
    {
      self.data.read().keys.len()
    }

    /// Whether the store currently holds no keys.
    #[ must_use ]
    pub fn is_empty( &self ) -> bool
    {
      self.len() == 0
    }

    /// Find the key matching `presented_secret`, comparing against every
    /// configured key with a constant-time primitive regardless of
    /// whether an earlier key already matched.
    #[ must_use ]
    pub fn find_by_secret( &self, presented_secret : &str ) -> Option< Arc< ApiKey > >
    {
      let snapshot = self.data.read().clone();
      let presented = presented_secret.as_bytes();

      let mut found : Option< Arc< ApiKey > > = None;
      for candidate in &snapshot.keys
      {
        let is_match = constant_time::eq( presented, candidate.expose_secret().as_bytes() );
        // Accumulate without an early return so every key is compared.
        if is_match
        {
          found = Some( Arc::clone( candidate ) );
        }
      }
      found
    }
  }

  fn read_and_parse( path : &Path ) -> ParseOutcome
  {
    match std::fs::read_to_string( path )
    {
      Ok( content ) => key::parse( &content ),
      Err( _ ) => ParseOutcome::Keys( Vec::new() ),
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use std::io::Write;

    fn write_temp( contents : &str ) -> tempfile::TempPath
    {
      let mut file = tempfile::NamedTempFile::new().expect( "create temp file" );
      file.write_all( contents.as_bytes() ).expect( "write temp file" );
      file.into_temp_path()
    }

    #[ test ]
    fn missing_file_yields_empty_store()
    {
      let store = KeyStore::load( Path::new( "/nonexistent/path/to/keys.txt" ) );
      assert!( store.is_empty() );
    }

    #[ test ]
    fn loads_valid_file()
    {
      let path = write_temp( "alice:abcdefghijklmnop\n" );
      let store = KeyStore::load( &path );
      assert_eq!( store.len(), 1 );
      assert!( store.find_by_secret( "abcdefghijklmnop" ).is_some() );
    }

    #[ test ]
    fn reload_rejects_invalid_and_retains_prior()
    {
      let path = write_temp( "alice:abcdefghijklmnop\n" );
      let store = KeyStore::load( &path );
      assert_eq!( store.len(), 1 );

      std::fs::write( &path, "alice\n" ).expect( "overwrite with invalid content" );
      let result = store.reload( &path );
      assert!( result.is_err() );
      assert_eq!( store.len(), 1, "prior store must be retained on invalid reload" );
    }

    #[ test ]
    fn reload_swaps_on_success()
    {
      let path = write_temp( "alice:abcdefghijklmnop\n" );
      let store = KeyStore::load( &path );

      std::fs::write( &path, "alice:abcdefghijklmnop\nbob:qrstuvwxyzabcdef\n" ).expect( "overwrite" );
      let result = store.reload( &path );
      assert_eq!( result, Ok( 2 ) );
      assert_eq!( store.len(), 2 );
    }
  }
}

pub use private::KeyStore;
