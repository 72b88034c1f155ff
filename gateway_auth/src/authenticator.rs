//! Ties the key store and rate limiter into the single authentication
//! contract every protected request goes through.

mod private
{
  use crate::
  {
    error::{ AuthError, Result },
    rate_limiter::RateLimiter,
    store::KeyStore,
  };
  use chrono::{ DateTime, Utc };
  use std::{ path::{ Path, PathBuf }, sync::Arc };

  /// Outcome of a successful authentication attempt.
  #[ derive( Debug, Clone ) ]
  pub struct Authenticated
  {
    /// The matched key's identifier, for logging and the rate-limit
    /// bucket.
    pub key_id : String,
    /// The effective limit that was checked (key override or global
    /// default), surfaced for diagnostics.
    pub effective_rate_limit : u32,
  }

  /// Process-wide authenticator: owns the reloadable key store and the
  /// rate limiter, and exposes the single `authenticate` entry point
  /// every protected request goes through.
  #[ derive( Debug ) ]
  pub struct Authenticator
  {
    store : KeyStore,
    limiter : Arc< RateLimiter >,
    keys_path : PathBuf,
    global_rate_limit_per_minute : u32,
  }

  impl Authenticator
  {
    /// Build an authenticator, performing the initial key-file load.
    #[ must_use ]
    pub fn new( keys_path : PathBuf, global_rate_limit_per_minute : u32 ) -> Self
    {
      Self
      {
        store : KeyStore::load( &keys_path ),
        limiter : Arc::new( RateLimiter::new() ),
        keys_path,
        global_rate_limit_per_minute,
      }
    }

    /// Number of keys currently loaded; surfaced on `/health`.
    #[ must_use ]
    pub fn keys_loaded( &self ) -> usize
    {
      self.store.len()
    }

    /// The rate limiter, for the supervisor to spawn its GC task against.
    #[ must_use ]
    pub fn rate_limiter( &self ) -> Arc< RateLimiter >
    {
      Arc::clone( &self.limiter )
    }

    /// Re-read the configured key file path and atomically swap the
    /// store on success.
    ///
    /// # Errors
    /// Returns the rejection reason when the file fails to parse; the
    /// previous store remains live.
    pub fn reload( &self ) -> core::result::Result< usize, String >
    {
      self.store.reload( &self.keys_path )
    }

    /// The effective authentication contract: validate shape, match
    /// against every configured key in constant time, check expiry,
    /// then consult the rate limiter.
    ///
    /// # Errors
    /// Returns the specific [`AuthError`] variant for the first failing
    /// step, in the order specified.
    pub fn authenticate( &self, authorization_header : Option< &str >, now : DateTime< Utc > ) -> Result< Authenticated >
    {
      let raw = authorization_header.filter( | h | !h.is_empty() ).ok_or( AuthError::MissingHeader )?;
      let presented = strip_bearer_prefix( raw );

      if !is_valid_secret_shape( presented )
      {
        return Err( AuthError::InvalidFormat );
      }

      let matched = self.store.find_by_secret( presented ).ok_or( AuthError::NoMatch )?;

      if matched.is_expired_at( now )
      {
        return Err( AuthError::Expired );
      }

      let effective_rate_limit = matched.rate_limit_per_minute.unwrap_or( self.global_rate_limit_per_minute );
      if !self.limiter.check_and_record( &matched.key_id, effective_rate_limit )
      {
        return Err( AuthError::RateLimited );
      }

      Ok( Authenticated { key_id : matched.key_id.clone(), effective_rate_limit } )
    }

    /// Path to the configured key file, for logging.
    #[ must_use ]
    pub fn keys_path( &self ) -> &Path
    {
      &self.keys_path
    }
  }

  fn strip_bearer_prefix( raw : &str ) -> &str
  {
    if raw.len() >= 7 && raw.as_bytes()[ 6 ] == b' ' && raw[ ..6 ].eq_ignore_ascii_case( "bearer" )
    {
      &raw[ 7.. ]
    }
    else
    {
      raw
    }
  }

  fn is_valid_secret_shape( s : &str ) -> bool
  {
    ( 16..=128 ).contains( &s.len() ) && s.chars().all( | c | c.is_ascii_alphanumeric() || matches!( c, '.' | '_' | '-' ) )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    fn authenticator_with_key( contents : &str, global_limit : u32 ) -> ( Authenticator, tempfile::TempPath )
    {
      use std::io::Write;
      let mut file = tempfile::NamedTempFile::new().expect( "temp file" );
      file.write_all( contents.as_bytes() ).expect( "write" );
      let path = file.into_temp_path();
      ( Authenticator::new( path.to_path_buf(), global_limit ), path )
    }

    #[ test ]
    fn missing_header_is_rejected()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop\n", 10 );
      let err = auth.authenticate( None, Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::MissingHeader );
    }

    #[ test ]
    fn bearer_prefix_is_stripped_case_insensitively()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop\n", 10 );
      let ok = auth.authenticate( Some( "bearer abcdefghijklmnop" ), Utc::now() ).expect( "should authenticate" );
      assert_eq!( ok.key_id, "alice" );
    }

    #[ test ]
    fn bad_shape_is_rejected()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop\n", 10 );
      let err = auth.authenticate( Some( "short" ), Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::InvalidFormat );
    }

    #[ test ]
    fn unknown_secret_is_rejected()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop\n", 10 );
      let err = auth.authenticate( Some( "zzzzzzzzzzzzzzzz" ), Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::NoMatch );
    }

    #[ test ]
    fn expired_key_is_rejected()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop::2000-01-01T00:00:00Z\n", 10 );
      let err = auth.authenticate( Some( "abcdefghijklmnop" ), Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::Expired );
    }

    #[ test ]
    fn rate_limit_enforced_after_override()
    {
      let ( auth, _path ) = authenticator_with_key( "alice:abcdefghijklmnop:1\n", 100 );
      assert!( auth.authenticate( Some( "abcdefghijklmnop" ), Utc::now() ).is_ok() );
      let err = auth.authenticate( Some( "abcdefghijklmnop" ), Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::RateLimited );
    }

    #[ test ]
    fn reload_replaces_keys_but_preserves_rate_limit_state()
    {
      use std::io::Write;
      let mut file = tempfile::NamedTempFile::new().expect( "temp file" );
      file.write_all( b"alice:abcdefghijklmnop:1\n" ).expect( "write" );
      let path = file.into_temp_path();
      let auth = Authenticator::new( path.to_path_buf(), 100 );

      assert!( auth.authenticate( Some( "abcdefghijklmnop" ), Utc::now() ).is_ok() );

      std::fs::write( &path, "alice:abcdefghijklmnop:1\nbob:qrstuvwxyzabcdef\n" ).expect( "rewrite" );
      assert_eq!( auth.reload(), Ok( 2 ) );

      // alice's usage from before the reload still counts.
      let err = auth.authenticate( Some( "abcdefghijklmnop" ), Utc::now() ).unwrap_err();
      assert_eq!( err, AuthError::RateLimited );
    }
  }
}

pub use private::{ Authenticated, Authenticator };
