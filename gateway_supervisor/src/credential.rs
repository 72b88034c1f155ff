//! Per-process backend credential: generated once at startup from a
//! cryptographic RNG, written owner-only to volatile storage, and
//! shredded on teardown so every exit path cleans up.

mod private
{
  use crate::error::{ Result, SupervisorError };
  use base64::{ engine::general_purpose::URL_SAFE_NO_PAD, Engine as _ };
  use rand::RngCore;
  use secrecy::SecretString;
  use std::path::{ Path, PathBuf };

  /// Candidate directories for the credential file, in preference order:
  /// tmpfs-backed `/dev/shm` first (never touches a persistent disk),
  /// falling back to the process temp directory.
  const VOLATILE_DIR_CANDIDATES : &[ &str ] = &[ "/dev/shm", "/tmp" ];

  fn pick_volatile_dir() -> PathBuf
  {
    for candidate in VOLATILE_DIR_CANDIDATES
    {
      if Path::new( candidate ).is_dir()
      {
        return PathBuf::from( *candidate );
      }
    }
    std::env::temp_dir()
  }

  /// 32 random bytes, URL-safe base64 without padding, yielding exactly
  /// 43 characters.
  fn generate_secret() -> SecretString
  {
    let mut bytes = [ 0u8; 32 ];
    rand::rng().fill_bytes( &mut bytes );
    SecretString::from( URL_SAFE_NO_PAD.encode( bytes ) )
  }

  /// A generated backend credential, written to a volatile file for the
  /// process lifetime. Dropping this value shreds the file: the bytes
  /// are overwritten before the file is unlinked, so a crash-consistent
  /// filesystem doesn't leave a readable copy behind.
  #[ derive( Debug ) ]
  pub struct BackendCredential
  {
    secret : SecretString,
    file_path : PathBuf,
  }

  impl BackendCredential
  {
    /// Generate a fresh credential and persist it to an owner-only file
    /// under volatile storage.
    ///
    /// # Errors
    /// Returns [`SupervisorError::Credential`] if the file cannot be
    /// created or its permissions cannot be restricted.
    pub async fn generate() -> Result< Self >
    {
      use secrecy::ExposeSecret;
      use tokio::io::AsyncWriteExt;

      let secret = generate_secret();
      let dir = pick_volatile_dir();
      let file_name = format!( ".gateway_backend_credential_{}", std::process::id() );
      let file_path = dir.join( file_name );

      let mut file = tokio::fs::OpenOptions::new()
        .create( true )
        .write( true )
        .truncate( true )
        .open( &file_path )
        .await
        .map_err( | e | SupervisorError::credential( file_path.display().to_string(), e ) )?;

      file.write_all( secret.expose_secret().as_bytes() ).await
        .map_err( | e | SupervisorError::credential( file_path.display().to_string(), e ) )?;
      file.flush().await
        .map_err( | e | SupervisorError::credential( file_path.display().to_string(), e ) )?;

      restrict_to_owner( &file_path ).await?;

      Ok( Self { secret, file_path } )
    }

    /// The credential value, for injecting into the backend's launch
    /// environment and comparing against forwarded `Authorization`
    /// headers.
    #[ must_use ]
    pub fn secret( &self ) -> SecretString
    {
      self.secret.clone()
    }

    /// Path to the credential file, for passing to the backend by
    /// reference instead of by value where supported.
    #[ must_use ]
    pub fn file_path( &self ) -> &Path
    {
      &self.file_path
    }

    /// Overwrite then unlink the credential file. Idempotent; safe to
    /// call from both the explicit teardown path and `Drop`.
    pub async fn shred( &self )
    {
      use secrecy::ExposeSecret;
      use tokio::io::AsyncWriteExt;

      if let Ok( mut file ) = tokio::fs::OpenOptions::new().write( true ).open( &self.file_path ).await
      {
        let filler = vec![ 0u8; self.secret.expose_secret().len() ];
        let _ = file.write_all( &filler ).await;
        let _ = file.flush().await;
      }
      let _ = tokio::fs::remove_file( &self.file_path ).await;
    }
  }

  #[ cfg( unix ) ]
  async fn restrict_to_owner( path : &Path ) -> Result< () >
  {
    use std::os::unix::fs::PermissionsExt;
    let permissions = std::fs::Permissions::from_mode( 0o600 );
    tokio::fs::set_permissions( path, permissions ).await
      .map_err( | e | SupervisorError::credential( path.display().to_string(), e ) )
  }

  #[ cfg( not( unix ) ) ]
  async fn restrict_to_owner( _path : &Path ) -> Result< () >
  {
    Ok( () )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn generated_secret_is_43_chars_url_safe()
    {
      use secrecy::ExposeSecret;
      let secret = generate_secret();
      let value = secret.expose_secret();
      assert_eq!( value.len(), 43 );
      assert!( value.chars().all( | c | c.is_ascii_alphanumeric() || matches!( c, '-' | '_' ) ) );
    }

    #[ tokio::test ]
    async fn generate_then_shred_removes_file()
    {
      let credential = BackendCredential::generate().await.expect( "credential should generate" );
      let path = credential.file_path().to_path_buf();
      assert!( tokio::fs::metadata( &path ).await.is_ok() );
      credential.shred().await;
      assert!( tokio::fs::metadata( &path ).await.is_err() );
    }
  }
}

pub use private::BackendCredential;
