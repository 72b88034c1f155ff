//! This module defines the error types shared by the gateway workspace.
//! Each crate layers its own, more specific error enum on top of
//! [`GatewayError`] via `#[from]`; this keeps failure classes exhaustive
//! and checkable against the HTTP-status mapping table in the design docs.

mod private
{
  use core::fmt;

  /// Errors that originate in the shared core: configuration validation
  /// and the small amount of file I/O the supervisor performs directly
  /// (credential file, boot transcript, access log).
  #[ derive( Debug, thiserror::Error ) ]
  #[ non_exhaustive ]
  pub enum GatewayError
  {
    /// A required configuration variable was missing.
    #[ error( "missing required configuration: {0}" ) ]
    MissingConfig( String ),

    /// A configuration variable was present but invalid or contradictory.
    #[ error( "invalid configuration for `{field}`: {reason}" ) ]
    InvalidConfig
    {
      /// Name of the offending field.
      field : String,
      /// Human-readable reason, safe to log.
      reason : String,
    },

    /// An I/O error while reading or writing gateway-owned files (key
    /// file, credential file, access log, boot transcript).
    #[ error( "io error on {path}: {source}" ) ]
    Io
    {
      /// Path involved, for diagnostics only.
      path : String,
      /// Underlying error.
      #[ source ]
      source : std::io::Error,
    },
  }

  impl GatewayError
  {
    /// Construct an [`GatewayError::Io`] with path context attached.
    #[ inline ]
    #[ must_use ]
    pub fn io( path : impl Into< String >, source : std::io::Error ) -> Self
    {
      Self::Io { path : path.into(), source }
    }
  }

  /// Convenience alias used throughout the core crate.
  pub type Result< T > = core::result::Result< T, GatewayError >;

  // Manual Display isn't needed; thiserror derives it from `#[error(...)]`.
  // This trait impl exists only to make dyn-error conversion ergonomic at
  // call sites that bridge into `std::error::Error`.
  impl From< GatewayError > for Box< dyn std::error::Error + Send + Sync >
  {
    #[ inline ]
    fn from( value : GatewayError ) -> Self
    {
      Box::new( value )
    }
  }

  #[ allow( dead_code ) ]
  fn _assert_error_bounds()
  {
    fn assert_send_sync< T : Send + Sync + fmt::Debug >() {}
    assert_send_sync::< GatewayError >();
  }
}

pub use private::{ GatewayError, Result };
