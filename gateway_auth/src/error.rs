//! Authentication-layer error type.

mod private
{
  /// Failure classes the authenticator can produce. Every variant maps to
  /// exactly one HTTP status and error-envelope `code` (handled in
  /// `gateway_proxy`, which is the only crate that knows about HTTP).
  #[ derive( Debug, Clone, thiserror::Error, PartialEq, Eq ) ]
  #[ non_exhaustive ]
  pub enum AuthError
  {
    /// No `Authorization` header, or an empty one.
    #[ error( "missing Authorization header" ) ]
    MissingHeader,

    /// Header present but the secret doesn't match the accepted shape.
    #[ error( "invalid API key format" ) ]
    InvalidFormat,

    /// No configured key matched the presented secret.
    #[ error( "invalid API key" ) ]
    NoMatch,

    /// The matched key's `expires_at` has passed.
    #[ error( "API key has expired" ) ]
    Expired,

    /// The matched key's effective rate limit was exceeded.
    #[ error( "rate limit exceeded" ) ]
    RateLimited,
  }

  /// Convenience alias used throughout the auth crate.
  pub type Result< T > = core::result::Result< T, AuthError >;
}

pub use private::{ AuthError, Result };
