//! `ApiKey` type and the key-file line parser.

mod private
{
  use chrono::{ DateTime, Utc };
  use secrecy::{ ExposeSecret, SecretString };

  /// An immutable, loaded API key.
  ///
  /// `secret` is wrapped in [`SecretString`] so an accidental `{:?}` or log
  /// line never prints it; use [`ApiKey::expose_secret`] only at the point
  /// of comparison.
  #[ derive( Debug, Clone ) ]
  pub struct ApiKey
  {
    /// Operator-assigned identifier; used in logs and as the rate-limit
    /// bucket key.
    pub key_id : String,
    secret : SecretString,
    /// Per-key override of the global requests-per-minute limit.
    pub rate_limit_per_minute : Option< u32 >,
    /// Absolute expiry instant, if any.
    pub expires_at : Option< DateTime< Utc > >,
  }

  impl ApiKey
  {
    /// Expose the raw secret for comparison. Callers must not log or
    /// otherwise persist the returned string.
    #[ inline ]
    #[ must_use ]
    pub fn expose_secret( &self ) -> &str
    {
      self.secret.expose_secret()
    }

    /// Whether, as of `now`, this key has expired.
    #[ inline ]
    #[ must_use ]
    pub fn is_expired_at( &self, now : DateTime< Utc > ) -> bool
    {
      self.expires_at.is_some_and( | exp | now > exp )
    }
  }

  fn is_valid_key_id( s : &str ) -> bool
  {
    ( 1..=64 ).contains( &s.len() ) && s.chars().all( is_token_char )
  }

  fn is_valid_secret_shape( s : &str ) -> bool
  {
    ( 16..=128 ).contains( &s.len() ) && s.chars().all( is_token_char )
  }

  fn is_token_char( c : char ) -> bool
  {
    c.is_ascii_alphanumeric() || matches!( c, '.' | '_' | '-' )
  }

  /// Outcome of parsing one line. Blank lines and comments are not errors;
  /// they simply produce no entry.
  enum LineOutcome
  {
    None,
    Entry( ApiKey ),
    Malformed,
  }

  fn parse_expires_at( raw : &str ) -> Option< DateTime< Utc > >
  {
    if let Ok( dt ) = DateTime::parse_from_rfc3339( raw )
    {
      return Some( dt.with_timezone( &Utc ) );
    }
    // Accept a naive "YYYY-MM-DDTHH:MM:SS" (no offset) as UTC.
    chrono::NaiveDateTime::parse_from_str( raw, "%Y-%m-%dT%H:%M:%S" )
      .ok()
      .map( | naive | naive.and_utc() )
  }

  fn parse_line( line : &str ) -> LineOutcome
  {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with( '#' )
    {
      return LineOutcome::None;
    }

    let fields : Vec< &str > = trimmed.split( ':' ).collect();
    if fields.len() < 2
    {
      return LineOutcome::Malformed;
    }

    let key_id = fields[ 0 ];
    let secret = fields[ 1 ];
    if !is_valid_key_id( key_id ) || !is_valid_secret_shape( secret )
    {
      return LineOutcome::Malformed;
    }

    let rate_limit_per_minute = match fields.get( 2 ).copied().unwrap_or( "" )
    {
      "" => None,
      raw => match raw.parse::< u32 >()
      {
        Ok( 0 ) | Err( _ ) => return LineOutcome::Malformed,
        Ok( n ) => Some( n ),
      },
    };

    let expires_at = match fields.get( 3 ).copied().unwrap_or( "" )
    {
      "" => None,
      raw => match parse_expires_at( raw )
      {
        Some( dt ) => Some( dt ),
        None => return LineOutcome::Malformed,
      },
    };

    LineOutcome::Entry( ApiKey
    {
      key_id : key_id.to_string(),
      secret : SecretString::from( secret.to_string() ),
      rate_limit_per_minute,
      expires_at,
    } )
  }

  /// Result of parsing a whole key file.
  pub enum ParseOutcome
  {
    /// File parsed with no errors and no duplicates; may be empty.
    Keys( Vec< ApiKey > ),
    /// At least one line was malformed, or a `key_id`/secret repeated;
    /// the whole file is rejected per the atomic-reload contract.
    Invalid( String ),
  }

  /// Parse key-file contents into [`ParseOutcome`]. A pure function of the
  /// file bytes, per the "key parse is a pure function" testable property.
  #[ must_use ]
  pub fn parse( content : &str ) -> ParseOutcome
  {
    let mut keys = Vec::new();
    let mut seen_ids = std::collections::HashSet::new();
    let mut seen_secrets = std::collections::HashSet::new();

    for ( lineno, line ) in content.lines().enumerate()
    {
      match parse_line( line )
      {
        LineOutcome::None => {}
        LineOutcome::Malformed =>
        {
          return ParseOutcome::Invalid( format!( "malformed entry on line {}", lineno + 1 ) );
        }
        LineOutcome::Entry( key ) =>
        {
          if !seen_ids.insert( key.key_id.clone() )
          {
            return ParseOutcome::Invalid( format!( "duplicate key_id `{}`", key.key_id ) );
          }
          if !seen_secrets.insert( key.expose_secret().to_string() )
          {
            return ParseOutcome::Invalid( "duplicate secret".to_string() );
          }
          keys.push( key );
        }
      }
    }

    ParseOutcome::Keys( keys )
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn parses_minimal_entry()
    {
      let outcome = parse( "alice:abcdefghijklmnop\n" );
      match outcome
      {
        ParseOutcome::Keys( keys ) =>
        {
          assert_eq!( keys.len(), 1 );
          assert_eq!( keys[ 0 ].key_id, "alice" );
          assert_eq!( keys[ 0 ].expose_secret(), "abcdefghijklmnop" );
          assert_eq!( keys[ 0 ].rate_limit_per_minute, None );
          assert_eq!( keys[ 0 ].expires_at, None );
        }
        ParseOutcome::Invalid( reason ) => panic!( "unexpected invalid: {reason}" ),
      }
    }

    #[ test ]
    fn ignores_comments_and_blank_lines()
    {
      let outcome = parse( "# a comment\n\nalice:abcdefghijklmnop\n" );
      assert!( matches!( outcome, ParseOutcome::Keys( ref v ) if v.len() == 1 ) );
    }

    #[ test ]
    fn parses_rate_limit_and_expiry()
    {
      let outcome = parse( "bob:abcdefghijklmnop:42:2026-01-01T00:00:00Z\n" );
      match outcome
      {
        ParseOutcome::Keys( keys ) =>
        {
          assert_eq!( keys[ 0 ].rate_limit_per_minute, Some( 42 ) );
          assert!( keys[ 0 ].expires_at.is_some() );
        }
        ParseOutcome::Invalid( reason ) => panic!( "unexpected invalid: {reason}" ),
      }
    }

    #[ test ]
    fn empty_override_field_means_global_default()
    {
      let outcome = parse( "carol:abcdefghijklmnop::2026-01-01T00:00:00\n" );
      match outcome
      {
        ParseOutcome::Keys( keys ) =>
        {
          assert_eq!( keys[ 0 ].rate_limit_per_minute, None );
          assert!( keys[ 0 ].expires_at.is_some() );
        }
        ParseOutcome::Invalid( reason ) => panic!( "unexpected invalid: {reason}" ),
      }
    }

    #[ test ]
    fn duplicate_key_id_invalidates_whole_file()
    {
      let outcome = parse( "alice:abcdefghijklmnop\nalice:qrstuvwxyzabcdef\n" );
      assert!( matches!( outcome, ParseOutcome::Invalid( _ ) ) );
    }

    #[ test ]
    fn duplicate_secret_invalidates_whole_file()
    {
      let outcome = parse( "alice:abcdefghijklmnop\nbob:abcdefghijklmnop\n" );
      assert!( matches!( outcome, ParseOutcome::Invalid( _ ) ) );
    }

    #[ test ]
    fn malformed_line_invalidates_whole_file()
    {
      let outcome = parse( "alice\n" );
      assert!( matches!( outcome, ParseOutcome::Invalid( _ ) ) );
    }

    #[ test ]
    fn secret_too_short_is_malformed()
    {
      let outcome = parse( "alice:short\n" );
      assert!( matches!( outcome, ParseOutcome::Invalid( _ ) ) );
    }

    #[ test ]
    fn empty_file_yields_no_keys()
    {
      let outcome = parse( "" );
      assert!( matches!( outcome, ParseOutcome::Keys( ref v ) if v.is_empty() ) );
    }
  }
}

pub use private::{ ApiKey, ParseOutcome, parse };
