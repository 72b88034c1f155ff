//! Constant-time byte comparison, used so authentication response time
//! does not leak whether (or where) a match occurred.

mod private
{
  /// Compare two byte strings without short-circuiting on the first
  /// mismatch. Differing lengths are still compared over their shared
  /// prefix so the cost is a function of the longer input, not of where
  /// a mismatch happens to fall.
  #[ must_use ]
  pub fn eq( a : &[ u8 ], b : &[ u8 ] ) -> bool
  {
    let len_equal = a.len() == b.len();
    let mut diff : u8 = u8::from( !len_equal );

    for i in 0..a.len().max( b.len() )
    {
      let x = a.get( i ).copied().unwrap_or( 0 );
      let y = b.get( i ).copied().unwrap_or( 0 );
      diff |= x ^ y;
    }

    diff == 0
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn equal_strings_match()
    {
      assert!( eq( b"hello world", b"hello world" ) );
    }

    #[ test ]
    fn different_strings_do_not_match()
    {
      assert!( !eq( b"hello world", b"hello worlD" ) );
    }

    #[ test ]
    fn different_lengths_do_not_match()
    {
      assert!( !eq( b"short", b"much longer input" ) );
    }
  }
}

pub use private::eq;
