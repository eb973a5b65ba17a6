//! Key and Value Constraints
//!
//! Defines which types may be used as cache keys and values.

use std::fmt::Debug;
use std::hash::Hash;

// == Key ==
/// Types usable as cache keys.
///
/// Keys are a fixed set of primitive scalar types: strings, booleans and
/// fixed-width integers. They are immutable once inserted and only ever
/// used for equality/hash lookup.
///
/// Floating-point types are deliberately not included: `f32`/`f64` carry
/// no total equality or `Hash` implementation.
pub trait Key: Eq + Hash + Ord + Clone + Debug + Send + Sync + 'static {}

macro_rules! impl_key {
    ($($ty:ty),* $(,)?) => {
        $(impl Key for $ty {})*
    };
}

impl_key!(
    String, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
);

// == Value ==
/// Types usable as cache values.
///
/// Values are opaque payloads. `Clone` because reads hand out copies of the
/// stored value; `Send + Sync + 'static` because values live behind the
/// expiration timers' task boundary.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_key<K: Key>() {}
    fn assert_value<V: Value>() {}

    #[test]
    fn test_primitive_keys_accepted() {
        assert_key::<String>();
        assert_key::<bool>();
        assert_key::<i64>();
        assert_key::<u32>();
        assert_key::<usize>();
    }

    #[test]
    fn test_arbitrary_values_accepted() {
        #[derive(Clone)]
        struct Payload {
            #[allow(dead_code)]
            data: Vec<u8>,
        }

        assert_value::<Payload>();
        assert_value::<String>();
        assert_value::<Vec<i32>>();
    }
}
