//! Mail client account definitions.
//!
//! Maps the store's account directory names (`account4`) to the address that
//! owns each account.

mod definitions;

pub use definitions::AccountMap;
