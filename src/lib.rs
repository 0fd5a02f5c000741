pub use tryout_core::*;
