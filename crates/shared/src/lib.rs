//! Wire types shared by the deck import client and the backend contract it consumes.

pub mod domain;
pub mod error;
pub mod protocol;
