//! The delta engine: producing block streams on the client and applying
//! them on the server

pub mod produce;
pub mod reconstruct;

pub use produce::BlockProducer;
pub use reconstruct::reconstruct;
