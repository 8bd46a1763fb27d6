/// UI module exports
pub mod blocking;
