//! Collection of generic internal data types shared across the consensus
//! core: fixed-size byte buffers, ids, parameters and error types.

pub mod buf;
pub mod constants;
pub mod errors;
pub mod hash;
pub mod ids;
pub mod params;
pub mod prelude;
