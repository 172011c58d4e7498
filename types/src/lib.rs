pub mod config;
pub mod consts;
pub mod containers;
pub mod nonstandard;
pub mod primitives;
pub mod redacting_url;
pub mod traits;
