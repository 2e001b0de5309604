//! Data provider adapters
//!
//! Each submodule is one widget kind: a typed settings struct, a `Widget`
//! implementation and a `kind()` registry entry.

pub mod cmdrunner;
pub mod hibp;
pub mod textfile;
