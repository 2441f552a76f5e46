//! Storage and manipulation of antisymmetrized, angular-momentum-coupled
//! two-body matrix elements for nuclear many-body calculations.
extern crate byteorder;
extern crate conv;
extern crate flate2;
extern crate fnv;
#[macro_use]
extern crate lazy_static;
extern crate num;
#[macro_use]
extern crate quick_error;
extern crate rand;
extern crate regex;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate wigner_symbols;
extern crate xz2;

#[macro_use]
mod macros;

pub mod ang_mom;
pub mod basis;
pub mod half;
pub mod io;
pub mod matrix;
pub mod model_space;
pub mod parity;
pub mod tbme;
pub mod tbme_ph;
pub mod utils;
