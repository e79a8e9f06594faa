pub mod dataset;
pub mod params;
pub mod results;
pub mod errors;

pub use dataset::*;
pub use params::*;
pub use results::*;
pub use errors::*;
