pub mod recordings;
pub mod downsample;
pub mod builder;
pub mod partition;
pub mod synthetic;
pub mod sink;

pub use recordings::*;
pub use downsample::*;
pub use builder::*;
pub use partition::*;
pub use sink::*;
