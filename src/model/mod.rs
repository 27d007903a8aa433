mod discriminator;
mod generator;
mod loss;
mod misc;

pub use discriminator::*;
pub use generator::*;
pub use loss::*;
pub use misc::*;
