mod axis;
mod controller;

pub use axis::*;
pub use controller::*;
