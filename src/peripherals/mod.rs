mod servo;
#[cfg(feature = "rp2040")]
mod usb_serial;

pub use servo::*;
#[cfg(feature = "rp2040")]
pub use usb_serial::*;
