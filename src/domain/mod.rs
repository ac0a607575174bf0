pub mod report;
pub mod transfer;
pub mod window;

pub use report::*;
pub use transfer::*;
pub use window::*;
