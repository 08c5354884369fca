pub mod screenshot;
pub mod settings;
pub mod trade;

pub use screenshot::*;
pub use settings::*;
pub use trade::*;
