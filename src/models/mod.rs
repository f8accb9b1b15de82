pub mod enums;
pub mod record;
pub mod share_token;

pub use enums::*;
pub use record::*;
pub use share_token::*;
