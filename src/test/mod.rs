pub mod badges;
pub mod sessions;
pub mod streak;
pub mod utils;

pub use utils::*;
