mod concept;
mod filter;
mod ids;
mod mapping;
mod source_code;

pub use concept::*;
pub use filter::*;
pub use ids::*;
pub use mapping::*;
pub use source_code::*;
