mod model;
mod parser;
mod types;

pub use model::*;
pub use parser::*;
pub use types::*;
