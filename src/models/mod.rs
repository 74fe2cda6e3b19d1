pub mod analysis;
pub mod common;
pub mod pagination;
pub mod plan;
pub mod quota;
pub mod subscription;

pub use analysis::*;
pub use common::*;
pub use pagination::*;
pub use plan::*;
pub use quota::*;
pub use subscription::*;
