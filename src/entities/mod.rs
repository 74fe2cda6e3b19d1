pub mod product_analyses;
pub mod products;
pub mod subscriptions;
pub mod users;

pub use product_analyses::AnalysisVerdict;
pub use products::SourcePlatform;

pub use product_analyses as product_analysis_entity;
pub use products as product_entity;
pub use subscriptions as subscription_entity;
pub use users as user_entity;
