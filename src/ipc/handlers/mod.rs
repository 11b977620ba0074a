pub mod bulk;
pub mod core;
pub mod lookup;
pub mod members;
pub mod organizations;
pub mod schools;
