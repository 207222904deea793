pub mod dependency;
pub mod membership;
pub mod role;
