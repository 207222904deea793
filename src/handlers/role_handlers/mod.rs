pub mod crud;
pub mod dependencies;
pub mod list;
pub mod status;
