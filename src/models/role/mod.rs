pub mod editor;
pub mod form;
pub mod types;

pub use editor::*;
pub use form::*;
pub use types::*;
