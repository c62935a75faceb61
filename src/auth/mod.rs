pub mod jwt;

pub use jwt::{current_user, require_user};
