//! Operator commands that work directly against the database.

pub mod doctor;
pub mod search;
pub mod user;

pub use doctor::doctor;
pub use search::search;
pub use user::create_user;
