pub mod resources;
pub mod users;
