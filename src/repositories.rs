pub mod mail;
pub mod users;
