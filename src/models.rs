pub mod mail;
pub mod transactions;
pub mod users;
