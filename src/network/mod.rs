pub mod lobby;
pub mod server;
