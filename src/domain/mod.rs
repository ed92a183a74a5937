pub mod chat;
pub mod dispute;
pub mod money;
pub mod party;
pub mod ports;
pub mod transaction;
