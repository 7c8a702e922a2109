pub mod agent;
pub mod ports;
pub mod score;
pub mod transaction;
