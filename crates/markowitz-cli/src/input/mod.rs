pub mod file;
pub mod prices;
pub mod stdin;
