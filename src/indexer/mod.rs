pub mod client;
pub mod cursor;
pub mod decoder;
pub mod paginator;
pub mod scanner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
