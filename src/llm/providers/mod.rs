#[cfg(test)]
pub mod fixture;
pub mod ollama;
pub mod remote;
