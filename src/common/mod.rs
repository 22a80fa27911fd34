pub mod errors;
pub mod models;

#[cfg(test)]
mod tests;
