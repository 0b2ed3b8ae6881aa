pub mod apply;
pub mod error;
pub mod invert;
pub mod local;
pub mod run;
pub mod sync;
pub mod tree;

#[cfg(test)]
mod tests;
