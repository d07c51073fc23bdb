pub mod artifact;
pub mod session;
pub mod summary;
pub mod user;
