//! Resume artifact endpoints: fetch, template switch, ATS report.
//!
//! Session-scoped artifact reads live in `crate::sessions::handlers`.

pub mod handlers;
