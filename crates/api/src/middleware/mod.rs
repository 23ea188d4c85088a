//! Request middleware.

pub mod serve;
