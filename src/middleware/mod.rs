//! HTTP middleware

pub mod loopback;
