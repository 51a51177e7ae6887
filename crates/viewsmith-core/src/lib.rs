pub mod config;
pub mod fingerprint;
pub mod manifest;
pub mod metadata;
pub mod observability;
pub mod view;
