//! Mail side-panel engine: folder suggestions for attachments and contact
//! capture from signatures.

pub mod config;
pub mod contacts;
pub mod error;
pub mod folders;
pub mod services;
pub mod text;
