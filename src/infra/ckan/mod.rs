mod client;

pub use client::{CkanClient, WriteMethod, watermark_from_response};
