mod client;

pub use client::{BrokerClient, decode_page};
