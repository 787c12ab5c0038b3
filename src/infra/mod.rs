//! Concrete connectors: the NGSI-LD context broker and the CKAN DataStore.

pub mod broker;
pub mod ckan;
