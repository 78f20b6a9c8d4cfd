//! Catalog record types shared by the service and server crates.

pub mod errors;
pub mod site_entry;
