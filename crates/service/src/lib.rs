//! Service layer for the site index.
//! - `storage` holds the pluggable entry stores (file document, remote set).
//! - `site_index` applies submission rules on top of whichever store is configured.
//! - `runtime` builds the configured store at process start.

pub mod errors;
pub mod runtime;
pub mod site_index;
pub mod storage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
