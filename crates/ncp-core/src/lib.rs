//! Device command dispatch and source-of-truth inventory sync.
//!
//! Both entry points are total: [`CommandDispatcher::execute`] always returns a
//! displayable [`CommandResult`] and [`InventorySync::sync`] always returns a
//! bool. Failures travel as typed errors until that boundary.

pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
pub mod sync;

pub use config::NcpConfig;
pub use connector::{Connection, DeviceConnector, DeviceTypeDetector};
pub use dispatch::{CommandDispatcher, CommandLine};
pub use error::{
    ConfigError, ConnectError, DeviceError, DispatchError, SourceRequestError, StoreError,
    SyncError,
};
pub use model::{
    CommandResult, Credentials, DeviceRecord, DeviceType, ParsedValue, SourceDevice, SourceKind,
    SyncConfig, SyncReport,
};
pub use source::{DnacSource, InventorySource, SourceClientFactory};
pub use store::{load_persisted_inventory, InventoryStore, JsonFileStore};
pub use sync::InventorySync;
