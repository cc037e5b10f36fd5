//! Control-plane core of the Blynx browser shell.
//!
//! Persistent stores, profiles, extension storage and the tab hand-off
//! buffer, tied together by [`ControlContext`], which answers
//! [`blynx_protocol::ControlRequest`]s from browser windows.

pub mod browsing;
pub mod clock;
pub mod control;
pub mod error;
pub mod ext_storage;
pub mod extensions;
pub mod host;
pub mod migrate;
pub mod notifier;
pub mod profiles;
pub mod session;
pub mod settings;
pub mod store;
pub mod tab_transfer;

pub use control::{ControlContext, ControlOptions, SharedControl};
pub use error::{Error, Result};
pub use extensions::ExtensionInstaller;
pub use host::{NotifyingHost, ShellHost};
pub use migrate::MigrationReport;
pub use notifier::{ChangeNotifier, Subscription};
pub use profiles::{ProfileRegistry, partition_for};
pub use store::{KeyedStore, StoreRegistry};
pub use tab_transfer::TabTransferBroker;
