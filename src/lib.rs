pub mod bulletin;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod ignore;
pub mod integrity;
pub mod model;
pub mod output;
pub mod platform;
pub mod registry;
pub mod scanner;
pub mod version;

pub use cache::Cache;
pub use config::Config;
pub use engine::{AuditEngine, AuditOptions, IntegrityScope, ModifiedPolicy};
pub use error::AuditError;
pub use ignore::IgnoreRuleSet;
pub use model::{AuditReport, ExtensionInstance, Finding, FindingKind, Installation, Modification};
pub use registry::{FeedSource, FileFeed, RegistryIndex, RemoteFeed};
pub use version::{RawVersion, Version};
