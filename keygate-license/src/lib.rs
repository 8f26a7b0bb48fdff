//! License validation engine for Keygate.
//!
//! This crate handles:
//! - License checks against a remote licensing service, with failover to a
//!   backup host
//! - Local persistence of credentials and the last validated license
//! - Entitlement predicates (new / expired / licensed) derived from that state
//! - Classification of service error replies into user-facing messages
//!
//! # Design Principles
//!
//! - **Fail open**: when neither host is reachable the license stays valid
//! - **Errors as data**: service failures are outcomes plus a cached message,
//!   never `Err`
//! - **Injected collaborators**: storage, transport and hooks sit behind
//!   narrow traits
//!
//! # Record Layout
//!
//! - `activation`: [`Credentials`] of the license holder
//! - `license`: [`LicenseContent`], where `expire` is the number of days left
//!   (`0` = disabled, absent = never validated)
//! - `license-error`: last error message, kept for a limited time

mod config;
mod content;
mod error;
mod facade;
mod store;
mod translator;
mod validator;
mod webservice;

pub use config::{ClientConfig, DefaultHooks, LicenseConfig, LicenseHooks};
pub use content::{
    expire_days, parse_expiry, ContentPatch, Credentials, LicenseContent, RemoteContent,
    ValidationResponse, CODE_UP, EXPIRED, STATUS_SUCCESS,
};
pub use error::{LicenseError, LicenseResult};
pub use facade::Licensing;
pub use store::{FileStore, MemoryStore, OptionStore, RecordKey, TransientStore};
pub use translator::{default_errors, default_messages, ErrorKind, ErrorMap, ErrorTranslator, MessageMap};
pub use validator::{Activation, LicenseValidator, Outcome, Validation, API_VERSION};
pub use webservice::{Webservice, WebserviceClient, CHECK_PATH, INDEX_PATH};
