//! Infrastructure layer for the controller.
//!
//! Contains the process- and network-facing adapters: the ADB subprocess
//! bridge, host port pooling, on-device binary provisioning, the live
//! minitouch/minicap sessions, and file-system configuration.
//!
//! **Dependency rule**: this layer may depend on `tapfarm_core`, but MUST
//! NOT be imported by the domain layer.

pub mod adb;
pub mod ports;
pub mod provision;
pub mod session;
pub mod storage;
