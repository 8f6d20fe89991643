//! One-time provisioning of the on-device binaries.
//!
//! Devices need the prebuilt `minitouch`/`minicap` binaries (and minicap's
//! companion `minicap.so`) in `/data/local/tmp` before a session can start.
//! The shared assets directory follows the stf prebuilt layout:
//!
//! ```text
//! <shared_assets>/stf_libs/<abi>/minitouch
//! <shared_assets>/stf_libs/<abi>/minicap
//! <shared_assets>/stf_libs/minicap-shared/aosp/libs/android-<sdk>/<abi>/minicap.so
//! ```
//!
//! Provisioning is idempotent (remote existence is checked first) and runs
//! once per device per installation, so ADB failures propagate verbatim
//! with no retry.

use std::path::Path;

use tracing::info;

use super::adb::{query, AdbBridge, AdbError};

/// Where the on-device binaries live.
pub const REMOTE_DIR: &str = "/data/local/tmp";

/// Which build of the on-device binaries a device needs.
///
/// Devices below SDK 16 predate position-independent executables and need
/// the `-nopie` builds. Resolved once per session from
/// `ro.build.version.sdk` and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryVariant {
    Pie,
    NoPie,
}

impl BinaryVariant {
    pub fn for_sdk(sdk: u32) -> Self {
        if sdk >= 16 {
            BinaryVariant::Pie
        } else {
            BinaryVariant::NoPie
        }
    }

    /// File name of the minitouch binary for this variant.
    pub fn touch_binary(self) -> &'static str {
        match self {
            BinaryVariant::Pie => "minitouch",
            BinaryVariant::NoPie => "minitouch-nopie",
        }
    }

    /// File name of the minicap binary for this variant.
    pub fn cap_binary(self) -> &'static str {
        match self {
            BinaryVariant::Pie => "minicap",
            BinaryVariant::NoPie => "minicap-nopie",
        }
    }
}

/// Ensures the minitouch binary is on the device, pushing and `chmod`ing it
/// if absent. Returns the resolved variant.
pub async fn ensure_touch_binary(
    bridge: &dyn AdbBridge,
    device: &str,
    shared_assets: &Path,
) -> Result<BinaryVariant, AdbError> {
    let abi = query::cpu_abi(bridge, device).await?;
    let sdk = query::sdk_version(bridge, device).await?;
    let variant = BinaryVariant::for_sdk(sdk);

    let binary = variant.touch_binary();
    let remote = format!("{REMOTE_DIR}/{binary}");
    if !query::file_exists(bridge, device, &remote).await? {
        info!(device, binary, abi, "pushing minitouch binary");
        let local = shared_assets.join("stf_libs").join(&abi).join(binary);
        bridge.push(device, &local, REMOTE_DIR).await?;
        chmod(bridge, device, &remote).await?;
    }

    Ok(variant)
}

/// Ensures the minicap binary and its `minicap.so` are on the device.
///
/// Existence is keyed on `minicap.so` (the shared object is SDK-specific,
/// the binary is not), matching the stf deployment convention.
pub async fn ensure_cap_binary(
    bridge: &dyn AdbBridge,
    device: &str,
    shared_assets: &Path,
) -> Result<BinaryVariant, AdbError> {
    let abi = query::cpu_abi(bridge, device).await?;
    let sdk = query::sdk_version(bridge, device).await?;
    let variant = BinaryVariant::for_sdk(sdk);

    let binary = variant.cap_binary();
    if !query::file_exists(bridge, device, &format!("{REMOTE_DIR}/minicap.so")).await? {
        info!(device, binary, abi, sdk, "pushing minicap binary and shared object");

        let local_bin = shared_assets.join("stf_libs").join(&abi).join(binary);
        bridge.push(device, &local_bin, REMOTE_DIR).await?;

        let local_so = shared_assets
            .join("stf_libs/minicap-shared/aosp/libs")
            .join(format!("android-{sdk}"))
            .join(&abi)
            .join("minicap.so");
        bridge.push(device, &local_so, REMOTE_DIR).await?;

        chmod(bridge, device, &format!("{REMOTE_DIR}/{binary}")).await?;
        chmod(bridge, device, &format!("{REMOTE_DIR}/minicap.so")).await?;
    }

    Ok(variant)
}

async fn chmod(bridge: &dyn AdbBridge, device: &str, remote: &str) -> Result<(), AdbError> {
    bridge
        .run(
            device,
            &[
                "shell".to_string(),
                "chmod".to_string(),
                "777".to_string(),
                remote.to_string(),
            ],
        )
        .await?;
    Ok(())
}
