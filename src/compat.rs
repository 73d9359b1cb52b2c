//! Debug properties for platform releases that shipped without a `debug.*` section.
//!
//! Each entry is keyed by platform id (`package:arch@version`). The resolver
//! applies an entry as one extra layer, right after the board layer, and
//! only when the properties merged so far have no `debug.executable`.
//! Dropping support for a release means deleting its row here.

use crate::properties::PropertyStore;

const SAMD_OPENOCD_DEBUG: &[(&str, &str)] = &[
    ("debug.executable", "{build.path}/{build.project_name}.elf"),
    ("debug.toolchain", "gcc"),
    (
        "debug.toolchain.path",
        "{runtime.tools.arm-none-eabi-gcc-7-2017q4.path}/bin/",
    ),
    ("debug.toolchain.prefix", "arm-none-eabi-"),
    ("debug.server", "openocd"),
    (
        "debug.server.openocd.path",
        "{runtime.tools.openocd-0.10.0-arduino7.path}/bin/openocd",
    ),
    (
        "debug.server.openocd.scripts_dir",
        "{runtime.tools.openocd-0.10.0-arduino7.path}/share/openocd/scripts/",
    ),
    (
        "debug.server.openocd.script",
        "{runtime.platform.path}/variants/{build.variant}/{build.openocdscript}",
    ),
];

/// Platform id -> debug properties injected for it.
pub const LEGACY_DEBUG_PROFILES: &[(&str, &[(&str, &str)])] = &[
    ("arduino:samd@1.8.8", SAMD_OPENOCD_DEBUG),
    ("arduino:samd@1.8.9", SAMD_OPENOCD_DEBUG),
];

/// Compatibility layer for `platform_id`, if one is registered.
pub fn legacy_debug_properties(platform_id: &str) -> Option<PropertyStore> {
    LEGACY_DEBUG_PROFILES
        .iter()
        .find(|(id, _)| *id == platform_id)
        .map(|(_, props)| props.iter().copied().collect())
}
