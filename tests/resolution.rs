//! Integration tests for board resolution against an on-disk hardware tree.

use inox::Error;
use inox::platform::{BoardResolver, Fqbn, HardwareIndex};
use inox::resolver::{BuildRequest, ConfigurationResolver, DebugRequest};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `arduino:samd@1.8.9` without debug keys, `acme:samd@2.0.0` whose `zero`
/// board borrows the arduino core, and tools for both packages.
fn hardware(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().join("packages");

    let samd = root.join("arduino/hardware/samd/1.8.9");
    write(
        &samd.join("platform.txt"),
        "name=Arduino SAMD\n\
         compiler.path={runtime.tools.arm-none-eabi-gcc.path}/bin/\n\
         recipe.cpp.o.pattern=\"{compiler.path}arm-none-eabi-g++\" -c {includes} \"{source_file}\" -o \"{object_file}\"\n",
    );
    write(
        &samd.join("boards.txt"),
        "mkr1000.name=Arduino MKR1000\n\
         mkr1000.build.core=arduino\n\
         mkr1000.build.variant=mkr1000\n\
         mkr1000.build.mcu=cortex-m0plus\n\
         mkr1000.build.openocdscript=openocd_scripts/arduino_zero.cfg\n",
    );
    write(
        &samd.join("programmers.txt"),
        "atmel_ice.name=Atmel-ICE\natmel_ice.protocol=cmsis-dap\n",
    );
    write(&root.join("arduino/tools/arm-none-eabi-gcc/4.8.3/bin/.keep"), "");
    write(&root.join("arduino/tools/arm-none-eabi-gcc/7-2017q4/bin/.keep"), "");
    write(&root.join("arduino/tools/openocd/0.10.0-arduino7/bin/.keep"), "");

    let acme = root.join("acme/hardware/samd/2.0.0");
    write(&acme.join("platform.txt"), "name=Acme SAMD\n");
    write(
        &acme.join("boards.txt"),
        "zero.name=Acme Zero\n\
         zero.build.core=arduino:arduino\n\
         zero.build.variant=zero\n\
         nodebug.name=Acme NoDebug\n\
         nodebug.build.core=arduino:arduino\n",
    );
    root
}

fn index(root: PathBuf) -> HardwareIndex {
    HardwareIndex::new(vec![root])
}

#[test]
fn test_legacy_platform_gets_debug_configuration() {
    let tmp = TempDir::new().unwrap();
    let index = index(hardware(&tmp));
    let fqbn: Fqbn = "arduino:samd:mkr1000".parse().unwrap();
    let board = index.resolve(&fqbn).unwrap();
    let resolver = ConfigurationResolver::with_resolver(&index, &board).unwrap();

    let config = resolver
        .debug_config(&DebugRequest {
            build_path: PathBuf::from("/tmp/build"),
            sketch_name: "Blink".into(),
            programmer: Some("atmel_ice".into()),
            port: Some("/dev/ttyACM0".into()),
        })
        .unwrap();

    assert_eq!(config.executable, "/tmp/build/Blink.ino.elf");
    assert_eq!(config.toolchain, "gcc");
    assert_eq!(config.server, "openocd");
    assert!(config.toolchain_path.ends_with("arm-none-eabi-gcc/7-2017q4/bin/"));
    assert!(
        config
            .server_configuration
            .get("script")
            .is_some_and(|s| s.ends_with("openocd_scripts/arduino_zero.cfg"))
    );
}

#[test]
fn test_referenced_core_and_programmers() {
    let tmp = TempDir::new().unwrap();
    let index = index(hardware(&tmp));
    let fqbn: Fqbn = "acme:samd:zero".parse().unwrap();
    let board = index.resolve(&fqbn).unwrap();
    assert_eq!(board.referenced_platform.as_ref().unwrap().id(), "arduino:samd@1.8.9");

    let resolver = ConfigurationResolver::with_resolver(&index, &board).unwrap();
    let configuration = resolver
        .build_properties(&BuildRequest {
            build_path: PathBuf::from("/tmp/build"),
            sketch_name: "Blink".into(),
            programmer: Some("atmel_ice".into()),
        })
        .unwrap();
    let props = configuration.properties();
    assert_eq!(props.get("build.core"), "arduino");
    assert_eq!(props.get("protocol"), "cmsis-dap");
    assert!(
        props
            .get("build.core.path")
            .ends_with(&format!("samd{0}1.8.9{0}cores{0}arduino", std::path::MAIN_SEPARATOR))
    );
    assert_eq!(configuration.get_expanded("build.project_name").unwrap(), "Blink.ino");
}

#[test]
fn test_board_without_debug_keys_is_unsupported() {
    let tmp = TempDir::new().unwrap();
    let index = index(hardware(&tmp));
    let fqbn: Fqbn = "acme:samd:nodebug".parse().unwrap();
    let board = index.resolve(&fqbn).unwrap();
    let resolver = ConfigurationResolver::with_resolver(&index, &board).unwrap();

    let err = resolver
        .debug_config(&DebugRequest {
            build_path: PathBuf::from("/tmp/build"),
            sketch_name: "Blink".into(),
            programmer: None,
            port: None,
        })
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(err.to_string().contains("acme:samd:nodebug"));
}

#[test]
fn test_unknown_programmer() {
    let tmp = TempDir::new().unwrap();
    let index = index(hardware(&tmp));
    let board = index.resolve(&"acme:samd:zero".parse().unwrap()).unwrap();
    let resolver = ConfigurationResolver::with_resolver(&index, &board).unwrap();

    let err = resolver
        .build_properties(&BuildRequest {
            build_path: PathBuf::from("/tmp/build"),
            sketch_name: "Blink".into(),
            programmer: Some("nonexistent".into()),
        })
        .unwrap_err();
    assert!(matches!(err, Error::ProgrammerNotFound(ref id) if id == "nonexistent"));
}

#[test]
fn test_unknown_board_is_resolution_error() {
    let tmp = TempDir::new().unwrap();
    let index = index(hardware(&tmp));
    let err = index.resolve(&"arduino:samd:uno".parse().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
    assert_eq!(index.installed_programmers().unwrap(), vec!["atmel_ice"]);
}
