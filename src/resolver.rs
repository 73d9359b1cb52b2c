//! Layered configuration resolution for compilation and debugging.
//!
//! Every request merges the same stack of property layers, lowest precedence
//! first:
//!
//! 1. referenced (parent) platform
//! 2. owning platform
//! 3. owning platform runtime properties
//! 4. board
//! 5. every installed tool release
//! 6. tools required by the board, in required order
//! 7. selected programmer
//!
//! Later layers replace earlier values key by key. Installed tools are applied
//! sorted by package, name and ascending version, so for two releases of the
//! same tool the newest one owns `runtime.tools.<name>.path`.
//!
//! Request-scoped keys (`build.path`, `build.project_name`, debug port) are
//! set after the merge and therefore win over every layer. Nothing here is
//! cached: a [`ConfigurationResolver`] is built per request.

use crate::compat::legacy_debug_properties;
use crate::error::{Error, Result};
use crate::platform::{BoardResolver, ResolvedBoard, ToolRelease, compare_versions};
use crate::properties::PropertyStore;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    ReferencedPlatform,
    Platform,
    PlatformRuntime,
    Board,
    /// Hardcoded debug properties for a known legacy platform release.
    Compatibility,
    InstalledTool(String),
    RequiredTool(String),
    Programmer(String),
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub kind: LayerKind,
    pub properties: PropertyStore,
}

/// Inputs of a compilation request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub build_path: PathBuf,
    pub sketch_name: String,
    pub programmer: Option<String>,
}

/// Inputs of a debug-configuration request.
#[derive(Debug, Clone)]
pub struct DebugRequest {
    /// Directory holding the compiled sketch.
    pub build_path: PathBuf,
    pub sketch_name: String,
    pub programmer: Option<String>,
    /// Communication port address, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: Option<String>,
}

/// Fully merged properties for one request.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    properties: PropertyStore,
}

impl ResolvedConfiguration {
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn into_properties(self) -> PropertyStore {
        self.properties
    }

    pub fn get_expanded(&self, key: &str) -> Result<String> {
        self.properties.get_expanded(key)
    }

    /// Subtree under `prefix`, each value expanded against the whole store.
    pub fn expanded_subtree(&self, prefix: &str) -> Result<PropertyStore> {
        let mut out = PropertyStore::new();
        for (key, value) in self.properties.sub_tree(prefix).iter() {
            out.set(key, self.properties.expand_props_in_string(value)?);
        }
        Ok(out)
    }
}

/// What a debugger front-end needs to start a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    pub executable: String,
    pub server: String,
    pub server_path: String,
    pub server_configuration: BTreeMap<String, String>,
    pub toolchain: String,
    pub toolchain_path: String,
    pub toolchain_prefix: String,
    pub toolchain_configuration: BTreeMap<String, String>,
}

impl DebugConfig {
    fn from_debug_properties(debug: &PropertyStore) -> Self {
        let server = debug.get("server").to_string();
        let toolchain = debug.get("toolchain").to_string();
        Self {
            executable: debug.get("executable").to_string(),
            server_path: debug.get(&format!("server.{server}.path")).to_string(),
            server_configuration: debug.sub_tree(&format!("server.{server}")).into(),
            toolchain_path: debug.get("toolchain.path").to_string(),
            toolchain_prefix: debug.get("toolchain.prefix").to_string(),
            toolchain_configuration: debug.sub_tree(&format!("toolchain.{toolchain}")).into(),
            server,
            toolchain,
        }
    }
}

pub struct ConfigurationResolver<'a> {
    board: &'a ResolvedBoard,
    installed_tools: Vec<ToolRelease>,
    required_tools: Vec<ToolRelease>,
}

impl<'a> ConfigurationResolver<'a> {
    pub fn new(
        board: &'a ResolvedBoard,
        mut installed_tools: Vec<ToolRelease>,
        required_tools: Vec<ToolRelease>,
    ) -> Self {
        installed_tools.sort_by(|a, b| {
            (&a.package, &a.name)
                .cmp(&(&b.package, &b.name))
                .then_with(|| compare_versions(&a.version, &b.version))
        });
        Self {
            board,
            installed_tools,
            required_tools,
        }
    }

    /// Collect installed and required tools for `board` from `resolver`.
    pub fn with_resolver(resolver: &dyn BoardResolver, board: &'a ResolvedBoard) -> Result<Self> {
        let installed = resolver.installed_tools()?;
        let required = resolver.required_tools(board)?;
        Ok(Self::new(board, installed, required))
    }

    pub fn board(&self) -> &ResolvedBoard {
        self.board
    }

    /// The ordered layer stack for this request.
    pub fn layers(&self, programmer: Option<&str>) -> Result<Vec<Layer>> {
        let programmer = programmer
            .filter(|p| !p.is_empty())
            .map(|id| self.find_programmer(id))
            .transpose()?;

        let mut layers = Vec::new();
        if let Some(referenced) = &self.board.referenced_platform {
            layers.push(Layer {
                kind: LayerKind::ReferencedPlatform,
                properties: referenced.properties.clone(),
            });
        }
        layers.push(Layer {
            kind: LayerKind::Platform,
            properties: self.board.platform.properties.clone(),
        });
        layers.push(Layer {
            kind: LayerKind::PlatformRuntime,
            properties: self.board.platform.runtime_properties(),
        });
        layers.push(Layer {
            kind: LayerKind::Board,
            properties: self.board.properties.clone(),
        });
        for tool in &self.installed_tools {
            layers.push(Layer {
                kind: LayerKind::InstalledTool(tool.id()),
                properties: tool.runtime_properties(),
            });
        }
        for tool in &self.required_tools {
            info!("tool {} required for board {}", tool.id(), self.board.fqbn);
            layers.push(Layer {
                kind: LayerKind::RequiredTool(tool.id()),
                properties: tool.runtime_properties(),
            });
        }
        if let Some((id, properties)) = programmer {
            layers.push(Layer {
                kind: LayerKind::Programmer(id),
                properties,
            });
        }
        Ok(layers)
    }

    fn find_programmer(&self, id: &str) -> Result<(String, PropertyStore)> {
        let owning = self.board.platform.programmers.get(id);
        let referenced = self
            .board
            .referenced_platform
            .as_ref()
            .and_then(|p| p.programmers.get(id));
        owning
            .or(referenced)
            .map(|p| (p.id.clone(), p.properties.clone()))
            .ok_or_else(|| Error::ProgrammerNotFound(id.to_string()))
    }

    /// Merge the layer stack without any request-scoped bindings.
    pub fn merge(&self, programmer: Option<&str>) -> Result<PropertyStore> {
        Ok(merge_layers(&self.layers(programmer)?))
    }

    /// Properties for compiling a sketch into `request.build_path`.
    pub fn build_properties(&self, request: &BuildRequest) -> Result<ResolvedConfiguration> {
        let mut properties = self.merge(request.programmer.as_deref())?;

        bind_build_path(&mut properties, &request.build_path, &request.sketch_name);
        properties.set("build.fqbn", self.board.fqbn.to_string());
        properties.set("build.arch", self.board.platform.arch.to_uppercase());
        properties.set_path("build.system.path", self.board.platform.install_dir.join("system"));

        let core = properties.get("build.core").to_string();
        if !core.is_empty() {
            properties.set_path(
                "build.core.path",
                self.board.core_platform().install_dir.join("cores").join(core),
            );
        }
        let variant = properties.get("build.variant").to_string();
        if !variant.is_empty() {
            properties.set_path(
                "build.variant.path",
                self.board.platform.install_dir.join("variants").join(variant),
            );
        }

        Ok(ResolvedConfiguration { properties })
    }

    /// Debugger configuration for the compiled sketch in `request.build_path`.
    ///
    /// Fails with [`Error::UnsupportedOperation`] when the board has no
    /// `debug.executable`.
    pub fn debug_config(&self, request: &DebugRequest) -> Result<DebugConfig> {
        let mut layers = self.layers(request.programmer.as_deref())?;

        let after_board = layers
            .iter()
            .position(|l| l.kind == LayerKind::Board)
            .map_or(layers.len(), |idx| idx + 1);
        let platform_id = self.board.platform.id();
        if !merge_layers(&layers[..after_board]).contains_key("debug.executable")
            && let Some(properties) = legacy_debug_properties(&platform_id)
        {
            info!("applying legacy debug properties for {platform_id}");
            layers.insert(
                after_board,
                Layer {
                    kind: LayerKind::Compatibility,
                    properties,
                },
            );
        }

        let mut properties = merge_layers(&layers);
        bind_build_path(&mut properties, &request.build_path, &request.sketch_name);
        if let Some(address) = request.port.as_deref().filter(|a| !a.is_empty()) {
            properties.set("debug.port", address);
            if let Some(file) = address.strip_prefix("/dev/") {
                properties.set("debug.port.file", file);
            }
        }

        let resolved = ResolvedConfiguration { properties };
        let debug = resolved.expanded_subtree("debug")?;
        if !debug.contains_key("executable") {
            return Err(Error::UnsupportedOperation {
                operation: "debugging".to_string(),
                board: self.board.fqbn.to_string(),
            });
        }

        Ok(DebugConfig::from_debug_properties(&debug))
    }
}

/// Fold `layers` left to right, last write wins.
pub fn merge_layers(layers: &[Layer]) -> PropertyStore {
    let mut merged = PropertyStore::new();
    for layer in layers {
        debug!("merging {:?} ({} keys)", layer.kind, layer.properties.len());
        merged.merge(&layer.properties);
    }
    merged
}

fn bind_build_path(properties: &mut PropertyStore, build_path: &Path, sketch_name: &str) {
    properties.set_path("build.path", build_path);
    properties.set("build.project_name", format!("{sketch_name}.ino"));
}
