//! Installed platforms, boards, tools and programmers.
//!
//! The resolver in [`crate::resolver`] only needs the property layers these
//! types expose. Where those layers come from is behind the [`BoardResolver`]
//! trait; [`HardwareIndex`] is the filesystem implementation used by the CLI.
//!
//! ## Hardware layout
//!
//! ```text
//! <root>/<package>/hardware/<arch>/<version>/platform.txt
//!                                           /boards.txt
//!                                           /programmers.txt
//! <root>/<package>/tools/<name>/<version>/
//! ```

use crate::error::{Error, Result};
use crate::properties::PropertyStore;
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fully-qualified board name: `package:arch:board[:opt=val,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fqbn {
    pub package: String,
    pub arch: String,
    pub board_id: String,
    pub options: Vec<(String, String)>,
}

impl FromStr for Fqbn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(Error::Resolution(format!("invalid FQBN '{s}'")));
        }

        let mut options = Vec::new();
        if let Some(opts) = parts.get(3) {
            for pair in opts.split(',') {
                match pair.split_once('=') {
                    Some((k, v)) if !k.is_empty() && !v.is_empty() => {
                        options.push((k.to_string(), v.to_string()))
                    }
                    _ => {
                        return Err(Error::Resolution(format!(
                            "invalid FQBN '{s}': malformed option '{pair}'"
                        )));
                    }
                }
            }
        }

        Ok(Self {
            package: parts[0].to_string(),
            arch: parts[1].to_string(),
            board_id: parts[2].to_string(),
            options,
        })
    }
}

impl fmt::Display for Fqbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package, self.arch, self.board_id)?;
        if !self.options.is_empty() {
            let opts: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, ":{}", opts.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Programmer {
    pub id: String,
    pub name: String,
    pub properties: PropertyStore,
}

/// One installed release of a hardware platform (`package:arch@version`).
#[derive(Debug, Clone)]
pub struct PlatformRelease {
    pub package: String,
    pub arch: String,
    pub version: String,
    pub install_dir: PathBuf,
    pub properties: PropertyStore,
    pub programmers: BTreeMap<String, Programmer>,
}

impl PlatformRelease {
    /// Load `platform.txt` and `programmers.txt` from `install_dir`.
    pub fn load(
        package: &str,
        arch: &str,
        version: &str,
        install_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let install_dir = install_dir.into();
        let properties = load_if_exists(&install_dir.join("platform.txt"))?;
        let programmers_txt = load_if_exists(&install_dir.join("programmers.txt"))?;

        let programmers = programmers_txt
            .first_level_keys()
            .into_iter()
            .map(|id| {
                let props = programmers_txt.sub_tree(&id);
                let programmer = Programmer {
                    name: props.get_opt("name").unwrap_or(&id).to_string(),
                    id: id.clone(),
                    properties: props,
                };
                (id, programmer)
            })
            .collect();

        Ok(Self {
            package: package.to_string(),
            arch: arch.to_string(),
            version: version.to_string(),
            install_dir,
            properties,
            programmers,
        })
    }

    /// `package:arch@version`
    pub fn id(&self) -> String {
        format!("{}:{}@{}", self.package, self.arch, self.version)
    }

    /// Properties describing where this release is installed.
    pub fn runtime_properties(&self) -> PropertyStore {
        let mut props = PropertyStore::new();
        props.set_path("runtime.platform.path", &self.install_dir);
        if let Some(hardware) = self.install_dir.parent() {
            props.set_path("runtime.hardware.path", hardware);
        }
        props
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRelease {
    pub package: String,
    pub name: String,
    pub version: String,
    pub install_dir: PathBuf,
}

impl ToolRelease {
    /// `package:name@version`
    pub fn id(&self) -> String {
        format!("{}:{}@{}", self.package, self.name, self.version)
    }

    pub fn runtime_properties(&self) -> PropertyStore {
        let mut props = PropertyStore::new();
        props.set_path(format!("runtime.tools.{}.path", self.name), &self.install_dir);
        props.set_path(
            format!("runtime.tools.{}-{}.path", self.name, self.version),
            &self.install_dir,
        );
        props
    }
}

/// A board resolved from an FQBN together with the platforms it depends on.
#[derive(Debug, Clone)]
pub struct ResolvedBoard {
    pub fqbn: Fqbn,
    pub name: String,
    /// `boards.txt` subtree for the board, with selected menu options applied.
    pub properties: PropertyStore,
    pub platform: PlatformRelease,
    /// Platform providing the core when `build.core` is `vendor:core`.
    pub referenced_platform: Option<PlatformRelease>,
}

impl ResolvedBoard {
    /// Platform hosting the board's core sources.
    pub fn core_platform(&self) -> &PlatformRelease {
        self.referenced_platform.as_ref().unwrap_or(&self.platform)
    }
}

/// Source of installed boards, tools and programmers.
pub trait BoardResolver {
    fn resolve(&self, fqbn: &Fqbn) -> Result<ResolvedBoard>;

    /// Every installed tool release.
    fn installed_tools(&self) -> Result<Vec<ToolRelease>>;

    /// Tools the board needs, in the order they must be applied.
    fn required_tools(&self, board: &ResolvedBoard) -> Result<Vec<ToolRelease>>;

    /// Ids of all programmers declared by installed platforms, sorted.
    fn installed_programmers(&self) -> Result<Vec<String>>;
}

/// Filesystem-backed [`BoardResolver`] over one or more hardware roots.
#[derive(Debug, Clone)]
pub struct HardwareIndex {
    roots: Vec<PathBuf>,
}

impl HardwareIndex {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// `~/.inox/packages`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".inox")
            .join("packages")
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Newest installed release of `package:arch`.
    pub fn find_platform(&self, package: &str, arch: &str) -> Result<Option<PlatformRelease>> {
        let mut candidates = Vec::new();
        for root in &self.roots {
            let arch_dir = root.join(package).join("hardware").join(arch);
            for (version, dir) in version_dirs(&arch_dir)? {
                if dir.join("platform.txt").is_file() {
                    candidates.push((version, dir));
                }
            }
        }
        match newest(candidates) {
            Some((version, dir)) => {
                debug!("using platform {package}:{arch}@{version} from {}", dir.display());
                PlatformRelease::load(package, arch, &version, dir).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Every installed platform release (newest version per `package:arch`).
    pub fn platforms(&self) -> Result<Vec<PlatformRelease>> {
        let mut pairs = Vec::new();
        for root in &self.roots {
            for package in sub_dirs(root)? {
                for arch in sub_dirs(&root.join(&package).join("hardware"))? {
                    if !pairs.contains(&(package.clone(), arch.clone())) {
                        pairs.push((package.clone(), arch));
                    }
                }
            }
        }
        pairs.sort();

        let mut out = Vec::new();
        for (package, arch) in pairs {
            if let Some(platform) = self.find_platform(&package, &arch)? {
                out.push(platform);
            }
        }
        Ok(out)
    }

    fn tools_of_package(&self, package: &str) -> Result<Vec<ToolRelease>> {
        let mut tools = Vec::new();
        for root in &self.roots {
            let tools_dir = root.join(package).join("tools");
            for name in sub_dirs(&tools_dir)? {
                for (version, dir) in version_dirs(&tools_dir.join(&name))? {
                    tools.push(ToolRelease {
                        package: package.to_string(),
                        name: name.clone(),
                        version,
                        install_dir: dir,
                    });
                }
            }
        }
        Ok(tools)
    }
}

impl BoardResolver for HardwareIndex {
    fn resolve(&self, fqbn: &Fqbn) -> Result<ResolvedBoard> {
        let platform = self
            .find_platform(&fqbn.package, &fqbn.arch)?
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "platform {}:{} is not installed",
                    fqbn.package, fqbn.arch
                ))
            })?;

        let boards = load_if_exists(&platform.install_dir.join("boards.txt"))?;
        let mut properties = boards.sub_tree(&fqbn.board_id);
        if properties.is_empty() {
            return Err(Error::Resolution(format!(
                "board {} not found in platform {}",
                fqbn,
                platform.id()
            )));
        }

        for (option, value) in &fqbn.options {
            let menu = properties.sub_tree(&format!("menu.{option}.{value}"));
            if menu.is_empty() {
                return Err(Error::Resolution(format!(
                    "invalid option '{option}={value}' for board {fqbn}"
                )));
            }
            properties.merge(&menu);
        }

        let mut referenced_platform = None;
        if let Some((vendor, core)) = properties
            .get("build.core")
            .split_once(':')
            .map(|(v, c)| (v.to_string(), c.to_string()))
        {
            let referenced = self.find_platform(&vendor, &fqbn.arch)?.ok_or_else(|| {
                Error::Resolution(format!(
                    "missing platform {vendor}:{} referenced by board {fqbn}",
                    fqbn.arch
                ))
            })?;
            properties.set("build.core", core);
            referenced_platform = Some(referenced);
        }

        Ok(ResolvedBoard {
            name: properties.get_opt("name").unwrap_or(&fqbn.board_id).to_string(),
            fqbn: fqbn.clone(),
            properties,
            platform,
            referenced_platform,
        })
    }

    fn installed_tools(&self) -> Result<Vec<ToolRelease>> {
        let mut packages = Vec::new();
        for root in &self.roots {
            for package in sub_dirs(root)? {
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
        }
        let mut tools = Vec::new();
        for package in packages {
            tools.extend(self.tools_of_package(&package)?);
        }
        tools.sort_by(|a, b| {
            (&a.package, &a.name)
                .cmp(&(&b.package, &b.name))
                .then_with(|| compare_versions(&a.version, &b.version))
        });
        Ok(tools)
    }

    fn required_tools(&self, board: &ResolvedBoard) -> Result<Vec<ToolRelease>> {
        let mut newest_by_name: BTreeMap<String, ToolRelease> = BTreeMap::new();
        for tool in self.tools_of_package(&board.platform.package)? {
            match newest_by_name.get(&tool.name) {
                Some(current)
                    if compare_versions(&current.version, &tool.version) != Ordering::Less => {}
                _ => {
                    newest_by_name.insert(tool.name.clone(), tool);
                }
            }
        }
        Ok(newest_by_name.into_values().collect())
    }

    fn installed_programmers(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .platforms()?
            .into_iter()
            .flat_map(|p| p.programmers.into_keys())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

fn load_if_exists(path: &Path) -> Result<PropertyStore> {
    if path.is_file() {
        PropertyStore::load(path)
    } else {
        Ok(PropertyStore::new())
    }
}

fn sub_dirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io("listing", dir, e))? {
        let entry = entry.map_err(|e| Error::io("listing", dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn version_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    Ok(sub_dirs(dir)?
        .into_iter()
        .map(|v| {
            let path = dir.join(&v);
            (v, path)
        })
        .collect())
}

fn newest(candidates: Vec<(String, PathBuf)>) -> Option<(String, PathBuf)> {
    candidates
        .into_iter()
        .max_by(|(a, _), (b, _)| compare_versions(a, b))
}

/// Semver ordering when both sides parse, string ordering otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}
