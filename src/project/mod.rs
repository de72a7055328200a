//! Game manifests (`zapgen.toml`) and the build that turns one into ZAP
//! source.

use crate::config::{BuildConfig, DEFAULT_ZVERSION};
use crate::emit::{
    EmitError, FileStreamFactory, FlagId, ModuleBuilder, NullaryOp, ObjectId, Operand, PropertyId,
    Segment, SourceSpan, ZapStreamFactory, sanitize_symbol,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "zapgen.toml";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to encode symbol table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// A literal number or the name of another definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestValue {
    Number(i32),
    Symbol(String),
}

/// Game manifest (zapgen.toml)
#[derive(Debug, Serialize, Deserialize)]
pub struct GameManifest {
    pub game: GameInfo,
    #[serde(default)]
    pub constants: BTreeMap<String, ManifestValue>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub globals: Vec<GlobalDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameInfo {
    pub name: String,
    #[serde(default = "default_zversion")]
    pub zversion: i32,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_zversion() -> i32 {
    DEFAULT_ZVERSION
}

fn default_greeting() -> String {
    "Hello, sailor!".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ManifestValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ManifestValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    /// Word-sized property values by property name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ManifestValue>,
}

impl GameManifest {
    /// Create a new manifest with a one-room sample world
    pub fn new(name: &str) -> Self {
        Self {
            game: GameInfo {
                name: name.to_string(),
                zversion: DEFAULT_ZVERSION,
                debug: false,
                greeting: format!("Welcome to {}!", name),
            },
            constants: BTreeMap::new(),
            flags: vec!["LIGHTBIT".to_string()],
            properties: Vec::new(),
            globals: vec![GlobalDef {
                name: "HERE".to_string(),
                default: Some(ManifestValue::Symbol("START-ROOM".to_string())),
            }],
            objects: vec![
                ObjectDef {
                    name: "ROOMS".to_string(),
                    desc: None,
                    parent: None,
                    flags: Vec::new(),
                    properties: BTreeMap::new(),
                },
                ObjectDef {
                    name: "START-ROOM".to_string(),
                    desc: Some("Starting Room".to_string()),
                    parent: Some("ROOMS".to_string()),
                    flags: vec!["LIGHTBIT".to_string()],
                    properties: BTreeMap::new(),
                },
            ],
            vocabulary: Vec::new(),
        }
    }

    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ProjectError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save the manifest as `zapgen.toml` in `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ProjectError> {
        let path = dir.join(MANIFEST_FILE);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ProjectError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Apply the manifest's settings on top of `base`.
    pub fn build_config(&self, base: &BuildConfig) -> BuildConfig {
        BuildConfig {
            zversion: self.game.zversion,
            debug_info: base.debug_info || self.game.debug,
            output_name: sanitize_file_name(&self.game.name),
            ..base.clone()
        }
    }
}

/// Lower-case file name made of the name's alphanumerics and dashes.
fn sanitize_file_name(name: &str) -> String {
    let file: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if file.is_empty() { "story".to_string() } else { file }
}

/// Write a sample `zapgen.toml` into `dir`.
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<PathBuf, ProjectError> {
    let project_name = name
        .map(|s| s.to_string())
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "mygame".to_string());

    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(ProjectError::AlreadyExists(manifest_path));
    }
    fs::create_dir_all(dir).map_err(|source| ProjectError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = GameManifest::new(&project_name).save(dir)?;
    log::info!("created manifest for '{}' at {}", project_name, path.display());
    Ok(path)
}

/// Files written by [`build_project`] plus the symbol table as JSON.
#[derive(Debug)]
pub struct BuildOutput {
    pub files: Vec<PathBuf>,
    pub symbols_json: String,
}

/// Build the story described by `manifest` into `config.output_dir`.
///
/// `source` names the manifest file in debug records.
pub fn build_project(
    manifest: &GameManifest,
    config: &BuildConfig,
    source: &str,
) -> Result<BuildOutput, ProjectError> {
    let factory = FileStreamFactory::new(&config.output_dir, &config.output_name)
        .force_frequent_words(config.force_frequent_words);
    let mut files = vec![
        factory.path(Segment::Main),
        factory.path(Segment::Data),
        factory.path(Segment::Strings),
    ];
    if !factory.frequent_words_file_exists() {
        files.push(factory.path(Segment::FrequentWords));
    }

    let module = build_module(manifest, config, Box::new(factory), source)?;
    let symbols_json = serde_json::to_string_pretty(module.symbols())?;
    module.finish()?;
    Ok(BuildOutput { files, symbols_json })
}

/// Define everything in `manifest` on a new module. The module is returned
/// unfinished.
pub fn build_module(
    manifest: &GameManifest,
    config: &BuildConfig,
    factory: Box<dyn ZapStreamFactory>,
    source: &str,
) -> Result<ModuleBuilder, ProjectError> {
    let mut module = ModuleBuilder::new(config.zversion, factory, config.debug_info)?;
    log::debug!("building '{}' for version {}", manifest.game.name, module.version());

    let mut flags: HashMap<String, FlagId> = HashMap::new();
    for name in &manifest.flags {
        flags.insert(sanitize_symbol(name), module.define_flag(name)?);
    }

    let mut properties: HashMap<String, PropertyId> = HashMap::new();
    let mut property_ids = Vec::with_capacity(manifest.properties.len());
    for prop in &manifest.properties {
        let id = module.define_property(&prop.name)?;
        properties.insert(sanitize_symbol(&prop.name), id);
        property_ids.push(id);
    }

    let mut objects: HashMap<String, ObjectId> = HashMap::new();
    let mut object_ids = Vec::with_capacity(manifest.objects.len());
    for object in &manifest.objects {
        let id = module.define_object(&object.name)?;
        objects.insert(sanitize_symbol(&object.name), id);
        object_ids.push(id);
    }

    let mut globals = Vec::with_capacity(manifest.globals.len());
    for global in &manifest.globals {
        globals.push(module.define_global(&global.name)?);
    }

    for word in &manifest.vocabulary {
        module.define_vocabulary_word(word)?;
    }

    for (name, value) in &manifest.constants {
        let value = resolve(&mut module, value)?;
        module.define_constant(name, value)?;
    }

    // Values may name anything defined above.
    for (&prop, def) in property_ids.iter().zip(&manifest.properties) {
        if let Some(value) = &def.default {
            let value = resolve(&mut module, value)?;
            module.property_mut(prop).default_value = Some(value);
        }
    }

    for (&id, def) in globals.iter().zip(&manifest.globals) {
        if let Some(value) = &def.default {
            let value = resolve(&mut module, value)?;
            module.global_mut(id).default_value = Some(value);
        }
    }

    for (&id, def) in object_ids.iter().zip(&manifest.objects) {
        module.object_mut(id).descriptive_name = def.desc.clone();

        for flag in &def.flags {
            let flag = lookup(&flags, "flag", flag)?;
            module.object_mut(id).set_flag(flag);
        }
        for (prop, value) in &def.properties {
            let prop = lookup(&properties, "property", prop)?;
            let value = resolve(&mut module, value)?;
            module.object_mut(id).add_word_property(prop, value)?;
        }
        if let Some(parent) = &def.parent {
            let parent = lookup(&objects, "object", parent)?;
            insert_into(&mut module, id, parent);
        }
    }

    let go = module.define_routine("GO", true, false)?;
    if config.debug_info {
        let span = SourceSpan::point(source, 1, 1);
        module.routine_mut(go).set_source_span(span.clone());
        module.mark_sequence_point(go, &span)?;
        if let Some(debug) = module.debug_file() {
            debug.map("zapgen", env!("CARGO_PKG_VERSION"));
        }
    }
    let routine = module.routine_mut(go);
    routine.print_string(&manifest.game.greeting)?;
    routine.print_new_line()?;
    routine.nullary(NullaryOp::Quit, None)?;
    module.finish_routine(go)?;

    Ok(module)
}

fn lookup<T: Copy>(
    defs: &HashMap<String, T>,
    kind: &'static str,
    name: &str,
) -> Result<T, ProjectError> {
    defs.get(&sanitize_symbol(name))
        .copied()
        .ok_or_else(|| ProjectError::Unknown {
            kind,
            name: name.to_string(),
        })
}

fn resolve(module: &mut ModuleBuilder, value: &ManifestValue) -> Result<Operand, ProjectError> {
    match value {
        ManifestValue::Number(n) => Ok(module.make_number(*n)),
        ManifestValue::Symbol(name) => {
            let symbol = sanitize_symbol(name);
            if module.symbols().contains(&symbol) {
                Ok(Operand::symbol(symbol))
            } else {
                Err(ProjectError::Unknown {
                    kind: "symbol",
                    name: name.clone(),
                })
            }
        }
    }
}

/// Make `child` the first child of `parent`.
fn insert_into(module: &mut ModuleBuilder, child: ObjectId, parent: ObjectId) {
    let first = module.object(parent).child;
    let node = module.object_mut(child);
    node.parent = Some(parent);
    node.sibling = first;
    module.object_mut(parent).child = Some(child);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::MemoryStreamFactory;

    const MANIFEST: &str = r#"
[game]
name = "Cloak"
greeting = "Hurrying through the rainswept November night..."

[constants]
MAX-SCORE = 2

[[properties]]
name = "SIZE"
default = 5

[[globals]]
name = "SCORE"

[[globals]]
name = "HERE"
default = "FOYER"

[[objects]]
name = "ROOMS"

[[objects]]
name = "FOYER"
desc = "Foyer of the Opera House"
parent = "ROOMS"
properties = { SIZE = 10 }

[[objects]]
name = "BAR"
desc = "Foyer Bar"
parent = "ROOMS"
"#;

    fn sample() -> GameManifest {
        toml::from_str(MANIFEST).unwrap()
    }

    #[test]
    fn test_new_manifest() {
        let manifest = GameManifest::new("testgame");
        assert_eq!(manifest.game.name, "testgame");
        assert_eq!(manifest.game.zversion, 3);
        assert_eq!(manifest.objects.len(), 2);
    }

    #[test]
    fn test_manifest_serialization() {
        let manifest = GameManifest::new("testgame");
        let toml_str = toml::to_string_pretty(&manifest).unwrap();
        assert!(toml_str.contains("name = \"testgame\""));
        assert!(toml_str.contains("zversion = 3"));
        let back: GameManifest = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.globals[0].default, Some(ManifestValue::Symbol("START-ROOM".into())));
    }

    #[test]
    fn test_defaults_applied() {
        let manifest = sample();
        assert_eq!(manifest.game.zversion, 3);
        assert!(!manifest.game.debug);
        assert_eq!(manifest.constants["MAX-SCORE"], ManifestValue::Number(2));
    }

    #[test]
    fn test_object_tree_insertion() {
        let factory = MemoryStreamFactory::new("cloak");
        let module = build_module(
            &sample(),
            &BuildConfig::default(),
            Box::new(factory),
            "zapgen.toml",
        )
        .unwrap();
        let rooms = module.object(ObjectId(0));
        let foyer = module.object(ObjectId(1));
        let bar = module.object(ObjectId(2));
        // Later insertions become the first child.
        assert_eq!(rooms.child, Some(bar.id()));
        assert_eq!(bar.sibling, Some(foyer.id()));
        assert_eq!(foyer.sibling, None);
        assert_eq!(foyer.parent, Some(rooms.id()));
    }

    #[test]
    fn test_build_module_output() {
        let factory = MemoryStreamFactory::new("cloak");
        let reader = factory.clone();
        let module = build_module(
            &sample(),
            &BuildConfig::default(),
            Box::new(factory),
            "zapgen.toml",
        )
        .unwrap();
        module.finish().unwrap();

        let main = reader.contents(Segment::Main).unwrap();
        assert!(main.contains(concat!(
            "\t.FUNCT GO\nSTART::\n",
            "\tPRINTI \"Hurrying through the rainswept November night...\"\n",
            "\tCRLF\n\tQUIT\n",
        )));

        let data = reader.contents(Segment::Data).unwrap();
        assert!(data.contains("\tP?SIZE=31\n"));
        assert!(data.contains("\tMAX-SCORE=2\n"));
        assert!(data.contains("GLOBAL::\n\t.GVAR HERE=FOYER\n\t.GVAR SCORE\n"));
        assert!(data.contains("\t.OBJECT ROOMS,0,0,0,0,BAR,?PTBL?ROOMS\n"));
        assert!(data.contains(concat!(
            "?PTBL?FOYER::\n\t.STRL \"Foyer of the Opera House\"\n",
            "\t.PROP 2,31\n\t.WORD 10\n\t.BYTE 0\n",
        )));
    }

    #[test]
    fn test_unknown_references() {
        let mut manifest = sample();
        manifest.objects[1].flags.push("NOSUCHBIT".into());
        let factory = MemoryStreamFactory::new("cloak");
        let err = build_module(
            &manifest,
            &BuildConfig::default(),
            Box::new(factory),
            "zapgen.toml",
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::Unknown { kind: "flag", .. }));

        let mut manifest = sample();
        manifest.globals[0].default = Some(ManifestValue::Symbol("NOWHERE".into()));
        let factory = MemoryStreamFactory::new("cloak");
        let err = build_module(
            &manifest,
            &BuildConfig::default(),
            Box::new(factory),
            "zapgen.toml",
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::Unknown { kind: "symbol", .. }));
    }

    #[test]
    fn test_init_project() {
        let temp = tempfile::tempdir().unwrap();
        let path = init_project(temp.path(), Some("mytest")).unwrap();
        assert_eq!(path, temp.path().join(MANIFEST_FILE));

        let manifest = GameManifest::load(&path).unwrap();
        assert_eq!(manifest.game.name, "mytest");

        assert!(matches!(
            init_project(temp.path(), Some("mytest")),
            Err(ProjectError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_build_config_from_manifest() {
        let mut manifest = sample();
        manifest.game.zversion = 5;
        let config = manifest.build_config(&BuildConfig::default());
        assert_eq!(config.zversion, 5);
        assert_eq!(config.output_name, "cloak");
        assert!(!config.debug_info);
    }
}
