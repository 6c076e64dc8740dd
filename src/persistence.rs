//! JSON save/load for macro scripts.
//!
//! Scripts are stored as a version number plus a tree of [`NodeDto`]s. Each
//! DTO carries its type tag and an opaque settings payload; loading routes
//! the payload through the registry descriptor for that tag.

use crate::error::LoadError;
use crate::graph::{CURRENT_VERSION, CommandBlock, CommandNode, MacroScript};
use crate::registry::CommandRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use uuid::Uuid;

fn legacy_version() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MacroFile {
    /// Files written before versioning are treated as version 1.
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commands: Vec<NodeDto>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeDto {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, Vec<NodeDto>>,
}

pub fn to_dto(script: &MacroScript) -> MacroFile {
    MacroFile {
        version: CURRENT_VERSION,
        name: script.name.clone(),
        commands: script.commands.iter().map(node_to_dto).collect(),
    }
}

fn node_to_dto(node: &CommandNode) -> NodeDto {
    NodeDto {
        id: Some(node.id),
        command_type: node.command_type().tag().to_string(),
        enabled: node.enabled,
        settings: node.kind.settings_json(),
        blocks: node
            .blocks
            .iter()
            .map(|b| (b.name.clone(), b.nodes.iter().map(node_to_dto).collect()))
            .collect(),
    }
}

/// Builds the live tree. The first bad node aborts the whole load, as does
/// an id used by more than one node.
pub fn from_dto(file: MacroFile, registry: &CommandRegistry) -> Result<MacroScript, LoadError> {
    if file.version > CURRENT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            found: file.version,
            supported: CURRENT_VERSION,
        });
    }

    let mut seen = HashSet::new();
    let commands = file
        .commands
        .into_iter()
        .enumerate()
        .map(|(index, dto)| {
            let path = format!("commands[{}]", index);
            node_from_dto(dto, file.version, registry, &mut seen, path)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MacroScript {
        name: file.name,
        version: CURRENT_VERSION,
        commands,
    })
}

fn node_from_dto(
    dto: NodeDto,
    version: u32,
    registry: &CommandRegistry,
    seen: &mut HashSet<Uuid>,
    path: String,
) -> Result<CommandNode, LoadError> {
    let descriptor = registry
        .get(&dto.command_type)
        .ok_or_else(|| LoadError::UnknownCommand {
            tag: dto.command_type.clone(),
            path: path.clone(),
        })?;

    let settings = match dto.settings {
        serde_json::Value::Null => serde_json::json!({}),
        other => descriptor.migrate(other, version),
    };
    let kind = descriptor
        .build(settings)
        .map_err(|source| LoadError::Settings {
            tag: dto.command_type.clone(),
            path: path.clone(),
            source,
        })?;

    let messages = descriptor.validate(&kind);
    if !messages.is_empty() {
        return Err(LoadError::Validation {
            tag: dto.command_type,
            path,
            messages,
        });
    }

    let id = dto.id.unwrap_or_else(Uuid::new_v4);
    if !seen.insert(id) {
        return Err(LoadError::DuplicateId { id, path });
    }
    let mut node = CommandNode::with_id(id, kind);
    node.enabled = dto.enabled;

    for (block_name, children) in dto.blocks {
        if descriptor.slot(&block_name).is_none() {
            return Err(LoadError::UnknownBlock {
                tag: dto.command_type,
                path,
                block: block_name,
            });
        }
        let nodes = children
            .into_iter()
            .enumerate()
            .map(|(index, child)| {
                let child_path = format!("{}.blocks.{}[{}]", path, block_name, index);
                node_from_dto(child, version, registry, &mut *seen, child_path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        match node.block_mut(&block_name) {
            Some(block) => block.nodes = nodes,
            None => node.blocks.push(CommandBlock {
                name: block_name,
                nodes,
            }),
        }
    }

    Ok(node)
}

pub fn to_json_string(script: &MacroScript) -> Result<String, LoadError> {
    Ok(serde_json::to_string_pretty(&to_dto(script))?)
}

pub fn from_json_str(json: &str, registry: &CommandRegistry) -> Result<MacroScript, LoadError> {
    let file: MacroFile = serde_json::from_str(json)?;
    from_dto(file, registry)
}

pub fn save_to_path(script: &MacroScript, path: &Path) -> Result<(), LoadError> {
    let json = to_json_string(script)?;
    fs::write(path, json)?;
    log::info!("Saved '{}' to {:?}", script.name, path);
    Ok(())
}

pub fn load_from_path(path: &Path, registry: &CommandRegistry) -> Result<MacroScript, LoadError> {
    let json = fs::read_to_string(path)?;
    let script = from_json_str(&json, registry)?;
    log::info!(
        "Loaded '{}' from {:?} ({} commands)",
        script.name,
        path,
        script.node_count()
    );
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CommandKind, Value};
    use crate::node_types::{BLOCK_BODY, BLOCK_ELSE, BLOCK_THEN};
    use crate::settings::*;

    fn load(json: &str) -> Result<MacroScript, LoadError> {
        from_json_str(json, &CommandRegistry::builtin())
    }

    #[test]
    fn dto_keeps_ids_and_tags() {
        let node = CommandNode::new(CommandKind::Loop(LoopSettings { loop_count: 4 })).push_child(
            BLOCK_BODY,
            CommandNode::new(CommandKind::Break),
        );
        let id = node.id;
        let mut script = MacroScript::new("dto");
        script.commands.push(node);

        let file = to_dto(&script);
        assert_eq!(file.version, CURRENT_VERSION);
        assert_eq!(file.commands[0].id, Some(id));
        assert_eq!(file.commands[0].command_type, "Loop");
        assert_eq!(file.commands[0].settings, serde_json::json!({"loopCount": 4}));
        assert_eq!(file.commands[0].blocks[BLOCK_BODY][0].command_type, "Break");

        let back = from_dto(file, &CommandRegistry::builtin()).unwrap();
        assert_eq!(back, script);
    }

    #[test]
    fn loads_nested_blocks_and_fills_defaults() {
        let script = load(
            r#"{
                "version": 2,
                "name": "nested",
                "commands": [
                    {"type": "IfVariable", "settings": {"name": "mode", "value": "fast"},
                     "blocks": {
                        "Then": [{"type": "Click", "settings": {"x": 10, "y": 20}}],
                        "Else": [{"type": "Wait", "enabled": false}]
                     }}
                ]
            }"#,
        )
        .unwrap();

        let node = &script.commands[0];
        assert!(node.enabled);
        match &node.children(BLOCK_THEN)[0].kind {
            CommandKind::Click(s) => {
                assert_eq!((s.x, s.y, s.click_count), (10, 20, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
        let else_node = &node.children(BLOCK_ELSE)[0];
        assert!(!else_node.enabled);
        assert_eq!(else_node.kind, CommandKind::Wait(WaitSettings::default()));
    }

    #[test]
    fn unknown_tag_fails_whole_load() {
        let err = load(
            r#"{"version": 2, "commands": [
                {"type": "Loop", "blocks": {"Body": [{"type": "Teleport"}]}}
            ]}"#,
        )
        .unwrap_err();
        match err {
            LoadError::UnknownCommand { tag, path } => {
                assert_eq!(tag, "Teleport");
                assert_eq!(path, "commands[0].blocks.Body[0]");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validation_failure_fails_load() {
        let err = load(r#"{"version": 2, "commands": [{"type": "Click", "settings": {"clickCount": 7}}]}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref tag, .. } if tag == "Click"));
        assert!(err.to_string().contains("Click count must be between 1 and 3"));
    }

    #[test]
    fn malformed_settings_fail_load() {
        let err = load(r#"{"version": 2, "commands": [{"type": "Wait", "settings": {"durationMs": "soon"}}]}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::Settings { .. }));
    }

    #[test]
    fn unknown_block_fails_load() {
        let err = load(r#"{"version": 2, "commands": [{"type": "Loop", "blocks": {"Then": []}}]}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownBlock { ref block, .. } if block == "Then"));
    }

    #[test]
    fn newer_versions_are_rejected() {
        let err = load(r#"{"version": 99, "commands": []}"#).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedVersion { found: 99, supported: CURRENT_VERSION }
        ));
    }

    #[test]
    fn version_one_files_are_migrated() {
        let script = load(
            r#"{"name": "legacy", "commands": [
                {"type": "Loop", "settings": {"LoopCount": 3}, "blocks": {"Body": [
                    {"type": "SetVariable", "settings": {"Name": "hits", "Value": 10}},
                    {"type": "WaitImageExist", "settings": {"ImagePath": "ok.png", "Timeout": 500, "Interval": 100}}
                ]}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(script.version, CURRENT_VERSION);
        let looped = &script.commands[0];
        assert_eq!(looped.kind, CommandKind::Loop(LoopSettings { loop_count: 3 }));
        let body = looped.children(BLOCK_BODY);
        assert_eq!(
            body[0].kind,
            CommandKind::SetVariable(SetVariableSettings {
                name: "hits".into(),
                value: Value::Number(10.0),
            })
        );
        match &body[1].kind {
            CommandKind::WaitImageExist(s) => {
                assert_eq!(s.image.path, "ok.png");
                assert_eq!(s.timeout_ms, 500);
                assert_eq!(s.poll_interval_ms, 100);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn shared_ids_fail_load() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"version": 2, "commands": [
                {{"id": "{id}", "type": "Loop", "blocks": {{"Body": [{{"id": "{id}", "type": "Break"}}]}}}}
            ]}}"#
        );
        match load(&json).unwrap_err() {
            LoadError::DuplicateId { id: dup, path } => {
                assert_eq!(dup, id);
                assert_eq!(path, "commands[0].blocks.Body[0]");
            }
            other => panic!("unexpected {:?}", other),
        }

        let json = format!(
            r#"{{"version": 2, "commands": [{{"id": "{id}", "type": "Break"}}, {{"id": "{id}", "type": "Continue"}}]}}"#
        );
        assert!(matches!(load(&json), Err(LoadError::DuplicateId { .. })));
    }

    #[test]
    fn legacy_if_variable_accepts_numeric_values() {
        let script = load(
            r#"{"commands": [{"type": "IfVariable", "settings": {"Name": "count", "Operator": "GreaterThan", "Value": 5}}]}"#,
        )
        .unwrap();
        match &script.commands[0].kind {
            CommandKind::IfVariable(s) => {
                assert_eq!(s.name, "count");
                assert_eq!(s.value, "5");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(load("{ not json"), Err(LoadError::Json(_))));
    }
}
