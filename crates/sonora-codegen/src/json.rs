//! JSON description and UI path table
//!
//! Builds the serialized unit description embedded in the WAST data segment
//! and the path table mapping UI-control paths to zone indexes. Paths are
//! `/group/.../label` with spaces replaced by underscores; colliding paths
//! get a numeric suffix so every control stays addressable.

use rustc_hash::FxHashMap;
use serde_json::{json, Map, Value};
use sonora_bytecode::{Factory, UiInstruction};

/// Serialized unit description plus the control path table
#[derive(Debug)]
pub struct UiDescription {
    /// Compact JSON text
    pub json: String,
    /// Control path to zone index, in declaration order
    pub path_table: Vec<(String, i32)>,
}

struct PathBuilder {
    groups: Vec<String>,
    seen: FxHashMap<String, u32>,
    table: Vec<(String, i32)>,
}

impl PathBuilder {
    fn new() -> Self {
        Self {
            groups: Vec::new(),
            seen: FxHashMap::default(),
            table: Vec::new(),
        }
    }

    fn open(&mut self, label: &str) {
        self.groups.push(normalize(label));
    }

    fn close(&mut self) {
        self.groups.pop();
    }

    /// Build the unique full path for a control and record its zone index
    fn bind(&mut self, label: &str, index: i32) -> String {
        let mut path = String::new();
        for group in &self.groups {
            path.push('/');
            path.push_str(group);
        }
        path.push('/');
        path.push_str(&normalize(label));

        let count = self.seen.entry(path.clone()).or_insert(0);
        if *count > 0 {
            path = format!("{}{}", path, count);
        }
        *count += 1;

        self.table.push((path.clone(), index));
        path
    }
}

fn normalize(label: &str) -> String {
    label.replace(' ', "_")
}

fn group_value(kind: &str, label: &str, items: Vec<Value>) -> Value {
    json!({ "type": kind, "label": label, "items": items })
}

/// Single-entry `{key: value}` object with a run-time key
fn pair(key: &str, value: &str) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), Value::String(value.to_string()));
    Value::Object(map)
}

/// Describe a factory's UI and metadata as JSON plus a path table
///
/// `zone_index` maps a real-heap cell offset to the index published in the
/// description and the path table (the WAST backend passes the byte offset
/// of the cell inside the module's memory layout).
pub fn describe<F: Fn(i32) -> i32>(factory: &Factory, zone_index: F) -> UiDescription {
    let mut paths = PathBuilder::new();

    // One item list per open group; index 0 is the root
    let mut stack: Vec<Vec<Value>> = vec![Vec::new()];
    let mut group_heads: Vec<(String, String)> = Vec::new();
    let mut pending_meta: Vec<Value> = Vec::new();

    fn open(
        kind: &str,
        label: &str,
        stack: &mut Vec<Vec<Value>>,
        heads: &mut Vec<(String, String)>,
        paths: &mut PathBuilder,
    ) {
        paths.open(label);
        heads.push((kind.to_string(), label.to_string()));
        stack.push(Vec::new());
    }

    for instruction in &factory.user_interface_block {
        match instruction {
            UiInstruction::OpenVerticalBox { label } => {
                open("vgroup", label, &mut stack, &mut group_heads, &mut paths);
            }
            UiInstruction::OpenHorizontalBox { label } => {
                open("hgroup", label, &mut stack, &mut group_heads, &mut paths);
            }
            UiInstruction::OpenTabBox { label } => {
                open("tgroup", label, &mut stack, &mut group_heads, &mut paths);
            }
            UiInstruction::CloseBox => {
                if stack.len() > 1 {
                    if let (Some(items), Some((kind, label))) = (stack.pop(), group_heads.pop()) {
                        let group = group_value(&kind, &label, items);
                        if let Some(parent) = stack.last_mut() {
                            parent.push(group);
                        }
                    }
                }
                paths.close();
            }
            UiInstruction::AddButton { label, offset }
            | UiInstruction::AddCheckButton { label, offset } => {
                let kind = if matches!(instruction, UiInstruction::AddButton { .. }) {
                    "button"
                } else {
                    "checkbox"
                };
                let item = widget(kind, label, *offset, &zone_index, &mut paths, &mut pending_meta);
                push_item(&mut stack, item);
            }
            UiInstruction::AddHorizontalSlider {
                label,
                offset,
                init,
                min,
                max,
                step,
            }
            | UiInstruction::AddVerticalSlider {
                label,
                offset,
                init,
                min,
                max,
                step,
            }
            | UiInstruction::AddNumEntry {
                label,
                offset,
                init,
                min,
                max,
                step,
            } => {
                let kind = match instruction {
                    UiInstruction::AddHorizontalSlider { .. } => "hslider",
                    UiInstruction::AddVerticalSlider { .. } => "vslider",
                    _ => "nentry",
                };
                let mut item =
                    widget(kind, label, *offset, &zone_index, &mut paths, &mut pending_meta);
                extend(&mut item, "init", json!(init));
                extend(&mut item, "min", json!(min));
                extend(&mut item, "max", json!(max));
                extend(&mut item, "step", json!(step));
                push_item(&mut stack, item);
            }
            UiInstruction::AddHorizontalBargraph {
                label,
                offset,
                min,
                max,
            }
            | UiInstruction::AddVerticalBargraph {
                label,
                offset,
                min,
                max,
            } => {
                let kind = if matches!(instruction, UiInstruction::AddHorizontalBargraph { .. }) {
                    "hbargraph"
                } else {
                    "vbargraph"
                };
                let mut item =
                    widget(kind, label, *offset, &zone_index, &mut paths, &mut pending_meta);
                extend(&mut item, "min", json!(min));
                extend(&mut item, "max", json!(max));
                push_item(&mut stack, item);
            }
            UiInstruction::AddSoundFile { label } => {
                let item = json!({
                    "type": "soundfile",
                    "label": label,
                });
                push_item(&mut stack, item);
            }
            UiInstruction::Declare { key, value, .. } => {
                // Declarations attach to the next declared widget
                pending_meta.push(pair(key, value));
            }
        }
    }

    // Unclosed groups are folded into the root in order
    while stack.len() > 1 {
        if let (Some(items), Some((kind, label))) = (stack.pop(), group_heads.pop()) {
            let group = group_value(&kind, &label, items);
            if let Some(parent) = stack.last_mut() {
                parent.push(group);
            }
        }
    }
    let ui_items = stack.pop().unwrap_or_default();

    let meta: Vec<Value> = factory
        .meta_block
        .iter()
        .map(|declaration| pair(&declaration.key, &declaration.value))
        .collect();

    let description = json!({
        "name": factory.name,
        "inputs": factory.num_inputs,
        "outputs": factory.num_outputs,
        "meta": meta,
        "ui": ui_items,
    });

    UiDescription {
        json: description.to_string(),
        path_table: paths.table,
    }
}

fn widget<F: Fn(i32) -> i32>(
    kind: &str,
    label: &str,
    offset: i32,
    zone_index: &F,
    paths: &mut PathBuilder,
    pending_meta: &mut Vec<Value>,
) -> Value {
    let index = zone_index(offset);
    let address = paths.bind(label, index);
    let mut item = json!({
        "type": kind,
        "label": label,
        "address": address,
        "index": index,
    });
    if !pending_meta.is_empty() {
        extend(&mut item, "meta", Value::Array(std::mem::take(pending_meta)));
    }
    item
}

fn extend(item: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = item {
        map.insert(key.to_string(), value);
    }
}

fn push_item(stack: &mut Vec<Vec<Value>>, item: Value) {
    if let Some(top) = stack.last_mut() {
        top.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slider(label: &str, offset: i32) -> UiInstruction {
        UiInstruction::AddHorizontalSlider {
            label: label.to_string(),
            offset,
            init: 0.5,
            min: 0.0,
            max: 1.0,
            step: 0.01,
        }
    }

    #[test]
    fn test_paths_follow_group_nesting() {
        let mut factory = Factory::new("gain");
        factory.user_interface_block = vec![
            UiInstruction::OpenVerticalBox {
                label: "main out".to_string(),
            },
            slider("level", 4),
            UiInstruction::CloseBox,
        ];

        let description = describe(&factory, |cell| cell);
        assert_eq!(
            description.path_table,
            vec![("/main_out/level".to_string(), 4)]
        );
    }

    #[test]
    fn test_colliding_paths_get_suffixes() {
        let mut factory = Factory::new("dup");
        factory.user_interface_block = vec![slider("gain", 1), slider("gain", 2), slider("gain", 3)];

        let description = describe(&factory, |cell| cell);
        let paths: Vec<&str> = description
            .path_table
            .iter()
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(paths, vec!["/gain", "/gain1", "/gain2"]);
    }

    #[test]
    fn test_zone_index_transform_applies() {
        let mut factory = Factory::new("bytes");
        factory.user_interface_block = vec![slider("level", 3)];

        let description = describe(&factory, |cell| 16 + 4 * cell);
        assert_eq!(description.path_table, vec![("/level".to_string(), 28)]);
        assert!(description.json.contains("\"index\":28"));
    }

    #[test]
    fn test_json_carries_meta_and_channel_counts() {
        let mut factory = Factory::new("osc");
        factory.num_outputs = 2;
        factory
            .meta_block
            .push(sonora_bytecode::MetaDeclaration::new("author", "someone"));

        let description = describe(&factory, |cell| cell);
        let parsed: Value = serde_json::from_str(&description.json).unwrap();
        assert_eq!(parsed["name"], "osc");
        assert_eq!(parsed["inputs"], 0);
        assert_eq!(parsed["outputs"], 2);
        assert_eq!(parsed["meta"][0]["author"], "someone");
    }

    #[test]
    fn test_declare_attaches_to_next_widget() {
        let mut factory = Factory::new("m");
        factory.user_interface_block = vec![
            UiInstruction::Declare {
                offset: Some(4),
                key: "unit".to_string(),
                value: "Hz".to_string(),
            },
            slider("freq", 4),
        ];

        let description = describe(&factory, |cell| cell);
        let parsed: Value = serde_json::from_str(&description.json).unwrap();
        assert_eq!(parsed["ui"][0]["meta"][0]["unit"], "Hz");
    }
}
