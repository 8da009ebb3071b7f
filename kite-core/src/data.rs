//! 编辑器导出的声明式游戏描述。
//!
//! 运行时本身不解析任何文件格式：宿主程序负责把磁盘上的内容（例如 JSON）反序列化成这里的记录，
//! 再交给 [`RuntimeGame`](crate::RuntimeGame) / [`RuntimeScene`](crate::RuntimeScene)。

use std::collections::HashMap;

use serde::Deserialize;

/// 整个游戏的描述。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameData {
    pub name: String,
    /// 最低帧率；缺省时使用 [`GameConfig::min_fps`](crate::config::GameConfig::min_fps)。
    pub min_fps: Option<u32>,
    /// 全局变量。
    pub variables: Vec<VariableData>,
    /// 所有场景共享的对象模板；同名时场景自身的模板优先。
    pub objects: Vec<ObjectData>,
    pub scenes: Vec<SceneData>,
}

/// 单个场景的描述。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SceneData {
    pub name: String,
    pub title: String,
    /// 背景色（RGB）。
    pub background: [u8; 3],
    pub layers: Vec<LayerData>,
    pub variables: Vec<VariableData>,
    pub objects: Vec<ObjectData>,
    pub instances: Vec<InstanceData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayerData {
    pub name: String,
    pub visible: bool,
}

impl Default for LayerData {
    fn default() -> Self {
        Self {
            name: String::new(),
            visible: true,
        }
    }
}

/// 对象模板：同名的所有实例共享它。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectData {
    pub name: String,
    /// 类型标签，例如 `"Sprite"`；空串表示没有外观的基础对象。
    #[serde(rename = "type")]
    pub kind: String,
    pub variables: Vec<VariableData>,
    pub automatisms: Vec<AutomatismData>,
    /// 仅 Sprite 类型使用。
    pub animations: Vec<AnimationData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutomatismData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: HashMap<String, String>,
}

/// 场景初始实例。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InstanceData {
    /// 对应的对象模板名。
    pub object: String,
    pub x: f32,
    pub y: f32,
    pub z_order: i32,
    pub angle: f32,
    pub layer: String,
    pub variables: Vec<VariableData>,
    /// 两者都给出时视为自定义尺寸。
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// 类型相关的附加数值，例如 Sprite 的 `"animation"`。
    pub properties: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VariableData {
    pub name: String,
    #[serde(default)]
    pub value: VariableValue,
}

/// 变量初值。
///
/// 编辑器里的变量没有显式类型：文本若整体可以解析为数字则按数字处理，空文本视为 0。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Number(f64),
    Text(String),
    Structure(Vec<VariableData>),
}

impl Default for VariableValue {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

impl VariableData {
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Number(value),
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Text(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimationData {
    pub use_multiple_directions: bool,
    pub directions: Vec<DirectionData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectionData {
    /// 相邻两帧之间的秒数。
    pub time_between_frames: f32,
    pub looping: bool,
    pub frames: Vec<FrameData>,
}

impl Default for DirectionData {
    fn default() -> Self {
        Self {
            time_between_frames: 1.0,
            looping: false,
            frames: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrameData {
    pub image: String,
    pub origin: [f32; 2],
    /// `None` 表示自动中心：纹理尺寸的一半。
    pub center: Option<[f32; 2]>,
    pub points: HashMap<String, [f32; 2]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_data_deserializes_with_defaults() {
        let json = r#"{
            "name": "Level",
            "layers": [{ "name": "" }, { "name": "HUD", "visible": false }],
            "objects": [{ "name": "Hero", "type": "Sprite" }],
            "instances": [{ "object": "Hero", "x": 5, "y": 7, "properties": { "animation": 1 } }],
            "variables": [
                { "name": "score", "value": 3 },
                { "name": "title", "value": "Go" },
                { "name": "nested", "value": [{ "name": "a", "value": "1" }] }
            ]
        }"#;

        let scene: SceneData = serde_json::from_str(json).expect("场景 JSON 应能解析");
        assert_eq!(scene.name, "Level");
        assert!(scene.layers[0].visible);
        assert!(!scene.layers[1].visible);
        assert_eq!(scene.objects[0].kind, "Sprite");
        assert_eq!(scene.instances[0].x, 5.0);
        assert_eq!(scene.instances[0].properties.get("animation"), Some(&1.0));
        assert_eq!(scene.variables[0].value, VariableValue::Number(3.0));
        assert_eq!(scene.variables[1].value, VariableValue::Text("Go".into()));
        assert!(matches!(
            scene.variables[2].value,
            VariableValue::Structure(ref v) if v.len() == 1
        ));
    }
}
