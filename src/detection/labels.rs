// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 类别标签表 (class id → label)
//!
//! 构造时按模型声明的类别数校验, 推理时越界的 id 交给渲染器按 RenderError 处理.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// DETR 输出的 COCO 类别 (91 个, "N/A" 为空洞), 第 91 类是 "no object"
pub const COCO91: [&str; 91] = [
    "N/A",
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "N/A",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "N/A",
    "backpack",
    "umbrella",
    "N/A",
    "N/A",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "N/A",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "N/A",
    "dining table",
    "N/A",
    "N/A",
    "toilet",
    "N/A",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "N/A",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// COCO91 的 "no object" 类 id
pub const COCO91_NO_OBJECT: u32 = 91;

/// 标签集配置
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "names")]
pub enum LabelSet {
    #[default]
    Coco91,
    Custom(Vec<String>),
}

/// 类别映射
#[derive(Clone, Debug, PartialEq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// 按声明类别数校验后构造
    pub fn new(labels: Vec<String>, declared_classes: usize) -> Result<Self, ConfigError> {
        if labels.len() != declared_classes {
            return Err(ConfigError::LabelCount {
                declared: declared_classes,
                actual: labels.len(),
            });
        }
        Ok(Self { labels })
    }

    pub fn coco91() -> Self {
        Self {
            labels: COCO91.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_set(set: &LabelSet, declared_classes: Option<usize>) -> Result<Self, ConfigError> {
        match set {
            LabelSet::Coco91 => Self::coco91().check(declared_classes),
            LabelSet::Custom(names) => {
                let declared = declared_classes.unwrap_or(names.len());
                Self::new(names.clone(), declared)
            }
        }
    }

    fn check(self, declared_classes: Option<usize>) -> Result<Self, ConfigError> {
        match declared_classes {
            Some(declared) if declared != self.labels.len() => Err(ConfigError::LabelCount {
                declared,
                actual: self.labels.len(),
            }),
            _ => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, class_id: u32) -> Option<&str> {
        self.labels.get(class_id as usize).map(String::as_str)
    }

    /// 反查类别 id (首个匹配)
    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.labels.iter().position(|l| l == label).map(|i| i as u32)
    }
}
