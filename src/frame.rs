// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧缓冲与区域 (Frame buffer and region)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 像素通道数: 固定 RGBA8
pub const CHANNELS: u32 = 4;

/// 整数像素矩形 (捕获源 / 呈现目标)
///
/// 宽高恒为正, 通过 `Region::new` 或反序列化时校验.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRegion", into = "RawRegion")]
pub struct Region {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Serialize, Deserialize)]
struct RawRegion {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl TryFrom<RawRegion> for Region {
    type Error = ConfigError;

    fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
        Region::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl From<Region> for RawRegion {
    fn from(r: Region) -> Self {
        RawRegion {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyRegion { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// 常量区域, 宽高为零时编译期报错
    pub const fn fixed(x: i32, y: i32, width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 原点在 (0,0) 的区域
    pub fn sized(width: u32, height: u32) -> Result<Self, ConfigError> {
        Self::new(0, 0, width, height)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 右边界 (不含)
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// 下边界 (不含)
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// `other` 是否完全落在本区域内
    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@({},{})",
            self.width, self.height, self.x, self.y
        )
    }
}

/// 命令行格式: `x,y,width,height`
impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height but got `{}`", s));
        }
        let x = parts[0].parse::<i32>().map_err(|e| e.to_string())?;
        let y = parts[1].parse::<i32>().map_err(|e| e.to_string())?;
        let w = parts[2].parse::<u32>().map_err(|e| e.to_string())?;
        let h = parts[3].parse::<u32>().map_err(|e| e.to_string())?;
        Region::new(x, y, w, h).map_err(|e| e.to_string())
    }
}

/// 一帧捕获的图像 + 捕获元数据
///
/// 只属于创建它的那一轮 cycle, 不跨线程, cycle 结束即丢弃.
/// 因此这里没有 `Clone`: 需要副本时显式调用 `duplicate`.
#[derive(Debug)]
pub struct FrameBuffer {
    image: RgbaImage,
    origin: Region,
    captured_at: DateTime<Local>,
}

impl FrameBuffer {
    pub fn new(image: RgbaImage, origin: Region) -> Self {
        Self {
            image,
            origin,
            captured_at: Local::now(),
        }
    }

    /// 从原始 RGBA 字节构造, 长度不符时返回 None
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>, origin: Region) -> Option<Self> {
        RgbaImage::from_raw(width, height, pixels).map(|image| Self::new(image, origin))
    }

    /// 用新的像素替换, 保留来源区域与捕获时间
    pub fn with_image(&self, image: RgbaImage) -> Self {
        Self {
            image,
            origin: self.origin,
            captured_at: self.captured_at,
        }
    }

    pub fn duplicate(&self) -> Self {
        self.with_image(self.image.clone())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn channels(&self) -> u32 {
        CHANNELS
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn origin(&self) -> Region {
        self.origin
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }
}
