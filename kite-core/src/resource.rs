//! 图像资源接口。
//!
//! 运行时只关心纹理尺寸（用于计算 Sprite 的宽高、中心与碰撞盒）；像素数据的加载与上传由外部后端负责。

use std::collections::HashMap;

use nalgebra::Vector2;

/// 外部图像缓存。
pub trait ImageCache: Send + Sync {
    /// 查询图像的像素尺寸；未知图像返回 `None`。
    fn texture_size(&self, image: &str) -> Option<Vector2<f32>>;

    /// 未知图像使用的占位纹理尺寸。
    fn invalid_texture_size(&self) -> Vector2<f32> {
        Vector2::new(1.0, 1.0)
    }

    /// 查询尺寸，未知图像回退到占位纹理。
    fn texture_size_or_invalid(&self, image: &str) -> Vector2<f32> {
        self.texture_size(image)
            .unwrap_or_else(|| self.invalid_texture_size())
    }
}

/// 基于静态尺寸表的 [`ImageCache`]。
///
/// 适合测试与无窗口运行：宿主程序在启动时把已知图像的尺寸登记进来即可。
#[derive(Debug, Clone, Default)]
pub struct StaticImageCache {
    sizes: HashMap<String, Vector2<f32>>,
}

impl StaticImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, name: impl Into<String>, width: f32, height: f32) -> Self {
        self.insert(name, width, height);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, width: f32, height: f32) {
        self.sizes.insert(name.into(), Vector2::new(width, height));
    }
}

impl ImageCache for StaticImageCache {
    fn texture_size(&self, image: &str) -> Option<Vector2<f32>> {
        self.sizes.get(image).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_image_falls_back_to_invalid_texture() {
        let cache = StaticImageCache::new().with_image("hero.png", 32.0, 48.0);
        assert_eq!(
            cache.texture_size_or_invalid("hero.png"),
            Vector2::new(32.0, 48.0)
        );
        assert_eq!(
            cache.texture_size_or_invalid("missing.png"),
            cache.invalid_texture_size()
        );
    }
}
