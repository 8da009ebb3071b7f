/// 视口配置。
///
/// 图层的摄像机宽高直接取自这里（单摄像机模型）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// 运行时配置。
///
/// - `min_fps`：游戏数据未指定最低帧率时使用的默认值，用于钳制单帧最大流逝时间
/// - `viewport`：视口尺寸
/// - `object_pool_capacity`：每个对象名的回收池上限，超出部分直接丢弃
/// - `spatial_max_items_per_node` / `spatial_max_depth`：碰撞候选四叉树的分裂参数
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub min_fps: u32,
    pub viewport: ViewportConfig,
    pub object_pool_capacity: usize,
    pub spatial_max_items_per_node: usize,
    pub spatial_max_depth: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_fps: 15,
            viewport: ViewportConfig::default(),
            object_pool_capacity: 64,
            spatial_max_items_per_node: 8,
            spatial_max_depth: 8,
        }
    }
}
