//! Kite Engine 的 2D 运行时核心（`kite-core`）。
//!
//! 该 crate 接收外部编辑器导出的声明式游戏/场景描述（[`data`]），实例化运行中的对象，
//! 按帧推进它们（力积分、自动行为、事件回调、动画），解决碰撞，并把每帧的绘制快照交给外部渲染后端（[`render`]）。
//!
//! 大多数宿主程序只需要：
//! - 用 [`game::registry::TypeRegistry`] 注册自定义对象类型、自动行为与场景事件函数
//! - 通过 [`RuntimeGame`] 载入 [`data::GameData`] 并启动首个场景
//! - 以固定节奏调用 [`RuntimeGame::step`]，直到它返回 `false`

pub mod aabb;
pub mod config;
pub mod data;
pub mod game;
pub mod logger;
pub mod render;
pub mod resource;

pub use aabb::Aabb2;
pub use game::{GameError, RuntimeGame};
pub use game::scene::{RuntimeScene, SceneLoadError};
