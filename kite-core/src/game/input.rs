use std::collections::HashSet;

/// 支持的鼠标按键数量（左、右、中与两个侧键）。
pub const MOUSE_BUTTON_COUNT: usize = 5;

/// 宿主程序喂入的输入快照。
///
/// 运行时不直接读取窗口事件：宿主在收到事件时调用 `on_*` 方法，场景逻辑随后查询当前状态。
/// 鼠标坐标是相对于游戏视口的画布坐标，需要通过 [`Layer::convert_coords`](super::layer::Layer::convert_coords)
/// 转换到世界坐标。
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pressed_keys: HashSet<u32>,
    pressed_mouse_buttons: [bool; MOUSE_BUTTON_COUNT],
    mouse_x: f32,
    mouse_y: f32,
    mouse_wheel_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_pressed(&mut self, key_code: u32) {
        self.pressed_keys.insert(key_code);
    }

    pub fn on_key_released(&mut self, key_code: u32) {
        self.pressed_keys.remove(&key_code);
    }

    pub fn is_key_pressed(&self, key_code: u32) -> bool {
        self.pressed_keys.contains(&key_code)
    }

    pub fn any_key_pressed(&self) -> bool {
        !self.pressed_keys.is_empty()
    }

    pub fn on_mouse_move(&mut self, x: f32, y: f32) {
        self.mouse_x = x;
        self.mouse_y = y;
    }

    pub fn mouse_x(&self) -> f32 {
        self.mouse_x
    }

    pub fn mouse_y(&self) -> f32 {
        self.mouse_y
    }

    /// 超出范围的按键编号被忽略。
    pub fn on_mouse_button_pressed(&mut self, button: usize) {
        if let Some(pressed) = self.pressed_mouse_buttons.get_mut(button) {
            *pressed = true;
        }
    }

    pub fn on_mouse_button_released(&mut self, button: usize) {
        if let Some(pressed) = self.pressed_mouse_buttons.get_mut(button) {
            *pressed = false;
        }
    }

    pub fn is_mouse_button_pressed(&self, button: usize) -> bool {
        self.pressed_mouse_buttons
            .get(button)
            .copied()
            .unwrap_or(false)
    }

    pub fn on_mouse_wheel(&mut self, delta: f32) {
        self.mouse_wheel_delta = delta;
    }

    pub fn mouse_wheel_delta(&self) -> f32 {
        self.mouse_wheel_delta
    }

    /// 每帧结束后清零滚轮增量。
    pub(crate) fn end_frame(&mut self) {
        self.mouse_wheel_delta = 0.0;
    }
}
