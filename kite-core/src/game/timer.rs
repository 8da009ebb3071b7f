/// 场景计时器：按场景的帧流逝时间累加。
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    name: String,
    time_ms: f64,
    paused: bool,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_ms: 0.0,
            paused: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 累计时间（毫秒）。
    pub fn time(&self) -> f64 {
        self.time_ms
    }

    /// 累加 `elapsed` 毫秒；暂停时忽略。
    pub fn update_time(&mut self, elapsed: f64) {
        if !self.paused {
            self.time_ms += elapsed;
        }
    }

    pub fn reset(&mut self) {
        self.time_ms = 0.0;
    }

    pub fn set_time(&mut self, time_ms: f64) {
        self.time_ms = time_ms;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_timer_ignores_elapsed_time() {
        let mut t = Timer::new("spawn");
        t.update_time(16.0);
        t.pause();
        t.update_time(100.0);
        assert_eq!(t.time(), 16.0);
        t.resume();
        t.update_time(4.0);
        assert_eq!(t.time(), 20.0);
        t.reset();
        assert_eq!(t.time(), 0.0);
    }
}
