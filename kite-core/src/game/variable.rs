use indexmap::IndexMap;

use crate::data::{VariableData, VariableValue};

/// 动态类型的变量单元：数字、字符串或结构体。
///
/// 数字与字符串两种表示中总有一个是最新的，另一个在被读取时才按需重新计算：
/// - [`set_number`](Self::set_number) 之后字符串表示过期
/// - [`set_string`](Self::set_string) 之后数字表示过期
///
/// 因此读取接口 [`as_number`](Self::as_number) / [`as_string`](Self::as_string) 需要 `&mut self` 来缓存换算结果。
///
/// 结构体变量忽略标量部分，通过 [`child`](Self::child) 访问子变量。
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    number: f64,
    string: String,
    number_dirty: bool,
    string_dirty: bool,
    is_structure: bool,
    children: IndexMap<String, Variable>,
    undefined_in_container: bool,
}

impl Default for Variable {
    fn default() -> Self {
        Self {
            number: 0.0,
            string: String::new(),
            number_dirty: false,
            string_dirty: true,
            is_structure: false,
            children: IndexMap::new(),
            undefined_in_container: false,
        }
    }
}

impl Variable {
    /// 创建值为数字 0 的变量。
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_number(value: f64) -> Self {
        let mut v = Self::new();
        v.set_number(value);
        v
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        let mut v = Self::new();
        v.set_string(value);
        v
    }

    /// 按声明式初值构造变量。
    ///
    /// 文本初值整体可解析为数字时按数字存储，空文本视为 0。
    pub fn from_value(value: &VariableValue) -> Self {
        let mut v = Self::new();
        v.assign_value(value);
        v
    }

    pub(crate) fn assign_value(&mut self, value: &VariableValue) {
        *self = Self::new();
        match value {
            VariableValue::Number(n) => self.set_number(*n),
            VariableValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    self.set_number(0.0);
                } else if let Ok(n) = trimmed.parse::<f64>() {
                    self.set_number(n);
                } else {
                    self.set_string(text.clone());
                }
            }
            VariableValue::Structure(children) => {
                self.is_structure = true;
                for child in children {
                    self.children
                        .insert(child.name.clone(), Self::from_value(&child.value));
                }
            }
        }
    }

    /// 读取数字表示；字符串无法解析时为 0。
    pub fn as_number(&mut self) -> f64 {
        if self.number_dirty {
            self.number = parse_number_prefix(&self.string);
            self.number_dirty = false;
        }
        self.number
    }

    /// 读取字符串表示。
    pub fn as_string(&mut self) -> &str {
        if self.string_dirty {
            self.string = format_number(self.number);
            self.string_dirty = false;
        }
        &self.string
    }

    pub fn set_number(&mut self, value: f64) {
        self.number = value;
        self.number_dirty = false;
        self.string_dirty = true;
    }

    pub fn set_string(&mut self, value: impl Into<String>) {
        self.string = value.into();
        self.string_dirty = false;
        self.number_dirty = true;
    }

    pub fn add(&mut self, value: f64) {
        let n = self.as_number();
        self.set_number(n + value);
    }

    pub fn sub(&mut self, value: f64) {
        let n = self.as_number();
        self.set_number(n - value);
    }

    pub fn mul(&mut self, value: f64) {
        let n = self.as_number();
        self.set_number(n * value);
    }

    pub fn div(&mut self, value: f64) {
        let n = self.as_number();
        self.set_number(n / value);
    }

    pub fn concatenate(&mut self, suffix: &str) {
        let mut s = self.as_string().to_owned();
        s.push_str(suffix);
        self.set_string(s);
    }

    pub fn is_structure(&self) -> bool {
        self.is_structure
    }

    /// 访问子变量；不存在时创建一个值为 0 的子变量。
    ///
    /// 对标量变量调用会把它提升为结构体（原有标量值不再可见）。
    pub fn child(&mut self, name: &str) -> &mut Variable {
        self.is_structure = true;
        self.children.entry(name.to_owned()).or_default()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.is_structure && self.children.contains_key(name)
    }

    pub fn remove_child(&mut self, name: &str) -> Option<Variable> {
        if !self.is_structure {
            return None;
        }
        self.children.shift_remove(name)
    }

    /// 按插入顺序遍历子变量。
    pub fn children(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn is_undefined_in_container(&self) -> bool {
        self.undefined_in_container
    }

    pub(crate) fn set_undefined_in_container(&mut self, undefined: bool) {
        self.undefined_in_container = undefined;
    }
}

impl From<&VariableData> for Variable {
    fn from(data: &VariableData) -> Self {
        Self::from_value(&data.value)
    }
}

/// 解析字符串开头的数字（可带空白、符号、小数与指数部分），与浏览器里的 `parseFloat` 行为一致。
/// 没有可解析前缀时返回 0。
pub(crate) fn parse_number_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// 数字转字符串：整数不带小数部分，无穷大写作 `Infinity`。
///
/// 绝对值不小于 `1e21` 或小于 `1e-6` 时改用指数形式（`1e+21`、`1.5e-7`），与编辑器的显示一致。
pub(crate) fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }

    let magnitude = n.abs();
    if !(1.0e-6..1.0e21).contains(&magnitude) {
        let text = format!("{:e}", n);
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => text,
        };
    }
    n.to_string()
}
