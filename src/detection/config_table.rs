// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器配置表 (字符串多值映射)
//!
//! 每个检测器变体通过一组 `key → value` 文本参数配置,
//! 同一个 key 可以出现多次 (例如 `white_list`).

use std::collections::BTreeMap;
use std::str::FromStr;

use super::detector::DetectorError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl ConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个键值对 (保留已有同名键)
    pub fn emplace(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// 链式构造
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.emplace(key, value);
        self
    }

    /// 覆盖一个键的全部取值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// 第一个取值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// 全部取值 (按插入顺序)
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 键数量 (不计重复值)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 必填键
    pub fn require(&self, key: &str) -> Result<&str, DetectorError> {
        self.get(key)
            .ok_or_else(|| DetectorError::MissingKey(key.to_string()))
    }

    /// 解析取值, 键缺失时返回 `Ok(None)`
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, DetectorError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| DetectorError::InvalidValue {
                    key: key.to_string(),
                    value: raw.to_string(),
                }),
        }
    }

    /// 解析取值, 键缺失时使用默认值
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, DetectorError> {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    /// 合并另一张表 (other 中的键覆盖当前表)
    pub fn merge(&mut self, other: &ConfigTable) {
        for (key, values) in &other.entries {
            self.entries.insert(key.clone(), values.clone());
        }
    }
}
