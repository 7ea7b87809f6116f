use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 乐谱编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Abc,
    Humdrum,
    Mei,
    Musicxml,
}

impl Datatype {
    pub const ALL: [Datatype; 4] = [
        Datatype::Abc,
        Datatype::Humdrum,
        Datatype::Mei,
        Datatype::Musicxml,
    ];

    /// 目录名 / 参数名
    pub fn name(self) -> &'static str {
        match self {
            Datatype::Abc => "abc",
            Datatype::Humdrum => "humdrum",
            Datatype::Mei => "mei",
            Datatype::Musicxml => "musicxml",
        }
    }

    /// 文件扩展名（带点）
    pub fn extension(self) -> &'static str {
        match self {
            Datatype::Abc => ".abc",
            Datatype::Humdrum => ".krn",
            Datatype::Mei => ".mei",
            Datatype::Musicxml => ".musicxml",
        }
    }

    /// 从目录名解析，未知目录返回 None
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl FromStr for Datatype {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::from_dir_name(&key).ok_or_else(|| ValidationError::UnknownDatatype(s.to_string()))
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
