use phf::phf_map;
use std::fmt;

/// 能力等级，按专业程度递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Proficiency {
    /// 入门
    Learner,
    /// 从业者
    Practitioner,
    /// 专家
    Specialist,
}

/// 题目难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Complexity {
    Easy,
    Medium,
    Difficult,
}

static PROFICIENCY_ALIASES: phf::Map<&'static str, Proficiency> = phf_map! {
    "learner" => Proficiency::Learner,
    "beginner" => Proficiency::Learner,
    "l0" => Proficiency::Learner,
    "practitioner" => Proficiency::Practitioner,
    "intermediate" => Proficiency::Practitioner,
    "l1" => Proficiency::Practitioner,
    "specialist" => Proficiency::Specialist,
    "expert" => Proficiency::Specialist,
    "l2" => Proficiency::Specialist,
};

static COMPLEXITY_ALIASES: phf::Map<&'static str, Complexity> = phf_map! {
    "easy" => Complexity::Easy,
    "medium" => Complexity::Medium,
    "moderate" => Complexity::Medium,
    "difficult" => Complexity::Difficult,
    "hard" => Complexity::Difficult,
};

impl Proficiency {
    /// 获取标准名称（也是提示词中使用的名称）
    pub fn name(self) -> &'static str {
        match self {
            Proficiency::Learner => "Learner",
            Proficiency::Practitioner => "Practitioner",
            Proficiency::Specialist => "Specialist",
        }
    }

    /// 全部等级，按递增顺序
    pub fn all() -> Vec<Self> {
        vec![
            Proficiency::Learner,
            Proficiency::Practitioner,
            Proficiency::Specialist,
        ]
    }

    /// 从名称解析（不区分大小写，支持别名）
    pub fn from_str(s: &str) -> Option<Self> {
        PROFICIENCY_ALIASES
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
    }
}

impl Complexity {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Complexity::Easy => "Easy",
            Complexity::Medium => "Medium",
            Complexity::Difficult => "Difficult",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Complexity::Easy, Complexity::Medium, Complexity::Difficult]
    }

    /// 从名称解析（不区分大小写，支持别名）
    pub fn from_str(s: &str) -> Option<Self> {
        COMPLEXITY_ALIASES
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
    }
}

impl fmt::Display for Proficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
