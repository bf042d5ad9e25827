//! 校验结果合并 - 编排层
//!
//! 把一轮校验答案写回题目映射，并找出需要下一轮重新校验的题目。

use std::collections::{HashMap, HashSet};

use crate::models::{MismatchSet, ResultMapping, ValidatedAnswer};

/// 一轮合并的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// 本轮参与比对的题目数
    pub total: usize,
    /// 校验答案与原答案一致
    pub matched: usize,
    /// 校验答案与原答案不一致
    pub disagreed: usize,
    /// 没有对应的校验答案
    pub missing: usize,
}

impl ReconcileStats {
    /// 不一致 + 缺失
    pub fn mismatched(&self) -> usize {
        self.disagreed + self.missing
    }
}

/// 一轮合并的结果
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// 按题干顺序排列
    pub mismatches: MismatchSet,
    pub stats: ReconcileStats,
}

/// 校验结果合并器
pub struct Reconciler {
    validator_identity: String,
}

impl Reconciler {
    /// `validator_identity` 会写入每条有校验结果的题目
    pub fn new(validator_identity: impl Into<String>) -> Self {
        Self {
            validator_identity: validator_identity.into(),
        }
    }

    /// 对映射中的全部题目合并校验结果
    pub fn reconcile(
        &self,
        mapping: &mut ResultMapping,
        validated: &HashMap<String, ValidatedAnswer>,
    ) -> Reconciliation {
        self.reconcile_where(mapping, validated, |_| true)
    }

    /// 只对 `scope` 中的题目合并校验结果，其余题目保持不变
    pub fn reconcile_scope(
        &self,
        mapping: &mut ResultMapping,
        scope: &[String],
        validated: &HashMap<String, ValidatedAnswer>,
    ) -> Reconciliation {
        let scope: HashSet<&str> = scope.iter().map(String::as_str).collect();
        self.reconcile_where(mapping, validated, |question| scope.contains(question))
    }

    fn reconcile_where(
        &self,
        mapping: &mut ResultMapping,
        validated: &HashMap<String, ValidatedAnswer>,
        in_scope: impl Fn(&str) -> bool,
    ) -> Reconciliation {
        let mut result = Reconciliation::default();

        for record in mapping.iter_mut() {
            if !in_scope(record.question()) {
                continue;
            }
            result.stats.total += 1;

            match validated.get(record.question()) {
                Some(answer) => {
                    record.apply_validation(answer, &self.validator_identity);
                    if record.validated_answer() == record.answer() {
                        result.stats.matched += 1;
                    } else {
                        result.stats.disagreed += 1;
                        result.mismatches.push(record.clone());
                    }
                }
                None => {
                    result.stats.missing += 1;
                    result.mismatches.push(record.clone());
                }
            }
        }

        result
    }
}
