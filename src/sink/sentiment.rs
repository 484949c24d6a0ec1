// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// 情感评分特质
///
/// 可插拔的后处理阶段，仅在配置启用时由流水线调用。
/// 评分失败返回None，输出字段置null，从不中断流水线。
pub trait SentimentScorer: Send + Sync {
    /// 对文本评分
    ///
    /// # 返回值
    ///
    /// * `Some(score)` - [-1.0, 1.0]区间内的情感得分
    /// * `None` - 评分失败
    fn score(&self, text: &str) -> Option<f32>;
}

static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "great", "excellent", "positive", "success", "successful", "win",
        "wins", "growth", "improve", "improved", "improvement", "strong", "record",
        "boost", "gain", "gains", "rise", "rises", "surge", "breakthrough", "hope",
        "optimism", "optimistic", "recovery", "progress", "celebrate", "victory",
        "agreement", "peace", "innovative", "thriving",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bad", "poor", "negative", "failure", "fail", "fails", "loss", "losses",
        "crisis", "decline", "declines", "drop", "drops", "fall", "falls", "crash",
        "weak", "fear", "fears", "concern", "concerns", "warning", "threat",
        "conflict", "war", "death", "deaths", "disaster", "fraud", "scandal",
        "recession", "layoffs", "collapse", "violence",
    ]
    .into_iter()
    .collect()
});

/// 词表情感评分器
///
/// 统计正负词表命中数，得分为(正-负)/命中总数。
/// 无任何词表命中时返回中性0.0，空文本视为评分失败。
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Option<f32> {
        let words: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect();

        if words.is_empty() {
            return None;
        }

        let mut positive = 0i32;
        let mut negative = 0i32;
        for word in &words {
            if POSITIVE_WORDS.contains(word.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(word.as_str()) {
                negative += 1;
            }
        }

        let matched = positive + negative;
        if matched == 0 {
            return Some(0.0);
        }

        let score = (positive - negative) as f32 / matched as f32;
        Some(score.clamp(-1.0, 1.0))
    }
}
