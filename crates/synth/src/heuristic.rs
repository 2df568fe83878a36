//! Offline keyword translator.
//!
//! Covers the common question shapes (totals, averages, extremes, counts,
//! distinct values, top-N and per-group aggregates) by matching keywords and
//! column names. Useful for demos and tests without a model provider; anything
//! it cannot place is reported as an invalid expression.

use async_trait::async_trait;
use tabula_table::{ColumnSummary, DType};

use crate::backend::CompletionBackend;
use crate::error::{Result, SynthesisError};
use crate::prompt::Prompt;

const DEFAULT_TOP: usize = 5;

/// Keyword → aggregation method, checked in question order.
const AGGREGATIONS: &[(&str, &str)] = &[
    ("total", "sum"),
    ("sum", "sum"),
    ("average", "mean"),
    ("mean", "mean"),
    ("median", "median"),
    ("maximum", "max"),
    ("max", "max"),
    ("highest", "max"),
    ("largest", "max"),
    ("biggest", "max"),
    ("minimum", "min"),
    ("min", "min"),
    ("lowest", "min"),
    ("smallest", "min"),
    ("how many", "count"),
    ("number of", "count"),
    ("count", "count"),
];

const GROUP_WORDS: &[&str] = &["per", "by", "each", "every"];
const DISTINCT_WORDS: &[&str] = &["distinct", "unique", "different"];
const TOP_WORDS: &[(&str, &str)] = &[("top", "nlargest"), ("bottom", "nsmallest")];

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicBackend;

impl HeuristicBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionBackend for HeuristicBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        translate(prompt.question(), prompt.columns()).ok_or_else(|| {
            SynthesisError::InvalidExpression(format!(
                "no rule matches the question '{}'",
                prompt.question()
            ))
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

struct Mention<'a> {
    at: usize,
    end: usize,
    column: &'a ColumnSummary,
}

impl Mention<'_> {
    fn numeric(&self) -> bool {
        matches!(self.column.dtype, DType::Int | DType::Float)
    }

    fn name(&self) -> &str {
        &self.column.name
    }
}

pub(crate) fn translate(question: &str, columns: &[ColumnSummary]) -> Option<String> {
    let text = question.to_lowercase();
    let mentions = mentions(&text, columns);

    // "top 3 by revenue" reads like a grouping but ranks rows.
    for (word, method) in TOP_WORDS {
        if let Some(at) = find_all(&text, word).next() {
            let n = text[at + word.len()..]
                .split(|c: char| !c.is_alphanumeric())
                .find(|w| !w.is_empty())
                .and_then(|w| w.parse::<usize>().ok())
                .unwrap_or(DEFAULT_TOP);
            let target = mentions.iter().find(|m| m.numeric())?;
            return Some(format!("df.{method}({n}, {})", quote(target.name())));
        }
    }

    let group = mentions.iter().find(|m| {
        GROUP_WORDS.iter().any(|word| {
            find_all(&text, word).any(|at| {
                let rest = text[at + word.len()..].trim_start();
                let rest = rest.strip_prefix("the ").unwrap_or(rest);
                text.len() - rest.len() == m.at
            })
        })
    });
    let others: Vec<&Mention> = mentions
        .iter()
        .filter(|m| group.map_or(true, |g| g.at != m.at))
        .collect();

    if DISTINCT_WORDS.iter().any(|w| find_all(&text, w).next().is_some()) {
        let target = others.first()?;
        let counting = ["how many", "number of", "count"]
            .iter()
            .any(|w| find_all(&text, w).next().is_some());
        let method = if counting { "nunique" } else { "unique" };
        return Some(format!("df[{}].{method}()", quote(target.name())));
    }

    let agg = AGGREGATIONS
        .iter()
        .filter_map(|(word, agg)| find_all(&text, word).next().map(|at| (at, *agg)))
        .min_by_key(|(at, _)| *at)
        .map(|(_, agg)| agg)?;

    let numeric_agg = matches!(agg, "sum" | "mean" | "median");
    let target = if numeric_agg {
        others.iter().find(|m| m.numeric())
    } else {
        others.first()
    };

    match (group, target) {
        (Some(group), Some(target)) => Some(format!(
            "df.groupby({})[{}].{agg}()",
            quote(group.name()),
            quote(target.name())
        )),
        (Some(group), None) if agg == "count" => {
            Some(format!("df.groupby({}).size()", quote(group.name())))
        }
        (None, Some(target)) if !(agg == "count" && mentions_rows(&text)) => {
            Some(format!("df[{}].{agg}()", quote(target.name())))
        }
        (None, _) if agg == "count" => Some("len(df)".to_string()),
        _ => None,
    }
}

fn mentions_rows(text: &str) -> bool {
    ["rows", "records", "entries", "lines"]
        .iter()
        .any(|w| find_all(text, w).next().is_some())
}

/// Column mentions in question order; a longer name wins over a name it
/// contains.
fn mentions<'a>(text: &str, columns: &'a [ColumnSummary]) -> Vec<Mention<'a>> {
    let mut found: Vec<Mention<'a>> = Vec::new();
    for column in columns {
        let lowered = column.name.to_lowercase();
        let spaced = lowered.replace('_', " ");
        let mut phrases = vec![lowered];
        if phrases[0] != spaced {
            phrases.push(spaced);
        }
        for phrase in &phrases {
            if phrase.trim().is_empty() {
                continue;
            }
            for at in find_all(text, phrase) {
                found.push(Mention {
                    at,
                    end: at + phrase.len(),
                    column,
                });
            }
        }
    }
    found.sort_by(|a, b| a.at.cmp(&b.at).then(b.end.cmp(&a.end)));

    let mut kept: Vec<Mention<'a>> = Vec::new();
    for mention in found {
        let overlaps = kept.last().is_some_and(|last| mention.at < last.end);
        let repeated = kept.iter().any(|k| k.column.name == mention.column.name);
        if !overlaps && !repeated {
            kept.push(mention);
        }
    }
    kept
}

/// Byte offsets of whole-word occurrences of `needle` in `haystack`.
fn find_all<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack.match_indices(needle).filter_map(move |(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + needle.len()..].chars().next();
        let boundary = |c: Option<char>| c.map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        (boundary(before) && boundary(after)).then_some(at)
    })
}

fn quote(name: &str) -> String {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
}
