use std::collections::HashMap;

use crate::foundation::error::ForgeResult;

/// Width measurement for a single line of text, in output pixels.
pub trait TextMeasure {
    /// Advance width of `text` laid out on one line.
    fn measure(&mut self, text: &str) -> ForgeResult<f64>;
}

impl<M: TextMeasure + ?Sized> TextMeasure for &mut M {
    fn measure(&mut self, text: &str) -> ForgeResult<f64> {
        (**self).measure(text)
    }
}

/// Memoizing wrapper; lives for a single [`wrap`] call.
pub struct MemoMeasure<M> {
    inner: M,
    memo: HashMap<String, f64>,
}

impl<M: TextMeasure> MemoMeasure<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            memo: HashMap::new(),
        }
    }

    /// Number of distinct strings measured so far.
    pub fn distinct(&self) -> usize {
        self.memo.len()
    }
}

impl<M: TextMeasure> TextMeasure for MemoMeasure<M> {
    fn measure(&mut self, text: &str) -> ForgeResult<f64> {
        if let Some(w) = self.memo.get(text) {
            return Ok(*w);
        }
        let w = self.inner.measure(text)?;
        self.memo.insert(text.to_owned(), w);
        Ok(w)
    }
}

/// Greedy word wrap with a per-character fallback for tokens wider than `max_width_px`.
///
/// Tokens are split on whitespace and re-joined with single spaces. Text that is empty after
/// trimming yields no lines. A non-positive or non-finite limit means unconstrained.
pub fn wrap<M: TextMeasure>(
    text: &str,
    max_width_px: f64,
    measure: M,
) -> ForgeResult<Vec<String>> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }
    if !max_width_px.is_finite() || max_width_px <= 0.0 {
        return Ok(vec![words.join(" ")]);
    }

    let mut measure = MemoMeasure::new(measure);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in words {
        if !line.is_empty() {
            let candidate = format!("{line} {word}");
            if measure.measure(&candidate)? <= max_width_px {
                line = candidate;
                continue;
            }
            lines.push(std::mem::take(&mut line));
        }

        if measure.measure(word)? <= max_width_px {
            line.push_str(word);
            continue;
        }

        // Break the token; the trailing fragment stays open for the next word.
        for ch in word.chars() {
            let mut candidate = line.clone();
            candidate.push(ch);
            if line.is_empty() || measure.measure(&candidate)? <= max_width_px {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push(ch);
            }
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
#[path = "../../tests/unit/text/shaper.rs"]
mod tests;
