//! Approximate substring scoring.
//!
//! `partial_ratio` follows the classic fuzzywuzzy definition: find the matching
//! blocks between the shorter and the longer string, align a window the size of the
//! shorter string at each block, and keep the best similarity ratio. Scores are on a
//! 0-100 scale. OCR text routinely drops or swaps characters, which is why exact
//! substring search is not enough.

use std::borrow::Cow;
use std::collections::HashMap;

/// A maximal run of equal characters: `a[a_start..a_start+len] == b[b_start..b_start+len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

/// Longest-common-block matcher over two character sequences (no junk heuristics).
pub struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: Cow<'a, CharIndex>,
}

impl<'a> SequenceMatcher<'a> {
    pub fn new(a: &'a [char], b: &'a [char]) -> Self {
        Self {
            a,
            b,
            b2j: Cow::Owned(index_positions(b)),
        }
    }

    /// Matcher over a `b` whose index was built ahead of time.
    fn with_index(a: &'a [char], b: &'a [char], b2j: &'a CharIndex) -> Self {
        Self {
            a,
            b,
            b2j: Cow::Borrowed(b2j),
        }
    }

    /// Longest matching block inside `a[alo..ahi]` and `b[blo..bhi]`, earliest on ties.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let mut best = MatchingBlock {
            a_start: alo,
            b_start: blo,
            len: 0,
        };
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                    next_j2len.insert(j, k);
                    if k > best.len {
                        best = MatchingBlock {
                            a_start: i + 1 - k,
                            b_start: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            j2len = next_j2len;
        }
        best
    }

    /// All matching blocks in order, adjacent blocks merged, terminated by a
    /// zero-length sentinel at `(a.len(), b.len())`.
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.len == 0 {
                continue;
            }
            if alo < m.a_start && blo < m.b_start {
                queue.push((alo, m.a_start, blo, m.b_start));
            }
            if m.a_start + m.len < ahi && m.b_start + m.len < bhi {
                queue.push((m.a_start + m.len, ahi, m.b_start + m.len, bhi));
            }
            blocks.push(m);
        }
        blocks.sort_by_key(|m| (m.a_start, m.b_start));

        let mut merged: Vec<MatchingBlock> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match merged.last_mut() {
                Some(last)
                    if last.a_start + last.len == block.a_start
                        && last.b_start + last.len == block.b_start =>
                {
                    last.len += block.len;
                }
                _ => merged.push(block),
            }
        }
        merged.push(MatchingBlock {
            a_start: self.a.len(),
            b_start: self.b.len(),
            len: 0,
        });
        merged
    }

    /// Similarity in `[0, 1]`: twice the matched characters over the total length.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|m| m.len).sum();
        2.0 * matches as f64 / total as f64
    }
}

/// Positions of every character, ascending.
type CharIndex = HashMap<char, Vec<usize>>;

fn index_positions(chars: &[char]) -> CharIndex {
    let mut index = CharIndex::new();
    for (j, &c) in chars.iter().enumerate() {
        index.entry(c).or_default().push(j);
    }
    index
}

/// Full-string similarity on a 0-100 scale.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(SequenceMatcher::new(&a, &b).ratio())
}

fn to_score(r: f64) -> u8 {
    (r * 100.0).round().clamp(0.0, 100.0) as u8
}

/// A body of text prepared for repeated partial scoring against many probes.
///
/// Building the character index of a long OCR blob is the expensive part, so it is
/// done once per document rather than once per term.
pub struct PartialScorer {
    text: Vec<char>,
    index: CharIndex,
}

impl PartialScorer {
    pub fn new(text: &str) -> Self {
        let text: Vec<char> = text.chars().collect();
        let index = index_positions(&text);
        Self { text, index }
    }

    /// Best alignment score of `probe` anywhere in the text (0-100).
    pub fn score(&self, probe: &str) -> u8 {
        let probe: Vec<char> = probe.chars().collect();
        if probe.is_empty() || self.text.is_empty() {
            return 0;
        }
        if probe.len() <= self.text.len() {
            let matcher = SequenceMatcher::with_index(&probe, &self.text, &self.index);
            best_window(&probe, &self.text, &matcher.matching_blocks())
        } else {
            let matcher = SequenceMatcher::new(&self.text, &probe);
            best_window(&self.text, &probe, &matcher.matching_blocks())
        }
    }
}

fn best_window(shorter: &[char], longer: &[char], blocks: &[MatchingBlock]) -> u8 {
    let mut best = 0.0f64;
    for block in blocks {
        let start = block.b_start.saturating_sub(block.a_start);
        let end = (start + shorter.len()).min(longer.len());
        let window = &longer[start..end];
        let r = SequenceMatcher::new(shorter, window).ratio();
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    to_score(best)
}

/// Best partial alignment score of the shorter string inside the longer (0-100).
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    PartialScorer::new(longer).score(shorter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_matching_blocks() {
        let a = chars("abxcd");
        let b = chars("abcd");
        let blocks = SequenceMatcher::new(&a, &b).matching_blocks();
        assert_eq!(
            blocks,
            vec![
                MatchingBlock { a_start: 0, b_start: 0, len: 2 },
                MatchingBlock { a_start: 3, b_start: 2, len: 2 },
                MatchingBlock { a_start: 5, b_start: 4, len: 0 },
            ]
        );
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("this is a test", "this is a test"), 100);
        // 2 * 14 / 29
        assert_eq!(ratio("this is a test", "this is a test!"), 97);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", "abc"), 0);
    }

    #[test]
    fn test_partial_ratio_exact_substring() {
        assert_eq!(partial_ratio("absorbable", "a bioabsorbable polymer"), 100);
        assert_eq!(partial_ratio("a bioabsorbable polymer", "absorbable"), 100);
    }

    #[test]
    fn test_partial_ratio_tolerates_ocr_noise() {
        // One substituted character in a ten-letter word.
        let score = partial_ratio("absorbable", "the implant is abs0rbable over time");
        assert!(score >= 80, "score was {}", score);
        assert!(score < 100);
    }

    #[test]
    fn test_partial_ratio_unrelated() {
        assert!(partial_ratio("stereolithography", "titanium bone screw") < 50);
        assert_eq!(partial_ratio("", "text"), 0);
        assert_eq!(partial_ratio("term", ""), 0);
    }

    #[test]
    fn test_scorer_reuses_index() {
        let scorer = PartialScorer::new("contains suture material and a resorbable anchor");
        assert_eq!(scorer.score("suture"), 100);
        assert_eq!(scorer.score("resorbable"), 100);
        assert!(scorer.score("laser sintering") < 80);
    }
}
