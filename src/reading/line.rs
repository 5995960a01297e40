//! Line clustering
//!
//! Groups word candidates into visual lines with a single pass over the
//! candidates in arrival order.

use super::geometry::WordCandidate;

/// Word candidates believed to share one visual text line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    words: Vec<WordCandidate>,
    sum_y: f64,
}

impl Line {
    /// Start a new line from its first member
    pub fn new(first: WordCandidate) -> Self {
        Self {
            sum_y: first.y_center,
            words: vec![first],
        }
    }

    pub fn push(&mut self, word: WordCandidate) {
        self.sum_y += word.y_center;
        self.words.push(word);
    }

    /// Running mean of the members' y centers
    pub fn mean_y(&self) -> f64 {
        self.sum_y / self.words.len() as f64
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[WordCandidate] {
        &self.words
    }

    /// Whether `word` is close enough to this line to join it
    ///
    /// The tolerance scales with the candidate's own height, not the line's.
    pub fn accepts(&self, word: &WordCandidate, tolerance: f64) -> bool {
        (word.y_center - self.mean_y()).abs() < tolerance * word.height
    }

    /// Freeze the line: order words right to left and join their texts
    pub fn into_text(mut self) -> String {
        // Stable sort keeps arrival order for words sharing an x_start
        self.words.sort_by(|a, b| b.x_start.total_cmp(&a.x_start));

        self.words
            .iter()
            .map(|w| w.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Assign each candidate to the first existing line that accepts it,
/// creating a new line when none does
///
/// Lines are returned in creation order.
pub fn cluster_lines<I>(candidates: I, tolerance: f64) -> Vec<Line>
where
    I: IntoIterator<Item = WordCandidate>,
{
    let mut lines: Vec<Line> = Vec::new();

    for word in candidates {
        match lines.iter_mut().find(|line| line.accepts(&word, tolerance)) {
            Some(line) => line.push(word),
            None => lines.push(Line::new(word)),
        }
    }

    lines
}
