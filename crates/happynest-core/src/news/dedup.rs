//! Near-duplicate removal by title similarity

use super::models::Story;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Character-level similarity ratio in `[0, 1]`
///
/// `2 * LCS / (len(a) + len(b))`, so `1.0` means identical and the ratio is
/// symmetric in its arguments.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Whether `title` duplicates any of `seen` at the given threshold
fn is_duplicate(title: &str, seen: &[String], threshold: f64) -> bool {
    seen.iter()
        .any(|kept| kept == title || similarity(title, kept) > threshold)
}

/// Drop stories whose title is too similar to an earlier kept story
///
/// First seen wins: input order decides which of two similar stories stays.
pub fn remove_duplicates(stories: Vec<Story>, threshold: f64) -> Vec<Story> {
    let mut seen_titles: Vec<String> = Vec::new();
    let mut unique = Vec::with_capacity(stories.len());

    for story in stories {
        if is_duplicate(&story.title, &seen_titles, threshold) {
            tracing::debug!("Dropping near-duplicate story: {}", story.title);
            continue;
        }
        seen_titles.push(story.title.clone());
        unique.push(story);
    }

    unique
}
