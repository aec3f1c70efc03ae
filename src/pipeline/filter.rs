//! Delivery selection.

use crate::models::{Post, Watermark};

/// Select posts strictly newer than `watermark`, oldest first.
///
/// A post exactly at the watermark counts as delivered. Posts sharing a
/// timestamp keep their relative order from `candidates`.
pub fn select_new(candidates: &[Post], watermark: Watermark) -> Vec<Post> {
    let mut selected: Vec<Post> = candidates
        .iter()
        .filter(|post| !watermark.covers(post))
        .cloned()
        .collect();
    selected.sort_by_key(|post| post.indexed_at);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{post, watermark_at};

    fn times(posts: &[Post]) -> Vec<i64> {
        posts.iter().map(|p| p.indexed_at.timestamp()).collect()
    }

    #[test]
    fn test_strictly_after_watermark_in_order() {
        let candidates = vec![post(1200), post(1100), post(1000), post(900)];
        let selected = select_new(&candidates, watermark_at(1000));
        assert_eq!(times(&selected), vec![1100, 1200]);
    }

    #[test]
    fn test_epoch_selects_everything() {
        let candidates = vec![post(30), post(10), post(20)];
        let selected = select_new(&candidates, Watermark::epoch());
        assert_eq!(times(&selected), vec![10, 20, 30]);
    }

    #[test]
    fn test_output_is_ascending_for_any_input_order() {
        let candidates: Vec<Post> = [7, 3, 9, 1, 8, 2, 6, 4, 5]
            .into_iter()
            .map(|s| post(1000 + s))
            .collect();
        let selected = select_new(&candidates, watermark_at(1003));
        assert_eq!(times(&selected), vec![1004, 1005, 1006, 1007, 1008, 1009]);
        assert!(selected.windows(2).all(|w| w[0].indexed_at < w[1].indexed_at));
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let mut first = post(1500);
        first.content = "first".to_string();
        let mut second = post(1500);
        second.content = "second".to_string();

        let selected = select_new(&[post(1600), first, second, post(1400)], watermark_at(0));
        let contents: Vec<&str> = selected.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["post 1400", "first", "second", "post 1600"]);
    }

    #[test]
    fn test_is_pure() {
        let candidates = vec![post(1200), post(1100)];
        let a = select_new(&candidates, watermark_at(1000));
        let b = select_new(&candidates, watermark_at(1000));
        assert_eq!(a, b);
        assert_eq!(times(&candidates), vec![1200, 1100]);
        assert!(select_new(&[], watermark_at(1000)).is_empty());
    }
}
