//! Headless view of how the renderer lays out one shape per window.

use crate::{WindowId, WindowRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: WindowId,
    pub center: (f64, f64),
    /// Positions (in the window list) of the shapes this node mirrors.
    pub neighbors: Vec<usize>,
    pub is_this_window: bool,
}

/// One node per window, in list order. With fewer than three windows each
/// node mirrors its predecessor (wrapping); otherwise both predecessor and
/// successor.
pub fn layout(windows: &[WindowRecord], this_window: Option<WindowId>) -> Vec<SceneNode> {
    let count = windows.len();
    windows
        .iter()
        .enumerate()
        .map(|(i, window)| {
            let previous = if i == 0 { count - 1 } else { i - 1 };
            let next = if i == count - 1 { 0 } else { i + 1 };
            let neighbors = if count < 3 {
                vec![previous]
            } else {
                vec![previous, next]
            };

            SceneNode {
                id: window.id,
                center: window.shape.center(),
                neighbors,
                is_this_window: Some(window.id) == this_window,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;
    use chrono::Utc;

    fn windows(n: u64) -> Vec<WindowRecord> {
        (0..n)
            .map(|i| WindowRecord {
                id: WindowId(i + 1),
                seq: i,
                shape: Shape::new(i as f64 * 800.0, 0.0, 800.0, 600.0),
                meta_data: serde_json::Value::Null,
                last_seen: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn empty_list_has_no_nodes() {
        assert!(layout(&[], None).is_empty());
    }

    #[test]
    fn single_window_mirrors_itself() {
        let nodes = layout(&windows(1), Some(WindowId(1)));
        assert_eq!(nodes[0].neighbors, vec![0]);
        assert_eq!(nodes[0].center, (400.0, 300.0));
        assert!(nodes[0].is_this_window);
    }

    #[test]
    fn pair_mirrors_predecessor_only() {
        let nodes = layout(&windows(2), Some(WindowId(2)));
        assert_eq!(nodes[0].neighbors, vec![1]);
        assert_eq!(nodes[1].neighbors, vec![0]);
        assert!(!nodes[0].is_this_window);
        assert!(nodes[1].is_this_window);
    }

    #[test]
    fn three_or_more_wrap_both_ways() {
        let nodes = layout(&windows(3), None);
        assert_eq!(nodes[0].neighbors, vec![2, 1]);
        assert_eq!(nodes[1].neighbors, vec![0, 2]);
        assert_eq!(nodes[2].neighbors, vec![1, 0]);
    }
}
