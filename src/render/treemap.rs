use serde::{Deserialize, Serialize};

use super::ChartDimensions;
use crate::models::TopicNode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x0 >= self.x0 - EPS && other.y0 >= self.y0 - EPS && other.x1 <= self.x1 + EPS && other.y1 <= self.y1 + EPS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreemapTile {
    pub name: String,
    /// Names from the first level down to this node.
    pub path: Vec<String>,
    pub depth: usize,
    pub value: f64,
    pub rect: Rect,
    /// Top-level topic the tile belongs to, used for colouring.
    pub group: String,
    pub is_leaf: bool,
}

/// Squarified treemap of the topic hierarchy inside the chart's inner area.
/// The root itself is not emitted; parents precede their children.
pub fn render_treemap(root: &TopicNode, dims: &ChartDimensions) -> Vec<TreemapTile> {
    let area = Rect {
        x0: dims.margin.left,
        y0: dims.margin.top,
        x1: dims.margin.left + dims.inner_width(),
        y1: dims.margin.top + dims.inner_height(),
    };
    let mut tiles = Vec::new();
    layout_children(root, area, 1, &[], None, &mut tiles);
    tiles
}

fn layout_children(
    node: &TopicNode,
    area: Rect,
    depth: usize,
    path: &[String],
    group: Option<&str>,
    tiles: &mut Vec<TreemapTile>,
) {
    let mut children: Vec<&TopicNode> = node.children.iter().filter(|c| c.value > 0.0).collect();
    children.sort_by(|a, b| b.value.total_cmp(&a.value));

    let total: f64 = children.iter().map(|c| c.value).sum();
    if children.is_empty() || total <= 0.0 {
        return;
    }
    let scale = area.area() / total;
    let areas: Vec<f64> = children.iter().map(|c| c.value * scale).collect();
    let rects = squarify(&areas, area);

    for (child, rect) in children.into_iter().zip(rects) {
        let mut child_path = path.to_vec();
        child_path.push(child.name.clone());
        let child_group = group.unwrap_or(child.name.as_str()).to_string();
        tiles.push(TreemapTile {
            name: child.name.clone(),
            path: child_path.clone(),
            depth,
            value: child.value,
            rect,
            group: child_group.clone(),
            is_leaf: child.is_leaf(),
        });
        layout_children(child, rect, depth + 1, &child_path, Some(&child_group), tiles);
    }
}

/// Worst aspect ratio in a row of `areas` laid along a side of length `side`.
fn worst_ratio(row_sum: f64, row_min: f64, row_max: f64, side: f64) -> f64 {
    if row_sum <= 0.0 || row_min <= 0.0 || side <= 0.0 {
        return f64::INFINITY;
    }
    let side2 = side * side;
    let sum2 = row_sum * row_sum;
    (side2 * row_max / sum2).max(sum2 / (side2 * row_min))
}

/// Tiles `areas` (sorted descending, summing to the rect's area) into `rect`.
pub fn squarify(areas: &[f64], rect: Rect) -> Vec<Rect> {
    let mut out = Vec::with_capacity(areas.len());
    let mut remaining = rect;
    let mut i = 0;

    while i < areas.len() {
        let side = remaining.width().min(remaining.height());
        let mut j = i + 1;
        let mut row_sum = areas[i];
        let mut row_min = areas[i];
        let mut row_max = areas[i];
        while j < areas.len() {
            let candidate = areas[j];
            let current = worst_ratio(row_sum, row_min, row_max, side);
            let extended = worst_ratio(row_sum + candidate, row_min.min(candidate), row_max.max(candidate), side);
            if extended > current {
                break;
            }
            row_sum += candidate;
            row_min = row_min.min(candidate);
            row_max = row_max.max(candidate);
            j += 1;
        }

        let row = &areas[i..j];
        if remaining.width() >= remaining.height() {
            // Column on the left edge
            let thickness = if remaining.height() > 0.0 { row_sum / remaining.height() } else { 0.0 };
            let mut y = remaining.y0;
            for (k, a) in row.iter().enumerate() {
                let h = if thickness > 0.0 { a / thickness } else { 0.0 };
                let y1 = if k + 1 == row.len() { remaining.y1 } else { y + h };
                out.push(Rect { x0: remaining.x0, y0: y, x1: remaining.x0 + thickness, y1 });
                y = y1;
            }
            remaining.x0 = (remaining.x0 + thickness).min(remaining.x1);
        } else {
            // Row along the top edge
            let thickness = if remaining.width() > 0.0 { row_sum / remaining.width() } else { 0.0 };
            let mut x = remaining.x0;
            for (k, a) in row.iter().enumerate() {
                let w = if thickness > 0.0 { a / thickness } else { 0.0 };
                let x1 = if k + 1 == row.len() { remaining.x1 } else { x + w };
                out.push(Rect { x0: x, y0: remaining.y0, x1, y1: remaining.y0 + thickness });
                x = x1;
            }
            remaining.y0 = (remaining.y0 + thickness).min(remaining.y1);
        }
        i = j;
    }
    out
}
