use crate::config::DetectionConfig;
use crate::models::Rect;
use tracing::debug;

/// Median of `values` (mean of the two middle values for even lengths).
///
/// Mutates the input buffer (partial sort via quickselect).
pub fn median_mut(values: &mut [f64]) -> Option<f64> {
    let len = values.len();
    if len == 0 {
        return None;
    }
    let mid = len / 2;
    let (left, median, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let right = *median;
    if len % 2 == 1 {
        return Some(right);
    }
    let left = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((left + right) * 0.5)
}

/// Single-linkage clustering of one axis: walking the sorted values, a value
/// joins the current cluster when it is within `tolerance` of its predecessor.
/// Returns the median of each cluster in ascending order.
pub fn cluster_axis(values: &[f64], tolerance: f64) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    let mut previous: Option<f64> = None;
    for value in sorted {
        let joins = previous.is_some_and(|prev| value - prev <= tolerance);
        if let Some(current) = clusters.last_mut().filter(|_| joins) {
            current.push(value);
        } else {
            clusters.push(vec![value]);
        }
        previous = Some(value);
    }

    clusters
        .iter_mut()
        .filter_map(|members| median_mut(members))
        .collect()
}

/// Rects for the cells of a nearly complete row/column layout that have no
/// candidate.
///
/// Returns only the synthesized cells; the candidates themselves are never
/// touched. Nothing is inferred when there are fewer than
/// `grid_min_candidates` candidates, fewer than two rows or columns, or when
/// the candidates fill less than `grid_min_density` of the grid.
pub fn complete_grid(candidates: &[Rect], frame_width: u32, frame_height: u32, config: &DetectionConfig) -> Vec<Rect> {
    if candidates.len() < config.grid_min_candidates {
        return Vec::new();
    }

    let mut widths: Vec<f64> = candidates.iter().map(|r| r.width as f64).collect();
    let mut heights: Vec<f64> = candidates.iter().map(|r| r.height as f64).collect();
    let (Some(median_width), Some(median_height)) = (median_mut(&mut widths), median_mut(&mut heights)) else {
        return Vec::new();
    };

    let tolerance_x = config.grid_tolerance * median_width;
    let tolerance_y = config.grid_tolerance * median_height;

    let centers: Vec<(f64, f64)> = candidates.iter().map(Rect::center).collect();
    let xs: Vec<f64> = centers.iter().map(|c| c.0).collect();
    let ys: Vec<f64> = centers.iter().map(|c| c.1).collect();
    let columns = cluster_axis(&xs, tolerance_x);
    let rows = cluster_axis(&ys, tolerance_y);

    if columns.len() < 2 || rows.len() < 2 {
        debug!(columns = columns.len(), rows = rows.len(), "No grid layout");
        return Vec::new();
    }

    let total_cells = columns.len() * rows.len();
    if (candidates.len() as f64) < config.grid_min_density * total_cells as f64 {
        debug!(candidates = candidates.len(), total_cells, "Grid too sparse to complete");
        return Vec::new();
    }

    let mut synthesized = Vec::new();
    for &row in &rows {
        for &column in &columns {
            let occupied = centers
                .iter()
                .any(|&(cx, cy)| (cx - column).abs() <= tolerance_x && (cy - row).abs() <= tolerance_y);
            if occupied {
                continue;
            }

            let x = (column - median_width / 2.0).round().max(0.0) as u32;
            let y = (row - median_height / 2.0).round().max(0.0) as u32;
            let cell = Rect::new(x, y, median_width.round() as u32, median_height.round() as u32)
                .clipped(frame_width, frame_height);
            synthesized.push(cell);
        }
    }

    debug!(
        columns = columns.len(),
        rows = rows.len(),
        synthesized = synthesized.len(),
        "Grid completed"
    );
    synthesized
}
