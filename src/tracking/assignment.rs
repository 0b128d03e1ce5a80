// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 轨迹 ↔ 检测 分配 (匈牙利算法 / 贪心二部匹配)

use pathfinding::prelude::{kuhn_munkres_min, Matrix};

use super::settings::MatchType;

/// 浮点代价到整数代价的放大倍数
const COST_SCALE: f32 = 10_000.0;
/// 不可匹配项的代价
const FORBIDDEN: i64 = 1_000_000_000;

/// 分配结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// (轨迹索引, 检测索引)
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// 求解分配
///
/// `costs[i][j]` 为轨迹 i 与检测 j 的距离, `None` 表示不可匹配。
/// 只接受距离 <= `threshold` 的匹配。
pub fn assign(
    costs: &[Vec<Option<f32>>],
    num_detections: usize,
    threshold: f32,
    match_type: MatchType,
) -> Assignment {
    let num_tracks = costs.len();
    let matches = if num_tracks == 0 || num_detections == 0 {
        Vec::new()
    } else {
        match match_type {
            MatchType::Hungarian => solve_hungarian(costs, num_detections, threshold),
            MatchType::Bipartite => solve_greedy(costs, threshold),
        }
    };

    let mut track_used = vec![false; num_tracks];
    let mut det_used = vec![false; num_detections];
    for &(t, d) in &matches {
        track_used[t] = true;
        det_used[d] = true;
    }

    Assignment {
        matches,
        unmatched_tracks: (0..num_tracks).filter(|&t| !track_used[t]).collect(),
        unmatched_detections: (0..num_detections).filter(|&d| !det_used[d]).collect(),
    }
}

fn accepted(cost: Option<f32>, threshold: f32) -> Option<f32> {
    cost.filter(|c| c.is_finite() && *c <= threshold)
}

/// 最优分配: 补齐为方阵后求最小代价
fn solve_hungarian(costs: &[Vec<Option<f32>>], num_detections: usize, threshold: f32) -> Vec<(usize, usize)> {
    let num_tracks = costs.len();
    let size = num_tracks.max(num_detections);
    let mut matrix = Matrix::new(size, size, FORBIDDEN);

    for (t, row) in costs.iter().enumerate() {
        for (d, cost) in row.iter().enumerate().take(num_detections) {
            if let Some(c) = accepted(*cost, threshold) {
                matrix[(t, d)] = (c * COST_SCALE).round() as i64;
            }
        }
    }

    let (_total, columns) = kuhn_munkres_min(&matrix);
    columns
        .into_iter()
        .enumerate()
        .filter(|&(t, d)| t < num_tracks && d < num_detections && matrix[(t, d)] < FORBIDDEN)
        .collect()
}

/// 贪心匹配: 按代价从小到大依次分配
fn solve_greedy(costs: &[Vec<Option<f32>>], threshold: f32) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(f32, usize, usize)> = costs
        .iter()
        .enumerate()
        .flat_map(|(t, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(d, cost)| accepted(*cost, threshold).map(|c| (c, t, d)))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let num_detections = costs.iter().map(Vec::len).max().unwrap_or(0);
    let mut track_used = vec![false; costs.len()];
    let mut det_used = vec![false; num_detections];
    let mut matches = Vec::new();
    for (_cost, t, d) in candidates {
        if !track_used[t] && !det_used[d] {
            track_used[t] = true;
            det_used[d] = true;
            matches.push((t, d));
        }
    }
    matches
}
