use crate::types::BlockExtent;

/// Number of segments each axis is cut into when aiming for `target_blocks` blocks.
///
/// Solves `a (a - 1) / 2 = k` for `a`, rounding down, and clamps the result so that no
/// segment is empty.
pub fn segments_for_target(n: usize, target_blocks: usize) -> usize {
    let k = target_blocks as f64;
    let a = ((1.0 + (1.0 + 8.0 * k).sqrt()) / 2.0).floor() as usize;
    a.clamp(1, n.max(1))
}

/// Partitions the lower triangle (diagonal included) of an `n x n` matrix into square-ish
/// blocks.
///
/// Both axes are cut at `b(i) = i * n / a`; the last segment ends at `n`. Blocks are
/// emitted row-band by row-band, each band from the leftmost column segment up to and
/// including the diagonal block.
pub fn subdivide_lower_triangle(n: usize, target_blocks: usize) -> Vec<BlockExtent> {
    if n == 0 {
        return Vec::new();
    }
    let a = segments_for_target(n, target_blocks);
    let boundary = |i: usize| i * n / a;
    let end = |i: usize| if i + 1 == a { n } else { boundary(i + 1) };

    let mut blocks = Vec::with_capacity(a * (a + 1) / 2);
    for i in 0..a {
        for j in 0..=i {
            blocks.push(BlockExtent::new(boundary(i), boundary(j), end(i), end(j)));
        }
    }
    blocks
}
