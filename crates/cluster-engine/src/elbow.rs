/// Knee of a convex, decreasing curve: the interior point with maximum
/// perpendicular distance from the chord between the first and last points,
/// both axes normalized to [0, 1]. `None` when the curve has no interior
/// point or no point lies meaningfully off the chord.
pub fn find_elbow(ks: &[usize], wcss: &[f64]) -> Option<usize> {
    let n = ks.len().min(wcss.len());
    if n < 3 {
        return None;
    }

    let x0 = ks[0] as f64;
    let x1 = ks[n - 1] as f64;
    let y_min = wcss[..n].iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = wcss[..n].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if x1 <= x0 || y_max <= y_min {
        return None;
    }

    let norm_x = |k: usize| (k as f64 - x0) / (x1 - x0);
    let norm_y = |w: f64| (w - y_min) / (y_max - y_min);

    // Chord runs from (0, y(0)) to (1, y(1)) in normalized space; for a
    // decreasing curve that is (0, 1) -> (1, 0), so the signed offset of a
    // point below the chord is 1 - x - y.
    let mut best: Option<(f64, usize)> = None;
    for i in 1..n - 1 {
        let offset = 1.0 - norm_x(ks[i]) - norm_y(wcss[i]);
        if offset > best.map_or(0.0, |(d, _)| d) {
            best = Some((offset, ks[i]));
        }
    }

    best.map(|(_, k)| k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_knee_of_convex_curve() {
        let ks = [2, 3, 4, 5, 6, 7];
        let wcss = [100.0, 40.0, 15.0, 12.0, 10.0, 9.0];
        assert_eq!(find_elbow(&ks, &wcss), Some(4));
    }

    #[test]
    fn too_few_points() {
        assert_eq!(find_elbow(&[2, 3], &[10.0, 5.0]), None);
        assert_eq!(find_elbow(&[], &[]), None);
    }

    #[test]
    fn flat_curve_has_no_elbow() {
        let ks = [2, 3, 4, 5];
        let wcss = [10.0, 10.0, 10.0, 10.0];
        assert_eq!(find_elbow(&ks, &wcss), None);
    }

    #[test]
    fn linear_curve_has_no_elbow() {
        let ks = [2, 3, 4, 5];
        let wcss = [40.0, 30.0, 20.0, 10.0];
        // Every interior point sits on the chord.
        assert_eq!(find_elbow(&ks, &wcss), None);
    }
}
