// Peak detection - Prominence and distance based selection of local maxima

/// Positions of local maxima, including flat tops.
///
/// A plateau reports its middle position (lower middle for even widths). The
/// first and last positions are never maxima.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }

            if x[i_ahead] < x[i] {
                let left_edge = i;
                let right_edge = i_ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drop peaks that sit closer than `distance` positions to a higher one.
///
/// Peaks are visited from highest to lowest; ties favour the later position.
pub fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];
    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in by_height.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Topographic prominence of the peak at `peak`.
///
/// Each side is scanned until a strictly higher value (or the edge of the
/// data); the higher of the two minima found is the reference level.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let left_min = x[..=peak]
        .iter()
        .rev()
        .take_while(|&&v| v <= height)
        .fold(height, |acc, &v| acc.min(v));

    let right_min = x[peak..]
        .iter()
        .take_while(|&&v| v <= height)
        .fold(height, |acc, &v| acc.min(v));

    height - left_min.max(right_min)
}

/// Find peaks with at least `min_prominence` that are `min_distance` apart.
///
/// The distance filter runs before the prominence filter. Returned positions
/// are ascending indices into `x`.
pub fn find_peaks(x: &[f64], min_prominence: f64, min_distance: usize) -> Vec<usize> {
    let candidates = local_maxima(x);
    let spaced = select_by_distance(x, &candidates, min_distance);

    spaced
        .into_iter()
        .filter(|&p| prominence(x, p) >= min_prominence)
        .collect()
}
