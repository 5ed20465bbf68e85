use crate::collector::PointerSample;
use crate::config::MouseBand;

/// Mean per-segment speed in units per second. Segments with a non-positive
/// time delta are skipped; fewer than two usable points yields 0.
pub fn average_velocity<'a, I>(positions: I) -> f64
where
    I: IntoIterator<Item = &'a PointerSample>,
{
    let mut iter = positions.into_iter();
    let Some(mut prev) = iter.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    let mut segments = 0u32;

    for point in iter {
        let dt_ms = point.timestamp_ms - prev.timestamp_ms;
        if dt_ms > 0.0 && dt_ms.is_finite() {
            let distance = ((point.x - prev.x).powi(2) + (point.y - prev.y).powi(2)).sqrt();
            if distance.is_finite() {
                total += distance / (dt_ms / 1000.0);
                segments += 1;
            }
        }
        prev = point;
    }

    if segments == 0 {
        0.0
    } else {
        total / segments as f64
    }
}

/// Piecewise pointer score in `[0, 1]`.
///
/// Below the floor reads as scripted or idle input, above the ceiling as a
/// teleporting cursor; both get `out_of_band_score`. Inside the band the
/// score rises linearly to 1 at `reference_velocity`.
pub fn mouse_score(velocity: f64, band: &MouseBand) -> f64 {
    if !velocity.is_finite() || velocity < band.min_velocity || velocity > band.max_velocity {
        return band.out_of_band_score.clamp(0.0, 1.0);
    }
    if band.reference_velocity <= 0.0 {
        return 1.0;
    }
    (velocity / band.reference_velocity).clamp(0.0, 1.0)
}
