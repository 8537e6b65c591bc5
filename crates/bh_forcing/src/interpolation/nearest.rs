// crates/bh_forcing/src/interpolation/nearest.rs

//! 最近站点插值

use super::Sample;
use glam::DVec2;

/// 距目标最近的站点下标，等距时取先出现者
pub fn nearest_index(target: DVec2, samples: &[Sample]) -> Option<usize> {
    samples
        .iter()
        .map(|s| s.position.distance_squared(target))
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
}

/// 最近站点的值
pub fn nearest(target: DVec2, samples: &[Sample], values: &[f64]) -> Option<f64> {
    nearest_index(target, samples).map(|i| values[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, value: f64) -> Sample {
        Sample {
            position: DVec2::new(x, 0.0),
            elevation: 0.0,
            value,
        }
    }

    #[test]
    fn test_nearest() {
        let samples = vec![sample(0.0, 1.0), sample(10.0, 2.0)];
        let v = [1.0, 2.0];
        assert_eq!(nearest(DVec2::new(2.0, 0.0), &samples, &v), Some(1.0));
        assert_eq!(nearest(DVec2::new(8.0, 3.0), &samples, &v), Some(2.0));
    }

    #[test]
    fn test_tie_takes_first() {
        let samples = vec![sample(-1.0, 1.0), sample(1.0, 2.0)];
        assert_eq!(nearest_index(DVec2::ZERO, &samples), Some(0));
    }

    #[test]
    fn test_empty() {
        assert_eq!(nearest_index(DVec2::ZERO, &[]), None);
    }
}
