//! Round scale bar values for a given pixel scale.

/// Scale bar appearance and sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalebarOptions {
    /// Target tick spacing on screen
    pub preferred_size_in_pixels: f64,
    /// Upper bound on the tick spacing, if any
    pub max_size_in_pixels: Option<f64>,
    pub unit: String,
    pub color: [f32; 4],
    pub font_height: f32,
}

impl Default for ScalebarOptions {
    fn default() -> Self {
        Self {
            preferred_size_in_pixels: 100.0,
            max_size_in_pixels: None,
            unit: "µm".to_string(),
            color: [0.0, 0.0, 0.0, 0.93],
            font_height: 12.0,
        }
    }
}

/// One tick interval: `value` world units span `size_in_pixel` pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalebarAttributes {
    pub size_in_pixel: f64,
    pub value: f64,
    pub unit: String,
}

impl ScalebarAttributes {
    /// Label of the `n`-th tick (`n × value` + unit).
    pub fn label(&self, n: usize) -> String {
        format!("{} {}", format_value(n as f64 * self.value, self.value), self.unit)
    }
}

const MANTISSAS: [f64; 3] = [1.0, 2.0, 5.0];

/// Pick `value ∈ {1, 2, 5} × 10ⁿ` whose on-screen size is closest to the
/// preferred size and not above the maximum. `None` for a degenerate pixel
/// scale or a maximum nothing fits under.
pub fn compute_scalebar_attributes(
    pixel_scale: f64,
    options: &ScalebarOptions,
) -> Option<ScalebarAttributes> {
    let preferred = options.preferred_size_in_pixels;
    if !pixel_scale.is_finite() || pixel_scale <= 0.0 || !(preferred > 0.0) {
        return None;
    }
    let max = options.max_size_in_pixels.unwrap_or(f64::INFINITY);
    if !(max > 0.0) {
        return None;
    }

    let exponent = (preferred * pixel_scale).log10().floor() as i32;
    let mut best: Option<(f64, f64)> = None;
    // Walk down from one decade above until something fits the maximum.
    for e in (exponent - 40..=exponent + 1).rev() {
        let decade = 10f64.powi(e);
        for m in MANTISSAS.iter().rev() {
            let value = m * decade;
            let size = value / pixel_scale;
            if size > max {
                continue;
            }
            let better = match best {
                Some((_, best_size)) => (size - preferred).abs() < (best_size - preferred).abs(),
                None => true,
            };
            if better {
                best = Some((value, size));
            }
        }
        if let Some((_, size)) = best {
            // Candidates only shrink from here.
            if size < preferred && e < exponent - 1 {
                break;
            }
        }
    }

    best.map(|(value, size_in_pixel)| ScalebarAttributes {
        size_in_pixel,
        value,
        unit: options.unit.clone(),
    })
}

/// Format `x` with as many decimals as `step` needs, hiding float noise
/// such as `0.30000000000000004`.
fn format_value(x: f64, step: f64) -> String {
    let decimals = if step >= 1.0 {
        0
    } else {
        (-(step.log10() + 1e-9).floor()).max(0.0) as usize
    };
    format!("{:.*}", decimals, x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pixel_scale: f64) -> ScalebarAttributes {
        compute_scalebar_attributes(pixel_scale, &ScalebarOptions::default()).unwrap()
    }

    #[test]
    fn exact_fit() {
        // 1 µm per pixel: 100 µm is exactly 100 px.
        let a = attrs(1.0);
        assert_eq!(a.value, 100.0);
        assert!((a.size_in_pixel - 100.0).abs() < 1e-9);
        assert_eq!(a.unit, "µm");
    }

    #[test]
    fn picks_closest_round_value() {
        // 0.01 µm/px: preferred 1 µm; candidates 1 (100 px) wins.
        assert_eq!(attrs(0.01).value, 1.0);
        // 0.3 µm/px: 30 µm preferred; 20 (66.7 px) vs 50 (166.7 px) → 20.
        assert_eq!(attrs(0.3).value, 20.0);
        // 0.4 µm/px: 40 preferred; 50 (125 px) beats 20 (50 px).
        assert_eq!(attrs(0.4).value, 50.0);
    }

    #[test]
    fn value_over_pixel_scale_is_size() {
        for ps in [0.0037, 0.25, 1.7, 42.0, 913.0] {
            let a = attrs(ps);
            assert!((a.size_in_pixel - a.value / ps).abs() < 1e-9);
            let mantissa = a.value / 10f64.powf(a.value.log10().floor());
            assert!(
                [1.0, 2.0, 5.0].iter().any(|m| (m - mantissa).abs() < 1e-9),
                "value {} is not round",
                a.value
            );
        }
    }

    #[test]
    fn respects_maximum_width() {
        let options = ScalebarOptions {
            max_size_in_pixels: Some(90.0),
            ..ScalebarOptions::default()
        };
        let a = compute_scalebar_attributes(1.0, &options).unwrap();
        assert_eq!(a.value, 50.0);
        assert!(a.size_in_pixel <= 90.0);
    }

    #[test]
    fn degenerate_scales_yield_none() {
        let o = ScalebarOptions::default();
        assert!(compute_scalebar_attributes(0.0, &o).is_none());
        assert!(compute_scalebar_attributes(-1.0, &o).is_none());
        assert!(compute_scalebar_attributes(f64::NAN, &o).is_none());
        assert!(compute_scalebar_attributes(f64::INFINITY, &o).is_none());
    }

    #[test]
    fn labels_hide_float_noise() {
        let a = ScalebarAttributes {
            size_in_pixel: 100.0,
            value: 0.1,
            unit: "µm".into(),
        };
        assert_eq!(a.label(3), "0.3 µm");
        let b = ScalebarAttributes {
            size_in_pixel: 100.0,
            value: 20.0,
            unit: "µm".into(),
        };
        assert_eq!(b.label(2), "40 µm");
    }
}
