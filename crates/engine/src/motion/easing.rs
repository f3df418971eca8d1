use serde::Deserialize;

/// Maps normalized progress `t` in `[0, 1]` to eased progress in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    #[default]
    EaseOutQuad,
    EaseOutCubic,
    EaseInOutSine,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 1.0 };
        match self {
            Easing::Linear => t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutSine => -((std::f32::consts::PI * t).cos() - 1.0) * 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 4] = [
        Easing::Linear,
        Easing::EaseOutQuad,
        Easing::EaseOutCubic,
        Easing::EaseInOutSine,
    ];

    #[test]
    fn endpoints_are_fixed() {
        for easing in ALL {
            assert!(easing.apply(0.0).abs() < 1e-6, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{easing:?}");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for easing in ALL {
            let mut previous = 0.0;
            for step in 1..=100 {
                let value = easing.apply(step as f32 / 100.0);
                assert!(value + 1e-6 >= previous, "{easing:?} dipped at {step}");
                previous = value;
            }
        }
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        assert_eq!(Easing::EaseOutQuad.apply(-3.0), 0.0);
        assert_eq!(Easing::EaseOutQuad.apply(7.0), 1.0);
        assert_eq!(Easing::Linear.apply(f32::NAN), 1.0);
    }

    #[test]
    fn ease_out_leads_linear() {
        assert!(Easing::EaseOutQuad.apply(0.5) > 0.5);
        assert!(Easing::EaseOutCubic.apply(0.5) > Easing::EaseOutQuad.apply(0.5));
    }
}
