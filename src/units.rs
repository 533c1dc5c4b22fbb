pub mod visibility {
    use lazy_static::lazy_static;
    use regex::Regex;

    /// Distance reported for CAVOK and the "10 km o más" sentinel.
    pub const UNLIMITED_M: u32 = 10_000;

    /// The shapes a decoded `visibility.main` value can take, in the order they are tried.
    #[derive(Debug, PartialEq, Eq)]
    enum Form<'a> {
        Unlimited,
        Meters(&'a str),
        Kilometers(&'a str),
        RawGroup(&'a str),
        Unrecognized,
    }

    impl<'a> Form<'a> {
        fn detect(text: &'a str) -> Self {
            lazy_static! {
                static ref UNLIMITED: Regex = Regex::new(r"(?i)cavok|10 km o más").unwrap();
                static ref METERS: Regex = Regex::new(r"(?i)(\d+)\s*m\b").unwrap();
                static ref KILOMETERS: Regex = Regex::new(r"(?i)(\d+)\s*km\b").unwrap();
                static ref RAW_GROUP: Regex = Regex::new(r"^\d{4}$").unwrap();
            }

            fn digits<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
                re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
            }

            if UNLIMITED.is_match(text) {
                Form::Unlimited
            } else if let Some(d) = digits(&METERS, text) {
                Form::Meters(d)
            } else if let Some(d) = digits(&KILOMETERS, text) {
                Form::Kilometers(d)
            } else if RAW_GROUP.is_match(text) {
                Form::RawGroup(text)
            } else {
                Form::Unrecognized
            }
        }

        fn meters(self) -> Option<u32> {
            match self {
                Form::Unlimited => Some(UNLIMITED_M),
                Form::Meters(d) | Form::RawGroup(d) => d.parse().ok(),
                Form::Kilometers(d) => d.parse::<u32>().ok()?.checked_mul(1000),
                Form::Unrecognized => None,
            }
        }
    }

    /// Canonical visibility in meters, or `None` when the text is not one of the known forms.
    pub fn normalize(main: &str) -> Option<u32> {
        if main.is_empty() {
            return None;
        }
        Form::detect(main).meters()
    }

}

pub mod speed {
    const KPH_PER_KT: f32 = 1.852;

    pub fn kt2kph(kt: f32) -> f32 {
        kt * KPH_PER_KT
    }

    /// Leading number of a formatted speed such as `"15 kt"`.
    pub fn knots(speed: &str) -> Option<f32> {
        speed.split_whitespace().next()?.parse().ok()
    }

    #[test]
    fn test_speed() {
        assert!((kt2kph(10.0) - 18.52).abs() < 1e-4);
        assert_eq!(knots("15 kt"), Some(15.0));
        assert_eq!(knots("No disponible"), None);
        assert_eq!(knots(""), None);
    }
}

pub mod direction {
    use lazy_static::lazy_static;
    use regex::Regex;

    const COMPASS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSO", "SO", "OSO", "O", "ONO",
        "NO", "NNO",
    ];

    pub fn degree_to_compass<'a>(deg: f32) -> &'a str {
        let deg = deg.rem_euclid(360.0);
        let val = (deg / 22.5 + 0.5) as usize;
        let idx = val % 16;
        COMPASS[idx]
    }

    /// Bearing for the compass rose, or `None` when the wind has no single direction.
    ///
    /// Variable (`VRB`) and calm winds never get a bearing, whatever `degrees` says. Any finite
    /// `degrees` is wrapped into `[0, 360)`, so negative and out-of-range values still land on
    /// a valid bearing.
    pub fn bearing_for(direction: &str, degrees: Option<f64>) -> Option<u16> {
        lazy_static! {
            static ref UNDIRECTED: Regex = Regex::new(r"(?i)variable|vrb|\bcalma?\b").unwrap();
        }

        if UNDIRECTED.is_match(direction) {
            return None;
        }
        let deg = degrees.filter(|d| d.is_finite())?;
        let bearing = deg.rem_euclid(360.0).floor() as u16;
        // rem_euclid rounds tiny negatives up to exactly 360.0
        Some(bearing % 360)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use rstest::rstest;

        #[test]
        fn test_degree_to_compass() {
            assert_eq!(degree_to_compass(0.0), "N");
            assert_eq!(degree_to_compass(90.0), "E");
            assert_eq!(degree_to_compass(180.0), "S");
            assert_eq!(degree_to_compass(210.0), "SSO");
            assert_eq!(degree_to_compass(270.0), "O");
            assert_eq!(degree_to_compass(360.0), "N");
            assert_eq!(degree_to_compass(-90.0), "O");
        }

        #[rstest]
        #[case(0, 0)]
        #[case(210, 210)]
        #[case(359, 359)]
        #[case(360, 0)]
        #[case(725, 5)]
        #[case(-1, 359)]
        #[case(-90, 270)]
        #[case(-720, 0)]
        fn test_bearing_wraps(#[case] degrees: i64, #[case] expected: u16) {
            assert_eq!(bearing_for("210", Some(degrees as f64)), Some(expected));
        }

        #[test]
        fn test_bearing_in_range_for_any_integer() {
            for d in (-5000_i64..5000).chain([i32::MIN as i64, i32::MAX as i64]) {
                let bearing = bearing_for("210", Some(d as f64)).unwrap();
                assert!(bearing < 360);
                assert_eq!(bearing as i64, d.rem_euclid(360));
            }
        }

        #[test]
        fn test_bearing_tiny_negative() {
            assert_eq!(bearing_for("", Some(-1e-20)), Some(0));
        }

        #[rstest]
        #[case("VRB", Some(180.0))]
        #[case("Variable", Some(90.0))]
        #[case("variable", None)]
        #[case("vrb03kt", Some(30.0))]
        #[case("Calma", Some(0.0))]
        #[case("calm", Some(0.0))]
        #[case("210° (suroeste)", None)]
        #[case("210° (suroeste)", Some(f64::NAN))]
        #[case("210° (suroeste)", Some(f64::INFINITY))]
        fn test_no_bearing(#[case] direction: &str, #[case] degrees: Option<f64>) {
            assert_eq!(bearing_for(direction, degrees), None);
        }

        #[test]
        fn test_fixed_direction_text() {
            assert_eq!(bearing_for("210° (suroeste)", Some(210.0)), Some(210));
            // "calmado" is not a calm-wind marker
            assert_eq!(bearing_for("calmado", Some(10.0)), Some(10));
        }
    }
}
