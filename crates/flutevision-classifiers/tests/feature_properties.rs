//! Property tests for feature extraction invariants

use flutevision_classifiers::{FeatureExtractor, FEATURES_PER_HAND, FEATURE_VECTOR_LEN};
use flutevision_core::{HandLandmarks, Landmark, LANDMARKS_PER_HAND};
use proptest::prelude::*;

fn hand_strategy() -> impl Strategy<Value = HandLandmarks> {
    prop::collection::vec((0.0f64..1.0, 0.0f64..1.0), LANDMARKS_PER_HAND).prop_map(|coords| {
        let points: Vec<Landmark> = coords.into_iter().map(|(x, y)| Landmark::new(x, y)).collect();
        HandLandmarks::try_from(points).unwrap()
    })
}

proptest! {
    #[test]
    fn test_vector_length_is_fixed(hands in prop::collection::vec(hand_strategy(), 1..=2)) {
        let features = FeatureExtractor::new().extract(&hands).unwrap();
        prop_assert_eq!(features.len(), FEATURE_VECTOR_LEN);
    }

    #[test]
    fn test_padding_is_zero(hands in prop::collection::vec(hand_strategy(), 1..=2)) {
        let features = FeatureExtractor::new().extract(&hands).unwrap();
        let computed = FEATURES_PER_HAND * hands.len();
        prop_assert!(features.as_slice()[computed..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_values_are_finite(hands in prop::collection::vec(hand_strategy(), 1..=2)) {
        let features = FeatureExtractor::new().extract(&hands).unwrap();
        prop_assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_extraction_is_deterministic(hands in prop::collection::vec(hand_strategy(), 1..=2)) {
        let extractor = FeatureExtractor::new();
        let a = extractor.extract(&hands).unwrap();
        let b = extractor.extract(&hands).unwrap();
        let a_bits: Vec<u64> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u64> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        prop_assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn test_bend_and_down_ranges(hand in hand_strategy()) {
        let features = FeatureExtractor::new().extract(&[hand]).unwrap();
        let values = features.as_slice();
        for bend in &values[0..5] {
            prop_assert!((0.0..=1.0).contains(bend));
        }
        for down in &values[5..10] {
            prop_assert!(*down == 0.0 || *down == 1.0);
        }
        for height in &values[20..24] {
            prop_assert!((0.0..=1.0).contains(height));
        }
    }
}
