use chroma_watch::config::{ThresholdConfig, Variant};
use chroma_watch::core_modules::alarm::{AlarmStateMachine, PlaybackSignal, SignalPolicy};
use chroma_watch::core_modules::classifier::classify;
use chroma_watch::core_modules::frame_aggregator::{FrameStats, aggregate};
use chroma_watch::core_modules::pixel::{Pixel, rgb_to_hsv};
use proptest::prelude::*;

fn any_pixel() -> impl Strategy<Value = Pixel> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Pixel::new(r, g, b))
}

proptest! {
    #[test]
    fn gray_is_achromatic(level in any::<u8>()) {
        let hsv = rgb_to_hsv(level, level, level);
        prop_assert_eq!(hsv.hue, 0.0);
        prop_assert_eq!(hsv.saturation, 0.0);
        let expected = level as f64 / 255.0 * 100.0;
        prop_assert!((hsv.value - expected).abs() < 1e-9, "value={}", hsv.value);
    }

    #[test]
    fn hsv_stays_in_range(pixel in any_pixel()) {
        let hsv = pixel.hsv();
        prop_assert!((0.0..360.0).contains(&hsv.hue), "hue={}", hsv.hue);
        prop_assert!((0.0..=100.0).contains(&hsv.saturation), "saturation={}", hsv.saturation);
        prop_assert!((0.0..=100.0).contains(&hsv.value), "value={}", hsv.value);

        let rounded = hsv.rounded();
        prop_assert!((0.0..360.0).contains(&rounded.hue), "rounded hue={}", rounded.hue);
    }

    #[test]
    fn classification_is_deterministic(pixel in any_pixel()) {
        for variant in Variant::ALL {
            let config = ThresholdConfig::preset(variant);
            let thresholds = config.thresholds();
            prop_assert_eq!(classify(&pixel, thresholds), classify(&pixel, thresholds));
        }
    }

    #[test]
    fn coverage_is_a_percentage(pixels in proptest::collection::vec(any::<[u8; 4]>(), 1..64)) {
        let buffer: Vec<u8> = pixels.iter().flatten().copied().collect();
        let config = ThresholdConfig::preset(Variant::Classic);
        let stats = aggregate(&buffer, config.thresholds()).unwrap();

        prop_assert_eq!(stats.pixel_count(), pixels.len() as u64);
        for share in stats.shares() {
            prop_assert!(
                (0.0..=100.0).contains(&share.percentage),
                "{}={}",
                share.name,
                share.percentage
            );
        }
    }

    #[test]
    fn edge_signals_alternate(samples in proptest::collection::vec(0.0f64..40.0, 1..50)) {
        let config = ThresholdConfig::preset(Variant::GreenOnly);
        let mut alarm =
            AlarmStateMachine::new(config.trigger().clone(), SignalPolicy::EdgeTriggered);

        let mut expected = PlaybackSignal::Start;
        for green in samples {
            let stats = FrameStats::from_percentages([("green", green)]);
            if let Some(signal) = alarm.evaluate(&stats) {
                prop_assert_eq!(signal, expected);
                expected = match signal {
                    PlaybackSignal::Start => PlaybackSignal::Stop,
                    PlaybackSignal::Stop => PlaybackSignal::Start,
                };
            }
        }
    }
}
