#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use analysis_core::{Bar, SupportResistanceConfig};
    use chrono::Utc;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to create sample bars
    fn sample_bars() -> Vec<Bar> {
        let prices = vec![
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, 106.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
            (111.0, 113.0, 110.0, 112.0),
            (112.0, 114.0, 111.0, 113.0),
            (113.0, 115.0, 112.0, 114.0),
            (114.0, 116.0, 113.0, 115.0),
        ];

        bars_from(&prices)
    }

    fn bars_from(prices: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: Utc::now() - chrono::Duration::days(prices.len() as i64 - i as i64),
                open,
                high,
                low,
                close,
                volume: 1000000.0,
            })
            .collect()
    }

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let prices: Vec<(f64, f64, f64, f64)> = closes.iter().map(|&c| (c, c + 1.0, c - 1.0, c)).collect();
        bars_from(&prices)
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 5);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert!((result[2].unwrap() - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[3].unwrap() - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
        assert!((result[4].unwrap() - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result, vec![None, None]);
    }

    #[test]
    fn test_sma_real_prices() {
        let prices = sample_prices();
        let result = sma(&prices, 5);

        let expected_first = (44.34 + 44.09 + 44.15 + 43.61 + 44.33) / 5.0;
        assert!((result[4].unwrap() - expected_first).abs() < 0.01);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let result = ema(&data, 3);

        assert_eq!(result[1], None);
        assert!((result[2].unwrap() - 4.0).abs() < 1e-10);
        // multiplier 0.5: (8 - 4) * 0.5 + 4 = 6
        assert!((result[3].unwrap() - 6.0).abs() < 1e-10);
        assert!((result[4].unwrap() - 8.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_basic() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        assert!(result[..14].iter().all(|v| v.is_none()));
        assert!(result[14..].iter().all(|v| v.is_some()));
        for value in result.iter().flatten() {
            assert!(*value >= 0.0 && *value <= 100.0, "RSI out of range: {}", value);
        }
        // Textbook series: the seed reading is around 70
        assert!((result[14].unwrap() - 70.46).abs() < 0.5);
    }

    #[test]
    fn test_rsi_bounds_on_volatile_data() {
        let data: Vec<f64> = (0..200)
            .map(|i| 50.0 + ((i * 37 % 17) as f64 - 8.0) * 3.0)
            .collect();
        for value in rsi(&data, 14).iter().flatten() {
            assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn test_rsi_no_losses_is_100() {
        let data: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        assert_eq!(latest(&rsi(&data, 14)), Some(100.0));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(rsi(&data, 14).iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_macd_alignment() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.2).sin() * 4.0).collect();
        let result = macd(&data, 12, 26, 9);

        assert_eq!(result.macd_line.len(), 60);
        assert!(result.macd_line[24].is_none());
        assert!(result.macd_line[25].is_some());
        // Signal needs 9 MACD values
        assert!(result.signal_line[32].is_none());
        assert!(result.signal_line[33].is_some());
        let h = result.histogram[40].unwrap();
        let expected = result.macd_line[40].unwrap() - result.signal_line[40].unwrap();
        assert!((h - expected).abs() < 1e-12);
    }

    #[test]
    fn test_macd_invalid_periods() {
        let data = vec![1.0; 40];
        let result = macd(&data, 26, 12, 9);
        assert!(result.macd_line.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_bollinger_bands() {
        let prices = sample_prices();
        let bb = bollinger_bands(&prices, 10, 2.0);

        assert!(bb.middle[8].is_none());
        for i in 9..prices.len() {
            let (u, m, l) = (bb.upper[i].unwrap(), bb.middle[i].unwrap(), bb.lower[i].unwrap());
            assert!(u > m && m > l);
            let pb = bb.percent_b[i].unwrap();
            assert!(((prices[i] - l) / (u - l) - pb).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bollinger_percent_b_undefined_when_flat() {
        let data = vec![25.0; 25];
        let bb = bollinger_bands(&data, 20, 2.0);

        assert_eq!(bb.upper[24], bb.lower[24]);
        assert!(bb.percent_b.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_stochastic() {
        let bars = sample_bars();
        let result = stochastic(&bars, 5, 3);

        assert!(result.k[3].is_none());
        assert!(result.k[4].is_some());
        // %D needs three %K values
        assert!(result.d[5].is_none());
        assert!(result.d[6].is_some());
        for k in result.k.iter().flatten() {
            assert!(*k >= 0.0 && *k <= 100.0);
        }
    }

    #[test]
    fn test_stochastic_flat_range() {
        let bars = bars_from(&vec![(10.0, 10.0, 10.0, 10.0); 6]);
        let result = stochastic(&bars, 5, 3);
        assert_eq!(latest(&result.k), Some(50.0));
    }

    #[test]
    fn test_williams_r() {
        let bars = sample_bars();
        let result = williams_r(&bars, 5);

        assert!(result[3].is_none());
        // Close 115 in a 5-bar range of 109..116
        let expected = -100.0 * (116.0 - 115.0) / (116.0 - 109.0);
        assert!((latest(&result).unwrap() - expected).abs() < 1e-10);
        for v in result.iter().flatten() {
            assert!(*v <= 0.0 && *v >= -100.0);
        }
    }

    #[test]
    fn test_adx_alignment() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes);
        let result = adx(&bars, 14);

        assert!(result.plus_di[13].is_none());
        assert!(result.plus_di[14].is_some());
        assert!(result.adx[26].is_none());
        assert!(result.adx[27].is_some());

        // Steady rise: all movement is directional up
        let value = latest(&result.adx).unwrap();
        assert!(value > 25.0);
        assert!(latest(&result.plus_di).unwrap() > latest(&result.minus_di).unwrap());
    }

    #[test]
    fn test_adx_insufficient_data() {
        let bars = sample_bars();
        let result = adx(&bars, 14);
        assert!(result.adx.iter().all(|v| v.is_none()));
        assert_eq!(result.adx.len(), bars.len());
    }

    #[test]
    fn test_support_resistance_levels() {
        // Oscillation with swing highs near 110 and swing lows near 90
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + 10.0 * ((i as f64) * std::f64::consts::PI / 10.0).sin())
            .collect();
        let bars = bars_from_closes(&closes);
        let config = SupportResistanceConfig::default();
        let levels = support_resistance(&bars, &config);

        assert!(!levels.is_empty());
        assert!(levels.len() <= config.max_levels);
        let current = bars.last().unwrap().close;
        for pair in levels.windows(2) {
            assert!((pair[0] - current).abs() <= (pair[1] - current).abs());
        }
        // Repeated swings collapse into one level per side
        assert!(levels.iter().any(|l| (l - 111.0).abs() < 1.0));
        assert!(levels.iter().any(|l| (l - 89.0).abs() < 1.0));
    }

    #[test]
    fn test_support_resistance_no_lookahead() {
        // A spike in the final bars is never confirmed as a pivot
        let mut closes = vec![100.0; 20];
        closes[18] = 130.0;
        let bars = bars_from_closes(&closes);
        let levels = support_resistance(&bars, &SupportResistanceConfig::default());
        assert!(levels.iter().all(|l| *l < 120.0));
    }
}
