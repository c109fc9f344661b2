//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: the value appears on the n-th observation.

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn warmup_bars(&self) -> usize {
        self.period
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn update(&mut self, price: f64) -> Option<f64> {
        match self.value {
            Some(prev) => {
                self.value = Some(price * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seen += 1;
                self.seed_sum += price;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(ema: &mut Ema, prices: &[f64]) -> Vec<Option<f64>> {
        prices.iter().map(|&p| ema.update(p)).collect()
    }

    #[test]
    fn ema_warmup() {
        let mut ema = Ema::new(3);
        let values = feed(&mut ema, &[10.0, 20.0, 30.0, 40.0, 50.0]);

        assert!(values[0].is_none());
        assert!(values[1].is_none());
        assert!(values[2].is_some());
        assert!(values[3].is_some());
        assert!(values[4].is_some());
    }

    #[test]
    fn ema_period_1_tracks_price() {
        let mut ema = Ema::new(1);
        let values = feed(&mut ema, &[10.0, 20.0, 30.0]);

        assert!((values[0].unwrap() - 10.0).abs() < f64::EPSILON);
        assert!((values[1].unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((values[2].unwrap() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_seed_is_sma() {
        let mut ema = Ema::new(3);
        let values = feed(&mut ema, &[10.0, 20.0, 30.0]);
        let expected_sma = (10.0 + 20.0 + 30.0) / 3.0;
        assert!((values[2].unwrap() - expected_sma).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let mut ema = Ema::new(3);
        let values = feed(&mut ema, &[10.0, 20.0, 30.0, 40.0, 50.0]);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((values[3].unwrap() - ema_3).abs() < f64::EPSILON);
        assert!((values[4].unwrap() - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let mut ema = Ema::new(3);
        for value in feed(&mut ema, &[100.0; 5]).into_iter().flatten() {
            assert!((value - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_period_0_never_ready() {
        let mut ema = Ema::new(0);
        assert!(feed(&mut ema, &[10.0, 20.0]).iter().all(Option::is_none));
    }

    #[test]
    fn ema_value_matches_last_update() {
        let mut ema = Ema::new(2);
        ema.update(4.0);
        let last = ema.update(6.0);
        assert_eq!(ema.value(), last);
    }
}
