//! Average Directional Index.
//!
//! `+DM`/`−DM` come from consecutive high/low differences (each zeroed unless
//! positive and larger than the opposite move). Smoothed DM over smoothed True
//! Range gives `+DI`/`−DI`; `DX = |+DI − −DI| / (+DI + −DI) × 100` smoothed
//! again gives ADX. Zero denominators resolve to 0.

use super::{last_of, Evaluation, Indicator};
use crate::{
    numeric::{self, Smoothing},
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    Period, Result, OHLCV,
};

impl_with_defaults!(AdxIndicator);

const PERIOD: ParamMeta = ParamMeta::period("period", 14.0, (1.0, 250.0, 1.0), "Smoothing period");
const SMOOTHING: ParamMeta =
    ParamMeta::choice("smoothing", Smoothing::CHOICES, "DM/TR and DX smoothing");

static ADX_PARAMS: &[ParamMeta] = &[PERIOD, SMOOTHING];

#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub period: Period,
    pub smoothing: Smoothing,
}

impl Default for AdxIndicator {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            smoothing: Smoothing::Wilder,
        }
    }
}

impl AdxIndicator {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    /// Trend strength bucket for an ADX value
    pub fn trend_strength(adx: f64) -> &'static str {
        if adx < 20.0 {
            "weak"
        } else if adx < 40.0 {
            "moderate"
        } else if adx < 60.0 {
            "strong"
        } else {
            "very_strong"
        }
    }
}

impl Indicator for AdxIndicator {
    fn indicator_type(&self) -> &'static str {
        "adx"
    }

    fn minimum_periods(&self) -> usize {
        2 * self.period.get() + 1
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let n = bars.len();
        let p = self.period.get();
        let true_range = numeric::true_range(bars);

        let mut tr = vec![None; n];
        let mut plus_dm = vec![None; n];
        let mut minus_dm = vec![None; n];
        for i in 1..n {
            let up = bars[i].high() - bars[i - 1].high();
            let down = bars[i - 1].low() - bars[i].low();
            tr[i] = Some(true_range[i]);
            plus_dm[i] = Some(if up > down && up > 0.0 { up } else { 0.0 });
            minus_dm[i] = Some(if down > up && down > 0.0 { down } else { 0.0 });
        }

        let tr_s = numeric::smooth(&tr, p, self.smoothing);
        let pdm_s = numeric::smooth(&plus_dm, p, self.smoothing);
        let mdm_s = numeric::smooth(&minus_dm, p, self.smoothing);

        let mut plus_di = vec![None; n];
        let mut minus_di = vec![None; n];
        let mut dx = vec![None; n];
        for i in 0..n {
            if let (Some(t), Some(pd), Some(md)) = (tr_s[i], pdm_s[i], mdm_s[i]) {
                let pdi = numeric::ratio_or(pd, t, 0.0) * 100.0;
                let mdi = numeric::ratio_or(md, t, 0.0) * 100.0;
                plus_di[i] = Some(pdi);
                minus_di[i] = Some(mdi);
                dx[i] = Some(numeric::ratio_or((pdi - mdi).abs(), pdi + mdi, 0.0) * 100.0);
            }
        }
        let mut adx = numeric::smooth(&dx, p, self.smoothing);

        let min = self.minimum_periods();
        for s in [&mut adx, &mut plus_di, &mut minus_di, &mut dx] {
            numeric::warm_up(s, min);
        }

        IndicatorSeries::from([
            ("adx".to_string(), adx),
            ("plus_di".to_string(), plus_di),
            ("minus_di".to_string(), minus_di),
            ("dx".to_string(), dx),
        ])
    }

    fn evaluate<T: OHLCV>(&self, _bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let adx = last_of(series, "adx");
        let plus_di = last_of(series, "plus_di");
        let minus_di = last_of(series, "minus_di");

        let direction = match (plus_di, minus_di) {
            (Some(p), Some(m)) if p > m => "bullish",
            (Some(p), Some(m)) if p < m => "bearish",
            _ => "neutral",
        };
        let strength = adx.map_or("weak", Self::trend_strength);

        Evaluation::new(adx)
            .with_value("adx", adx)
            .with_value("plus_di", plus_di)
            .with_value("minus_di", minus_di)
            .with_value("dx", last_of(series, "dx"))
            .with_meta("trend_strength", strength)
            .with_meta("direction", direction)
            .with_meta("signal", direction)
            .with_meta("smoothing", self.smoothing.as_str())
    }
}

impl ParameterizedAlgorithm for AdxIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        ADX_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        Ok(Self {
            period: params.period(&PERIOD)?,
            smoothing: params.choice(&SMOOTHING)?,
        })
    }

    fn implementation_id() -> &'static str {
        "adx"
    }
}
