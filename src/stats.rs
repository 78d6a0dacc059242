use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct Statistics {
    pub avg: f64,
    pub min: f64,
    pub p15: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub cnt: usize,
}

impl Statistics {
    /// Avg, Min, P15 .. P99, Max in table column order.
    pub fn values(&self) -> [f64; 10] {
        [
            self.avg, self.min, self.p15, self.p25, self.p50, self.p75, self.p90, self.p95,
            self.p99, self.max,
        ]
    }
}

pub fn statistics_from_sorted(data: &[f64]) -> Statistics {
    if data.is_empty() {
        return Statistics {
            avg: f64::NAN,
            min: f64::NAN,
            p15: f64::NAN,
            p25: f64::NAN,
            p50: f64::NAN,
            p75: f64::NAN,
            p90: f64::NAN,
            p95: f64::NAN,
            p99: f64::NAN,
            max: f64::NAN,
            cnt: 0,
        };
    }

    let cnt = data.len();
    let sum: f64 = data.iter().sum();
    let avg = (sum / (cnt as f64) * 100.0).round() / 100.0;
    let pick = |q: f64| -> f64 {
        let idx = ((cnt - 1) as f64 * q) as usize;
        data[idx.min(cnt - 1)]
    };

    Statistics {
        avg,
        min: data[0],
        p15: pick(0.15),
        p25: pick(0.25),
        p50: pick(0.5),
        p75: pick(0.75),
        p90: pick(0.9),
        p95: pick(0.95),
        p99: pick(0.99),
        max: data.last().copied().unwrap_or(f64::NAN),
        cnt,
    }
}

pub fn statistics_from_vec(mut data: Vec<f64>) -> Statistics {
    data.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    statistics_from_sorted(&data)
}
