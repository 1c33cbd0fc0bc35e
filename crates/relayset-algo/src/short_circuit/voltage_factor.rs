use crate::fault::OperatingCase;

/// Highest nominal voltage treated as low voltage.
const LV_LIMIT_KV: f64 = 1.0;

/// Voltage factor `c` per IEC 60909-0 Table 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageFactor {
    lv_tol_percent: f64,
}

impl VoltageFactor {
    pub fn new(lv_tol_percent: f64) -> Self {
        Self { lv_tol_percent }
    }

    pub fn c_max(&self, vn_kv: f64) -> f64 {
        if vn_kv <= LV_LIMIT_KV {
            if self.lv_tol_percent <= 6.0 {
                1.05
            } else {
                1.10
            }
        } else {
            1.10
        }
    }

    pub fn c_min(&self, vn_kv: f64) -> f64 {
        if vn_kv <= LV_LIMIT_KV {
            0.95
        } else {
            1.00
        }
    }

    pub fn c(&self, case: OperatingCase, vn_kv: f64) -> f64 {
        match case {
            OperatingCase::Max => self.c_max(vn_kv),
            OperatingCase::Min => self.c_min(vn_kv),
        }
    }
}
