use conv::ValueInto;
use fnv::FnvHashMap;

/// Shorthand for casting numbers.  Panics if out of range.
pub fn cast<T: ValueInto<U>, U>(x: T) -> U {
    x.value_into().expect("integer conversion failure")
}

#[inline]
pub fn default_hash_map<K, V>() -> FnvHashMap<K, V> {
    Default::default()
}

/// Tolerance for comparing floating-point numbers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Toler {
    pub relerr: f64,
    pub abserr: f64,
}

impl Default for Toler {
    fn default() -> Self {
        Self {
            relerr: 1e-10,
            abserr: 1e-12,
        }
    }
}

impl Toler {
    #[inline]
    pub fn is_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.abserr + self.relerr * a.abs().max(b.abs())
    }
}
