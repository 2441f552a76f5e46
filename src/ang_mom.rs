//! Angular momentum coupling.
use fnv::FnvHashMap;
use wigner_symbols::Wigner6j;
use super::half::Half;

/// Returns `(-1)^φ`
#[inline]
pub fn phase(phi: i32) -> f64 {
    if phi % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Returns `(2 * j + 1)^(e / 2)`.
#[inline]
pub fn jweight(j: Half<i32>, e: i32) -> f64 {
    j.weight(e)
}

/// Memoized Wigner 6-j symbols.
#[derive(Clone, Debug, Default)]
pub struct Wigner6jCtx(FnvHashMap<[i32; 6], f64>);

impl Wigner6jCtx {
    /// `{j1 j2 j3; j4 j5 j6}`, zero if any of the four triads violates the
    /// triangle rule.
    pub fn get(&mut self, w6j: Wigner6j) -> f64 {
        let key = [w6j.tj1, w6j.tj2, w6j.tj3, w6j.tj4, w6j.tj5, w6j.tj6];
        if !triads_6j(&key) {
            return 0.0;
        }
        *self.0.entry(key).or_insert_with(|| f64::from(w6j.value()))
    }

    /// Shorthand taking `Half` arguments.
    #[inline]
    pub fn w6j(&mut self, j1: Half<i32>, j2: Half<i32>, j3: Half<i32>,
               j4: Half<i32>, j5: Half<i32>, j6: Half<i32>) -> f64 {
        self.get(Wigner6j {
            tj1: j1.twice(),
            tj2: j2.twice(),
            tj3: j3.twice(),
            tj4: j4.twice(),
            tj5: j5.twice(),
            tj6: j6.twice(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn triads_6j(tj: &[i32; 6]) -> bool {
    let tri = |a: i32, b: i32, c: i32| Half(a).triangle(Half(b), Half(c));
    tri(tj[0], tj[1], tj[2])
        && tri(tj[0], tj[4], tj[5])
        && tri(tj[3], tj[1], tj[5])
        && tri(tj[3], tj[4], tj[2])
}

/// `⟨½ ta ½ tb | T Tz⟩` for coupling two nucleon isospins, where `ta`, `tb`
/// are the projections (±½) and `T` is 0 or 1.
pub fn isospin_cg(ta: Half<i32>, tb: Half<i32>, t: i32, tz: i32) -> f64 {
    if ta + tb != Half::from(tz) || !(t == 0 || t == 1) || tz.abs() > t {
        return 0.0;
    }
    if t == 1 && tz != 0 {
        return 1.0;
    }
    // tz == 0 with ta == −tb
    let s = std::f64::consts::FRAC_1_SQRT_2;
    if t == 1 || ta > tb {
        s
    } else {
        -s
    }
}
