//! Single-particle orbits, two-body kets, and bijective charts.
use std::borrow::Borrow;
use std::error::Error;
use std::hash::Hash;
use std::iter::FromIterator;
use std::{fmt, str};
use fnv::FnvHashMap;
use regex::Regex;
use super::half::Half;
use super::parity::Parity;
use super::utils;

lazy_static! {
    pub static ref ORB_ANG_CHART: HashChart<char> =
        "spdfghiklmnoqrtuvwxyz".chars().collect();
}

/// A chart is a bijection between a contiguous range of integers and an
/// arbitrary set of objects of type `T`.  `HashChart` is an implementation of
/// this idea using `HashMap`.
#[derive(Clone)]
pub struct HashChart<T> {
    pub encoder: FnvHashMap<T, usize>,
    pub decoder: Vec<T>,
}

impl<T> Default for HashChart<T> {
    fn default() -> Self {
        Self {
            encoder: utils::default_hash_map(),
            decoder: Default::default(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HashChart<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("HashChart").field(&self.decoder).finish()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HashChartInsertResult {
    /// Whether the insert was successful
    pub inserted: bool,
    /// Index of the inserted item
    pub index: usize,
}

impl<T> HashChart<T> {
    pub fn len(&self) -> usize {
        self.decoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoder.is_empty()
    }

    pub fn decode(&self, i: usize) -> Option<&T> {
        self.decoder.get(i)
    }
}

impl<T: Hash + Eq> HashChart<T> {
    pub fn encode<Q>(&self, q: &Q) -> Option<usize>
        where Q: Hash + Eq + ?Sized,
              T: Borrow<Q>,
    {
        self.encoder.get(q).cloned()
    }
}

impl<T: Hash + Eq + Clone> HashChart<T> {
    pub fn insert(&mut self, t: T) -> HashChartInsertResult {
        let mut inserted = false;
        let query = t.clone();
        let decoder = &mut self.decoder;
        let index = *self.encoder.entry(query).or_insert_with(|| {
            inserted = true;
            let index = decoder.len();
            decoder.push(t);
            index
        });
        HashChartInsertResult { inserted, index }
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for HashChart<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut chart = Self::default();
        for t in iter {
            chart.insert(t);
        }
        chart
    }
}

/// Single-particle orbit of a nucleon in a spherical basis.
///
/// Uses the particle-physics convention: protons have `tz = +1/2` and
/// neutrons have `tz = −1/2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Orbit {
    pub n: i32,
    pub l: i32,
    pub j: Half<i32>,
    pub tz: Half<i32>,
}

impl Orbit {
    pub fn proton(n: i32, l: i32, j: Half<i32>) -> Self {
        Self { n, l, j, tz: Half(1) }
    }

    pub fn neutron(n: i32, l: i32, j: Half<i32>) -> Self {
        Self { n, l, j, tz: Half(-1) }
    }

    #[inline]
    pub fn parity(self) -> Parity {
        Parity::of(self.l)
    }

    /// Harmonic oscillator shell index `2 n + l`.
    #[inline]
    pub fn shell(self) -> i32 {
        2 * self.n + self.l
    }

    /// The orbit with the same `(n, l, j)` and the given `tz`.
    #[inline]
    pub fn with_tz(self, tz: Half<i32>) -> Self {
        Self { tz, .. self }
    }

    /// Whether the two orbits differ only in `tz`.
    #[inline]
    pub fn same_nlj(self, other: Self) -> bool {
        self.with_tz(other.tz) == other
    }
}

/// Spectroscopic label, e.g. `0p3/2p` for a proton or `1s1/2n` for a
/// neutron.
impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let l = ORB_ANG_CHART.decode(self.l as usize).cloned().unwrap_or('?');
        let w = if self.tz > Half(0) { 'p' } else { 'n' };
        write!(f, "{}{}{}/2{}", self.n, l, self.j.twice(), w)
    }
}

impl str::FromStr for Orbit {
    type Err = Box<dyn Error + Send + Sync>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let m = re!(r"^(\d+)([a-z])(\d+)/2([pn])$").captures(s.trim())
            .ok_or_else(|| format!("invalid orbit label: {:?}", s))?;
        let n = m[1].parse()?;
        let l = m[2].chars().next()
            .and_then(|c| ORB_ANG_CHART.encode(&c))
            .ok_or("unknown orbital angular momentum")? as i32;
        let j = Half(m[3].parse()?);
        if Half::from(l).abs_diff(j) != Half(1) {
            return Err("l must be within 1/2 of j".into());
        }
        let tz = match &m[4] {
            "p" => Half(1),
            _ => Half(-1),
        };
        Ok(Self { n, l, j, tz })
    }
}

/// Iterates over the `(n, l, j)` orbits of the 3D harmonic oscillator in
/// order of increasing shell.
#[derive(Clone, Copy, Debug)]
pub struct Ho3dIter {
    n: i32,
    l: i32,
    j: Half<i32>,
}

impl Default for Ho3dIter {
    fn default() -> Self {
        Ho3dIter { n: 0, l: 0, j: Half(1) }
    }
}

impl Iterator for Ho3dIter {
    type Item = (i32, i32, Half<i32>);
    fn next(&mut self) -> Option<Self::Item> {
        let item = (self.n, self.l, self.j);
        let greater_j = Half::from(self.l) + Half(1);
        if self.j != greater_j {
            self.j = greater_j;
        } else if self.n > 0 {
            self.n -= 1;
            self.l += 2;
            self.j = Half::from(self.l) - Half(1);
        } else {
            let e = 2 * item.0 + item.1 + 1;
            self.n = e / 2;
            self.l = e % 2;
            self.j = Half(1);
        }
        Some(item)
    }
}

/// Two-body ket `|p q⟩` in canonical order `p ≤ q`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ket {
    pub p: usize,
    pub q: usize,
    pub jp: Half<i32>,
    pub jq: Half<i32>,
}

impl Ket {
    /// Exchange phase: `|q p; J⟩ = phase(J) |p q; J⟩`.
    #[inline]
    pub fn phase(&self, j12: i32) -> f64 {
        -(self.jp + self.jq - Half::from(j12)).phase()
    }

    #[inline]
    pub fn is_diag(&self) -> bool {
        self.p == self.q
    }

    /// `√(1 + δpq)`, the norm of the unnormalized antisymmetrized state.
    #[inline]
    pub fn norm(&self) -> f64 {
        if self.is_diag() {
            std::f64::consts::SQRT_2
        } else {
            1.0
        }
    }
}
